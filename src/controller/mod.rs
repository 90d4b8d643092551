//! Mode controller - the switch state machine.
//!
//! The controller is the only component allowed to mutate attachment state.
//! One switch runs at a time; the whole detach → teardown → instantiate →
//! attach sequence executes under a single lock, and every failure path
//! lands in a defined state: either the old mode untouched (detach failed)
//! or fully detached with no active instance (everything later).

pub mod instance;

pub use instance::ActiveInstance;

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::SwitchError;
use crate::events::{EventBus, ModeEvent};
use crate::profile::ProfileFactory;
use crate::registry::TemplateRegistry;
use crate::transport::TransportPort;

/// Orchestrates identity switches on one physical endpoint.
///
/// The switch lock guards the active instance itself: holding the lock *is*
/// holding the right to mutate attachment state. `current_mode` is a
/// lock-free mirror so status queries never wait behind an in-flight switch.
pub struct ModeController {
    registry: Arc<TemplateRegistry>,
    transport: Arc<dyn TransportPort>,
    factory: Arc<dyn ProfileFactory>,
    events: Arc<EventBus>,
    active: Mutex<Option<ActiveInstance>>,
    current_mode: ArcSwapOption<String>,
}

impl ModeController {
    pub fn new(
        registry: Arc<TemplateRegistry>,
        transport: Arc<dyn TransportPort>,
        factory: Arc<dyn ProfileFactory>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            registry,
            transport,
            factory,
            events,
            active: Mutex::new(None),
            current_mode: ArcSwapOption::const_empty(),
        }
    }

    /// Snapshot of the currently attached mode. Lock-free; never blocks on
    /// an in-flight switch and never observes a mid-transition value.
    pub fn current_mode(&self) -> Option<String> {
        self.current_mode.load_full().map(|name| (*name).clone())
    }

    /// All switchable mode names, in registration order.
    pub fn list_modes(&self) -> Vec<String> {
        self.registry.names().map(str::to_string).collect()
    }

    /// Description of the live instance, for status queries.
    pub async fn describe_active(&self) -> Option<String> {
        self.active.lock().await.as_ref().map(|i| i.describe())
    }

    /// Switch the endpoint to `target`.
    ///
    /// Blocking, sleeping work: must run on a task context allowed to
    /// block. Concurrent callers serialize on the switch lock; requests are
    /// applied one after the other, never interleaved.
    ///
    /// Switching to the already-active mode is a documented no-op that
    /// touches neither the transport nor the instance.
    pub async fn switch_to(&self, target: &str) -> Result<(), SwitchError> {
        let mut active = self.active.lock().await;

        if active
            .as_ref()
            .is_some_and(|i| i.template_name() == target)
        {
            info!(mode = target, "already in requested mode");
            return Ok(());
        }

        // The only failure path that touches nothing at all.
        let template = match self.registry.resolve(target) {
            Ok(t) => t,
            Err(_) => return Err(SwitchError::UnknownMode(target.to_string())),
        };

        let previous = active.as_ref().map(|i| i.template_name().to_string());
        info!(from = ?previous, to = target, "switching mode");
        self.events.publish(ModeEvent::SwitchStarted {
            from: previous.clone(),
            to: target.to_string(),
        });

        // 1. Detach the current identity. On failure the old instance
        //    remains authoritative and untouched.
        if active.is_some() {
            if let Err(e) = self.transport.detach().await {
                let err = SwitchError::DetachFailed(e);
                self.publish_failure(target, &err);
                return Err(err);
            }
        }

        // 2. The old instance is gone from the bus; tear it down. A
        //    teardown failure may leak resources but never stops the
        //    switch - it is surfaced instead.
        if let Some(mut old) = active.take() {
            old.set_attached(false);
            self.current_mode.store(None);

            if let Err(e) = old.teardown().await {
                let mode = previous.clone().unwrap_or_default();
                warn!(mode = %mode, error = %e, "old instance teardown failed");
                self.events.publish(ModeEvent::TeardownWarning {
                    mode,
                    reason: e.to_string(),
                });
            }
        }

        // 3. Realize the new template. Failure leaves the deliberate safe
        //    state: detached, no active instance.
        let profile = match self.factory.instantiate(template).await {
            Ok(p) => p,
            Err(e) => {
                let err = SwitchError::InstantiationFailed {
                    name: target.to_string(),
                    source: e,
                };
                self.publish_failure(target, &err);
                return Err(err);
            }
        };
        let mut instance = ActiveInstance::new(target, profile);

        // 4. Present the new identity. On failure the fresh instance is
        //    destroyed again; same safe state as above.
        if let Err(e) = self.transport.attach(&instance).await {
            if let Err(te) = instance.teardown().await {
                warn!(mode = target, error = %te, "teardown of unattached instance failed");
                self.events.publish(ModeEvent::TeardownWarning {
                    mode: target.to_string(),
                    reason: te.to_string(),
                });
            }
            let err = SwitchError::AttachFailed {
                name: target.to_string(),
                source: e,
            };
            self.publish_failure(target, &err);
            return Err(err);
        }

        instance.set_attached(true);
        self.current_mode.store(Some(Arc::new(target.to_string())));
        *active = Some(instance);

        info!(mode = target, "mode switch complete");
        self.events.publish(ModeEvent::SwitchCompleted {
            mode: target.to_string(),
        });
        Ok(())
    }

    fn publish_failure(&self, target: &str, err: &SwitchError) {
        warn!(target = target, error = %err, "mode switch failed");
        self.events.publish(ModeEvent::SwitchFailed {
            target: target.to_string(),
            reason: err.to_string(),
        });
    }

    /// Forced detach + teardown at service shutdown.
    ///
    /// Takes the same switch lock, so a shutdown racing an in-flight switch
    /// simply queues behind it. Transport errors are logged but do not stop
    /// the teardown.
    pub async fn shutdown(&self) {
        let mut active = self.active.lock().await;
        let last_mode = active.as_ref().map(|i| i.template_name().to_string());

        if let Some(mut instance) = active.take() {
            info!(mode = instance.template_name(), "shutting down active mode");
            if let Err(e) = self.transport.detach().await {
                warn!(error = %e, "detach during shutdown failed, tearing down anyway");
            }
            instance.set_attached(false);
            self.current_mode.store(None);

            if let Err(e) = instance.teardown().await {
                warn!(error = %e, "teardown during shutdown failed");
            }
        }

        self.events
            .publish(ModeEvent::ControllerShutdown { last_mode });
    }
}
