//! GPIO mode-cycle button.
//!
//! A press advances to the next registered mode, wrapping at the end. The
//! kernel event wait is blocking, so it lives on a dedicated thread that
//! forwards press timestamps over a channel; the async worker debounces and
//! runs the switch. The worker never switches from the event thread itself.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gpio_cdev::{Chip, EventRequestFlags, LineRequestFlags};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GpioTriggerConfig;
use crate::controller::ModeController;
use crate::error::{AppError, Result};

const GPIO_CONSUMER: &str = "gadgetswitch";

/// The mode after `current` in registration order, wrapping. With no
/// current mode the first registered mode is next. Empty list: no target.
fn next_mode(modes: &[String], current: Option<&str>) -> Option<String> {
    if modes.is_empty() {
        return None;
    }
    let next = match current.and_then(|c| modes.iter().position(|m| m == c)) {
        Some(idx) => (idx + 1) % modes.len(),
        None => 0,
    };
    Some(modes[next].clone())
}

/// Cycle-button trigger bound to one GPIO line.
pub struct GpioTrigger {
    controller: Arc<ModeController>,
    config: GpioTriggerConfig,
}

impl GpioTrigger {
    pub fn new(controller: Arc<ModeController>, config: GpioTriggerConfig) -> Self {
        Self { controller, config }
    }

    /// Start the event thread and the async worker. The returned handle
    /// resolves once `cancel` fires and the worker drains.
    pub fn spawn(self, cancel: CancellationToken) -> Result<JoinHandle<()>> {
        let mut chip = Chip::new(&self.config.chip)
            .map_err(|e| AppError::Config(format!("open {}: {}", self.config.chip, e)))?;
        let line = chip
            .get_line(self.config.line)
            .map_err(|e| AppError::Config(format!("gpio line {}: {}", self.config.line, e)))?;
        let events = line
            .events(
                LineRequestFlags::INPUT,
                EventRequestFlags::FALLING_EDGE,
                GPIO_CONSUMER,
            )
            .map_err(|e| AppError::Config(format!("request gpio events: {}", e)))?;

        info!(
            chip = %self.config.chip,
            line = self.config.line,
            "gpio mode-cycle trigger armed"
        );

        let (tx, rx) = mpsc::channel::<Instant>(8);

        // The iterator blocks in the kernel until the next edge; the thread
        // exits when the worker side drops the receiver.
        std::thread::spawn(move || {
            for event in events {
                match event {
                    Ok(_) => {
                        if tx.blocking_send(Instant::now()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("gpio event read failed: {}", e);
                        break;
                    }
                }
            }
        });

        let debounce = Duration::from_millis(self.config.debounce_ms);
        Ok(tokio::spawn(run_worker(
            self.controller,
            rx,
            debounce,
            cancel,
        )))
    }
}

/// Debounce presses and apply the cycle. Separated from the hardware setup
/// so it can be driven by hand.
async fn run_worker(
    controller: Arc<ModeController>,
    mut rx: mpsc::Receiver<Instant>,
    debounce: Duration,
    cancel: CancellationToken,
) {
    let mut last_press: Option<Instant> = None;

    loop {
        let pressed_at = tokio::select! {
            _ = cancel.cancelled() => break,
            press = rx.recv() => match press {
                Some(at) => at,
                None => break,
            },
        };

        if last_press.is_some_and(|prev| pressed_at.duration_since(prev) < debounce) {
            debug!("gpio press ignored (debounce)");
            continue;
        }
        last_press = Some(pressed_at);

        let modes = controller.list_modes();
        let current = controller.current_mode();
        let Some(target) = next_mode(&modes, current.as_deref()) else {
            warn!("gpio press with no registered modes");
            continue;
        };

        info!(target = %target, "gpio press, cycling mode");
        if let Err(e) = controller.switch_to(&target).await {
            warn!(target = %target, error = %e, "gpio-triggered switch failed");
        }
    }

    debug!("gpio worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    // The file-level `Result` alias takes one parameter; the trait impls
    // below need the two-parameter form.
    use std::result::Result;

    use async_trait::async_trait;

    use crate::error::{InstantiateError, TeardownError, TransportError};
    use crate::events::EventBus;
    use crate::profile::{
        ActiveProfile, ProfileConfig, ProfileFactory, ProfileKind, SerialConfig,
    };
    use crate::registry::{Template, TemplateRegistry};
    use crate::transport::TransportPort;

    fn modes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cycles_in_registration_order_and_wraps() {
        let m = modes(&["storage", "network", "console"]);
        assert_eq!(next_mode(&m, None).as_deref(), Some("storage"));
        assert_eq!(next_mode(&m, Some("storage")).as_deref(), Some("network"));
        assert_eq!(next_mode(&m, Some("console")).as_deref(), Some("storage"));
        // A mode no longer registered restarts the cycle.
        assert_eq!(next_mode(&m, Some("gone")).as_deref(), Some("storage"));
        assert_eq!(next_mode(&[], None), None);
    }

    struct NullTransport;

    #[async_trait]
    impl TransportPort for NullTransport {
        async fn attach(
            &self,
            _instance: &crate::controller::ActiveInstance,
        ) -> Result<(), TransportError> {
            Ok(())
        }
        async fn detach(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct NullProfile;

    #[async_trait]
    impl ActiveProfile for NullProfile {
        fn kind(&self) -> ProfileKind {
            ProfileKind::Serial
        }
        fn function_names(&self) -> &[String] {
            &[]
        }
        fn describe(&self) -> String {
            "serial: 1 port".to_string()
        }
        async fn teardown(&mut self) -> Result<(), TeardownError> {
            Ok(())
        }
    }

    struct NullFactory;

    #[async_trait]
    impl ProfileFactory for NullFactory {
        async fn instantiate(
            &self,
            _template: &Template,
        ) -> Result<Box<dyn ActiveProfile>, InstantiateError> {
            Ok(Box::new(NullProfile))
        }
    }

    fn controller(names: &[&str]) -> Arc<ModeController> {
        let mut registry = TemplateRegistry::new();
        for name in names {
            registry
                .register(Template::new(
                    *name,
                    ProfileConfig::Serial(SerialConfig::default()),
                ))
                .unwrap();
        }
        Arc::new(ModeController::new(
            Arc::new(registry),
            Arc::new(NullTransport),
            Arc::new(NullFactory),
            Arc::new(EventBus::new()),
        ))
    }

    #[tokio::test]
    async fn worker_cycles_and_debounces() {
        let controller = controller(&["storage", "network"]);
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(
            controller.clone(),
            rx,
            Duration::from_secs(3600),
            cancel.clone(),
        ));

        let press = Instant::now();
        tx.send(press).await.unwrap();
        // Inside the debounce window, ignored.
        tx.send(press + Duration::from_millis(1)).await.unwrap();
        // Outside it, advances again.
        tx.send(press + Duration::from_secs(7200)).await.unwrap();
        drop(tx);
        worker.await.unwrap();

        assert_eq!(controller.current_mode().as_deref(), Some("network"));
        drop(cancel);
    }

    #[tokio::test]
    async fn worker_stops_on_cancel() {
        let controller = controller(&["storage"]);
        let (_tx, rx) = mpsc::channel::<Instant>(1);
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(
            controller,
            rx,
            Duration::from_millis(0),
            cancel.clone(),
        ));

        cancel.cancel();
        worker.await.unwrap();
    }
}
