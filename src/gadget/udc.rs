//! UDC transport port - binds and unbinds the gadget on the USB device
//! controller.
//!
//! Binding writes the UDC name into the gadget's `UDC` attribute; unbinding
//! clears it. Both are followed by a settle delay so the peer's enumeration
//! state machine catches up before the next reconfiguration step.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::configfs::{clear_attr, find_udc_in, read_attr, write_attr, UDC_CLASS_PATH};
use crate::controller::ActiveInstance;
use crate::error::TransportError;
use crate::transport::TransportPort;

/// Settle time after a bind/unbind before the bus is considered stable.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Default upper bound for a single UDC attribute write.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Production [`TransportPort`] over the gadget's `UDC` configfs attribute.
pub struct UdcPort {
    udc_attr: PathBuf,
    udc_class_dir: PathBuf,
    /// Pinned UDC name; discovered on first attach when `None`.
    udc_name: Option<String>,
    settle_delay: Duration,
    op_timeout: Duration,
}

impl UdcPort {
    pub fn new(gadget_path: &Path, udc_name: Option<String>) -> Self {
        Self {
            udc_attr: gadget_path.join("UDC"),
            udc_class_dir: PathBuf::from(UDC_CLASS_PATH),
            udc_name,
            settle_delay: DEFAULT_SETTLE_DELAY,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    pub fn with_timing(mut self, settle_delay: Duration, op_timeout: Duration) -> Self {
        self.settle_delay = settle_delay;
        self.op_timeout = op_timeout;
        self
    }

    #[cfg(test)]
    fn with_udc_class_dir(mut self, dir: PathBuf) -> Self {
        self.udc_class_dir = dir;
        self
    }

    /// Whether the gadget is currently bound to a UDC.
    pub fn is_bound(&self) -> bool {
        read_attr(&self.udc_attr)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }

    fn resolve_udc(&self) -> Result<String, TransportError> {
        match &self.udc_name {
            Some(name) => Ok(name.clone()),
            None => find_udc_in(&self.udc_class_dir).ok_or(TransportError::NoUdc),
        }
    }

    /// Write or clear the UDC attribute on a blocking worker, bounded by
    /// the configured timeout. A timeout is reported as a failed step,
    /// never waited out indefinitely.
    async fn write_udc(&self, value: Option<String>) -> Result<(), TransportError> {
        let path = self.udc_attr.clone();
        let write = tokio::task::spawn_blocking(move || match value {
            Some(v) => write_attr(&path, &v),
            None => clear_attr(&path),
        });

        match tokio::time::timeout(self.op_timeout, write).await {
            Err(_) => Err(TransportError::Timeout(self.op_timeout)),
            Ok(Err(join)) => Err(TransportError::Worker(join.to_string())),
            Ok(Ok(Err(e))) => Err(e.into()),
            Ok(Ok(Ok(()))) => Ok(()),
        }
    }
}

#[async_trait]
impl TransportPort for UdcPort {
    async fn attach(&self, instance: &ActiveInstance) -> Result<(), TransportError> {
        let udc = self.resolve_udc()?;
        info!(
            mode = instance.template_name(),
            udc = %udc,
            "binding gadget to UDC"
        );
        self.write_udc(Some(udc)).await?;
        tokio::time::sleep(self.settle_delay).await;
        Ok(())
    }

    async fn detach(&self) -> Result<(), TransportError> {
        if !self.is_bound() {
            debug!("gadget not bound, nothing to detach");
            return Ok(());
        }
        info!("unbinding gadget from UDC");
        self.write_udc(None).await?;
        tokio::time::sleep(self.settle_delay).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ActiveProfile, ProfileKind};
    use crate::error::TeardownError;
    use std::fs;
    use tempfile::tempdir;

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
            "null".to_string()
        }
        async fn teardown(&mut self) -> Result<(), TeardownError> {
            Ok(())
        }
    }

    fn instance() -> ActiveInstance {
        ActiveInstance::new("serial", Box::new(NullProfile))
    }

    fn port_in(dir: &Path) -> (UdcPort, PathBuf) {
        let gadget = dir.join("gswitch");
        let udc_class = dir.join("udc");
        fs::create_dir_all(&gadget).unwrap();
        fs::create_dir_all(udc_class.join("dummy_udc.0")).unwrap();
        fs::write(gadget.join("UDC"), "").unwrap();
        let port = UdcPort::new(&gadget, None)
            .with_timing(Duration::ZERO, Duration::from_secs(1))
            .with_udc_class_dir(udc_class);
        (port, gadget)
    }

    #[tokio::test]
    async fn attach_writes_discovered_udc_name() {
        let dir = tempdir().unwrap();
        let (port, gadget) = port_in(dir.path());

        port.attach(&instance()).await.unwrap();
        assert_eq!(
            fs::read_to_string(gadget.join("UDC")).unwrap().trim(),
            "dummy_udc.0"
        );
        assert!(port.is_bound());
    }

    #[tokio::test]
    async fn detach_clears_udc_attribute() {
        let dir = tempdir().unwrap();
        let (port, gadget) = port_in(dir.path());

        port.attach(&instance()).await.unwrap();
        port.detach().await.unwrap();
        assert_eq!(fs::read_to_string(gadget.join("UDC")).unwrap(), "\n");
        assert!(!port.is_bound());
    }

    #[tokio::test]
    async fn detach_when_unbound_is_noop() {
        let dir = tempdir().unwrap();
        let (port, _gadget) = port_in(dir.path());
        port.detach().await.unwrap();
    }

    #[tokio::test]
    async fn attach_without_udc_fails() {
        let dir = tempdir().unwrap();
        let gadget = dir.path().join("gswitch");
        fs::create_dir_all(&gadget).unwrap();
        let empty = dir.path().join("udc");
        fs::create_dir_all(&empty).unwrap();

        let port = UdcPort::new(&gadget, None)
            .with_timing(Duration::ZERO, Duration::from_secs(1))
            .with_udc_class_dir(empty);

        let err = port.attach(&instance()).await.unwrap_err();
        assert!(matches!(err, TransportError::NoUdc));
    }

    #[tokio::test]
    async fn pinned_udc_name_is_used_verbatim() {
        let dir = tempdir().unwrap();
        let gadget = dir.path().join("gswitch");
        fs::create_dir_all(&gadget).unwrap();
        fs::write(gadget.join("UDC"), "").unwrap();

        let port = UdcPort::new(&gadget, Some("musb-hdrc.0".to_string()))
            .with_timing(Duration::ZERO, Duration::from_secs(1));

        port.attach(&instance()).await.unwrap();
        assert_eq!(
            fs::read_to_string(gadget.join("UDC")).unwrap().trim(),
            "musb-hdrc.0"
        );
    }
}
