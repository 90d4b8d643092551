//! Unix control socket - the local line protocol for mode switching.
//!
//! One command per line:
//!
//! ```text
//! switch <name>   -> OK | ERR <reason>
//! current         -> <name> | none
//! list            -> space-separated mode names
//! status          -> one-line JSON snapshot
//! ```
//!
//! Every connection gets its own task; long switches on one connection do
//! not stall commands on another (they serialize inside the controller, not
//! in the socket loop).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::ModeController;
use crate::error::Result;

/// Status reply payload.
#[derive(Debug, Serialize)]
struct StatusReply {
    current: Option<String>,
    modes: Vec<String>,
    active: Option<String>,
}

/// Listens on a Unix socket and forwards commands to the controller.
pub struct ControlSocket {
    controller: Arc<ModeController>,
    path: PathBuf,
}

impl ControlSocket {
    pub fn new(controller: Arc<ModeController>, path: impl Into<PathBuf>) -> Self {
        Self {
            controller,
            path: path.into(),
        }
    }

    /// Accept loop. Runs until `cancel` fires, then removes the socket file.
    pub async fn serve(self, cancel: CancellationToken) -> Result<()> {
        // A stale socket from an unclean exit would make bind fail.
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        let listener = UnixListener::bind(&self.path)?;
        info!("control socket listening on {}", self.path.display());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let controller = self.controller.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(controller, stream).await {
                                debug!("control connection ended: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("control socket accept failed: {}", e);
                    }
                },
            }
        }

        info!("control socket shutting down");
        remove_socket_file(&self.path);
        Ok(())
    }
}

fn remove_socket_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove control socket {}: {}", path.display(), e);
        }
    }
}

async fn handle_connection(
    controller: Arc<ModeController>,
    stream: UnixStream,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let reply = dispatch(&controller, line.trim()).await;
        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Map one command line to its one-line reply.
async fn dispatch(controller: &ModeController, line: &str) -> String {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("switch") => match parts.next() {
            Some(name) => match controller.switch_to(name).await {
                Ok(()) => "OK".to_string(),
                Err(e) => format!("ERR {}", e),
            },
            None => "ERR switch requires a mode name".to_string(),
        },
        Some("current") => controller
            .current_mode()
            .unwrap_or_else(|| "none".to_string()),
        Some("list") => controller.list_modes().join(" "),
        Some("status") => {
            let reply = StatusReply {
                current: controller.current_mode(),
                modes: controller.list_modes(),
                active: controller.describe_active().await,
            };
            serde_json::to_string(&reply)
                .unwrap_or_else(|e| format!("ERR status serialization: {}", e))
        }
        Some(other) => format!("ERR unknown command: {}", other),
        None => "ERR empty command".to_string(),
    }
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
    use tempfile::tempdir;

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

    fn controller(modes: &[&str]) -> Arc<ModeController> {
        let mut registry = TemplateRegistry::new();
        for name in modes {
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
    async fn dispatch_covers_the_protocol() {
        let controller = controller(&["storage", "network"]);

        assert_eq!(dispatch(&controller, "list").await, "storage network");
        assert_eq!(dispatch(&controller, "current").await, "none");
        assert_eq!(dispatch(&controller, "switch storage").await, "OK");
        assert_eq!(dispatch(&controller, "current").await, "storage");
        assert!(dispatch(&controller, "switch bogus")
            .await
            .starts_with("ERR "));
        assert!(dispatch(&controller, "switch").await.starts_with("ERR "));
        assert!(dispatch(&controller, "frobnicate").await.starts_with("ERR "));

        let status = dispatch(&controller, "status").await;
        let parsed: serde_json::Value = serde_json::from_str(&status).unwrap();
        assert_eq!(parsed["current"], "storage");
        assert_eq!(parsed["modes"][1], "network");
    }

    #[tokio::test]
    async fn serves_commands_over_the_socket() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let cancel = CancellationToken::new();

        let socket = ControlSocket::new(controller(&["storage"]), &path);
        let server = tokio::spawn(socket.serve(cancel.clone()));

        // The listener binds inside the task.
        for _ in 0..50 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let stream = UnixStream::connect(&path).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"switch storage\ncurrent\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "OK");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "storage");

        cancel.cancel();
        server.await.unwrap().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn replaces_a_stale_socket_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("control.sock");
        std::fs::write(&path, b"").unwrap();

        let cancel = CancellationToken::new();
        let socket = ControlSocket::new(controller(&[]), &path);
        let server = tokio::spawn(socket.serve(cancel.clone()));

        for _ in 0..50 {
            if UnixStream::connect(&path).await.is_ok() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        cancel.cancel();
        server.await.unwrap().unwrap();
    }
}
