//! Serial profile - presents the gadget as one or more CDC ACM ports.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ActiveProfile, ProfileKind};
use crate::error::{InstantiateError, TeardownError};
use crate::gadget::configfs::{
    create_dir, create_symlink, function_dir, remove_dir, remove_file,
};

/// Most UDCs run out of endpoints beyond a handful of ACM instances.
pub const MAX_ACM_PORTS: u8 = 4;

/// Serial template configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Number of ACM port instances.
    pub ports: u8,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self { ports: 1 }
    }
}

impl SerialConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.ports == 0 || self.ports > MAX_ACM_PORTS {
            return Err(format!(
                "serial template must have 1..={} ports, got {}",
                MAX_ACM_PORTS, self.ports
            ));
        }
        Ok(())
    }
}

/// A live set of ACM functions inside a gadget tree.
pub struct SerialProfile {
    function_names: Vec<String>,
    gadget_path: PathBuf,
    config_path: PathBuf,
    torn_down: bool,
}

impl SerialProfile {
    pub fn instantiate(
        gadget_path: &Path,
        config_path: &Path,
        cfg: &SerialConfig,
    ) -> Result<Self, InstantiateError> {
        cfg.validate().map_err(InstantiateError::ConfigInvalid)?;

        let names: Vec<String> = (0..cfg.ports).map(|i| format!("acm.usb{}", i)).collect();

        let mut created: Vec<String> = Vec::with_capacity(names.len());
        for name in &names {
            let function_path = function_dir(gadget_path, name);
            let link_path = config_path.join(name);
            let result = create_dir(&function_path)
                .and_then(|_| create_symlink(&function_path, &link_path));
            match result {
                Ok(()) => created.push(name.clone()),
                Err(err) => {
                    Self::remove_functions(gadget_path, config_path, &created);
                    // The dir may exist without its link.
                    let _ = remove_dir(&function_path);
                    return Err(err.into());
                }
            }
        }

        debug!(ports = cfg.ports, "serial functions created");

        Ok(Self {
            function_names: names,
            gadget_path: gadget_path.to_path_buf(),
            config_path: config_path.to_path_buf(),
            torn_down: false,
        })
    }

    fn remove_functions(gadget_path: &Path, config_path: &Path, names: &[String]) {
        for name in names.iter().rev() {
            let _ = remove_file(&config_path.join(name));
            if let Err(e) = remove_dir(&function_dir(gadget_path, name)) {
                warn!("serial cleanup left residue for {}: {}", name, e);
            }
        }
    }
}

#[async_trait::async_trait]
impl ActiveProfile for SerialProfile {
    fn kind(&self) -> ProfileKind {
        ProfileKind::Serial
    }

    fn function_names(&self) -> &[String] {
        &self.function_names
    }

    fn describe(&self) -> String {
        format!("serial({} ports)", self.function_names.len())
    }

    async fn teardown(&mut self) -> Result<(), TeardownError> {
        if self.torn_down {
            return Ok(());
        }

        let mut first_err: Option<TeardownError> = None;
        for name in self.function_names.iter().rev() {
            let unlink = remove_file(&self.config_path.join(name));
            let rmdir = remove_dir(&function_dir(&self.gadget_path, name));
            for result in [unlink, rmdir] {
                if let Err(e) = result {
                    if first_err.is_none() {
                        first_err = Some(e.into());
                    }
                }
            }
        }

        self.torn_down = true;
        match first_err {
            None => {
                debug!("serial functions removed");
                Ok(())
            }
            Some(e) => Err(e),
        }
    }
}
