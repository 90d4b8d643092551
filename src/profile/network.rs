//! Network profile - presents the gadget as a USB ethernet adapter.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ActiveProfile, ProfileKind};
use crate::error::{InstantiateError, TeardownError};
use crate::gadget::configfs::{
    create_dir, create_symlink, function_dir, remove_dir, remove_file, write_attr,
};

/// USB ethernet function flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetFunctionType {
    /// CDC ECM - standard, works out of the box on Linux/macOS hosts.
    #[default]
    Ecm,
    /// RNDIS - needed for Windows hosts.
    Rndis,
}

impl NetFunctionType {
    fn as_str(self) -> &'static str {
        match self {
            NetFunctionType::Ecm => "ecm",
            NetFunctionType::Rndis => "rndis",
        }
    }
}

/// Network template configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Function flavor (ecm or rndis).
    pub function: NetFunctionType,
    /// MAC address of the gadget-side interface.
    pub dev_addr: Option<String>,
    /// MAC address presented to the host.
    pub host_addr: Option<String>,
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (label, addr) in [("dev_addr", &self.dev_addr), ("host_addr", &self.host_addr)] {
            if let Some(addr) = addr {
                if !is_valid_mac(addr) {
                    return Err(format!("{} '{}' is not a valid MAC address", label, addr));
                }
            }
        }
        Ok(())
    }
}

/// `aa:bb:cc:dd:ee:ff` form, case-insensitive.
fn is_valid_mac(addr: &str) -> bool {
    let octets: Vec<&str> = addr.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}

/// A live USB ethernet function inside a gadget tree.
pub struct NetworkProfile {
    function_names: Vec<String>,
    function_path: PathBuf,
    link_path: PathBuf,
    flavor: NetFunctionType,
    torn_down: bool,
}

impl NetworkProfile {
    pub fn instantiate(
        gadget_path: &Path,
        config_path: &Path,
        cfg: &NetworkConfig,
    ) -> Result<Self, InstantiateError> {
        cfg.validate().map_err(InstantiateError::ConfigInvalid)?;

        let function = format!("{}.usb0", cfg.function.as_str());
        let function_path = function_dir(gadget_path, &function);
        let link_path = config_path.join(&function);

        let result = Self::build(&function_path, &link_path, cfg);
        if let Err(err) = result {
            let _ = remove_file(&link_path);
            if let Err(e) = remove_dir(&function_path) {
                warn!("network rollback left residue: {}", e);
            }
            return Err(err);
        }

        debug!(function = %function, "network function created");

        Ok(Self {
            function_names: vec![function],
            function_path,
            link_path,
            flavor: cfg.function,
            torn_down: false,
        })
    }

    fn build(
        function_path: &Path,
        link_path: &Path,
        cfg: &NetworkConfig,
    ) -> Result<(), InstantiateError> {
        create_dir(function_path)?;

        if let Some(addr) = &cfg.dev_addr {
            write_attr(&function_path.join("dev_addr"), addr)?;
        }
        if let Some(addr) = &cfg.host_addr {
            write_attr(&function_path.join("host_addr"), addr)?;
        }

        create_symlink(function_path, link_path)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ActiveProfile for NetworkProfile {
    fn kind(&self) -> ProfileKind {
        ProfileKind::Network
    }

    fn function_names(&self) -> &[String] {
        &self.function_names
    }

    fn describe(&self) -> String {
        format!("network({})", self.flavor.as_str())
    }

    async fn teardown(&mut self) -> Result<(), TeardownError> {
        if self.torn_down {
            return Ok(());
        }

        remove_file(&self.link_path)?;
        // ConfigFS refuses to unlink attribute files (the kernel drops them
        // with the directory); on a plain filesystem they block the rmdir.
        for attr in ["dev_addr", "host_addr"] {
            let _ = remove_file(&self.function_path.join(attr));
        }
        remove_dir(&self.function_path)?;

        self.torn_down = true;
        debug!("network function removed");
        Ok(())
    }
}
