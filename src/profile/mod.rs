//! Gadget identity profiles.
//!
//! A profile is the realization of one identity template: the configfs
//! function directories and backing resources that make the gadget present
//! as mass storage, a network adapter, or a serial port. Profiles only
//! *represent* the identity; binding it to the bus is the transport's job.

pub mod mass_storage;
pub mod network;
pub mod serial;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{InstantiateError, TeardownError};
use crate::registry::Template;

pub use mass_storage::{MassStorageConfig, MassStorageProfile};
pub use network::{NetFunctionType, NetworkConfig, NetworkProfile};
pub use serial::{SerialConfig, SerialProfile};

/// Profile kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    MassStorage,
    Network,
    Serial,
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileKind::MassStorage => write!(f, "mass_storage"),
            ProfileKind::Network => write!(f, "network"),
            ProfileKind::Serial => write!(f, "serial"),
        }
    }
}

/// Per-kind template configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfileConfig {
    MassStorage(MassStorageConfig),
    Network(NetworkConfig),
    Serial(SerialConfig),
}

impl ProfileConfig {
    pub fn kind(&self) -> ProfileKind {
        match self {
            ProfileConfig::MassStorage(_) => ProfileKind::MassStorage,
            ProfileConfig::Network(_) => ProfileKind::Network,
            ProfileConfig::Serial(_) => ProfileKind::Serial,
        }
    }

    /// Kind-specific validation, run at registration time.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ProfileConfig::MassStorage(cfg) => cfg.validate(),
            ProfileConfig::Network(cfg) => cfg.validate(),
            ProfileConfig::Serial(cfg) => cfg.validate(),
        }
    }
}

/// A live profile: the resources backing one instantiated identity.
///
/// Teardown must release everything `instantiate` acquired, must be safe on
/// an instance that was never attached, and must tolerate being called
/// twice.
#[async_trait]
pub trait ActiveProfile: Send + Sync {
    fn kind(&self) -> ProfileKind;

    /// ConfigFS function names owned by this profile (e.g. `mass_storage.usb0`).
    fn function_names(&self) -> &[String];

    /// One-line description for logs and status queries.
    fn describe(&self) -> String;

    async fn teardown(&mut self) -> Result<(), TeardownError>;
}

/// Instantiates profiles from templates. The production implementation
/// builds configfs function trees; tests substitute a recording fake.
#[async_trait]
pub trait ProfileFactory: Send + Sync {
    async fn instantiate(
        &self,
        template: &Template,
    ) -> Result<Box<dyn ActiveProfile>, InstantiateError>;
}

/// Production factory building profiles inside a configfs gadget tree.
pub struct ConfigfsProfileFactory {
    gadget_path: PathBuf,
    config_path: PathBuf,
}

impl ConfigfsProfileFactory {
    /// `gadget_path` is the gadget root (e.g.
    /// `/sys/kernel/config/usb_gadget/gswitch`), `config_path` its
    /// `configs/c.1` directory.
    pub fn new(gadget_path: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            gadget_path: gadget_path.into(),
            config_path: config_path.into(),
        }
    }
}

#[async_trait]
impl ProfileFactory for ConfigfsProfileFactory {
    async fn instantiate(
        &self,
        template: &Template,
    ) -> Result<Box<dyn ActiveProfile>, InstantiateError> {
        match template.config() {
            ProfileConfig::MassStorage(cfg) => {
                MassStorageProfile::instantiate(&self.gadget_path, &self.config_path, cfg)
                    .map(|p| Box::new(p) as Box<dyn ActiveProfile>)
            }
            ProfileConfig::Network(cfg) => {
                NetworkProfile::instantiate(&self.gadget_path, &self.config_path, cfg)
                    .map(|p| Box::new(p) as Box<dyn ActiveProfile>)
            }
            ProfileConfig::Serial(cfg) => {
                SerialProfile::instantiate(&self.gadget_path, &self.config_path, cfg)
                    .map(|p| Box::new(p) as Box<dyn ActiveProfile>)
            }
        }
    }
}
