//! Service configuration (TOML schema + store).

pub mod schema;
pub mod store;

pub use schema::{
    AppConfig, ControlSocketConfig, GadgetConfig, GpioTriggerConfig, TemplateEntry,
    TransportConfig, TriggersConfig,
};
pub use store::ConfigStore;
