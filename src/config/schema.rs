//! Service configuration schema.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::gadget::shell::{
    DEFAULT_GADGET_NAME, DEFAULT_USB_BCD_DEVICE, DEFAULT_USB_PRODUCT_ID, DEFAULT_USB_VENDOR_ID,
};
use crate::profile::ProfileConfig;

/// Main service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Gadget shell / descriptor settings
    pub gadget: GadgetConfig,
    /// Transport (UDC) tuning
    pub transport: TransportConfig,
    /// Mode applied at startup (none = start detached)
    pub initial_mode: Option<String>,
    /// Identity templates available for switching
    pub templates: Vec<TemplateEntry>,
    /// Trigger adapter settings
    pub triggers: TriggersConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gadget: GadgetConfig::default(),
            transport: TransportConfig::default(),
            initial_mode: None,
            templates: Vec::new(),
            triggers: TriggersConfig::default(),
        }
    }
}

/// Gadget identity shared by all modes (descriptors, strings, UDC pin).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GadgetConfig {
    /// Gadget name under the configfs root
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_version: u16,
    pub manufacturer: String,
    pub product: String,
    pub serial_number: String,
    /// Pin a specific UDC; auto-discovered when unset
    pub udc: Option<String>,
}

impl Default for GadgetConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_GADGET_NAME.to_string(),
            vendor_id: DEFAULT_USB_VENDOR_ID,
            product_id: DEFAULT_USB_PRODUCT_ID,
            device_version: DEFAULT_USB_BCD_DEVICE,
            manufacturer: "gadgetswitch".to_string(),
            product: "gadgetswitch USB Device".to_string(),
            serial_number: "0123456789".to_string(),
            udc: None,
        }
    }
}

/// Transport timing bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Settle time after bind/unbind, milliseconds
    pub settle_delay_ms: u64,
    /// Upper bound for a single transport operation, milliseconds
    pub op_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 300,
            op_timeout_ms: 5000,
        }
    }
}

/// One named template in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateEntry {
    pub name: String,
    #[serde(flatten)]
    pub profile: ProfileConfig,
}

/// Trigger adapter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggersConfig {
    pub control: ControlSocketConfig,
    pub gpio: GpioTriggerConfig,
}

/// Unix control socket (the "write a mode name" surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSocketConfig {
    pub enabled: bool,
    pub socket: PathBuf,
}

impl Default for ControlSocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket: PathBuf::from("/run/gadgetswitch.sock"),
        }
    }
}

/// GPIO mode-cycle button.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioTriggerConfig {
    pub enabled: bool,
    /// GPIO character device (e.g. /dev/gpiochip0)
    pub chip: String,
    /// Line offset of the button
    pub line: u32,
    /// Presses within this window are ignored
    pub debounce_ms: u64,
}

impl Default for GpioTriggerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chip: "/dev/gpiochip0".to_string(),
            line: 0,
            debounce_ms: 200,
        }
    }
}
