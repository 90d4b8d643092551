//! Gadget shell - the per-endpoint configfs skeleton shared by all modes.
//!
//! Created once at startup and removed at shutdown. Profiles hang their
//! function directories off it; the shell itself never touches the UDC.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::configfs::{create_dir, remove_dir, write_attr};
use crate::error::ConfigfsError;

/// Default gadget name under the configfs root.
pub const DEFAULT_GADGET_NAME: &str = "gswitch";

/// USB Vendor ID (Linux Foundation).
pub const DEFAULT_USB_VENDOR_ID: u16 = 0x1d6b;

/// USB Product ID (Multifunction Composite Gadget).
pub const DEFAULT_USB_PRODUCT_ID: u16 = 0x0104;

/// Default bcdDevice.
pub const DEFAULT_USB_BCD_DEVICE: u16 = 0x0100;

/// bcdUSB (USB 2.0).
pub const USB_BCD_USB: u16 = 0x0200;

/// USB device descriptor values written into the gadget root.
#[derive(Debug, Clone)]
pub struct GadgetDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_version: u16,
    pub manufacturer: String,
    pub product: String,
    pub serial_number: String,
}

impl Default for GadgetDescriptor {
    fn default() -> Self {
        Self {
            vendor_id: DEFAULT_USB_VENDOR_ID,
            product_id: DEFAULT_USB_PRODUCT_ID,
            device_version: DEFAULT_USB_BCD_DEVICE,
            manufacturer: "gadgetswitch".to_string(),
            product: "gadgetswitch USB Device".to_string(),
            serial_number: "0123456789".to_string(),
        }
    }
}

/// The configfs gadget skeleton for one endpoint.
pub struct GadgetShell {
    gadget_path: PathBuf,
    config_path: PathBuf,
    descriptor: GadgetDescriptor,
    created: bool,
}

impl GadgetShell {
    /// `root` is the configfs usb_gadget directory
    /// (normally [`super::configfs::CONFIGFS_PATH`]).
    pub fn new(root: &Path, name: &str, descriptor: GadgetDescriptor) -> Self {
        let gadget_path = root.join(name);
        let config_path = gadget_path.join("configs/c.1");
        Self {
            gadget_path,
            config_path,
            descriptor,
            created: false,
        }
    }

    pub fn gadget_path(&self) -> &Path {
        &self.gadget_path
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn exists(&self) -> bool {
        self.gadget_path.exists()
    }

    /// Create the skeleton: gadget dir, device descriptors, strings and the
    /// single configuration.
    pub fn create(&mut self) -> Result<(), ConfigfsError> {
        info!("creating gadget skeleton at {}", self.gadget_path.display());

        create_dir(&self.gadget_path)?;
        self.created = true;

        self.write_descriptors()?;
        self.write_strings()?;
        self.write_configuration()?;

        debug!("gadget skeleton ready");
        Ok(())
    }

    fn write_descriptors(&self) -> Result<(), ConfigfsError> {
        let d = &self.descriptor;
        write_attr(
            &self.gadget_path.join("idVendor"),
            &format!("0x{:04x}", d.vendor_id),
        )?;
        write_attr(
            &self.gadget_path.join("idProduct"),
            &format!("0x{:04x}", d.product_id),
        )?;
        write_attr(
            &self.gadget_path.join("bcdDevice"),
            &format!("0x{:04x}", d.device_version),
        )?;
        write_attr(
            &self.gadget_path.join("bcdUSB"),
            &format!("0x{:04x}", USB_BCD_USB),
        )?;
        // Composite device: class decided per interface.
        write_attr(&self.gadget_path.join("bDeviceClass"), "0x00")?;
        write_attr(&self.gadget_path.join("bDeviceSubClass"), "0x00")?;
        write_attr(&self.gadget_path.join("bDeviceProtocol"), "0x00")?;
        Ok(())
    }

    fn write_strings(&self) -> Result<(), ConfigfsError> {
        let strings = self.gadget_path.join("strings/0x409");
        create_dir(&strings)?;
        write_attr(&strings.join("serialnumber"), &self.descriptor.serial_number)?;
        write_attr(&strings.join("manufacturer"), &self.descriptor.manufacturer)?;
        write_attr(&strings.join("product"), &self.descriptor.product)?;
        Ok(())
    }

    fn write_configuration(&self) -> Result<(), ConfigfsError> {
        create_dir(&self.config_path)?;
        let strings = self.config_path.join("strings/0x409");
        create_dir(&strings)?;
        write_attr(&strings.join("configuration"), "Config 1")?;
        write_attr(&self.config_path.join("MaxPower"), "500")?;
        Ok(())
    }

    /// Remove the skeleton. All functions must already be torn down; the
    /// caller is expected to have shut the controller down first.
    pub fn remove(&mut self) -> Result<(), ConfigfsError> {
        if !self.exists() {
            self.created = false;
            return Ok(());
        }

        info!("removing gadget skeleton at {}", self.gadget_path.display());

        let _ = remove_dir(&self.config_path.join("strings/0x409"));
        let _ = remove_dir(&self.config_path);
        let _ = remove_dir(&self.gadget_path.join("strings/0x409"));
        if let Err(e) = remove_dir(&self.gadget_path) {
            warn!("could not remove gadget directory: {}", e);
            return Err(e);
        }

        self.created = false;
        Ok(())
    }
}

impl Drop for GadgetShell {
    fn drop(&mut self) {
        if self.created {
            if let Err(e) = self.remove() {
                warn!("gadget skeleton cleanup on drop failed: {}", e);
            }
        }
    }
}
