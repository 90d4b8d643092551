//! Mass storage profile - exposes a backing image as a USB drive or CD-ROM.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ActiveProfile, ProfileKind};
use crate::error::{InstantiateError, TeardownError};
use crate::gadget::configfs::{
    create_dir, create_symlink, function_dir, remove_dir, remove_file, write_attr,
};

/// Mass storage template configuration (one LUN).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MassStorageConfig {
    /// Backing image file exposed to the host.
    pub image: PathBuf,
    /// Present as CD-ROM (forces read-only).
    pub cdrom: bool,
    /// Read-only mode.
    pub ro: bool,
    /// Removable media flag.
    pub removable: bool,
    /// Disable Force Unit Access.
    pub nofua: bool,
}

impl Default for MassStorageConfig {
    fn default() -> Self {
        Self {
            image: PathBuf::new(),
            cdrom: false,
            ro: false,
            removable: true,
            nofua: true,
        }
    }
}

impl MassStorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.image.as_os_str().is_empty() {
            return Err("mass storage template requires a backing image path".to_string());
        }
        Ok(())
    }

    /// Effective read-only flag: CD-ROM media is always read-only.
    pub fn effective_ro(&self) -> bool {
        self.ro || self.cdrom
    }
}

/// A live mass storage function inside a gadget tree.
pub struct MassStorageProfile {
    function_names: Vec<String>,
    function_path: PathBuf,
    link_path: PathBuf,
    image: PathBuf,
    torn_down: bool,
}

impl MassStorageProfile {
    const FUNCTION: &'static str = "mass_storage.usb0";

    /// Build the function directory and configure LUN 0.
    ///
    /// All-or-nothing: any failure rolls the partially built tree back
    /// before returning.
    pub fn instantiate(
        gadget_path: &Path,
        config_path: &Path,
        cfg: &MassStorageConfig,
    ) -> Result<Self, InstantiateError> {
        cfg.validate().map_err(InstantiateError::ConfigInvalid)?;

        if !cfg.image.exists() {
            return Err(InstantiateError::ResourceUnavailable(format!(
                "backing image {} does not exist",
                cfg.image.display()
            )));
        }

        let function_path = function_dir(gadget_path, Self::FUNCTION);
        let link_path = config_path.join(Self::FUNCTION);

        let result = Self::build(&function_path, &link_path, cfg);
        if let Err(err) = result {
            Self::rollback(&function_path, &link_path);
            return Err(err);
        }

        debug!(
            image = %cfg.image.display(),
            cdrom = cfg.cdrom,
            ro = cfg.effective_ro(),
            "mass storage function created"
        );

        Ok(Self {
            function_names: vec![Self::FUNCTION.to_string()],
            function_path,
            link_path,
            image: cfg.image.clone(),
            torn_down: false,
        })
    }

    fn build(
        function_path: &Path,
        link_path: &Path,
        cfg: &MassStorageConfig,
    ) -> Result<(), InstantiateError> {
        create_dir(function_path)?;

        // Some hosts choke on bulk-only stall; disable when the attribute exists.
        let stall = function_path.join("stall");
        if stall.exists() {
            let _ = write_attr(&stall, "0");
        }

        // LUN 0 is auto-created on real configfs but not on a plain fs.
        let lun0 = function_path.join("lun.0");
        if !lun0.exists() {
            create_dir(&lun0)?;
        }

        write_attr(&lun0.join("cdrom"), if cfg.cdrom { "1" } else { "0" })?;
        write_attr(&lun0.join("ro"), if cfg.effective_ro() { "1" } else { "0" })?;
        write_attr(&lun0.join("removable"), if cfg.removable { "1" } else { "0" })?;
        write_attr(&lun0.join("nofua"), if cfg.nofua { "1" } else { "0" })?;

        // Setting the file attribute is what arms the LUN.
        write_attr(&lun0.join("file"), &cfg.image.to_string_lossy())?;

        create_symlink(function_path, link_path)?;
        Ok(())
    }

    fn rollback(function_path: &Path, link_path: &Path) {
        let _ = remove_file(link_path);
        let _ = remove_dir(&function_path.join("lun.0"));
        if let Err(e) = remove_dir(function_path) {
            warn!("mass storage rollback left residue: {}", e);
        }
    }
}

#[async_trait::async_trait]
impl ActiveProfile for MassStorageProfile {
    fn kind(&self) -> ProfileKind {
        ProfileKind::MassStorage
    }

    fn function_names(&self) -> &[String] {
        &self.function_names
    }

    fn describe(&self) -> String {
        format!("mass_storage({})", self.image.display())
    }

    async fn teardown(&mut self) -> Result<(), TeardownError> {
        if self.torn_down {
            return Ok(());
        }

        let lun0 = self.function_path.join("lun.0");

        // Eject the medium before dismantling. forced_eject detaches the
        // backing file regardless of host state; fall back to clearing the
        // file attribute where the kernel is too old to have it.
        let forced_eject = lun0.join("forced_eject");
        if forced_eject.exists() {
            if let Err(e) = write_attr(&forced_eject, "1") {
                warn!("forced_eject failed, clearing file attribute: {}", e);
                let _ = write_attr(&lun0.join("file"), "");
            }
        } else if lun0.exists() {
            let _ = write_attr(&lun0.join("file"), "");
        }

        remove_file(&self.link_path)?;
        // ConfigFS refuses to unlink attribute files (the kernel drops them
        // with the directory); on a plain filesystem they block the rmdir.
        for attr in ["file", "cdrom", "ro", "removable", "nofua", "forced_eject"] {
            let _ = remove_file(&lun0.join(attr));
        }
        let _ = remove_file(&self.function_path.join("stall"));
        // On real configfs the default LUN goes away with the function dir.
        let _ = remove_dir(&lun0);
        remove_dir(&self.function_path)?;

        self.torn_down = true;
        debug!("mass storage function removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn gadget_tree() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempdir().unwrap();
        let gadget = dir.path().join("gswitch");
        let config = gadget.join("configs/c.1");
        fs::create_dir_all(&config).unwrap();
        (dir, gadget, config)
    }

    fn backing_image(dir: &Path) -> PathBuf {
        let image = dir.join("disk.img");
        fs::write(&image, vec![0u8; 512]).unwrap();
        image
    }

    #[test]
    fn validate_requires_image() {
        let cfg = MassStorageConfig::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn cdrom_forces_read_only() {
        let cfg = MassStorageConfig {
            cdrom: true,
            ro: false,
            ..Default::default()
        };
        assert!(cfg.effective_ro());
    }

    #[test]
    fn instantiate_builds_lun_and_link() {
        let (dir, gadget, config) = gadget_tree();
        let cfg = MassStorageConfig {
            image: backing_image(dir.path()),
            ..Default::default()
        };

        let profile = MassStorageProfile::instantiate(&gadget, &config, &cfg).unwrap();

        let lun0 = gadget.join("functions/mass_storage.usb0/lun.0");
        assert_eq!(fs::read_to_string(lun0.join("ro")).unwrap(), "0\n");
        assert_eq!(
            fs::read_to_string(lun0.join("file")).unwrap().trim(),
            cfg.image.to_string_lossy()
        );
        assert!(config.join("mass_storage.usb0").symlink_metadata().is_ok());
        assert_eq!(profile.function_names(), ["mass_storage.usb0"]);
    }

    #[test]
    fn missing_image_is_resource_unavailable() {
        let (dir, gadget, config) = gadget_tree();
        let cfg = MassStorageConfig {
            image: dir.path().join("absent.iso"),
            ..Default::default()
        };

        let err = MassStorageProfile::instantiate(&gadget, &config, &cfg).err();
        assert!(matches!(err, Some(InstantiateError::ResourceUnavailable(_))));
        // Nothing may be left behind.
        assert!(!gadget.join("functions/mass_storage.usb0").exists());
    }

    #[tokio::test]
    async fn teardown_removes_tree_and_is_idempotent() {
        let (dir, gadget, config) = gadget_tree();
        let cfg = MassStorageConfig {
            image: backing_image(dir.path()),
            ..Default::default()
        };

        let mut profile = MassStorageProfile::instantiate(&gadget, &config, &cfg).unwrap();
        profile.teardown().await.unwrap();

        assert!(!gadget.join("functions/mass_storage.usb0").exists());
        assert!(config.join("mass_storage.usb0").symlink_metadata().is_err());

        // Second teardown is a no-op.
        profile.teardown().await.unwrap();
    }
}
