//! ConfigFS file primitives for USB gadget manipulation.
//!
//! All attribute writes go through [`write_attr`], which builds the complete
//! newline-terminated buffer up front: sysfs attributes are processed on the
//! first `write()` syscall, so the value must land in a single write.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ConfigfsError;

/// ConfigFS base path for USB gadgets.
pub const CONFIGFS_PATH: &str = "/sys/kernel/config/usb_gadget";

/// Sysfs directory enumerating available USB device controllers.
pub const UDC_CLASS_PATH: &str = "/sys/class/udc";

fn fs_err(op: &'static str, path: &Path, source: std::io::Error) -> ConfigfsError {
    ConfigfsError {
        op,
        path: path.to_path_buf(),
        source,
    }
}

/// Check whether the gadget configfs tree is mounted.
pub fn is_configfs_available() -> bool {
    Path::new(CONFIGFS_PATH).exists()
}

/// Find the first available UDC under `udc_dir` (normally [`UDC_CLASS_PATH`]).
pub fn find_udc_in(udc_dir: &Path) -> Option<String> {
    let mut names: Vec<String> = fs::read_dir(udc_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    // read_dir order is arbitrary; sort so discovery is deterministic.
    names.sort();
    names.into_iter().next()
}

/// Find the first available UDC on the system.
pub fn find_udc() -> Option<String> {
    find_udc_in(Path::new(UDC_CLASS_PATH))
}

/// Write a string value to a configfs/sysfs attribute.
///
/// Appends a trailing newline when missing and issues exactly one `write()`
/// syscall, then flushes. `O_TRUNC` is deliberately avoided: some write-only
/// attributes (e.g. `forced_eject`) reject it.
pub fn write_attr(path: &Path, value: &str) -> Result<(), ConfigfsError> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .or_else(|e| {
            if path.exists() {
                Err(e)
            } else {
                File::create(path)
            }
        })
        .map_err(|e| fs_err("open", path, e))?;

    let data: std::borrow::Cow<[u8]> = if value.ends_with('\n') {
        value.as_bytes().into()
    } else {
        let mut buf = Vec::with_capacity(value.len() + 1);
        buf.extend_from_slice(value.as_bytes());
        buf.push(b'\n');
        buf.into()
    };

    file.write_all(&data).map_err(|e| fs_err("write", path, e))?;
    file.flush().map_err(|e| fs_err("flush", path, e))
}

/// Clear an attribute to a bare newline, truncating previous contents.
///
/// Used for read-write attributes that are emptied to reset them (the
/// gadget `UDC` attribute reads back as the bound controller name, so the
/// stale value must actually go away). `write_attr` stays truncate-free
/// because write-only attributes reject `O_TRUNC`.
pub fn clear_attr(path: &Path) -> Result<(), ConfigfsError> {
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| fs_err("open", path, e))?;
    file.write_all(b"\n").map_err(|e| fs_err("write", path, e))?;
    file.flush().map_err(|e| fs_err("flush", path, e))
}

/// Read a trimmed string value from an attribute.
pub fn read_attr(path: &Path) -> Result<String, ConfigfsError> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| fs_err("read", path, e))
}

/// Create a directory (and parents) if it does not exist.
pub fn create_dir(path: &Path) -> Result<(), ConfigfsError> {
    fs::create_dir_all(path).map_err(|e| fs_err("mkdir", path, e))
}

/// Remove a directory if present. ConfigFS directories are removed with
/// plain `rmdir`; the kernel tears the attribute files down itself.
pub fn remove_dir(path: &Path) -> Result<(), ConfigfsError> {
    if path.exists() {
        fs::remove_dir(path).map_err(|e| fs_err("rmdir", path, e))?;
    }
    Ok(())
}

/// Remove a file or symlink if present.
pub fn remove_file(path: &Path) -> Result<(), ConfigfsError> {
    if path.symlink_metadata().is_ok() {
        fs::remove_file(path).map_err(|e| fs_err("unlink", path, e))?;
    }
    Ok(())
}

/// Create a symlink (used to bind a function into a configuration).
pub fn create_symlink(src: &Path, dest: &Path) -> Result<(), ConfigfsError> {
    std::os::unix::fs::symlink(src, dest).map_err(|e| fs_err("symlink", dest, e))
}

/// Join a function name under a gadget's `functions/` directory.
pub fn function_dir(gadget_path: &Path, function: &str) -> PathBuf {
    gadget_path.join("functions").join(function)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_attr_appends_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idVendor");
        write_attr(&path, "0x1d6b").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0x1d6b\n");
    }

    #[test]
    fn write_attr_keeps_existing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("attr");
        write_attr(&path, "value\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "value\n");
    }

    #[test]
    fn clear_attr_drops_previous_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("UDC");
        write_attr(&path, "dummy_udc.0").unwrap();

        clear_attr(&path).unwrap();
        // No tail of the old value may survive the clear.
        assert_eq!(fs::read_to_string(&path).unwrap(), "\n");
        assert_eq!(read_attr(&path).unwrap(), "");
    }

    #[test]
    fn read_attr_trims() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("UDC");
        fs::write(&path, "musb-hdrc.0\n").unwrap();
        assert_eq!(read_attr(&path).unwrap(), "musb-hdrc.0");
    }

    #[test]
    fn udc_discovery_is_deterministic() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("zz-udc")).unwrap();
        fs::create_dir(dir.path().join("aa-udc")).unwrap();
        assert_eq!(find_udc_in(dir.path()).unwrap(), "aa-udc");
    }

    #[test]
    fn remove_missing_is_ok() {
        let dir = tempdir().unwrap();
        assert!(remove_dir(&dir.path().join("nope")).is_ok());
        assert!(remove_file(&dir.path().join("nope")).is_ok());
    }
}
