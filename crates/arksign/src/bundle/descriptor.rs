//! `Info.plist` reading and atomic rewriting.
//!
//! The descriptor keeps the encoding it was read with: binary plists are
//! written back as binary, everything else as XML.

use crate::ReconcileError;
use plist::{Dictionary, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File name of the descriptor inside an app folder.
pub const INFO_PLIST: &str = "Info.plist";

/// `Info.plist` keys read or written by arksign.
pub mod keys {
    pub const BUNDLE_IDENTIFIER: &str = "CFBundleIdentifier";
    pub const BUNDLE_EXECUTABLE: &str = "CFBundleExecutable";
    pub const BUNDLE_VERSION: &str = "CFBundleVersion";
    pub const BUNDLE_DISPLAY_NAME: &str = "CFBundleDisplayName";
    pub const BUNDLE_NAME: &str = "CFBundleName";
}

const BINARY_PLIST_MAGIC: &[u8] = b"bplist";

/// On-disk plist encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlistFormat {
    Xml,
    Binary,
}

impl PlistFormat {
    fn detect(data: &[u8]) -> Self {
        if data.starts_with(BINARY_PLIST_MAGIC) {
            PlistFormat::Binary
        } else {
            PlistFormat::Xml
        }
    }
}

/// An app's `Info.plist`, loaded into memory.
#[derive(Debug)]
pub struct InfoPlist {
    path: PathBuf,
    format: PlistFormat,
    dict: Dictionary,
}

impl InfoPlist {
    /// Read `Info.plist` from an app folder.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::DescriptorUnreadable`] if the file is missing or unreadable
    /// - [`ReconcileError::DescriptorMalformed`] if it is not a plist dictionary
    pub fn open(app_folder: impl AsRef<Path>) -> Result<Self, ReconcileError> {
        let path = app_folder.as_ref().join(INFO_PLIST);
        let data = fs::read(&path).map_err(|source| ReconcileError::DescriptorUnreadable {
            path: path.clone(),
            source,
        })?;
        Self::from_bytes(path, &data)
    }

    /// Parse descriptor bytes that belong to `path`.
    pub fn from_bytes(path: impl Into<PathBuf>, data: &[u8]) -> Result<Self, ReconcileError> {
        let path = path.into();
        let value: Value =
            plist::from_bytes(data).map_err(|e| ReconcileError::malformed(&path, e))?;
        let dict = value
            .into_dictionary()
            .ok_or_else(|| ReconcileError::malformed(&path, "root is not a dictionary"))?;

        Ok(Self {
            path,
            format: PlistFormat::detect(data),
            dict,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> PlistFormat {
        self.format
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.dict.contains_key(key)
    }

    /// String value of `key`, or `None` if absent or not a string.
    pub fn string(&self, key: &str) -> Option<&str> {
        self.dict.get(key).and_then(Value::as_string)
    }

    /// String value of a key that must be present and non-empty.
    pub fn required_string(&self, key: &'static str) -> Result<&str, ReconcileError> {
        match self.string(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ReconcileError::DescriptorIncomplete(key)),
        }
    }

    pub fn set_string(&mut self, key: &str, value: &str) {
        self.dict
            .insert(key.to_string(), Value::String(value.to_string()));
    }

    /// Serialize in the format the descriptor was read with.
    pub fn to_bytes(&self) -> Result<Vec<u8>, plist::Error> {
        let value = Value::Dictionary(self.dict.clone());
        let mut buf = Vec::new();
        match self.format {
            PlistFormat::Xml => plist::to_writer_xml(&mut buf, &value)?,
            PlistFormat::Binary => plist::to_writer_binary(&mut buf, &value)?,
        }
        Ok(buf)
    }

    /// Replace the descriptor on disk.
    ///
    /// Writes to a temporary file next to `Info.plist` and renames it over the
    /// original, so readers see either the old or the new content.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::WriteFailed`]; the original file is intact.
    pub fn save(&self) -> Result<(), ReconcileError> {
        let write_failed = |source: io::Error| ReconcileError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        let data = self
            .to_bytes()
            .map_err(|e| write_failed(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        write_atomic(&self.path, &data).map_err(write_failed)
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".Info.plist.")
        .tempfile_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    // On error the NamedTempFile is dropped and removed.
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleIdentifier</key>
    <string>com.old.app</string>
    <key>CFBundleExecutable</key>
    <string>App</string>
    <key>UIRequiredDeviceCapabilities</key>
    <array><string>arm64</string></array>
</dict>
</plist>"#;

    #[test]
    fn test_open_and_read_strings() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(INFO_PLIST), SAMPLE).unwrap();

        let info = InfoPlist::open(temp_dir.path()).unwrap();
        assert_eq!(info.format(), PlistFormat::Xml);
        assert_eq!(info.string(keys::BUNDLE_IDENTIFIER), Some("com.old.app"));
        assert_eq!(info.required_string(keys::BUNDLE_EXECUTABLE).unwrap(), "App");
        assert!(info.string(keys::BUNDLE_VERSION).is_none());
        assert!(info.string("UIRequiredDeviceCapabilities").is_none());
    }

    #[test]
    fn test_open_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = InfoPlist::open(temp_dir.path());
        assert!(matches!(result, Err(ReconcileError::DescriptorUnreadable { .. })));
    }

    #[test]
    fn test_open_garbage() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(INFO_PLIST), b"definitely not a plist <<<").unwrap();
        let result = InfoPlist::open(temp_dir.path());
        assert!(matches!(result, Err(ReconcileError::DescriptorMalformed { .. })));
    }

    #[test]
    fn test_root_must_be_dictionary() {
        let data = br#"<?xml version="1.0"?><plist version="1.0"><array><string>x</string></array></plist>"#;
        let result = InfoPlist::from_bytes("Info.plist", data);
        assert!(matches!(result, Err(ReconcileError::DescriptorMalformed { .. })));
    }

    #[test]
    fn test_required_string_rejects_empty() {
        let data = br#"<?xml version="1.0"?><plist version="1.0"><dict><key>CFBundleIdentifier</key><string></string></dict></plist>"#;
        let info = InfoPlist::from_bytes("Info.plist", data).unwrap();
        assert!(matches!(
            info.required_string(keys::BUNDLE_IDENTIFIER),
            Err(ReconcileError::DescriptorIncomplete("CFBundleIdentifier"))
        ));
    }

    #[test]
    fn test_save_preserves_other_keys() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(INFO_PLIST), SAMPLE).unwrap();

        let mut info = InfoPlist::open(temp_dir.path()).unwrap();
        info.set_string(keys::BUNDLE_IDENTIFIER, "com.new.app");
        info.save().unwrap();

        let reread = InfoPlist::open(temp_dir.path()).unwrap();
        assert_eq!(reread.string(keys::BUNDLE_IDENTIFIER), Some("com.new.app"));
        assert!(reread.contains_key("UIRequiredDeviceCapabilities"));

        // No temporary files left behind.
        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_binary_plist_stays_binary() {
        let temp_dir = TempDir::new().unwrap();
        let mut dict = Dictionary::new();
        dict.insert(keys::BUNDLE_IDENTIFIER.into(), Value::String("com.old.app".into()));
        let mut data = Vec::new();
        plist::to_writer_binary(&mut data, &Value::Dictionary(dict)).unwrap();
        fs::write(temp_dir.path().join(INFO_PLIST), &data).unwrap();

        let mut info = InfoPlist::open(temp_dir.path()).unwrap();
        assert_eq!(info.format(), PlistFormat::Binary);
        info.set_string(keys::BUNDLE_IDENTIFIER, "com.new.app");
        info.save().unwrap();

        let written = fs::read(temp_dir.path().join(INFO_PLIST)).unwrap();
        assert!(written.starts_with(BINARY_PLIST_MAGIC));
    }

    #[test]
    #[cfg(unix)]
    fn test_save_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(INFO_PLIST);
        fs::write(&path, SAMPLE).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        let mut info = InfoPlist::open(temp_dir.path()).unwrap();
        info.set_string(keys::BUNDLE_IDENTIFIER, "com.new.app");
        info.save().unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}
