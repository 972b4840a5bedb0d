//! Idempotent `Info.plist` reconciliation.
//!
//! Compares the bundle identifier, version and display name in an app's
//! descriptor with the values the caller wants, and rewrites the file only
//! when at least one of them differs. A descriptor that already matches is
//! never touched, so hand-maintained formatting survives repeated runs.

use super::descriptor::{keys, InfoPlist, INFO_PLIST};
use super::locate::find_app_folder;
use crate::ReconcileError;
use log::info;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

/// Desired identity values for an app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRequest {
    bundle_id: String,
    display_name: String,
    version: Option<String>,
}

impl IdentityRequest {
    /// Version written when the request does not name one.
    pub const DEFAULT_VERSION: &'static str = "1";

    /// Create a request. Bundle identifier and display name are required
    /// and checked by [`IdentityRequest::validate`].
    pub fn new(bundle_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            display_name: display_name.into(),
            version: None,
        }
    }

    /// Set the bundle version. An empty version counts as not provided.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.version = if version.is_empty() { None } else { Some(version) };
        self
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The version to reconcile towards, defaulting to `"1"`.
    pub fn desired_version(&self) -> &str {
        self.version.as_deref().unwrap_or(Self::DEFAULT_VERSION)
    }

    /// Check that the required values are non-empty.
    ///
    /// Returns the name of the first missing field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.bundle_id.is_empty() {
            return Err("bundle identifier");
        }
        if self.display_name.is_empty() {
            return Err("display name");
        }
        Ok(())
    }
}

/// Which key carries the display name.
///
/// Decided once per reconciliation from the descriptor as read; only the
/// chosen key is ever written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayNameKey {
    /// The descriptor already has `CFBundleDisplayName`.
    Display,
    /// Fall back to `CFBundleName`.
    Name,
}

impl DisplayNameKey {
    pub fn for_descriptor(info: &InfoPlist) -> Self {
        if info.contains_key(keys::BUNDLE_DISPLAY_NAME) {
            DisplayNameKey::Display
        } else {
            DisplayNameKey::Name
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            DisplayNameKey::Display => keys::BUNDLE_DISPLAY_NAME,
            DisplayNameKey::Name => keys::BUNDLE_NAME,
        }
    }
}

/// One tracked field that was changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub key: &'static str,
    /// Previous string value, `None` if absent or not a string.
    pub previous: Option<String>,
    pub current: String,
}

/// Result of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub app_folder: PathBuf,
    /// Whether `Info.plist` was rewritten.
    pub written: bool,
    pub bundle_id: String,
    pub version: String,
    pub display_name: String,
    pub display_name_key: DisplayNameKey,
    /// Fields that differed, in the order they were checked.
    pub changes: Vec<FieldChange>,
}

static DESCRIPTOR_LOCKS: Lazy<Mutex<HashMap<PathBuf, Weak<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Per-path lock serializing read-diff-write on one descriptor.
fn descriptor_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let mut locks = DESCRIPTOR_LOCKS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    locks.retain(|_, lock| lock.strong_count() > 0);
    if let Some(lock) = locks.get(&key).and_then(Weak::upgrade) {
        return lock;
    }

    let lock = Arc::new(Mutex::new(()));
    locks.insert(key, Arc::downgrade(&lock));
    lock
}

/// Locate the app under `bundle_path` and reconcile its `Info.plist`.
///
/// # Errors
///
/// - [`ReconcileError::InvalidRequest`] if the request has an empty required value
/// - [`ReconcileError::BundleNotFound`] if no app folder exists
/// - errors from [`reconcile_app_folder`]
///
/// # Examples
///
/// ```no_run
/// use arksign::bundle::{reconcile, IdentityRequest};
///
/// let request = IdentityRequest::new("com.new.app", "NewApp").version("1.0");
/// let outcome = reconcile("Payload", &request)?;
/// if outcome.written {
///     println!("Updated {} field(s)", outcome.changes.len());
/// }
/// # Ok::<(), arksign::ReconcileError>(())
/// ```
pub fn reconcile(
    bundle_path: impl AsRef<Path>,
    request: &IdentityRequest,
) -> Result<ReconcileOutcome, ReconcileError> {
    request.validate().map_err(ReconcileError::InvalidRequest)?;
    let app_folder = find_app_folder(bundle_path)?;
    reconcile_app_folder(&app_folder, request)
}

/// Reconcile the `Info.plist` of an already located app folder.
///
/// # Errors
///
/// - [`ReconcileError::InvalidRequest`] if the request has an empty required value
/// - [`ReconcileError::DescriptorUnreadable`] / [`ReconcileError::DescriptorMalformed`]
/// - [`ReconcileError::DescriptorIncomplete`] if `CFBundleIdentifier` or
///   `CFBundleExecutable` is missing; the file is not modified
/// - [`ReconcileError::WriteFailed`] if the rewrite fails; the original is intact
pub fn reconcile_app_folder(
    app_folder: &Path,
    request: &IdentityRequest,
) -> Result<ReconcileOutcome, ReconcileError> {
    request.validate().map_err(ReconcileError::InvalidRequest)?;

    let lock = descriptor_lock(&app_folder.join(INFO_PLIST));
    let _held = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let mut info = InfoPlist::open(app_folder)?;
    info!("Read {} ({:?})", info.path().display(), info.format());

    let existing_id = info.required_string(keys::BUNDLE_IDENTIFIER)?;
    let executable = info.required_string(keys::BUNDLE_EXECUTABLE)?;
    info!(
        "Info.plist validation successful - BundleID: {}, BundleExecutable: {}",
        existing_id, executable
    );

    let display_name_key = DisplayNameKey::for_descriptor(&info);

    let mut changes = Vec::new();
    stage(&mut info, &mut changes, keys::BUNDLE_IDENTIFIER, request.bundle_id());
    stage(&mut info, &mut changes, keys::BUNDLE_VERSION, request.desired_version());
    stage(&mut info, &mut changes, display_name_key.key(), request.display_name());

    let written = !changes.is_empty();
    if written {
        info.save()?;
        info!("Updated Info.plist with {} change(s)", changes.len());
    } else {
        info!("Info.plist already has correct values, skipping update");
    }

    Ok(ReconcileOutcome {
        app_folder: app_folder.to_path_buf(),
        written,
        bundle_id: request.bundle_id().to_string(),
        version: request.desired_version().to_string(),
        display_name: request.display_name().to_string(),
        display_name_key,
        changes,
    })
}

fn stage(info: &mut InfoPlist, changes: &mut Vec<FieldChange>, key: &'static str, desired: &str) {
    let previous = info.string(key).map(str::to_owned);
    if previous.as_deref() == Some(desired) {
        return;
    }

    info!(
        "Updating {}: {} -> {}",
        key,
        previous.as_deref().unwrap_or("<absent>"),
        desired
    );
    info.set_string(key, desired);
    changes.push(FieldChange {
        key,
        previous,
        current: desired.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    fn write_app(root: &Path, entries: &[(&str, &str)]) -> PathBuf {
        let app = root.join("Payload/App.app");
        fs::create_dir_all(&app).unwrap();

        let mut body = String::new();
        for (key, value) in entries {
            body.push_str(&format!("    <key>{key}</key>\n    <string>{value}</string>\n"));
        }
        let plist = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<plist version=\"1.0\">\n<dict>\n{body}</dict>\n</plist>\n"
        );
        fs::write(app.join(INFO_PLIST), plist).unwrap();
        app
    }

    #[test]
    fn test_request_defaults_and_validation() {
        let request = IdentityRequest::new("com.new.app", "NewApp");
        assert_eq!(request.desired_version(), "1");
        assert!(request.validate().is_ok());

        assert_eq!(request.clone().version("").desired_version(), "1");
        assert_eq!(request.version("2.0").desired_version(), "2.0");

        assert_eq!(IdentityRequest::new("", "NewApp").validate(), Err("bundle identifier"));
        assert_eq!(IdentityRequest::new("com.new.app", "").validate(), Err("display name"));
    }

    #[test]
    fn test_invalid_request_rejected_before_io() {
        let result = reconcile("/nonexistent", &IdentityRequest::new("", "NewApp"));
        assert!(matches!(result, Err(ReconcileError::InvalidRequest("bundle identifier"))));
    }

    #[test]
    fn test_updates_generic_name_when_display_name_absent() {
        let temp_dir = TempDir::new().unwrap();
        let app = write_app(
            temp_dir.path(),
            &[
                ("CFBundleIdentifier", "com.old.app"),
                ("CFBundleExecutable", "App"),
                ("CFBundleVersion", "1.0"),
                ("CFBundleName", "Old"),
            ],
        );

        let request = IdentityRequest::new("com.old.app", "NewApp").version("1.0");
        let outcome = reconcile(temp_dir.path(), &request).unwrap();

        assert!(outcome.written);
        assert_eq!(outcome.display_name_key, DisplayNameKey::Name);
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.changes[0].key, "CFBundleName");
        assert_eq!(outcome.changes[0].previous.as_deref(), Some("Old"));

        let info = InfoPlist::open(&app).unwrap();
        assert_eq!(info.string("CFBundleName"), Some("NewApp"));
        assert!(!info.contains_key("CFBundleDisplayName"));
    }

    #[test]
    fn test_updates_display_name_key_when_present() {
        let temp_dir = TempDir::new().unwrap();
        let app = write_app(
            temp_dir.path(),
            &[
                ("CFBundleIdentifier", "com.old.app"),
                ("CFBundleExecutable", "App"),
                ("CFBundleVersion", "1"),
                ("CFBundleDisplayName", "Old"),
                ("CFBundleName", "Internal"),
            ],
        );

        let outcome = reconcile(&app, &IdentityRequest::new("com.old.app", "NewApp")).unwrap();
        assert_eq!(outcome.display_name_key, DisplayNameKey::Display);

        let info = InfoPlist::open(&app).unwrap();
        assert_eq!(info.string("CFBundleDisplayName"), Some("NewApp"));
        assert_eq!(info.string("CFBundleName"), Some("Internal"));
    }

    #[test]
    fn test_default_version_matching_is_no_change() {
        let temp_dir = TempDir::new().unwrap();
        let app = write_app(
            temp_dir.path(),
            &[
                ("CFBundleIdentifier", "com.same.app"),
                ("CFBundleExecutable", "App"),
                ("CFBundleVersion", "1"),
                ("CFBundleName", "Same"),
            ],
        );
        let before = fs::read(app.join(INFO_PLIST)).unwrap();

        let outcome = reconcile(&app, &IdentityRequest::new("com.same.app", "Same")).unwrap();
        assert!(!outcome.written);
        assert!(outcome.changes.is_empty());
        assert_eq!(fs::read(app.join(INFO_PLIST)).unwrap(), before);
    }

    #[test]
    fn test_missing_version_is_added() {
        let temp_dir = TempDir::new().unwrap();
        let app = write_app(
            temp_dir.path(),
            &[
                ("CFBundleIdentifier", "com.same.app"),
                ("CFBundleExecutable", "App"),
                ("CFBundleName", "Same"),
            ],
        );

        let outcome = reconcile(&app, &IdentityRequest::new("com.same.app", "Same")).unwrap();
        assert!(outcome.written);
        assert_eq!(outcome.changes[0].key, "CFBundleVersion");
        assert_eq!(outcome.changes[0].previous, None);
        assert_eq!(InfoPlist::open(&app).unwrap().string("CFBundleVersion"), Some("1"));
    }

    #[test]
    fn test_missing_required_key_leaves_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let app = write_app(temp_dir.path(), &[("CFBundleIdentifier", "com.old.app")]);
        let before = fs::read(app.join(INFO_PLIST)).unwrap();

        let result = reconcile(&app, &IdentityRequest::new("com.new.app", "NewApp"));
        assert!(matches!(
            result,
            Err(ReconcileError::DescriptorIncomplete("CFBundleExecutable"))
        ));
        assert_eq!(fs::read(app.join(INFO_PLIST)).unwrap(), before);
    }

    #[test]
    fn test_missing_identifier_leaves_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let app = write_app(
            temp_dir.path(),
            &[("CFBundleExecutable", "App"), ("CFBundleName", "Old")],
        );
        let before = fs::read(app.join(INFO_PLIST)).unwrap();

        let result = reconcile(&app, &IdentityRequest::new("com.new.app", "NewApp"));
        assert!(matches!(
            result,
            Err(ReconcileError::DescriptorIncomplete("CFBundleIdentifier"))
        ));
        assert_eq!(fs::read(app.join(INFO_PLIST)).unwrap(), before);
    }

    #[test]
    #[cfg(unix)]
    fn test_write_failure_keeps_previous_content() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let app = write_app(
            temp_dir.path(),
            &[
                ("CFBundleIdentifier", "com.old.app"),
                ("CFBundleExecutable", "App"),
            ],
        );
        let before = fs::read(app.join(INFO_PLIST)).unwrap();
        fs::set_permissions(&app, fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users ignore directory permissions.
        let canary = app.join("canary");
        if fs::write(&canary, b"x").is_ok() {
            fs::remove_file(&canary).unwrap();
            fs::set_permissions(&app, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = reconcile(&app, &IdentityRequest::new("com.new.app", "NewApp"));
        let leftovers: Vec<_> = fs::read_dir(&app)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name.to_string_lossy().starts_with(".Info.plist."))
            .collect();
        let after = fs::read(app.join(INFO_PLIST)).unwrap();
        fs::set_permissions(&app, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(result, Err(ReconcileError::WriteFailed { .. })));
        assert_eq!(after, before);
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_concurrent_reconciles_converge() {
        let temp_dir = TempDir::new().unwrap();
        let app = write_app(
            temp_dir.path(),
            &[
                ("CFBundleIdentifier", "com.old.app"),
                ("CFBundleExecutable", "App"),
            ],
        );

        let request = IdentityRequest::new("com.new.app", "NewApp").version("2.0");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let app = app.clone();
                let request = request.clone();
                thread::spawn(move || reconcile(&app, &request).unwrap().written)
            })
            .collect();
        let writes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|written| *written)
            .count();

        // Serialized per path: exactly one writer saw stale values.
        assert_eq!(writes, 1);
        let info = InfoPlist::open(&app).unwrap();
        assert_eq!(info.string("CFBundleIdentifier"), Some("com.new.app"));
        assert_eq!(info.string("CFBundleVersion"), Some("2.0"));
    }
}
