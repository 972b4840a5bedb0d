//! Read-only summary of an app's current identity values.

use super::descriptor::{keys, InfoPlist};
use super::locate::find_app_folder;
use super::reconcile::IdentityRequest;
use crate::ReconcileError;
use std::path::{Path, PathBuf};

/// Identity values currently stored in an app's `Info.plist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    pub app_folder: PathBuf,
    pub bundle_id: Option<String>,
    pub executable: Option<String>,
    /// `CFBundleVersion`, or `"1"` if absent.
    pub version: String,
    /// `CFBundleDisplayName`, then `CFBundleName`, then the folder name.
    pub display_name: String,
}

/// Locate the app under `bundle_path` and summarize its descriptor.
///
/// Missing optional values fall back to defaults instead of failing, so this
/// can prefill a signing form for apps that [`super::reconcile`] would reject.
pub fn inspect(bundle_path: impl AsRef<Path>) -> Result<BundleSummary, ReconcileError> {
    let app_folder = find_app_folder(bundle_path)?;
    let info = InfoPlist::open(&app_folder)?;

    let non_empty = |key: &str| {
        info.string(key)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    };

    let display_name = non_empty(keys::BUNDLE_DISPLAY_NAME)
        .or_else(|| non_empty(keys::BUNDLE_NAME))
        .unwrap_or_else(|| {
            app_folder
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

    Ok(BundleSummary {
        bundle_id: non_empty(keys::BUNDLE_IDENTIFIER),
        executable: non_empty(keys::BUNDLE_EXECUTABLE),
        version: non_empty(keys::BUNDLE_VERSION)
            .unwrap_or_else(|| IdentityRequest::DEFAULT_VERSION.to_string()),
        display_name,
        app_folder,
    })
}
