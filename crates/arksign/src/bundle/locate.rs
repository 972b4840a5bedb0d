//! Locating the app folder inside an unpacked IPA or a bare bundle path.

use crate::ReconcileError;
use log::debug;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions that mark a directory as an application bundle.
const BUNDLE_EXTENSIONS: [&str; 2] = ["app", "appex"];

/// Directories never searched for the main app.
///
/// Embedded frameworks, extensions and watch apps are bundles too, but never
/// the one being re-identified.
const SKIPPED_DIRS: [&str; 4] = ["__MACOSX", "Frameworks", "PlugIns", "Watch"];

/// Check if a path is an application bundle directory.
pub fn is_app_folder(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            BUNDLE_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(false)
}

/// Find the application folder for `path`.
///
/// Returns `path` itself if it is a `.app`/`.appex` directory. Otherwise
/// searches depth-first in file-name order (so `Payload/Foo.app` is found
/// for an unpacked IPA) and returns the first match.
///
/// # Errors
///
/// Returns [`ReconcileError::BundleNotFound`] if no bundle directory exists
/// under `path`.
pub fn find_app_folder(path: impl AsRef<Path>) -> Result<PathBuf, ReconcileError> {
    let path = path.as_ref();

    if is_app_folder(path) {
        return Ok(path.to_path_buf());
    }
    if !path.is_dir() {
        return Err(ReconcileError::BundleNotFound(path.to_path_buf()));
    }

    let walker = WalkDir::new(path)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.file_type().is_dir()
                && !SKIPPED_DIRS
                    .iter()
                    .any(|skipped| entry.file_name() == *skipped)
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry while locating app: {}", e);
                continue;
            }
        };

        if is_app_folder(entry.path()) {
            return Ok(entry.into_path());
        }
    }

    Err(ReconcileError::BundleNotFound(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_app_path_is_returned_directly() {
        let temp_dir = TempDir::new().unwrap();
        let app = temp_dir.path().join("Test.app");
        fs::create_dir(&app).unwrap();

        assert_eq!(find_app_folder(&app).unwrap(), app);
    }

    #[test]
    fn test_finds_app_in_payload() {
        let temp_dir = TempDir::new().unwrap();
        let app = temp_dir.path().join("Payload/Test.app");
        fs::create_dir_all(&app).unwrap();

        assert_eq!(find_app_folder(temp_dir.path()).unwrap(), app);
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        let app = temp_dir.path().join("Payload/Test.APP");
        fs::create_dir_all(&app).unwrap();

        assert_eq!(find_app_folder(temp_dir.path()).unwrap(), app);
    }

    #[test]
    fn test_skips_macosx_metadata() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("__MACOSX/Payload/Test.app")).unwrap();
        let app = temp_dir.path().join("Payload/Test.app");
        fs::create_dir_all(&app).unwrap();

        assert_eq!(find_app_folder(temp_dir.path()).unwrap(), app);
    }

    #[test]
    fn test_skips_embedded_bundles() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("Frameworks/Helper.app")).unwrap();
        fs::create_dir_all(temp_dir.path().join("PlugIns/Share.appex")).unwrap();

        let result = find_app_folder(temp_dir.path());
        assert!(matches!(result, Err(ReconcileError::BundleNotFound(_))));
    }

    #[test]
    fn test_file_named_app_is_not_a_bundle() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("Fake.app"), b"not a directory").unwrap();

        let result = find_app_folder(temp_dir.path());
        assert!(matches!(result, Err(ReconcileError::BundleNotFound(_))));
    }

    #[test]
    fn test_nonexistent_path() {
        let result = find_app_folder("/nonexistent/Payload");
        assert!(matches!(result, Err(ReconcileError::BundleNotFound(_))));
    }
}
