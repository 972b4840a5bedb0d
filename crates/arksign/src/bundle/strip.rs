//! Removal of stale signature artifacts before re-signing.

use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const CODE_SIGNATURE_DIR: &str = "_CodeSignature";
const EMBEDDED_PROFILE: &str = "embedded.mobileprovision";

/// Remove the previous signature from an app folder.
///
/// Deletes `_CodeSignature/` and `embedded.mobileprovision` from the app
/// itself, and `_CodeSignature/` from every `Frameworks/*.framework`.
/// Returns the removed paths; absent artifacts are not an error.
pub fn strip_signatures(app_folder: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let app_folder = app_folder.as_ref();
    let mut removed = Vec::new();

    remove_if_present(&app_folder.join(CODE_SIGNATURE_DIR), &mut removed)?;
    remove_if_present(&app_folder.join(EMBEDDED_PROFILE), &mut removed)?;

    let frameworks = app_folder.join("Frameworks");
    if frameworks.is_dir() {
        let mut entries = fs::read_dir(&frameworks)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort();

        for framework in entries {
            let is_framework = framework.is_dir()
                && framework.extension().map_or(false, |ext| ext == "framework");
            if is_framework {
                remove_if_present(&framework.join(CODE_SIGNATURE_DIR), &mut removed)?;
            }
        }
    } else {
        debug!("No Frameworks folder in {}", app_folder.display());
    }

    info!("Removed {} stale signature artifact(s)", removed.len());
    Ok(removed)
}

fn remove_if_present(path: &Path, removed: &mut Vec<PathBuf>) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    debug!("Removed {}", path.display());
    removed.push(path.to_path_buf());
    Ok(())
}
