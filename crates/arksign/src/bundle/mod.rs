//! App bundle handling for re-signing.
//!
//! This module provides functionality to:
//! - Locate the `.app` folder inside an unpacked IPA
//! - Read and atomically rewrite `Info.plist`
//! - Reconcile bundle identifier, version and display name idempotently
//! - Remove stale signature artifacts
//!
//! # Tracked `Info.plist` Keys
//!
//! | Key | Role |
//! |-----|------|
//! | `CFBundleIdentifier` | required, reconciled |
//! | `CFBundleExecutable` | required, never written |
//! | `CFBundleVersion` | reconciled, defaults to `"1"` |
//! | `CFBundleDisplayName` | reconciled if already present |
//! | `CFBundleName` | reconciled otherwise |
//!
//! # Examples
//!
//! ```no_run
//! use arksign::bundle::{reconcile, IdentityRequest};
//!
//! let request = IdentityRequest::new("com.example.app", "Example");
//! let outcome = reconcile("/tmp/unpacked", &request)?;
//! for change in &outcome.changes {
//!     println!("{}: {:?} -> {}", change.key, change.previous, change.current);
//! }
//! # Ok::<(), arksign::ReconcileError>(())
//! ```

pub mod descriptor;
pub mod inspect;
pub mod locate;
pub mod reconcile;
pub mod strip;

pub use descriptor::{keys, InfoPlist, PlistFormat, INFO_PLIST};
pub use inspect::{inspect, BundleSummary};
pub use locate::{find_app_folder, is_app_folder};
pub use reconcile::{
    reconcile, reconcile_app_folder, DisplayNameKey, FieldChange, IdentityRequest,
    ReconcileOutcome,
};
pub use strip::strip_signatures;
