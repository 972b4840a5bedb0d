//! Preparation of unpacked iOS apps for re-signing.
//!
//! - [`crypto`] - PKCS#12 validation and signer identity
//! - [`bundle`] - app folder lookup and `Info.plist` reconciliation
//! - [`engine`] - interface to the code-signing engine
//! - [`Signer`] - builder tying the above together
//! - [`status`] - integer status codes for host applications
//! - [`logging`] - forwarding of log records to host sinks

pub mod bundle;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod logging;
pub mod signer;
pub mod status;

pub use bundle::{IdentityRequest, ReconcileOutcome};
pub use crypto::{Credential, Identity};
pub use engine::{SigningEngine, SigningPolicy};
pub use error::{ReconcileError, SignError, ValidationError};
pub use signer::Signer;
pub use status::{SignStatus, ValidateStatus};
