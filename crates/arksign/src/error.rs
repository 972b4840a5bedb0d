//! Error types for arksign operations.
//!
//! Each stage of the pipeline has its own error enum so callers can route
//! failures to the right remediation:
//!
//! - [`ValidationError`] - PKCS#12 credential validation
//! - [`ReconcileError`] - `Info.plist` reconciliation
//! - [`SignError`] - signing orchestration
//!
//! # See Also
//!
//! - [`crate::status`] - conversion of these errors to integer status codes

use std::path::PathBuf;
use thiserror::Error;

/// Error returned by [`crate::crypto::validate`] and [`crate::crypto::Credential::open`].
///
/// Variants are ordered by the step of validation that produces them and are
/// mutually exclusive.
///
/// # Examples
///
/// ```no_run
/// use arksign::{crypto, ValidationError};
///
/// match crypto::validate("signing.p12", "secret") {
///     Ok(identity) => println!("Team: {}", identity.team_name()),
///     Err(ValidationError::InvalidPassphrase(_)) => eprintln!("Wrong password"),
///     Err(ValidationError::MalformedContainer(e)) => eprintln!("Not a PKCS#12 file: {e}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required argument was empty or absent.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(&'static str),

    /// The container file does not exist or cannot be read.
    #[error("Cannot read PKCS#12 file {}: {source}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes are not a recognizable PKCS#12 structure.
    #[error("Invalid PKCS#12: {0}")]
    MalformedContainer(#[source] openssl::error::ErrorStack),

    /// Decryption with the supplied passphrase failed.
    ///
    /// This is the common real-world failure and is kept distinct from
    /// [`ValidationError::MalformedContainer`].
    #[error("Invalid password for PKCS#12")]
    InvalidPassphrase(#[source] openssl::error::ErrorStack),

    /// The container decrypted but lacks a private key or a certificate.
    #[error("Incomplete PKCS#12: no {0} in container")]
    IncompleteCredential(&'static str),

    /// The certificate subject carries no usable Common Name.
    #[error("Certificate subject has no Common Name")]
    MissingIdentity,
}

/// Error returned by [`crate::bundle::reconcile`].
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The identity request has an empty required value.
    #[error("Identity request is missing {0}")]
    InvalidRequest(&'static str),

    /// No `.app` or `.appex` folder was found under the given path.
    #[error("Cannot find app folder in: {}", .0.display())]
    BundleNotFound(PathBuf),

    /// `Info.plist` is missing or cannot be read.
    #[error("Cannot read {}: {source}", path.display())]
    DescriptorUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `Info.plist` is not a property list dictionary.
    #[error("Cannot parse {} as plist: {reason}", path.display())]
    DescriptorMalformed { path: PathBuf, reason: String },

    /// A required key is absent or empty. The file is left untouched.
    #[error("Info.plist missing required key {0}")]
    DescriptorIncomplete(&'static str),

    /// Writing the updated descriptor failed. The previous content is intact.
    #[error("Failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReconcileError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DescriptorMalformed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Error returned by [`crate::Signer::sign`].
#[derive(Debug, Error)]
pub enum SignError {
    /// A required input was empty or not configured.
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// Bundle location or `Info.plist` reconciliation failed.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Removing stale signature artifacts from the bundle failed.
    #[error("Failed to prepare bundle: {0}")]
    Prepare(#[source] std::io::Error),

    /// The signing engine could not load the certificate, key or profile.
    #[error("Failed to initialize signing asset: {0}")]
    CredentialInitFailed(String),

    /// The signing engine reported failure.
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}
