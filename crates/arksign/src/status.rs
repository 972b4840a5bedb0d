//! Integer status codes for host applications.
//!
//! These functions never panic and never return an error type: every failure
//! is reduced to a [`ValidateStatus`] or [`SignStatus`] whose numeric values
//! are stable. Details go to the log.

use crate::bundle::IdentityRequest;
use crate::engine::SigningEngine;
use crate::{crypto, ReconcileError, SignError, Signer, ValidationError};
use log::error;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// Result of [`validate_credential`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ValidateStatus {
    Success = 0,
    /// Missing path, passphrase or output buffer.
    InvalidParameters = -1,
    /// The container file does not exist or cannot be read.
    NotFound = -2,
    /// Not a PKCS#12 file, wrong password, or no key/certificate inside.
    InvalidFormatOrPassword = -3,
    /// The certificate has no subject Common Name.
    NoIdentityFound = -4,
}

impl ValidateStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<&ValidationError> for ValidateStatus {
    fn from(err: &ValidationError) -> Self {
        match err {
            ValidationError::InvalidParameters(_) => ValidateStatus::InvalidParameters,
            ValidationError::NotFound { .. } => ValidateStatus::NotFound,
            ValidationError::MalformedContainer(_)
            | ValidationError::InvalidPassphrase(_)
            | ValidationError::IncompleteCredential(_) => ValidateStatus::InvalidFormatOrPassword,
            ValidationError::MissingIdentity => ValidateStatus::NoIdentityFound,
        }
    }
}

/// Result of [`sign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SignStatus {
    Success = 0,
    /// Missing field, bundle not found, or unusable `Info.plist`.
    InvalidInput = -1,
    /// The engine could not load the signing credential.
    CredentialInitFailed = -2,
    /// Bundle preparation or the engine's signing step failed.
    SigningFailed = -3,
}

impl SignStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<&SignError> for SignStatus {
    fn from(err: &SignError) -> Self {
        match err {
            SignError::MissingRequiredField(_) => SignStatus::InvalidInput,
            SignError::Reconcile(ReconcileError::WriteFailed { .. }) => SignStatus::SigningFailed,
            SignError::Reconcile(_) => SignStatus::InvalidInput,
            SignError::Prepare(_) => SignStatus::SigningFailed,
            SignError::CredentialInitFailed(_) => SignStatus::CredentialInitFailed,
            SignError::SigningFailed(_) => SignStatus::SigningFailed,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Validate a PKCS#12 file and return its signer identity.
///
/// The identity is `Some` only on [`ValidateStatus::Success`].
pub fn validate_credential(
    path: Option<&Path>,
    password: Option<&str>,
) -> (ValidateStatus, Option<String>) {
    let (Some(path), Some(password)) = (path, password) else {
        error!("validate_credential: path and password are required");
        return (ValidateStatus::InvalidParameters, None);
    };

    match catch_unwind(AssertUnwindSafe(|| crypto::validate(path, password))) {
        Ok(Ok(identity)) => (ValidateStatus::Success, Some(identity.as_str().to_string())),
        Ok(Err(e)) => (ValidateStatus::from(&e), None),
        Err(payload) => {
            error!("validate_credential panicked: {}", panic_message(payload.as_ref()));
            (ValidateStatus::InvalidParameters, None)
        }
    }
}

/// Like [`validate_credential`], but writes the identity into a
/// caller-provided buffer.
///
/// At most `sink.len() - 1` bytes are written, cut at a UTF-8 character
/// boundary, followed by a NUL. On failure the sink holds an empty string.
/// An empty sink is rejected.
pub fn validate_credential_into(
    path: Option<&Path>,
    password: Option<&str>,
    sink: &mut [u8],
) -> ValidateStatus {
    if sink.is_empty() {
        error!("validate_credential_into: output buffer is empty");
        return ValidateStatus::InvalidParameters;
    }
    sink[0] = 0;

    let (Some(path), Some(password)) = (path, password) else {
        error!("validate_credential_into: path and password are required");
        return ValidateStatus::InvalidParameters;
    };

    match catch_unwind(AssertUnwindSafe(|| crypto::validate(path, password))) {
        Ok(Ok(identity)) => {
            identity.copy_to(sink);
            ValidateStatus::Success
        }
        Ok(Err(e)) => ValidateStatus::from(&e),
        Err(payload) => {
            error!(
                "validate_credential_into panicked: {}",
                panic_message(payload.as_ref())
            );
            ValidateStatus::InvalidParameters
        }
    }
}

/// Reconcile an app's `Info.plist` and sign it with `engine`.
///
/// Empty strings are treated like absent values. `version` defaults to `"1"`,
/// and so does `Some("")`: an empty version is never written to
/// `Info.plist`.
#[allow(clippy::too_many_arguments)]
pub fn sign<E: SigningEngine>(
    engine: &mut E,
    app_path: Option<&Path>,
    pkcs12: Option<&Path>,
    provisioning_profile: Option<&Path>,
    password: Option<&str>,
    bundle_id: Option<&str>,
    version: Option<&str>,
    display_name: Option<&str>,
    dylib: Option<&Path>,
) -> SignStatus {
    fn present(path: Option<&Path>) -> Option<&Path> {
        path.filter(|p| !p.as_os_str().is_empty())
    }

    let mut signer = Signer::new().password(password.unwrap_or_default());
    if let Some(p12) = present(pkcs12) {
        signer = signer.pkcs12(p12);
    }
    if let Some(profile) = present(provisioning_profile) {
        signer = signer.provisioning_profile(profile);
    }
    if let Some(dylib) = present(dylib) {
        signer = signer.dylib(dylib);
    }

    let mut request = IdentityRequest::new(
        bundle_id.unwrap_or_default(),
        display_name.unwrap_or_default(),
    );
    if let Some(version) = version {
        request = request.version(version);
    }

    let app_path = app_path.unwrap_or_else(|| Path::new(""));
    let result = catch_unwind(AssertUnwindSafe(|| signer.sign(engine, app_path, &request)));

    match result {
        Ok(Ok(())) => SignStatus::Success,
        Ok(Err(e)) => {
            error!("Signing {} failed: {}", app_path.display(), e);
            SignStatus::from(&e)
        }
        Err(payload) => {
            error!("sign panicked: {}", panic_message(payload.as_ref()));
            SignStatus::SigningFailed
        }
    }
}
