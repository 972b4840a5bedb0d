//! Interface to the external code-signing engine.
//!
//! arksign does not rewrite Mach-O signatures itself. It prepares the bundle
//! and hands it to an implementation of [`SigningEngine`], which owns
//! certificate loading, provisioning, dylib injection and signature
//! generation.

use secrecy::SecretString;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure reported by a signing engine.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Credential material handed to [`SigningEngine::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPaths {
    /// PKCS#12 file with certificate and private key.
    pub pkcs12: PathBuf,
    /// Provisioning profile, if the engine should use one.
    pub provisioning_profile: Option<PathBuf>,
}

/// Behaviour switches for a folder signing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningPolicy {
    /// Overwrite existing signatures.
    pub force: bool,
    /// Inject dylibs as `LC_LOAD_WEAK_DYLIB` instead of `LC_LOAD_DYLIB`.
    pub weak_injection: bool,
    /// Reuse cached signing results between runs.
    pub enable_cache: bool,
    /// Do not write `embedded.mobileprovision` into the bundle.
    pub suppress_embedded_provisioning: bool,
}

impl SigningPolicy {
    /// The only policy the orchestrator uses.
    pub const FIXED: SigningPolicy = SigningPolicy {
        force: true,
        weak_injection: false,
        enable_cache: false,
        suppress_embedded_provisioning: true,
    };
}

/// Everything the engine needs to sign one app folder.
#[derive(Debug, Clone)]
pub struct FolderSigningJob<'a> {
    /// Path the caller asked to sign (may contain the app folder).
    pub input_path: &'a Path,
    /// Located `.app` folder whose `Info.plist` was reconciled.
    pub app_folder: &'a Path,
    pub bundle_id: &'a str,
    pub version: &'a str,
    pub display_name: &'a str,
    /// Dylibs to inject; the orchestrator passes zero or one.
    pub dylibs: &'a [PathBuf],
    pub policy: SigningPolicy,
}

/// A code-signing engine.
///
/// # Examples
///
/// ```
/// use arksign::engine::{CredentialPaths, EngineError, FolderSigningJob, SigningEngine};
/// use secrecy::SecretString;
///
/// struct DryRun;
///
/// impl SigningEngine for DryRun {
///     type Credential = ();
///
///     fn initialize(&mut self, _: &CredentialPaths, _: &SecretString) -> Result<(), EngineError> {
///         Ok(())
///     }
///
///     fn sign_folder(&mut self, _: &(), job: &FolderSigningJob<'_>) -> Result<(), EngineError> {
///         println!("would sign {}", job.app_folder.display());
///         Ok(())
///     }
/// }
/// ```
pub trait SigningEngine {
    /// Loaded signing asset (certificate, key, profile) owned by the engine.
    type Credential;

    /// Load the certificate, key and optional provisioning profile.
    fn initialize(
        &mut self,
        paths: &CredentialPaths,
        password: &SecretString,
    ) -> Result<Self::Credential, EngineError>;

    /// Sign an app folder with a previously initialized credential.
    fn sign_folder(
        &mut self,
        credential: &Self::Credential,
        job: &FolderSigningJob<'_>,
    ) -> Result<(), EngineError>;
}
