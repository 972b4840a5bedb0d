//! Signer builder API
//!
//! Prepares an unpacked app for re-signing: reconciles its `Info.plist`
//! with the requested identity, then hands the folder to a
//! [`SigningEngine`] under [`SigningPolicy::FIXED`].

use crate::bundle::{find_app_folder, reconcile_app_folder, strip_signatures, IdentityRequest};
use crate::engine::{CredentialPaths, FolderSigningJob, SigningEngine, SigningPolicy};
use crate::SignError;
use log::{error, info};
use secrecy::SecretString;
use std::path::{Path, PathBuf};

/// App re-signing with builder pattern API.
///
/// # Example
///
/// ```no_run
/// use arksign::{IdentityRequest, Signer};
/// # use arksign::engine::{CredentialPaths, EngineError, FolderSigningJob, SigningEngine};
/// # use secrecy::SecretString;
/// # struct Engine;
/// # impl SigningEngine for Engine {
/// #     type Credential = ();
/// #     fn initialize(&mut self, _: &CredentialPaths, _: &SecretString) -> Result<(), EngineError> { Ok(()) }
/// #     fn sign_folder(&mut self, _: &(), _: &FolderSigningJob<'_>) -> Result<(), EngineError> { Ok(()) }
/// # }
/// # let mut engine = Engine;
///
/// let request = IdentityRequest::new("com.example.app", "Example").version("2.0");
/// Signer::new()
///     .pkcs12("certificate.p12")
///     .password("secret")
///     .provisioning_profile("profile.mobileprovision")
///     .sign(&mut engine, "Payload", &request)?;
/// # Ok::<(), arksign::SignError>(())
/// ```
#[derive(Clone)]
pub struct Signer {
    pkcs12: Option<PathBuf>,
    provisioning_profile: Option<PathBuf>,
    password: Option<SecretString>,
    dylib: Option<PathBuf>,
    strip_existing_signatures: bool,
}

impl Signer {
    /// Create a new Signer builder.
    pub fn new() -> Self {
        Self {
            pkcs12: None,
            provisioning_profile: None,
            password: None,
            dylib: None,
            strip_existing_signatures: false,
        }
    }

    /// Set PKCS#12 file path (.p12 format).
    pub fn pkcs12(mut self, path: impl AsRef<Path>) -> Self {
        self.pkcs12 = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set provisioning profile path (.mobileprovision format).
    pub fn provisioning_profile(mut self, path: impl AsRef<Path>) -> Self {
        self.provisioning_profile = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set password for the PKCS#12 file.
    ///
    /// The password is stored securely and will be zeroized when dropped.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::new(password.into()));
        self
    }

    /// Inject a dylib into the main executable while signing.
    pub fn dylib(mut self, path: impl AsRef<Path>) -> Self {
        self.dylib = Some(path.as_ref().to_path_buf());
        self
    }

    /// Remove `_CodeSignature` folders and `embedded.mobileprovision` before
    /// handing the bundle to the engine. Off by default.
    pub fn strip_existing_signatures(mut self, strip: bool) -> Self {
        self.strip_existing_signatures = strip;
        self
    }

    /// Check that every required input is present.
    ///
    /// Touches no files.
    pub fn validate(&self, app_path: &Path, request: &IdentityRequest) -> Result<(), SignError> {
        if app_path.as_os_str().is_empty() {
            return Err(SignError::MissingRequiredField("app path"));
        }
        request.validate().map_err(SignError::MissingRequiredField)?;
        if self.pkcs12.as_ref().map_or(true, |p| p.as_os_str().is_empty()) {
            return Err(SignError::MissingRequiredField("PKCS#12 path"));
        }
        Ok(())
    }

    /// Credential paths for the engine, checked for existence.
    fn credential_paths(&self) -> Result<CredentialPaths, SignError> {
        let pkcs12 = self
            .pkcs12
            .clone()
            .ok_or(SignError::MissingRequiredField("PKCS#12 path"))?;
        if !pkcs12.is_file() {
            return Err(SignError::CredentialInitFailed(format!(
                "PKCS#12 file not found: {}",
                pkcs12.display()
            )));
        }

        if let Some(ref profile) = self.provisioning_profile {
            if !profile.is_file() {
                return Err(SignError::CredentialInitFailed(format!(
                    "Provisioning profile not found: {}",
                    profile.display()
                )));
            }
        }

        Ok(CredentialPaths {
            pkcs12,
            provisioning_profile: self.provisioning_profile.clone(),
        })
    }

    /// Reconcile the app's identity and sign it with `engine`.
    ///
    /// # Arguments
    ///
    /// * `engine` - Signing engine that performs the actual signature work
    /// * `app_path` - Unpacked IPA folder or the `.app` folder itself
    /// * `request` - Bundle identifier, display name and optional version
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A required field is missing (checked before any filesystem access)
    /// - The app folder cannot be found or its `Info.plist` reconciled
    /// - Stale signatures cannot be removed (only when enabled)
    /// - The engine cannot load the credential
    /// - The engine fails to sign
    pub fn sign<E: SigningEngine>(
        &self,
        engine: &mut E,
        app_path: impl AsRef<Path>,
        request: &IdentityRequest,
    ) -> Result<(), SignError> {
        let app_path = app_path.as_ref();
        self.validate(app_path, request)?;

        let app_folder = find_app_folder(app_path)?;
        info!("Found app folder: {}", app_folder.display());
        let outcome = reconcile_app_folder(&app_folder, request)?;

        if self.strip_existing_signatures {
            strip_signatures(&app_folder).map_err(SignError::Prepare)?;
        }

        let paths = self.credential_paths()?;
        let empty = SecretString::new(String::new());
        let password = self.password.as_ref().unwrap_or(&empty);

        let credential = engine.initialize(&paths, password).map_err(|e| {
            error!("Failed to initialize signing asset: {}", e);
            SignError::CredentialInitFailed(e.to_string())
        })?;
        info!("Signing asset initialized");

        let dylibs: Vec<PathBuf> = self.dylib.iter().cloned().collect();
        if let Some(dylib) = dylibs.first() {
            info!("Injecting dylib: {}", dylib.display());
        }

        let job = FolderSigningJob {
            input_path: app_path,
            app_folder: &outcome.app_folder,
            bundle_id: &outcome.bundle_id,
            version: &outcome.version,
            display_name: &outcome.display_name,
            dylibs: &dylibs,
            policy: SigningPolicy::FIXED,
        };

        info!("Signing folder: {}", app_folder.display());
        engine.sign_folder(&credential, &job).map_err(|e| {
            error!("Signing failed: {}", e);
            SignError::SigningFailed(e.to_string())
        })?;

        info!("Signing completed successfully");
        Ok(())
    }
}

impl Default for Signer {
    fn default() -> Self {
        Self::new()
    }
}
