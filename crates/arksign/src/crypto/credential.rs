//! PKCS#12 credential loading and identity extraction.
//!
//! A [`Credential`] is either complete (private key, certificate and a
//! non-empty subject Common Name) or not constructed at all. [`validate`]
//! opens one, keeps only its [`Identity`], and releases everything else
//! before returning.
//!
//! # Examples
//!
//! ```no_run
//! use arksign::crypto;
//!
//! let identity = crypto::validate("signing.p12", "password")?;
//! println!("Signing as {}", identity.team_name());
//! # Ok::<(), arksign::ValidationError>(())
//! ```

use super::providers::ProviderGuard;
use crate::ValidationError;
use log::{debug, error, info};
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509, X509Ref};
use std::fmt;
use std::fs;
use std::path::Path;

/// Certificate-type prefixes Apple puts in front of the developer name.
const TEAM_NAME_PREFIXES: [&str; 12] = [
    "iPhone Distribution: ",
    "iPhone Developer: ",
    "Apple Development: ",
    "Apple Distribution: ",
    "iOS Developer: ",
    "iOS Distribution: ",
    "Mac Developer: ",
    "Mac Distribution: ",
    "Developer ID Application: ",
    "Developer ID Installer: ",
    "3rd Party Mac Developer Application: ",
    "3rd Party Mac Developer Installer: ",
];

/// Human-readable signer identity: the certificate subject Common Name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    common_name: String,
}

impl Identity {
    fn new(common_name: String) -> Self {
        Self { common_name }
    }

    /// The Common Name exactly as stored in the certificate.
    pub fn as_str(&self) -> &str {
        &self.common_name
    }

    /// The Common Name without its certificate-type prefix.
    ///
    /// `"Apple Development: Jane Doe (AB12CD34EF)"` becomes
    /// `"Jane Doe (AB12CD34EF)"`. Falls back to the raw name if nothing
    /// would remain.
    pub fn team_name(&self) -> &str {
        let stripped = TEAM_NAME_PREFIXES
            .iter()
            .find_map(|prefix| self.common_name.strip_prefix(prefix))
            .unwrap_or(&self.common_name)
            .trim();

        if stripped.is_empty() {
            &self.common_name
        } else {
            stripped
        }
    }

    /// The longest prefix that fits a NUL-terminated sink of `capacity` bytes.
    ///
    /// Never splits a UTF-8 code point. A capacity of 0 or 1 yields `""`.
    pub fn truncated(&self, capacity: usize) -> &str {
        let mut end = capacity.saturating_sub(1).min(self.common_name.len());
        while !self.common_name.is_char_boundary(end) {
            end -= 1;
        }
        &self.common_name[..end]
    }

    /// Copy the identity into `sink` as a NUL-terminated byte string.
    ///
    /// Returns the number of name bytes written, excluding the terminator.
    /// An empty sink is left untouched.
    pub fn copy_to(&self, sink: &mut [u8]) -> usize {
        if sink.is_empty() {
            return 0;
        }
        sink.fill(0);
        let name = self.truncated(sink.len()).as_bytes();
        sink[..name.len()].copy_from_slice(name);
        name.len()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.common_name)
    }
}

/// A fully validated PKCS#12 signing credential.
pub struct Credential {
    certificate: X509,
    private_key: PKey<Private>,
    chain: Vec<X509>,
    identity: Identity,
}

impl Credential {
    /// Open and decrypt a PKCS#12 (.p12) file.
    ///
    /// The file is read before any OpenSSL provider is registered, so a
    /// missing file never touches global crypto state.
    ///
    /// # Errors
    ///
    /// Returns, in order of the step that fails:
    /// - [`ValidationError::InvalidParameters`] if `path` is empty
    /// - [`ValidationError::NotFound`] if the file cannot be read
    /// - [`ValidationError::MalformedContainer`] if it is not PKCS#12
    /// - [`ValidationError::InvalidPassphrase`] if decryption fails
    /// - [`ValidationError::IncompleteCredential`] if the key or certificate is absent
    /// - [`ValidationError::MissingIdentity`] if the subject has no Common Name
    pub fn open(path: impl AsRef<Path>, passphrase: &str) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ValidationError::InvalidParameters("PKCS#12 path is empty"));
        }

        debug!("Opening PKCS#12 {} (password length {})", path.display(), passphrase.len());
        let p12_data = fs::read(path).map_err(|source| ValidationError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;

        let _providers = ProviderGuard::acquire();

        let pkcs12 = Pkcs12::from_der(&p12_data).map_err(ValidationError::MalformedContainer)?;
        let parsed = pkcs12
            .parse2(passphrase)
            .map_err(ValidationError::InvalidPassphrase)?;

        let private_key = parsed
            .pkey
            .ok_or(ValidationError::IncompleteCredential("private key"))?;
        let certificate = parsed
            .cert
            .ok_or(ValidationError::IncompleteCredential("certificate"))?;
        let chain: Vec<X509> = parsed
            .ca
            .map(|stack| stack.into_iter().collect())
            .unwrap_or_default();

        let identity = common_name(&certificate)
            .map(Identity::new)
            .ok_or(ValidationError::MissingIdentity)?;

        Ok(Self {
            certificate,
            private_key,
            chain,
            identity,
        })
    }

    /// Signing certificate.
    pub fn certificate(&self) -> &X509Ref {
        &self.certificate
    }

    /// Private key matching the certificate.
    pub fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    /// Intermediate CA certificates bundled in the container.
    pub fn chain(&self) -> &[X509] {
        &self.chain
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Consume the credential, keeping only its identity.
    pub fn into_identity(self) -> Identity {
        self.identity
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Validate a PKCS#12 file and return the signer identity.
///
/// Key and certificate are dropped before this returns, on success and on
/// every error path.
pub fn validate(path: impl AsRef<Path>, passphrase: &str) -> Result<Identity, ValidationError> {
    let path = path.as_ref();
    info!("Validating PKCS#12: {}", path.display());

    match Credential::open(path, passphrase) {
        Ok(credential) => {
            let identity = credential.into_identity();
            info!("Extracted team name: {}", identity);
            Ok(identity)
        }
        Err(e) => {
            error!("PKCS#12 validation failed: {}", e);
            Err(e)
        }
    }
}

/// First Common Name of the certificate subject, if non-empty.
fn common_name(cert: &X509Ref) -> Option<String> {
    let entry = cert.subject_name().entries_by_nid(Nid::COMMONNAME).next()?;
    let data = entry.data();
    let name = match data.as_utf8() {
        Ok(utf8) => utf8.to_string(),
        Err(_) => String::from_utf8_lossy(data.as_slice()).into_owned(),
    };

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
