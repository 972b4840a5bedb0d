//! PKCS#12 credential validation.
//!
//! - [`credential`] - opening a container and extracting the signer identity
//! - [`providers`] - reference-counted OpenSSL provider registration

pub mod credential;
pub mod providers;

pub use credential::{validate, Credential, Identity};
pub use providers::ProviderGuard;
