//! Process-wide OpenSSL provider registration.
//!
//! Legacy PKCS#12 files (RC2/3DES bag encryption, as exported by older
//! Keychain Access versions) only decrypt with the OpenSSL 3 `legacy`
//! provider loaded. Both `legacy` and `default` are loaded with fallbacks
//! retained, so the implicit `default` activation of the global library
//! context keeps working after the last guard unloads them.
//!
//! Provider state is global to the process. [`ProviderGuard`] reference-counts
//! it: the first guard loads, the last guard dropped unloads. The registry lock
//! is held only for those transitions, never across parse/decrypt work.

use log::{debug, warn};
use once_cell::sync::Lazy;
use openssl::provider::Provider;
use std::sync::{Mutex, MutexGuard};

const PROVIDER_NAMES: [&str; 2] = ["legacy", "default"];

struct Registry {
    users: usize,
    loaded: Vec<Provider>,
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| {
    Mutex::new(Registry {
        users: 0,
        loaded: Vec::new(),
    })
});

#[cfg(test)]
thread_local! {
    static ACQUIRED_ON_THREAD: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

fn registry() -> MutexGuard<'static, Registry> {
    // A panic while holding the lock cannot leave the count half-updated.
    REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scoped registration of the OpenSSL `legacy` and `default` providers.
///
/// Hold the guard for as long as PKCS#12 parsing runs. Dropping it releases
/// this caller's reference on every exit path, including unwinding.
pub struct ProviderGuard {
    _private: (),
}

impl ProviderGuard {
    /// Take a reference on the providers, loading them if this is the first.
    pub fn acquire() -> Self {
        let mut registry = registry();
        if registry.users == 0 {
            for name in PROVIDER_NAMES {
                match Provider::try_load(None, name, true) {
                    Ok(provider) => {
                        debug!("Loaded OpenSSL provider {}", name);
                        registry.loaded.push(provider);
                    }
                    Err(e) => warn!("Failed to load OpenSSL provider {}: {}", name, e),
                }
            }
        }
        registry.users += 1;

        #[cfg(test)]
        ACQUIRED_ON_THREAD.with(|count| count.set(count.get() + 1));

        Self { _private: () }
    }
}

impl Drop for ProviderGuard {
    fn drop(&mut self) {
        let mut registry = registry();
        registry.users = registry.users.saturating_sub(1);
        if registry.users == 0 && !registry.loaded.is_empty() {
            // Dropping a Provider calls OSSL_PROVIDER_unload.
            registry.loaded.clear();
            debug!("Unloaded OpenSSL providers");
        }
    }
}

/// Number of live guards across the process.
pub fn active_users() -> usize {
    registry().users
}

/// Number of guards ever acquired on the current thread.
#[cfg(test)]
pub(crate) fn acquired_on_this_thread() -> usize {
    ACQUIRED_ON_THREAD.with(|count| count.get())
}
