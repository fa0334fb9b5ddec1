//! Shared test utilities for serialising environment mutation.

use std::env;

use tokio::sync::{Mutex, MutexGuard};

pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets an environment variable while holding a global mutex.
    pub async fn set_var(key: &str, value: &str) -> Self {
        let guard = ENV_LOCK.lock().await;
        let saved = vec![(key.to_owned(), env::var(key).ok())];
        unsafe { env::set_var(key, value) };
        Self {
            saved,
            _guard: guard,
        }
    }

    /// Removes an environment variable while holding a global mutex.
    pub async fn remove_var(key: &str) -> Self {
        let guard = ENV_LOCK.lock().await;
        let saved = vec![(key.to_owned(), env::var(key).ok())];
        unsafe { env::remove_var(key) };
        Self {
            saved,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, previous) in &self.saved {
            match previous {
                Some(value) => unsafe { env::set_var(key, value) },
                None => unsafe { env::remove_var(key) },
            }
        }
    }
}
