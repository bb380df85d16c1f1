//! Serialise environment mutations across tests.
//!
//! `std::env::set_var` is `unsafe` in Rust 2024. Hold an [`EnvLock`] while
//! any [`EnvVarGuard`] is alive.

use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard, PoisonError};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// RAII guard that holds the global environment lock.
#[derive(Debug)]
pub struct EnvLock {
    _guard: MutexGuard<'static, ()>,
}

impl EnvLock {
    /// Acquire the lock, recovering it if a previous holder panicked.
    pub fn acquire() -> Self {
        let guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        Self { _guard: guard }
    }
}

/// Restores an environment variable to its previous value on drop.
#[derive(Debug)]
pub struct EnvVarGuard {
    name: String,
    prev: Option<OsString>,
}

impl EnvVarGuard {
    /// Set `name` to `value` until the guard drops.
    #[must_use]
    pub fn set(_lock: &EnvLock, name: &str, value: &str) -> Self {
        let prev = std::env::var_os(name);
        // SAFETY: the caller holds `EnvLock`.
        unsafe { std::env::set_var(name, value) };
        Self {
            name: name.to_owned(),
            prev,
        }
    }

    /// Unset `name` until the guard drops.
    #[must_use]
    pub fn remove(_lock: &EnvLock, name: &str) -> Self {
        let prev = std::env::var_os(name);
        // SAFETY: the caller holds `EnvLock`.
        unsafe { std::env::remove_var(name) };
        Self {
            name: name.to_owned(),
            prev,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        // SAFETY: tests drop guards while still holding `EnvLock`.
        unsafe {
            match &self.prev {
                Some(value) => std::env::set_var(&self.name, value),
                None => std::env::remove_var(&self.name),
            }
        }
    }
}
