//! Reentrancy guard for state-mutating entry points.

use std::cell::Cell;

use poolbook_types::{PoolbookError, Result};

/// Single-flight latch. Held for the lifetime of an [`Entered`] token.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    locked: Cell<bool>,
}

impl ReentrancyGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the guarded section.
    ///
    /// # Errors
    /// `Reentrancy` while another token is alive.
    pub fn enter(&self) -> Result<Entered<'_>> {
        if self.locked.replace(true) {
            tracing::warn!("Reentrant call rejected");
            return Err(PoolbookError::Reentrancy);
        }
        Ok(Entered { guard: self })
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }
}

/// Releases the guard on drop, including on early `?` returns.
#[derive(Debug)]
#[must_use = "the guard is released as soon as this is dropped"]
pub struct Entered<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.guard.locked.set(false);
    }
}
