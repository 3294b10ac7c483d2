//! Re-entrancy protection for vault operations.
//!
//! Every state-mutating operation acquires the per-vault lock before touching
//! any external collaborator (a venue connector or the relay may try to call
//! back into the vault) and releases it on every exit path. Read-only views
//! never take the lock.

use crate::errors::{VaultError, VaultResult};

/// Lock status flags
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GuardState {
    /// Vault is ready for the next operation
    #[default]
    Unlocked,
    /// An operation is in flight
    Locked,
}

/// Per-vault operation lock
#[derive(Debug, Default)]
pub struct OperationGuard {
    state: GuardState,
}

impl OperationGuard {
    pub fn new() -> Self {
        OperationGuard {
            state: GuardState::Unlocked,
        }
    }

    /// Acquire the lock for a state-mutating operation
    pub fn acquire(&mut self) -> VaultResult<()> {
        match self.state {
            GuardState::Unlocked => {
                self.state = GuardState::Locked;
                Ok(())
            }
            GuardState::Locked => Err(VaultError::ReentrantCall),
        }
    }

    /// Release the lock after the operation completes, on success or failure
    pub fn release(&mut self) {
        if self.state == GuardState::Unlocked {
            // Release without a matching acquire indicates a bug upstream
            log::warn!("operation guard released while already unlocked");
        }
        self.state = GuardState::Unlocked;
    }

    pub fn is_locked(&self) -> bool {
        self.state == GuardState::Locked
    }

    /// Reject if an operation is currently in flight
    pub fn ensure_unlocked(&self) -> VaultResult<()> {
        if self.is_locked() {
            return Err(VaultError::ReentrantCall);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_lifecycle() {
        let mut guard = OperationGuard::new();

        assert!(guard.acquire().is_ok());
        assert!(guard.is_locked());

        // Second acquire while held is the re-entrancy case
        assert_eq!(guard.acquire(), Err(VaultError::ReentrantCall));
        assert_eq!(guard.ensure_unlocked(), Err(VaultError::ReentrantCall));

        guard.release();
        assert!(!guard.is_locked());
        assert!(guard.acquire().is_ok());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut guard = OperationGuard::new();
        guard.release();
        assert!(!guard.is_locked());
        assert!(guard.acquire().is_ok());
    }
}
