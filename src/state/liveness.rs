//! Liveness guards for results that arrive after an await.
//!
//! A component hands a [`LiveToken`] to each async operation it starts and
//! calls [`Liveness::invalidate`] when it is closed or torn down. Code that
//! resumes after an await checks the token before writing any state, so a
//! late result is dropped instead of mutating a component that is gone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Liveness {
    generation: Arc<AtomicU64>,
}

/// Snapshot of a [`Liveness`] generation
#[derive(Debug, Clone)]
pub struct LiveToken {
    generation: Arc<AtomicU64>,
    issued: u64,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token valid until the next `invalidate`
    pub fn token(&self) -> LiveToken {
        LiveToken {
            generation: Arc::clone(&self.generation),
            issued: self.generation.load(Ordering::Acquire),
        }
    }

    /// Mark every outstanding token stale
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl LiveToken {
    /// Token that never goes stale, for callers without a lifecycle
    pub fn detached() -> Self {
        Liveness::new().token()
    }

    pub fn is_live(&self) -> bool {
        self.generation.load(Ordering::Acquire) == self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_goes_stale_on_invalidate() {
        let liveness = Liveness::new();
        let old = liveness.token();
        assert!(old.is_live());

        liveness.invalidate();
        assert!(!old.is_live());
        assert!(liveness.token().is_live());
    }

    #[test]
    fn test_detached_token_stays_live() {
        assert!(LiveToken::detached().is_live());
    }
}
