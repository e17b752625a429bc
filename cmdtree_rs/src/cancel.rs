//! Cooperative cancellation.
//!
//! The parser checks the token between argument tokens, completers between
//! row batches and the service wrapper before each remote call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, RuntimeError};

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fails with [`RuntimeError::Cancelled`] once [`cancel`](Self::cancel)
    /// has been called on any clone.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(RuntimeError::Cancelled.into());
        }
        Ok(())
    }
}
