/// Interrupt request line shared with the host dispatcher

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A level-style interrupt request flag
///
/// The controller raises it; the host dispatcher polls and clears it. Clones
/// share the same flag. Raising an already raised line has no further effect.
#[derive(Debug, Clone, Default)]
pub struct IrqLine(Arc<AtomicBool>);

impl IrqLine {
    /// Create a line in the cleared state
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert the line
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Check if the line is asserted
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear the line, returning whether it was asserted
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}
