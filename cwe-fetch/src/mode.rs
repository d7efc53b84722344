//! Data source latch
//!
//! `Unprobed → Primary | Fallback`, `Primary → Fallback`. Fallback is
//! terminal: once the bulk snapshot has been used, every later collection
//! in the run reads from it.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SourceMode {
    Unprobed = 0,
    Primary = 1,
    Fallback = 2,
}

impl SourceMode {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SourceMode::Primary,
            2 => SourceMode::Fallback,
            _ => SourceMode::Unprobed,
        }
    }
}

#[derive(Debug)]
pub struct SourceModeLatch(AtomicU8);

impl SourceModeLatch {
    pub fn new() -> Self {
        Self(AtomicU8::new(SourceMode::Unprobed as u8))
    }

    pub fn get(&self) -> SourceMode {
        SourceMode::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn is_fallback(&self) -> bool {
        self.get() == SourceMode::Fallback
    }

    /// Unprobed → Primary; returns false if the mode had already moved on
    pub fn mark_primary(&self) -> bool {
        self.0
            .compare_exchange(
                SourceMode::Unprobed as u8,
                SourceMode::Primary as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Any → Fallback; returns the previous mode
    pub fn mark_fallback(&self) -> SourceMode {
        SourceMode::from_u8(self.0.swap(SourceMode::Fallback as u8, Ordering::AcqRel))
    }
}

impl Default for SourceModeLatch {
    fn default() -> Self {
        Self::new()
    }
}
