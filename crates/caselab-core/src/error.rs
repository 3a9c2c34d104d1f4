//! ============================================================================
//! Engine Errors
//! ============================================================================
//! A failed engine operation leaves the design untouched.
//! ============================================================================

use serde::{Deserialize, Serialize};

use crate::types::SlotIndex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum EngineError {
    #[error("Slot {index} is outside the grid (0..{slot_count})")]
    SlotOutOfRange { index: SlotIndex, slot_count: usize },

    #[error("No empty slots available")]
    NoEmptySlots,

    #[error("Slot {0} is empty")]
    EmptySlot(SlotIndex),

    #[error("Unknown pack: {0}")]
    UnknownPack(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
