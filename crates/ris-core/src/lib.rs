//! Reconfigurable intelligent surface (RIS) beam-steering engine.
//!
//! Enumerates per-element phase-state combinations into a codebook of
//! usable array-factor phases, then resolves a desired phase at each
//! spatial position to the closest codebook entry and its hardware bits.
//!
//! Zero I/O: pure math engine with no opinions about transport or persistence.

pub mod codebook;
pub mod constants;
pub mod driver;
pub mod error;
pub mod frame;
pub mod mapper;
pub mod phase;
pub mod serde_compat;
pub mod steering;

pub use codebook::{
    Codebook, CodebookEntry, CodebookKey, CodebookSource, CodebookStats, PhaseStateSet,
    SincWeighting, array_factor, build_codebook, build_codebook_with, duplicate_phases,
};
pub use constants::{
    DITHER_CORRECTION, ELEMENT_COUNT, ELEMENT_SPACING, EPSILON, HEX_FRAME_BYTES, PHASE_STATES,
    POSITION_COUNT, QPSK_PHASES, STEERING_ANGLE, THRESHOLD,
};
pub use driver::{Cycle, CycleDriver, DriverConfig, Schedule};
pub use error::{CoreError, Result};
pub use frame::{BitPattern, FrameEncoder, FrameFormat, OutputFrame};
pub use mapper::{BitPolicy, BitRule, Mapper, match_phase, pack_bits, to_bits};
pub use phase::{circular_distance, wrap_degrees};
pub use serde_compat::{CURRENT_VERSION, export_table, import_table};
pub use steering::{DitherTable, Steering, phase_gradient, target_phases};
