/// Default number of phase-shifting elements per array-factor computation (L).
pub const ELEMENT_COUNT: usize = 4;

/// Default number of spatial positions (columns) resolved per cycle (M).
pub const POSITION_COUNT: usize = 16;

/// Default two-level phase state set, in degrees.
pub const PHASE_STATES: [f64; 2] = [0.0, 180.0];

/// Minimum array-factor magnitude for a combination to enter the codebook.
pub const THRESHOLD: f64 = 0.6;

/// Default beam steering angle in degrees.
pub const STEERING_ANGLE: f64 = 30.0;

/// Element spacing in wavelengths (d/λ).
pub const ELEMENT_SPACING: f64 = 0.5;

/// QPSK modulation phases in degrees, one per symbol index.
pub const QPSK_PHASES: [f64; 4] = [0.0, 90.0, 180.0, 270.0];

/// Per-position pre-phasing correction measured on the reference board.
pub const DITHER_CORRECTION: [f64; 13] = [
    90.0, 0.0, 90.0, 0.0, 90.0, 90.0, 0.0, 90.0, 0.0, 90.0, 0.0, 90.0, 0.0,
];

/// Fixed byte length of a hex-packed output frame.
pub const HEX_FRAME_BYTES: usize = 20;

/// Bit patterns are packed into a `u32`.
pub const MAX_ELEMENT_COUNT: usize = 32;

/// Upper bound on |phase_states|^L enumerated by the builder (2^24).
pub const MAX_COMBINATIONS: usize = 1 << 24;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-9;
