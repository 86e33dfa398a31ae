use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Degenerate element count, phase state set, threshold or frame layout.
    InvalidConfiguration(String),
    /// The magnitude threshold rejected every combination.
    EmptyCodebook {
        element_count: usize,
        phase_states: Vec<f64>,
        threshold: f64,
    },
    /// A match was requested against an empty codebook.
    NoMatchAvailable { target_phase: f64 },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            CoreError::EmptyCodebook {
                element_count,
                phase_states,
                threshold,
            } => write!(
                f,
                "empty codebook: no combination of {phase_states:?} over {element_count} elements \
                 has array-factor magnitude above {threshold}"
            ),
            CoreError::NoMatchAvailable { target_phase } => write!(
                f,
                "no codebook entry available to match target phase {target_phase:.3}°"
            ),
        }
    }
}

impl std::error::Error for CoreError {}

pub type Result<T> = std::result::Result<T, CoreError>;
