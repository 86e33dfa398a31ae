//! Cycle driver: owns the codebook and turns the modulation / steering
//! schedule into one output frame per call.

use serde::{Deserialize, Serialize};

use crate::codebook::Codebook;
use crate::constants::{
    ELEMENT_SPACING, HEX_FRAME_BYTES, POSITION_COUNT, QPSK_PHASES, STEERING_ANGLE,
};
use crate::error::{CoreError, Result};
use crate::frame::{BitPattern, FrameEncoder, FrameFormat, OutputFrame};
use crate::mapper::{BitPolicy, Mapper};
use crate::steering::{DitherTable, Steering, target_phases};

/// What changes from one cycle to the next.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
    /// Step through modulation phases at a fixed steering angle.
    Qpsk { phases: Vec<f64> },
    /// Step through steering angles with zero modulation phase.
    Sweep { angles: Vec<f64> },
}

impl Schedule {
    pub fn len(&self) -> usize {
        match self {
            Schedule::Qpsk { phases } => phases.len(),
            Schedule::Sweep { angles } => angles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::Qpsk {
            phases: QPSK_PHASES.to_vec(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DriverConfig {
    pub position_count: usize,
    pub steering_angle_deg: f64,
    pub element_spacing: f64,
    pub schedule: Schedule,
    /// Pre-phasing correction; `None` disables it.
    pub dither: Option<DitherTable>,
    pub bit_policy: BitPolicy,
    pub encoder: FrameEncoder,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            position_count: POSITION_COUNT,
            steering_angle_deg: STEERING_ANGLE,
            element_spacing: ELEMENT_SPACING,
            schedule: Schedule::default(),
            dither: None,
            bit_policy: BitPolicy::Midpoint,
            encoder: FrameEncoder::new(FrameFormat::Decimal, HEX_FRAME_BYTES),
        }
    }
}

/// Everything computed for one cycle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cycle {
    /// Position in the schedule that produced this cycle.
    pub schedule_index: usize,
    pub base_phase: f64,
    pub steering_angle_deg: f64,
    pub targets: Vec<f64>,
    pub pattern: BitPattern,
    pub frame: OutputFrame,
}

pub struct CycleDriver {
    config: DriverConfig,
    codebook: Codebook,
    index: usize,
}

impl CycleDriver {
    /// Validate the configuration and take ownership of the codebook.
    ///
    /// An empty codebook fails here with `EmptyCodebook`, before any cycle runs.
    pub fn new(config: DriverConfig, codebook: Codebook) -> Result<Self> {
        codebook.require_non_empty()?;
        if config.position_count == 0 {
            return Err(CoreError::InvalidConfiguration(
                "position count must be at least 1".to_string(),
            ));
        }
        if config.schedule.is_empty() {
            return Err(CoreError::InvalidConfiguration(
                "schedule has no phases or angles".to_string(),
            ));
        }
        let schedule_values: &[f64] = match &config.schedule {
            Schedule::Qpsk { phases } => phases,
            Schedule::Sweep { angles } => angles,
        };
        if !config.steering_angle_deg.is_finite()
            || !config.element_spacing.is_finite()
            || schedule_values.iter().any(|v| !v.is_finite())
        {
            return Err(CoreError::InvalidConfiguration(
                "steering angle, element spacing and schedule must be finite".to_string(),
            ));
        }
        config
            .encoder
            .check_capacity(config.position_count, codebook.element_count())?;

        Ok(Self {
            config,
            codebook,
            index: 0,
        })
    }

    pub fn codebook(&self) -> &Codebook {
        &self.codebook
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Schedule position the next cycle will use.
    pub fn schedule_index(&self) -> usize {
        self.index
    }

    /// Retarget the beam; takes effect on the next cycle.
    ///
    /// A sweep schedule supplies its own angles, so retargeting it is an
    /// `InvalidConfiguration`.
    pub fn set_steering_angle(&mut self, angle_deg: f64) -> Result<()> {
        if !angle_deg.is_finite() {
            return Err(CoreError::InvalidConfiguration(format!(
                "steering angle {angle_deg} is not finite"
            )));
        }
        if let Schedule::Sweep { angles } = &self.config.schedule {
            return Err(CoreError::InvalidConfiguration(format!(
                "steering angle is fixed by the {}-step sweep schedule",
                angles.len()
            )));
        }
        self.config.steering_angle_deg = angle_deg;
        Ok(())
    }

    /// Compute the current cycle and advance the schedule by one step.
    ///
    /// The schedule only advances when the cycle succeeds.
    pub fn next_cycle(&mut self) -> Result<Cycle> {
        let index = self.index;
        let (base_phase, angle) = match &self.config.schedule {
            Schedule::Qpsk { phases } => (phases[index], self.config.steering_angle_deg),
            Schedule::Sweep { angles } => (0.0, angles[index]),
        };

        let steering = Steering {
            angle_deg: angle,
            element_spacing: self.config.element_spacing,
        };
        let targets = target_phases(
            base_phase,
            steering.gradient(),
            self.config.position_count,
            self.config.dither.as_ref(),
        );

        let pattern = Mapper::new(&self.codebook, self.config.bit_policy).resolve(&targets)?;
        let frame = self.config.encoder.encode(&pattern)?;

        self.index = (index + 1) % self.config.schedule.len();
        Ok(Cycle {
            schedule_index: index,
            base_phase,
            steering_angle_deg: angle,
            targets,
            pattern,
            frame,
        })
    }

    /// Pull entry point: the next frame as a string.
    pub fn get_next_frame(&mut self) -> Result<String> {
        self.next_cycle().map(|cycle| cycle.frame.into_string())
    }
}
