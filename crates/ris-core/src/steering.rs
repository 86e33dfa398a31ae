//! Target-phase derivation: steering gradient, modulation offset and the
//! optional per-position dithering correction.

use std::f64::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::phase::wrap_degrees;

/// Per-position phase step (degrees) that tilts the beam by `steering_angle_deg`.
///
/// delta = degrees(2π · d/λ · sin(θ))
pub fn phase_gradient(steering_angle_deg: f64, element_spacing: f64) -> f64 {
    (TAU * element_spacing * steering_angle_deg.to_radians().sin()).to_degrees()
}

/// Fixed per-position pre-phasing offsets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DitherTable {
    offsets: Vec<f64>,
}

impl DitherTable {
    pub fn new(offsets: Vec<f64>) -> Result<Self> {
        if let Some(bad) = offsets.iter().find(|o| !o.is_finite()) {
            return Err(CoreError::InvalidConfiguration(format!(
                "dithering offset {bad} is not finite"
            )));
        }
        Ok(Self { offsets })
    }

    /// Draw `positions` offsets uniformly from `levels`.
    pub fn random(positions: usize, levels: &[f64], rng: &mut impl Rng) -> Result<Self> {
        if levels.is_empty() {
            return Err(CoreError::InvalidConfiguration(
                "dithering levels are empty".to_string(),
            ));
        }
        let offsets = (0..positions)
            .map(|_| levels[rng.random_range(0..levels.len())])
            .collect();
        Self::new(offsets)
    }

    /// Offset for `position`; positions past the end of the table get none.
    pub fn offset(&self, position: usize) -> f64 {
        self.offsets.get(position).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Steering geometry for one cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Steering {
    pub angle_deg: f64,
    pub element_spacing: f64,
}

impl Steering {
    pub fn gradient(&self) -> f64 {
        phase_gradient(self.angle_deg, self.element_spacing)
    }
}

/// target[k] = (base + k·delta) mod 360, minus `dither[k]` when supplied.
pub fn target_phases(
    base_phase: f64,
    delta: f64,
    positions: usize,
    dither: Option<&DitherTable>,
) -> Vec<f64> {
    (0..positions)
        .map(|k| {
            let phi = wrap_degrees(base_phase + k as f64 * delta);
            match dither {
                Some(table) => wrap_degrees(phi - table.offset(k)),
                None => phi,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DITHER_CORRECTION;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn test_gradient_thirty_degrees() {
        assert_abs_diff_eq!(phase_gradient(30.0, 0.5), 90.0, epsilon = 1e-6);
    }

    #[test]
    fn test_gradient_broadside_is_zero() {
        assert_abs_diff_eq!(phase_gradient(0.0, 0.5), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gradient_negative_angle() {
        assert_abs_diff_eq!(phase_gradient(-30.0, 0.5), -90.0, epsilon = 1e-6);
    }

    #[test]
    fn test_targets_follow_gradient() {
        let t = target_phases(0.0, phase_gradient(30.0, 0.5), 16, None);
        assert_eq!(t.len(), 16);
        assert_abs_diff_eq!(t[0], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t[1], 90.0, epsilon = 1e-6);
        assert_abs_diff_eq!(t[2], 180.0, epsilon = 1e-6);
        assert!(t.iter().all(|p| (0.0..360.0).contains(p)));
    }

    #[test]
    fn test_targets_with_base_phase_wrap() {
        let t = target_phases(270.0, 90.0, 3, None);
        assert_eq!(t, vec![270.0, 0.0, 90.0]);
    }

    #[test]
    fn test_dither_subtracts_and_wraps() {
        let table = DitherTable::new(vec![90.0, 0.0]).unwrap();
        let t = target_phases(0.0, 90.0, 3, Some(&table));
        assert_eq!(t, vec![270.0, 90.0, 180.0]);
    }

    #[test]
    fn test_dither_short_table_leaves_tail_uncorrected() {
        let table = DitherTable::new(DITHER_CORRECTION.to_vec()).unwrap();
        assert_eq!(table.offset(12), 0.0);
        assert_eq!(table.offset(13), 0.0);
        assert_eq!(table.offset(15), 0.0);
        assert_eq!(table.offset(0), 90.0);
    }

    #[test]
    fn test_random_table_is_seeded() {
        let a = DitherTable::random(16, &[0.0, 90.0], &mut SmallRng::seed_from_u64(7)).unwrap();
        let b = DitherTable::random(16, &[0.0, 90.0], &mut SmallRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!((0..16).map(|k| a.offset(k)).all(|o| o == 0.0 || o == 90.0));
    }

    #[test]
    fn test_random_table_needs_levels() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(DitherTable::random(4, &[], &mut rng).is_err());
    }
}
