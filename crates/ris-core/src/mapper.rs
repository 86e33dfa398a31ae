//! Beam pattern mapping: closest-phase codebook lookup and bit extraction.

use serde::{Deserialize, Serialize};

use crate::codebook::{Codebook, CodebookEntry, PhaseStateSet};
use crate::constants::EPSILON;
use crate::error::{CoreError, Result};
use crate::frame::BitPattern;
use crate::phase::circular_distance;

/// How a per-element phase state becomes a hardware bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BitPolicy {
    /// Bit set when the state lies above the midpoint of the phase range.
    #[default]
    Midpoint,
    /// Bit set when the state equals `value` (the 1-bit board uses 180°).
    Equals { value: f64 },
}

impl BitPolicy {
    /// Fix the policy against a concrete phase state set.
    pub fn resolve(self, phase_states: &PhaseStateSet) -> BitRule {
        match self {
            BitPolicy::Midpoint => BitRule::Above(phase_states.midpoint()),
            BitPolicy::Equals { value } => BitRule::Equals(value),
        }
    }
}

/// A resolved bit threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BitRule {
    Above(f64),
    Equals(f64),
}

impl BitRule {
    pub fn bit(self, state: f64) -> bool {
        match self {
            BitRule::Above(mid) => state > mid,
            BitRule::Equals(value) => (state - value).abs() < EPSILON,
        }
    }
}

/// Pack one bit per element, element t at bit position t.
pub fn pack_bits(states: &[f64], rule: BitRule) -> u32 {
    states
        .iter()
        .enumerate()
        .filter(|(_, s)| rule.bit(**s))
        .fold(0u32, |acc, (t, _)| acc | (1 << t))
}

/// Bit pattern of a matched entry. Depends only on its state vector.
pub fn to_bits(entry: &CodebookEntry, rule: BitRule) -> u32 {
    pack_bits(&entry.states, rule)
}

/// Linear scan for the entry whose phase is circularly closest to `target_phase`.
///
/// Ties keep the earliest entry in enumeration order.
pub fn match_phase(target_phase: f64, codebook: &Codebook) -> Result<&CodebookEntry> {
    if !target_phase.is_finite() {
        return Err(CoreError::InvalidConfiguration(format!(
            "target phase {target_phase} is not finite"
        )));
    }

    let mut best: Option<(&CodebookEntry, f64)> = None;
    for entry in codebook.entries() {
        let d = circular_distance(entry.phase, target_phase);
        if best.is_none_or(|(_, best_d)| d < best_d) {
            best = Some((entry, d));
        }
    }

    best.map(|(entry, _)| entry)
        .ok_or(CoreError::NoMatchAvailable { target_phase })
}

/// Resolves target phases to bit patterns against a borrowed codebook.
pub struct Mapper<'a> {
    codebook: &'a Codebook,
    rule: BitRule,
}

impl<'a> Mapper<'a> {
    pub fn new(codebook: &'a Codebook, policy: BitPolicy) -> Self {
        Self {
            codebook,
            rule: policy.resolve(codebook.phase_states()),
        }
    }

    pub fn rule(&self) -> BitRule {
        self.rule
    }

    pub fn match_phase(&self, target_phase: f64) -> Result<&'a CodebookEntry> {
        match_phase(target_phase, self.codebook)
    }

    pub fn pattern_for(&self, target_phase: f64) -> Result<u32> {
        self.match_phase(target_phase)
            .map(|entry| to_bits(entry, self.rule))
    }

    /// Resolve every position independently.
    pub fn resolve(&self, targets: &[f64]) -> Result<BitPattern> {
        let values = targets
            .iter()
            .map(|&t| self.pattern_for(t))
            .collect::<Result<Vec<u32>>>()?;
        Ok(BitPattern::new(self.codebook.element_count(), values))
    }
}
