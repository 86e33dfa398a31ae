//! Codebook construction: enumerate every per-element phase-state
//! combination, evaluate its far-field array factor, and keep the
//! combinations whose magnitude clears the acceptance threshold.

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::constants::{EPSILON, MAX_COMBINATIONS, MAX_ELEMENT_COUNT};
use crate::error::{CoreError, Result};
use crate::phase::{circular_distance, wrap_degrees};

/// Ordered set of discrete phase values (degrees) shared by all elements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct PhaseStateSet {
    states: Vec<f64>,
}

impl PhaseStateSet {
    /// Validate a phase state set: non-empty, every value finite in [0, 360).
    pub fn new(states: Vec<f64>) -> Result<Self> {
        if states.is_empty() {
            return Err(CoreError::InvalidConfiguration(
                "phase state set is empty".to_string(),
            ));
        }
        if let Some(bad) = states
            .iter()
            .find(|s| !s.is_finite() || !(0.0..360.0).contains(*s))
        {
            return Err(CoreError::InvalidConfiguration(format!(
                "phase state {bad} outside [0, 360) in {states:?}"
            )));
        }
        Ok(Self { states })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn min(&self) -> f64 {
        self.states.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.states.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Value bisecting the phase range: 90° for {0, 180}.
    pub fn midpoint(&self) -> f64 {
        (self.min() + self.max()) / 2.0
    }
}

impl TryFrom<Vec<f64>> for PhaseStateSet {
    type Error = CoreError;

    fn try_from(states: Vec<f64>) -> Result<Self> {
        Self::new(states)
    }
}

impl From<PhaseStateSet> for Vec<f64> {
    fn from(set: PhaseStateSet) -> Self {
        set.states
    }
}

/// Per-element amplitude weighting applied inside the array-factor sum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SincWeighting {
    /// Constant 1.0 for every element.
    #[default]
    Unit,
    /// sin(π/L) / (π/L), the element-pattern rolloff of a length-L subarray.
    Normalized,
}

impl SincWeighting {
    pub fn factor(self, element_count: usize) -> f64 {
        match self {
            SincWeighting::Unit => 1.0,
            SincWeighting::Normalized => sinc(1.0, element_count),
        }
    }
}

/// sin(πm/L) / (πm/L), with sinc(0) = 1.
fn sinc(m: f64, element_count: usize) -> f64 {
    if m == 0.0 {
        return 1.0;
    }
    let x = PI * m / element_count as f64;
    x.sin() / x
}

/// Far-field array factor of one state vector (phases in degrees).
///
/// AF = (1/L) Σ_{n=1..L} e^{jγ_{n-1}} · w · e^{-jπ(2n-1)/L}
pub fn array_factor(states: &[f64], weighting: SincWeighting) -> Complex64 {
    let l = states.len();
    if l == 0 {
        return Complex64::new(0.0, 0.0);
    }
    let w = weighting.factor(l);
    let lf = l as f64;
    let sum: Complex64 = states
        .iter()
        .enumerate()
        .map(|(i, gamma)| {
            let n = (i + 1) as f64;
            let ramp = -PI * (2.0 * n - 1.0) / lf;
            Complex64::from_polar(1.0, gamma.to_radians()) * w * Complex64::from_polar(1.0, ramp)
        })
        .sum();
    sum / lf
}

/// One retained hardware configuration with its resulting phase and gain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodebookEntry {
    /// Enumeration index (mixed-radix, element 0 least significant).
    pub index: usize,
    /// Phase (degrees) assigned to each element.
    pub states: Vec<f64>,
    /// Array-factor phase in [0, 360).
    pub phase: f64,
    /// Array-factor magnitude.
    pub magnitude: f64,
}

/// Where a codebook's entries came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodebookSource {
    Generated,
    Table,
}

impl CodebookSource {
    pub fn as_str(self) -> &'static str {
        match self {
            CodebookSource::Generated => "generated",
            CodebookSource::Table => "table",
        }
    }
}

/// Parameters identifying a codebook. A generated and an imported codebook
/// with the same parameters have distinct keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodebookKey {
    pub phase_states: Vec<f64>,
    pub element_count: usize,
    pub threshold: f64,
    pub weighting: SincWeighting,
    pub source: CodebookSource,
}

impl CodebookKey {
    /// Stable textual identifier, used as a cache key.
    pub fn id(&self) -> String {
        let states: Vec<String> = self.phase_states.iter().map(|s| format!("{s}")).collect();
        let weighting = match self.weighting {
            SincWeighting::Unit => "unit",
            SincWeighting::Normalized => "normalized",
        };
        format!(
            "L{}:S{}:T{}:W{weighting}:{}",
            self.element_count,
            states.join(","),
            self.threshold,
            self.source.as_str()
        )
    }
}

/// Immutable set of usable configurations, in enumeration order.
#[derive(Clone, Debug, PartialEq)]
pub struct Codebook {
    phase_states: PhaseStateSet,
    element_count: usize,
    threshold: f64,
    weighting: SincWeighting,
    source: CodebookSource,
    total_combinations: usize,
    entries: Vec<CodebookEntry>,
}

impl Codebook {
    pub fn entries(&self) -> &[CodebookEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn phase_states(&self) -> &PhaseStateSet {
        &self.phase_states
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn weighting(&self) -> SincWeighting {
        self.weighting
    }

    pub fn source(&self) -> CodebookSource {
        self.source
    }

    /// |phase_states|^L for generated codebooks; row count for tables.
    pub fn total_combinations(&self) -> usize {
        self.total_combinations
    }

    pub fn key(&self) -> CodebookKey {
        CodebookKey {
            phase_states: self.phase_states.as_slice().to_vec(),
            element_count: self.element_count,
            threshold: self.threshold,
            weighting: self.weighting,
            source: self.source,
        }
    }

    /// Fail with `EmptyCodebook` if the threshold rejected everything.
    pub fn require_non_empty(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(CoreError::EmptyCodebook {
                element_count: self.element_count,
                phase_states: self.phase_states.as_slice().to_vec(),
                threshold: self.threshold,
            });
        }
        Ok(())
    }

    pub fn stats(&self) -> CodebookStats {
        let magnitudes = self.entries.iter().map(|e| e.magnitude);
        CodebookStats {
            total_combinations: self.total_combinations,
            retained: self.entries.len(),
            min_magnitude: magnitudes.clone().fold(None, |acc: Option<f64>, m| {
                Some(acc.map_or(m, |a| a.min(m)))
            }),
            max_magnitude: magnitudes.fold(None, |acc: Option<f64>, m| {
                Some(acc.map_or(m, |a| a.max(m)))
            }),
        }
    }

    /// Reassemble a previously built codebook, re-checking its invariants.
    pub fn from_parts(
        key: CodebookKey,
        total_combinations: usize,
        entries: Vec<CodebookEntry>,
    ) -> Result<Self> {
        let phase_states = PhaseStateSet::new(key.phase_states)?;
        validate_shape(&phase_states, key.element_count, key.threshold)?;
        for entry in &entries {
            if entry.states.len() != key.element_count
                || !(0.0..360.0).contains(&entry.phase)
                || entry.magnitude.is_nan()
                || entry.magnitude <= key.threshold
            {
                return Err(CoreError::InvalidConfiguration(format!(
                    "entry {} violates codebook invariants",
                    entry.index
                )));
            }
        }
        if entries.len() > total_combinations {
            return Err(CoreError::InvalidConfiguration(format!(
                "{} entries exceed {total_combinations} combinations",
                entries.len()
            )));
        }
        Ok(Self {
            phase_states,
            element_count: key.element_count,
            threshold: key.threshold,
            weighting: key.weighting,
            source: key.source,
            total_combinations,
            entries,
        })
    }

    /// Assemble a codebook from externally supplied rows.
    ///
    /// Each row is (states, phase, magnitude). Every state must be one of
    /// `phase_states`. A missing magnitude is recomputed from the states.
    /// Rows whose magnitude does not exceed the threshold are dropped so
    /// the retained set obeys the same invariant as a generated codebook.
    pub fn from_table(
        phase_states: PhaseStateSet,
        element_count: usize,
        threshold: f64,
        weighting: SincWeighting,
        rows: Vec<(Vec<f64>, f64, Option<f64>)>,
    ) -> Result<Self> {
        validate_shape(&phase_states, element_count, threshold)?;
        let total = rows.len();
        let mut entries = Vec::with_capacity(total);
        for (index, (states, phase, magnitude)) in rows.into_iter().enumerate() {
            if states.len() != element_count {
                return Err(CoreError::InvalidConfiguration(format!(
                    "table row {index} has {} states, expected {element_count}",
                    states.len()
                )));
            }
            if let Some(bad) = states.iter().find(|s| !s.is_finite()) {
                return Err(CoreError::InvalidConfiguration(format!(
                    "table row {index} has non-finite state {bad}"
                )));
            }
            if !phase.is_finite() {
                return Err(CoreError::InvalidConfiguration(format!(
                    "table row {index} has non-finite phase {phase}"
                )));
            }
            let states: Vec<f64> = states.into_iter().map(wrap_degrees).collect();
            if let Some(bad) = states.iter().find(|s| {
                !phase_states
                    .as_slice()
                    .iter()
                    .any(|p| circular_distance(**s, *p) < EPSILON)
            }) {
                return Err(CoreError::InvalidConfiguration(format!(
                    "table row {index} has state {bad} outside {:?}",
                    phase_states.as_slice()
                )));
            }
            let magnitude = flush_residual(
                magnitude.unwrap_or_else(|| array_factor(&states, weighting).norm()),
            );
            if magnitude > threshold {
                entries.push(CodebookEntry {
                    index,
                    states,
                    phase: wrap_degrees(phase),
                    magnitude,
                });
            }
        }
        Ok(Self {
            phase_states,
            element_count,
            threshold,
            weighting,
            source: CodebookSource::Table,
            total_combinations: total,
            entries,
        })
    }
}

/// Summary figures for diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CodebookStats {
    pub total_combinations: usize,
    pub retained: usize,
    pub min_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
}

fn validate_shape(phase_states: &PhaseStateSet, element_count: usize, threshold: f64) -> Result<()> {
    if phase_states.is_empty() {
        return Err(CoreError::InvalidConfiguration(
            "phase state set is empty".to_string(),
        ));
    }
    if element_count == 0 {
        return Err(CoreError::InvalidConfiguration(
            "element count must be at least 1".to_string(),
        ));
    }
    if element_count > MAX_ELEMENT_COUNT {
        return Err(CoreError::InvalidConfiguration(format!(
            "element count {element_count} exceeds {MAX_ELEMENT_COUNT}"
        )));
    }
    if !threshold.is_finite() {
        return Err(CoreError::InvalidConfiguration(format!(
            "threshold {threshold} is not finite"
        )));
    }
    Ok(())
}

/// Magnitudes below `EPSILON` are rounding residue of a cancelled sum.
fn flush_residual(magnitude: f64) -> f64 {
    if magnitude < EPSILON { 0.0 } else { magnitude }
}

/// Number of combinations |phase_states|^L, bounded by `MAX_COMBINATIONS`.
fn combination_count(base: usize, element_count: usize) -> Result<usize> {
    u32::try_from(element_count)
        .ok()
        .and_then(|l| base.checked_pow(l))
        .filter(|&n| n <= MAX_COMBINATIONS)
        .ok_or_else(|| {
            CoreError::InvalidConfiguration(format!(
                "{base}^{element_count} combinations exceeds the limit of {MAX_COMBINATIONS}"
            ))
        })
}

/// Decode a mixed-radix enumeration index into per-element state indices,
/// element 0 taking the least-significant digit.
fn digits(mut index: usize, base: usize, element_count: usize) -> impl Iterator<Item = usize> {
    (0..element_count).map(move |_| {
        let digit = index % base;
        index /= base;
        digit
    })
}

/// Build the codebook with unit sinc weighting.
pub fn build_codebook(
    phase_states: &PhaseStateSet,
    element_count: usize,
    threshold: f64,
) -> Result<Codebook> {
    build_codebook_with(phase_states, element_count, threshold, SincWeighting::Unit)
}

/// Build the codebook with an explicit element weighting.
pub fn build_codebook_with(
    phase_states: &PhaseStateSet,
    element_count: usize,
    threshold: f64,
    weighting: SincWeighting,
) -> Result<Codebook> {
    validate_shape(phase_states, element_count, threshold)?;
    let base = phase_states.len();
    let total = combination_count(base, element_count)?;
    let values = phase_states.as_slice();

    let mut entries = Vec::new();
    let mut states = Vec::with_capacity(element_count);
    for index in 0..total {
        states.clear();
        states.extend(digits(index, base, element_count).map(|d| values[d]));

        let af = array_factor(&states, weighting);
        let magnitude = flush_residual(af.norm());
        if magnitude > threshold {
            entries.push(CodebookEntry {
                index,
                states: states.clone(),
                phase: wrap_degrees(af.arg().to_degrees()),
                magnitude,
            });
        }
    }

    Ok(Codebook {
        phase_states: phase_states.clone(),
        element_count,
        threshold,
        weighting,
        source: CodebookSource::Generated,
        total_combinations: total,
        entries,
    })
}

/// Entries whose phases agree within `EPSILON`, used to spot degenerate tables.
pub fn duplicate_phases(codebook: &Codebook) -> Vec<(usize, usize)> {
    let entries = codebook.entries();
    let mut pairs = Vec::new();
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            if circular_distance(entries[i].phase, entries[j].phase) < EPSILON {
                pairs.push((entries[i].index, entries[j].index));
            }
        }
    }
    pairs
}
