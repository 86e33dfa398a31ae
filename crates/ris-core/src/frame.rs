//! Output frames: the per-cycle bit pattern serialized for the transport.
//!
//! Two wire formats:
//! - decimal: `M` comma-separated integers, each in [0, 2^L − 1]
//! - hex: the M×L bit matrix flattened row-major, packed MSB-first into
//!   bytes, zero-padded to a fixed byte count, uppercase hexadecimal

use std::fmt;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// One integer per position; bit t of each integer is element t.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BitPattern {
    element_count: usize,
    values: Vec<u32>,
}

impl BitPattern {
    pub fn new(element_count: usize, values: Vec<u32>) -> Self {
        Self {
            element_count,
            values,
        }
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bit for element `t` at `position`.
    pub fn bit(&self, position: usize, t: usize) -> bool {
        self.values
            .get(position)
            .is_some_and(|v| t < self.element_count && (v >> t) & 1 == 1)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    #[default]
    Decimal,
    Hex,
}

impl std::str::FromStr for FrameFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "decimal" | "dec" => Ok(FrameFormat::Decimal),
            "hex" => Ok(FrameFormat::Hex),
            other => Err(CoreError::InvalidConfiguration(format!(
                "unknown frame format '{other}'"
            ))),
        }
    }
}

/// A serialized frame ready for the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutputFrame(String);

impl OutputFrame {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for OutputFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameEncoder {
    pub format: FrameFormat,
    /// Fixed byte length of hex frames. Unused for decimal frames.
    pub frame_bytes: usize,
}

impl FrameEncoder {
    pub fn new(format: FrameFormat, frame_bytes: usize) -> Self {
        Self {
            format,
            frame_bytes,
        }
    }

    /// Reject layouts whose bit matrix cannot fit a hex frame.
    pub fn check_capacity(&self, positions: usize, element_count: usize) -> Result<()> {
        if self.format == FrameFormat::Hex && positions * element_count > self.frame_bytes * 8 {
            return Err(CoreError::InvalidConfiguration(format!(
                "{positions}x{element_count} bit matrix does not fit a {}-byte frame",
                self.frame_bytes
            )));
        }
        Ok(())
    }

    pub fn encode(&self, pattern: &BitPattern) -> Result<OutputFrame> {
        match self.format {
            FrameFormat::Decimal => Ok(OutputFrame(encode_decimal(pattern))),
            FrameFormat::Hex => encode_hex(pattern, self.frame_bytes).map(OutputFrame),
        }
    }
}

pub fn encode_decimal(pattern: &BitPattern) -> String {
    pattern
        .values()
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn encode_hex(pattern: &BitPattern, frame_bytes: usize) -> Result<String> {
    let l = pattern.element_count();
    let total_bits = pattern.len() * l;
    if total_bits > frame_bytes * 8 {
        return Err(CoreError::InvalidConfiguration(format!(
            "{} positions x {l} elements need {total_bits} bits, frame holds {}",
            pattern.len(),
            frame_bytes * 8
        )));
    }

    let mut bytes = vec![0u8; frame_bytes];
    for k in 0..pattern.len() {
        for t in 0..l {
            if pattern.bit(k, t) {
                let i = k * l + t;
                bytes[i / 8] |= 0x80 >> (i % 8);
            }
        }
    }

    let mut out = String::with_capacity(frame_bytes * 2);
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    Ok(out)
}
