use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::kernel::G;

// ---------------------------------------------------------------------------
// RecordFormat – header dialect of a channel file
// ---------------------------------------------------------------------------

/// Header dialect, detected from the first non-whitespace character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordFormat {
    /// Header lines start with `/`; samples are in m/s².
    SlashHeader,
    /// Plain `key: value` header; samples are already in g.
    Standard,
}

impl RecordFormat {
    /// Number of header lines preceding the samples.
    pub fn header_len(self) -> usize {
        match self {
            RecordFormat::SlashHeader => 21,
            RecordFormat::Standard => 30,
        }
    }

    /// Unit the sample lines are written in.
    pub fn values_unit(self) -> ValuesUnit {
        match self {
            RecordFormat::SlashHeader => ValuesUnit::MetersPerSecondSquared,
            RecordFormat::Standard => ValuesUnit::G,
        }
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFormat::SlashHeader => write!(f, "slashHeader"),
            RecordFormat::Standard => write!(f, "standard"),
        }
    }
}

// ---------------------------------------------------------------------------
// ValuesUnit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValuesUnit {
    #[serde(rename = "g")]
    G,
    #[serde(rename = "mps2")]
    MetersPerSecondSquared,
}

impl ValuesUnit {
    /// Factor that turns a value in this unit into g.
    pub fn to_g_factor(self) -> f64 {
        match self {
            ValuesUnit::G => 1.0,
            ValuesUnit::MetersPerSecondSquared => 1.0 / G,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ValuesUnit::G => "g",
            ValuesUnit::MetersPerSecondSquared => "mps2",
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelRole – what a neck load cell channel measures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelRole {
    /// Shear force, used for the lever-arm moment correction.
    Fx,
    /// Axial force.
    Fz,
    /// Bending moment.
    My,
    Unknown,
}

// ---------------------------------------------------------------------------
// ParsedRecord – one channel file
// ---------------------------------------------------------------------------

/// A single parsed channel record.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    /// Source name (usually the file name).
    pub name: String,
    /// Header entries in file order, keys normalized.
    pub meta_pairs: Vec<(String, String)>,
    /// Header lookup: key → value. Later duplicates win.
    pub meta: BTreeMap<String, String>,
    /// Samples in `values_unit`.
    pub values: Vec<f64>,
    pub format: RecordFormat,
    pub values_unit: ValuesUnit,
    /// "Number of samples" from the header, if present and numeric.
    pub sample_count: Option<usize>,
    /// Sampling interval in seconds, from "Sampling interval" or derived
    /// from "Sampling rate" in Hz.
    pub sampling_interval: Option<f64>,
}

impl ParsedRecord {
    /// Header value by normalized key.
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    /// Samples converted to g.
    pub fn values_in_g(&self) -> Vec<f64> {
        let k = self.values_unit.to_g_factor();
        self.values.iter().map(|v| v * k).collect()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no samples were read.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
