use serde::Serialize;

use injury_lab::criteria::hic::{HicAssessment, HicSuggestion};
use injury_lab::criteria::nij::{ModePeak, NijMode};
use injury_lab::data::filter::UndersamplingWarning;
use injury_lab::data::model::{ChannelRole, ParsedRecord};
use injury_lab::math::kernel::Extreme;

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

/// One input channel as it was read.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    pub file: String,
    pub label: String,
    pub format: String,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ChannelRole>,
}

impl ChannelInfo {
    pub fn new(record: &ParsedRecord, label: String, role: Option<ChannelRole>) -> Self {
        Self {
            file: record.name.clone(),
            label,
            format: record.format.to_string(),
            unit: record.values_unit.label().to_string(),
            role,
        }
    }
}

/// Common time base after trimming.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimeBase {
    pub sampling_interval_s: f64,
    pub sample_rate_hz: f64,
    pub samples_total: usize,
    /// First kept sample, inclusive.
    pub first_index: usize,
    /// Last kept sample, inclusive.
    pub last_index: usize,
}

impl TimeBase {
    pub fn kept(&self) -> usize {
        self.last_index - self.first_index + 1
    }
}

/// Extreme sample, located in time.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Peak {
    pub index: usize,
    pub time_ms: f64,
    pub value: f64,
}

impl Peak {
    pub fn at(e: Extreme, t: &[f64]) -> Self {
        Self {
            index: e.index,
            time_ms: t[e.index] * 1e3,
            value: e.value,
        }
    }
}

// ---------------------------------------------------------------------------
// HIC
// ---------------------------------------------------------------------------

/// Best interval for one maximum window length (`None` = unconstrained).
#[derive(Debug, Clone, Serialize)]
pub struct HicWindowReport {
    pub window_ms: Option<f64>,
    pub suggestion: Option<HicSuggestion>,
    pub assessment: Option<HicAssessment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HicReport {
    pub channels: Vec<ChannelInfo>,
    pub filter: String,
    pub undersampling: Option<UndersamplingWarning>,
    pub time_base: TimeBase,
    /// Peak of the resultant, in g.
    pub resultant_peak: Option<Peak>,
    pub windows: Vec<HicWindowReport>,
}

// ---------------------------------------------------------------------------
// Nij
// ---------------------------------------------------------------------------

/// Tension and compression peaks of Fz [N].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ForcePeaks {
    pub tension: Option<Peak>,
    pub compression: Option<Peak>,
}

/// Flexion and extension peaks of the corrected moment [N·m].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MomentPeaks {
    pub flexion: Option<Peak>,
    pub extension: Option<Peak>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct NijPeak {
    pub mode: NijMode,
    pub name: &'static str,
    pub index: usize,
    pub time_ms: f64,
    pub value: f64,
}

impl NijPeak {
    pub fn at(p: ModePeak, t: &[f64]) -> Self {
        Self {
            mode: p.mode,
            name: p.mode.short_name(),
            index: p.index,
            time_ms: t[p.index] * 1e3,
            value: p.value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NijReport {
    pub channels: Vec<ChannelInfo>,
    pub filter: String,
    pub undersampling: Option<UndersamplingWarning>,
    pub time_base: TimeBase,
    pub dummy: String,
    pub lever_arm_m: f64,
    pub fz: ForcePeaks,
    pub my_corrected: MomentPeaks,
    pub peaks: Vec<NijPeak>,
    pub governing: Option<NijPeak>,
    /// Samples governed by each mode, in priority order.
    pub dominant_counts: Vec<(NijMode, usize)>,
}

/// What a finished job produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Report {
    Hic(HicReport),
    Nij(NijReport),
}
