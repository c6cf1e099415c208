//! Normalized neck injury criterion (Nij).
//!
//! Sign convention: +Fz tension, −Fz compression, +My flexion, −My extension.
//! Forces in N, moments in N·m. Any occipital-condyle moment correction
//! (`My − Fx·d`) is applied by the caller before evaluation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::kernel::{extreme, Extreme, ExtremeKind};

// ---------------------------------------------------------------------------
// Critical intercepts
// ---------------------------------------------------------------------------

/// Critical intercepts, all positive magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NijConstants {
    /// Tension intercept [N].
    pub fzc_t: f64,
    /// Compression intercept [N].
    pub fzc_c: f64,
    /// Flexion intercept [N·m].
    pub myc_flex: f64,
    /// Extension intercept [N·m].
    pub myc_ext: f64,
}

/// Anthropomorphic test devices with published intercepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DummyPreset {
    /// Hybrid III 50th percentile male (FMVSS 208).
    #[default]
    #[serde(rename = "hiii50")]
    HybridIII50,
    /// Hybrid III 5th percentile female.
    #[serde(rename = "hiii5f")]
    HybridIII5F,
    /// Hybrid III 95th percentile male.
    #[serde(rename = "hiii95")]
    HybridIII95,
    /// THOR 50th percentile male, upper neck.
    #[serde(rename = "thor50m")]
    Thor50M,
}

impl DummyPreset {
    pub const ALL: [DummyPreset; 4] = [
        DummyPreset::HybridIII50,
        DummyPreset::HybridIII5F,
        DummyPreset::HybridIII95,
        DummyPreset::Thor50M,
    ];

    pub fn constants(self) -> NijConstants {
        let (fzc_t, fzc_c, myc_flex, myc_ext) = match self {
            DummyPreset::HybridIII50 => (6806.0, 6160.0, 310.0, 135.0),
            DummyPreset::HybridIII5F => (4287.0, 3880.0, 155.0, 67.0),
            DummyPreset::HybridIII95 => (5440.0, 5440.0, 415.0, 166.0),
            DummyPreset::Thor50M => (4200.0, 4520.0, 60.0, 79.2),
        };
        NijConstants {
            fzc_t,
            fzc_c,
            myc_flex,
            myc_ext,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            DummyPreset::HybridIII50 => "hiii50",
            DummyPreset::HybridIII5F => "hiii5f",
            DummyPreset::HybridIII95 => "hiii95",
            DummyPreset::Thor50M => "thor50m",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DummyPreset::HybridIII50 => "Hybrid III 50th (FMVSS 208)",
            DummyPreset::HybridIII5F => "Hybrid III 5th Female",
            DummyPreset::HybridIII95 => "Hybrid III 95th Male",
            DummyPreset::Thor50M => "THOR-50M",
        }
    }
}

impl FromStr for DummyPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id = s.trim().to_ascii_lowercase();
        DummyPreset::ALL
            .into_iter()
            .find(|p| p.id() == id)
            .ok_or_else(|| Error::invalid(format!("unknown dummy preset '{s}'")))
    }
}

impl fmt::Display for DummyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Loading modes
// ---------------------------------------------------------------------------

/// The four Nij loading modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NijMode {
    TensionFlexion,
    TensionExtension,
    CompressionFlexion,
    CompressionExtension,
}

impl NijMode {
    /// Tie-break order for dominance: on equal values the earlier mode governs.
    pub const PRIORITY: [NijMode; 4] = [
        NijMode::TensionFlexion,
        NijMode::TensionExtension,
        NijMode::CompressionFlexion,
        NijMode::CompressionExtension,
    ];

    pub fn short_name(self) -> &'static str {
        match self {
            NijMode::TensionFlexion => "NTF",
            NijMode::TensionExtension => "NTE",
            NijMode::CompressionFlexion => "NCF",
            NijMode::CompressionExtension => "NCE",
        }
    }
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Nij per sample for each mode. All four vectors have the same length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NijSeries {
    pub tf: Vec<f64>,
    pub te: Vec<f64>,
    pub cf: Vec<f64>,
    pub ce: Vec<f64>,
}

/// Peak of one mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModePeak {
    pub mode: NijMode,
    pub index: usize,
    pub value: f64,
}

impl NijSeries {
    pub fn len(&self) -> usize {
        self.tf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tf.is_empty()
    }

    pub fn mode(&self, mode: NijMode) -> &[f64] {
        match mode {
            NijMode::TensionFlexion => &self.tf,
            NijMode::TensionExtension => &self.te,
            NijMode::CompressionFlexion => &self.cf,
            NijMode::CompressionExtension => &self.ce,
        }
    }

    /// The four values at sample `i`, in [`NijMode::PRIORITY`] order.
    pub fn at(&self, i: usize) -> [f64; 4] {
        NijMode::PRIORITY.map(|m| self.mode(m)[i])
    }

    /// Maximum of each mode, in [`NijMode::PRIORITY`] order. Empty series give no peaks.
    pub fn peaks(&self) -> Vec<ModePeak> {
        NijMode::PRIORITY
            .iter()
            .filter_map(|&mode| {
                extreme(self.mode(mode), ExtremeKind::Max, None::<fn(f64, usize) -> bool>)
                    .map(|Extreme { index, value }| ModePeak { mode, index, value })
            })
            .collect()
    }

    /// Largest peak over all modes; ties go to the higher-priority mode.
    pub fn governing_peak(&self) -> Option<ModePeak> {
        self.peaks()
            .into_iter()
            .fold(None, |best: Option<ModePeak>, p| match best {
                Some(b) if p.value <= b.value => Some(b),
                _ => Some(p),
            })
    }
}

/// Evaluate the four modes for aligned `fz` [N] and `my` [N·m].
///
/// Fails when the two channels differ in length.
pub fn nij_series(fz: &[f64], my: &[f64], c: &NijConstants) -> Result<NijSeries> {
    if fz.len() != my.len() {
        return Err(Error::invalid(format!(
            "Fz has {} samples but My has {}",
            fz.len(),
            my.len()
        )));
    }
    let n = fz.len();
    let mut s = NijSeries {
        tf: Vec::with_capacity(n),
        te: Vec::with_capacity(n),
        cf: Vec::with_capacity(n),
        ce: Vec::with_capacity(n),
    };
    for (&f, &m) in fz.iter().zip(my) {
        let tension = f.max(0.0) / c.fzc_t;
        let compression = (-f).max(0.0) / c.fzc_c;
        let flexion = m.max(0.0) / c.myc_flex;
        let extension = (-m).max(0.0) / c.myc_ext;

        s.tf.push(tension + flexion);
        s.te.push(tension + extension);
        s.cf.push(compression + flexion);
        s.ce.push(compression + extension);
    }
    Ok(s)
}

/// Governing mode at each sample: the strictly largest value, ties resolved
/// by [`NijMode::PRIORITY`].
pub fn dominant_modes(series: &NijSeries) -> Vec<NijMode> {
    (0..series.len())
        .map(|i| dominant_at(&series.at(i)))
        .collect()
}

fn dominant_at(values: &[f64; 4]) -> NijMode {
    let mut best = 0;
    for k in 1..NijMode::PRIORITY.len() {
        if values[k] > values[best] {
            best = k;
        }
    }
    NijMode::PRIORITY[best]
}
