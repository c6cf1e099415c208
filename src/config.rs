//! Job file for the command-line host.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use injury_lab::criteria::nij::DummyPreset;
use injury_lab::data::filter::{CfcPreset, ChannelFilter};
use injury_lab::data::model::RecordFormat;

/// Occipital condyle offset of the upper neck load cell [m].
pub const DEFAULT_LEVER_ARM_M: f64 = 0.017780;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Three head acceleration channels → resultant → HIC.
    #[default]
    Hic,
    /// Neck Fx, Fz, My channels → Nij.
    Nij,
}

impl Mode {
    /// Dialect forced onto the job's records. Neck load cell exports always
    /// use the standard header; head channels are detected per file.
    pub fn record_format(self) -> Option<RecordFormat> {
        match self {
            Mode::Hic => None,
            Mode::Nij => Some(RecordFormat::Standard),
        }
    }
}

/// Complete job description.
///
/// ```json
/// {
///   "mode": "nij",
///   "records": ["fx.txt", "fz.txt", "my.txt"],
///   "filter": "cfc600",
///   "dummy": "hiii50",
///   "output_dir": "out"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub mode: Mode,

    /// Channel files, exactly three.
    pub records: Vec<PathBuf>,

    /// Channel conditioning; mode-specific default when absent.
    pub filter: Option<ChannelFilter>,

    /// Milliseconds removed from the start of every channel.
    pub trim_start_ms: f64,

    /// Milliseconds removed from the end of every channel.
    pub trim_end_ms: f64,

    /// Maximum HIC window lengths to search, in ms.
    pub windows_ms: Vec<f64>,

    /// Nij intercepts.
    pub dummy: DummyPreset,

    /// Lever arm for `My_corr = My − Fx·d` [m].
    pub lever_arm_m: f64,

    /// Where matrices and the report are written.
    pub output_dir: PathBuf,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Hic,
            records: Vec::new(),
            filter: None,
            trim_start_ms: 0.0,
            trim_end_ms: 0.0,
            windows_ms: vec![15.0, 36.0],
            dummy: DummyPreset::HybridIII50,
            lever_arm_m: DEFAULT_LEVER_ARM_M,
            output_dir: PathBuf::from("out"),
        }
    }
}

impl JobConfig {
    /// Read a JSON job file. Relative record and output paths are resolved
    /// against the job file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading job file {}", path.display()))?;
        let mut job: JobConfig = serde_json::from_str(&text).context("parsing job JSON")?;

        if let Some(base) = path.parent() {
            for rec in &mut job.records {
                if rec.is_relative() {
                    *rec = base.join(&*rec);
                }
            }
            if job.output_dir.is_relative() {
                job.output_dir = base.join(&job.output_dir);
            }
        }
        job.validate()?;
        Ok(job)
    }

    pub fn validate(&self) -> Result<()> {
        if self.records.len() != 3 {
            bail!("Exactly 3 channel records are required, got {}", self.records.len());
        }
        if !(self.trim_start_ms >= 0.0 && self.trim_end_ms >= 0.0) {
            bail!("Trim values must be non-negative");
        }
        if let Some(w) = self.windows_ms.iter().find(|w| !(**w > 0.0)) {
            bail!("HIC window lengths must be positive, got {w} ms");
        }
        if !self.lever_arm_m.is_finite() {
            bail!("Lever arm must be a finite number");
        }
        Ok(())
    }

    /// Filter to apply: the configured one, else CFC1000 for HIC and CFC600 for Nij.
    pub fn channel_filter(&self) -> ChannelFilter {
        self.filter.unwrap_or(match self.mode {
            Mode::Hic => CfcPreset::Cfc1000.into(),
            Mode::Nij => CfcPreset::Cfc600.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let job: JobConfig =
            serde_json::from_str(r#"{ "mode": "nij", "records": ["a", "b", "c"] }"#).unwrap();
        assert_eq!(job.mode, Mode::Nij);
        assert_eq!(job.channel_filter(), ChannelFilter::Cfc(600.0));
        assert_eq!(job.dummy, DummyPreset::HybridIII50);
        assert_eq!(job.lever_arm_m, DEFAULT_LEVER_ARM_M);
        assert_eq!(job.mode.record_format(), Some(RecordFormat::Standard));
        assert_eq!(Mode::Hic.record_format(), None);
        assert!(job.validate().is_ok());
    }

    #[test]
    fn filter_and_dummy_from_strings() {
        let job: JobConfig = serde_json::from_str(
            r#"{ "records": ["a", "b", "c"], "filter": "none", "dummy": "thor50m" }"#,
        )
        .unwrap();
        assert_eq!(job.channel_filter(), ChannelFilter::None);
        assert_eq!(job.dummy, DummyPreset::Thor50M);
        assert!(serde_json::from_str::<JobConfig>(r#"{ "filter": "cfc7" }"#).is_err());
    }

    #[test]
    fn validation() {
        let mut job = JobConfig::default();
        assert!(job.validate().is_err());
        job.records = vec!["a".into(), "b".into(), "c".into()];
        job.windows_ms = vec![15.0, 0.0];
        assert!(job.validate().is_err());
    }
}
