use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{bail, Context, Result};

use injury_lab::criteria::hic::{suggest_best_interval, HicAssessment};
use injury_lab::criteria::nij::{dominant_modes, nij_series, NijMode};
use injury_lab::data::filter::{ChannelFilter, FilterSpec, UndersamplingWarning};
use injury_lab::data::loader::{channel_label, guess_role, load_record_as, verify_aligned};
use injury_lab::data::model::{ChannelRole, ParsedRecord};
use injury_lab::math::kernel::{extreme, resultant, time_array, ExtremeKind};

use crate::config::{JobConfig, Mode};
use crate::state::{
    ChannelInfo, ForcePeaks, HicReport, HicWindowReport, MomentPeaks, NijPeak, NijReport, Peak,
    Report, TimeBase,
};

/// Slack, in samples, when converting trim times to indices.
const INDEX_SLACK: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Job entry-point
// ---------------------------------------------------------------------------

/// Run a job end to end and write its outputs into `job.output_dir`.
pub fn run(job: &JobConfig) -> Result<Report> {
    std::fs::create_dir_all(&job.output_dir)
        .with_context(|| format!("creating output directory {}", job.output_dir.display()))?;

    let records = job
        .records
        .iter()
        .map(|p| load_record_as(p, job.mode.record_format()))
        .collect::<Result<Vec<_>>>()?;

    let report = match job.mode {
        Mode::Hic => Report::Hic(run_hic(job, &records)?),
        Mode::Nij => Report::Nij(run_nij(job, &records)?),
    };

    let path = job.output_dir.join("report.json");
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &report)
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("Report written to {}", path.display());

    Ok(report)
}

// ---------------------------------------------------------------------------
// HIC
// ---------------------------------------------------------------------------

/// Three head acceleration channels → filtered resultant in g → HIC windows.
pub fn run_hic(job: &JobConfig, records: &[ParsedRecord]) -> Result<HicReport> {
    if records.len() != 3 {
        bail!("HIC needs 3 acceleration channels (x, y, z), got {}", records.len());
    }
    let (time_base, t) = prepare_time_base(job, records)?;
    let filter = job.channel_filter();
    let span = time_base.first_index..=time_base.last_index;

    let mut channels = Vec::with_capacity(records.len());
    let mut conditioned = Vec::with_capacity(records.len());
    for rec in records {
        let g = rec.values_in_g();
        let y = filter
            .apply(&g[span.clone()], time_base.sample_rate_hz)
            .with_context(|| format!("filtering {}", rec.name))?;
        conditioned.push(y);
        channels.push(ChannelInfo::new(rec, channel_label(rec), None));
    }
    let res = resultant(&conditioned[0], &conditioned[1], Some(conditioned[2].as_slice()));

    let mut windows: Vec<Option<f64>> = job.windows_ms.iter().copied().map(Some).collect();
    windows.push(None);
    let windows = windows
        .into_iter()
        .map(|window_ms| {
            let suggestion = suggest_best_interval(&t, &res, window_ms);
            let assessment =
                suggestion.and_then(|s| HicAssessment::evaluate(&t, &res, s.i0, s.i1));
            match (&suggestion, window_ms) {
                (Some(s), Some(w)) => log::info!(
                    "HIC (≤{w} ms) = {:.1} over [{:.2}, {:.2}] ms",
                    s.hic,
                    t[s.i0] * 1e3,
                    t[s.i1] * 1e3
                ),
                (Some(s), None) => log::info!(
                    "HIC (unconstrained) = {:.1} over [{:.2}, {:.2}] ms",
                    s.hic,
                    t[s.i0] * 1e3,
                    t[s.i1] * 1e3
                ),
                (None, _) => log::info!("No HIC interval found for window {window_ms:?} ms"),
            }
            HicWindowReport {
                window_ms,
                suggestion,
                assessment,
            }
        })
        .collect();

    write_matrix(
        &job.output_dir.join("matrix.tsv"),
        &["time_s", "y1", "y2", "y3", "resultant"],
        &[&t, &conditioned[0], &conditioned[1], &conditioned[2], &res],
    )?;

    let none: Option<fn(f64, usize) -> bool> = None;
    Ok(HicReport {
        channels,
        filter: filter.label(),
        undersampling: undersampling(filter, time_base.sample_rate_hz),
        time_base,
        resultant_peak: extreme(&res, ExtremeKind::Max, none).map(|e| Peak::at(e, &t)),
        windows,
    })
}

// ---------------------------------------------------------------------------
// Nij
// ---------------------------------------------------------------------------

/// Upper-neck Fx, Fz, My → moment correction → Nij modes.
pub fn run_nij(job: &JobConfig, records: &[ParsedRecord]) -> Result<NijReport> {
    let roles: Vec<ChannelRole> = records.iter().map(guess_role).collect();
    let find = |role: ChannelRole| -> Result<usize> {
        match roles.iter().position(|r| *r == role) {
            Some(i) => Ok(i),
            None => {
                let names: Vec<String> = records.iter().map(channel_label).collect();
                bail!("No {role:?} channel among [{}]", names.join(", "))
            }
        }
    };
    let (ix, iz, iy) = (find(ChannelRole::Fx)?, find(ChannelRole::Fz)?, find(ChannelRole::My)?);

    let (time_base, t) = prepare_time_base(job, records)?;
    let filter = job.channel_filter();
    let span = time_base.first_index..=time_base.last_index;
    let condition = |rec: &ParsedRecord| -> Result<Vec<f64>> {
        filter
            .apply(&rec.values[span.clone()], time_base.sample_rate_hz)
            .with_context(|| format!("filtering {}", rec.name))
    };
    let fx = condition(&records[ix])?;
    let fz = condition(&records[iz])?;
    let my = condition(&records[iy])?;

    let my_corr = correct_moment(&my, &fx, job.lever_arm_m);
    let series = nij_series(&fz, &my_corr, &job.dummy.constants())?;
    let modes = dominant_modes(&series);

    let dominant_counts = NijMode::PRIORITY
        .iter()
        .map(|&m| (m, modes.iter().filter(|d| **d == m).count()))
        .collect();
    let peaks: Vec<NijPeak> = series.peaks().into_iter().map(|p| NijPeak::at(p, &t)).collect();
    let governing = series.governing_peak().map(|p| NijPeak::at(p, &t));
    if let Some(g) = &governing {
        log::info!(
            "Nij ({}) = {:.3} ({}) at {:.2} ms",
            job.dummy.label(),
            g.value,
            g.name,
            g.time_ms
        );
    }

    let located = |values: &[f64], kind: ExtremeKind, keep: fn(f64, usize) -> bool| {
        extreme(values, kind, Some(keep)).map(|e| Peak::at(e, &t))
    };
    let fz_peaks = ForcePeaks {
        tension: located(&fz, ExtremeKind::Max, |v, _| v > 0.0),
        compression: located(&fz, ExtremeKind::Min, |v, _| v < 0.0),
    };
    let my_peaks = MomentPeaks {
        flexion: located(&my_corr, ExtremeKind::Max, |v, _| v > 0.0),
        extension: located(&my_corr, ExtremeKind::Min, |v, _| v < 0.0),
    };

    write_matrix(
        &job.output_dir.join("nij_matrix.tsv"),
        &["time_s", "Fz", "My_corr", "NTF", "NTE", "NCF", "NCE"],
        &[&t, &fz, &my_corr, &series.tf, &series.te, &series.cf, &series.ce],
    )?;

    let channels = records
        .iter()
        .zip(&roles)
        .map(|(rec, role)| ChannelInfo::new(rec, channel_label(rec), Some(*role)))
        .collect();

    Ok(NijReport {
        channels,
        filter: filter.label(),
        undersampling: undersampling(filter, time_base.sample_rate_hz),
        time_base,
        dummy: job.dummy.label().to_string(),
        lever_arm_m: job.lever_arm_m,
        fz: fz_peaks,
        my_corrected: my_peaks,
        peaks,
        governing,
        dominant_counts,
    })
}

/// Moment about the occipital condyle: `My − Fx·lever_arm_m`.
pub fn correct_moment(my: &[f64], fx: &[f64], lever_arm_m: f64) -> Vec<f64> {
    my.iter().zip(fx).map(|(m, f)| m - f * lever_arm_m).collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Check alignment, apply the trims, and return the kept time axis in seconds,
/// starting at 0 on the first kept sample.
fn prepare_time_base(job: &JobConfig, records: &[ParsedRecord]) -> Result<(TimeBase, Vec<f64>)> {
    let align = verify_aligned(records)?;
    let dt = align.sampling_interval;
    let (first_index, last_index) =
        trim_range(align.sample_count, dt, job.trim_start_ms, job.trim_end_ms)?;
    let t = time_array(last_index - first_index + 1, dt);
    let time_base = TimeBase {
        sampling_interval_s: dt,
        sample_rate_hz: 1.0 / dt,
        samples_total: align.sample_count,
        first_index,
        last_index,
    };
    log::info!(
        "{} channels, {} samples @ {} Hz, keeping {} in [{first_index}, {last_index}]",
        records.len(),
        align.sample_count,
        time_base.sample_rate_hz,
        time_base.kept()
    );
    Ok((time_base, t))
}

/// Inclusive index range left after removing `trim_start_ms` and `trim_end_ms`
/// from a uniform series of `n` samples.
pub fn trim_range(n: usize, dt: f64, trim_start_ms: f64, trim_end_ms: f64) -> Result<(usize, usize)> {
    if n < 2 {
        bail!("At least 2 samples are required, got {n}");
    }
    if !(dt > 0.0 && dt.is_finite()) {
        bail!("Invalid sampling interval {dt} s");
    }
    let total_s = (n - 1) as f64 * dt;
    let start_s = trim_start_ms.max(0.0) * 1e-3;
    let end_s = total_s - trim_end_ms.max(0.0) * 1e-3;
    if start_s >= end_s {
        bail!(
            "Trims of {trim_start_ms} ms + {trim_end_ms} ms leave nothing of {:.3} ms",
            total_s * 1e3
        );
    }

    let first = (start_s / dt - INDEX_SLACK).ceil().max(0.0) as usize;
    let last = ((end_s / dt + INDEX_SLACK).floor() as usize).min(n - 1);
    if last <= first {
        bail!("Trimmed range [{first}, {last}] holds fewer than 2 samples");
    }
    Ok((first, last))
}

fn undersampling(filter: ChannelFilter, sample_rate_hz: f64) -> Option<UndersamplingWarning> {
    match filter {
        ChannelFilter::None => None,
        ChannelFilter::Cfc(class) => FilterSpec::new(class, sample_rate_hz)
            .ok()
            .and_then(|spec| spec.undersampling()),
    }
}

/// Tab-separated matrix, one column per series. Columns must share a length.
fn write_matrix(path: &Path, header: &[&str], columns: &[&[f64]]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    wtr.write_record(header)?;

    let rows = columns.iter().map(|c| c.len()).min().unwrap_or(0);
    let mut row = Vec::with_capacity(columns.len());
    for i in 0..rows {
        row.clear();
        row.extend(columns.iter().map(|c| c[i].to_string()));
        wtr.write_record(&row)?;
    }
    wtr.flush()
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("Wrote {rows} rows to {}", path.display());
    Ok(())
}
