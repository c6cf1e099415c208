//! Synthetic acceleration pulse from keyframes.
//!
//! ```text
//! generate-signal [-o FILE] [--select T1:T2] <dt> <linear|step> <g|mps2> [t:a ...]
//! ```
//!
//! Keyframe accelerations are in g. The pulse is resampled on a uniform grid,
//! integrated twice in m/s², and written as a TSV with columns
//! `time_s`, `accel_<unit>`, `vel_mps`, `pos_m`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};

use injury_lab::data::model::ValuesUnit;
use injury_lab::math::integrate::{cumulative, resample, segment, Shape};
use injury_lab::math::kernel::{lower_bound, parse_number, series_summary, slice_min_max, to_accel_units};

/// Used when no keyframes are given.
const DEFAULT_KEYFRAMES: [(f64, f64); 4] = [(0.0, 0.0), (0.5, 1.0), (0.8, -0.5), (1.0, 0.0)];

struct Args {
    dt: f64,
    shape: Shape,
    unit: ValuesUnit,
    keyframes: Vec<(f64, f64)>,
    select: Option<(f64, f64)>,
    output: PathBuf,
}

fn parse_pair(s: &str) -> Result<(f64, f64)> {
    let (a, b) = s
        .split_once(':')
        .with_context(|| format!("expected 'a:b', got '{s}'"))?;
    let (a, b) = (parse_number(a), parse_number(b));
    if !(a.is_finite() && b.is_finite()) {
        bail!("invalid number in '{s}'");
    }
    Ok((a, b))
}

fn parse_unit(s: &str) -> Result<ValuesUnit> {
    match s.trim().to_ascii_lowercase().as_str() {
        "g" => Ok(ValuesUnit::G),
        "mps2" | "m/s2" | "m/s²" => Ok(ValuesUnit::MetersPerSecondSquared),
        other => bail!("unknown unit '{other}' (g or mps2)"),
    }
}

fn parse_args() -> Result<Args> {
    let mut output = PathBuf::from("signal.txt");
    let mut select = None;
    let mut positional = Vec::new();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-o" | "--output" => output = it.next().context("missing value for -o")?.into(),
            "--select" => {
                let v = it.next().context("missing value for --select")?;
                select = Some(parse_pair(&v).context("--select")?);
            }
            _ => positional.push(arg),
        }
    }
    if positional.len() < 3 {
        bail!("usage: generate-signal [-o FILE] [--select T1:T2] <dt> <linear|step> <g|mps2> [t:a ...]");
    }

    let dt = parse_number(&positional[0]);
    if !(dt > 0.0) {
        bail!("dt must be a positive number, got '{}'", positional[0]);
    }
    let shape: Shape = positional[1].parse()?;
    let unit = parse_unit(&positional[2])?;

    let mut keyframes = positional[3..]
        .iter()
        .enumerate()
        .map(|(i, s)| parse_pair(s).with_context(|| format!("keyframe {}", i + 1)))
        .collect::<Result<Vec<_>>>()?;
    if keyframes.is_empty() {
        keyframes = DEFAULT_KEYFRAMES.to_vec();
    } else if keyframes.len() < 2 {
        bail!("at least two keyframes (t:a) are required");
    }

    Ok(Args {
        dt,
        shape,
        unit,
        keyframes,
        select,
        output,
    })
}

fn run() -> Result<()> {
    let args = parse_args()?;
    let (times, accels): (Vec<f64>, Vec<f64>) = args.keyframes.iter().copied().unzip();

    let series = resample(&times, &accels, args.dt, args.shape)?;
    let t = series.t();
    let a_g = series.values();
    let a_out = to_accel_units(a_g, args.unit);
    let a_mps2 = to_accel_units(a_g, ValuesUnit::MetersPerSecondSquared);
    let v = cumulative(t, &a_mps2, 0.0)?;
    let x = cumulative(t, &v, 0.0)?;

    let summary = series_summary(&a_out);
    if let (Some(max), Some(min)) = (summary.max, summary.min) {
        log::info!(
            "{} samples, accel max {:.3} @ {:.5} s, min {:.3} @ {:.5} s, RMS {:.3} {}",
            t.len(),
            max.value,
            t[max.index],
            min.value,
            t[min.index],
            summary.rms,
            args.unit.label()
        );
    }

    if let Some((t1, t2)) = args.select {
        let last = t.len() - 1;
        let i0 = lower_bound(t, t1.min(t2)).min(last);
        let i1 = lower_bound(t, t1.max(t2)).min(last);
        let dv = segment(t, &a_mps2, i0, i1, Some(v.as_slice()));
        let dx = segment(t, &v, i0, i1, Some(x.as_slice()));
        let (amin, amax) = slice_min_max(&a_out, i0, i1);
        let (vmin, vmax) = slice_min_max(&v, i0, i1);
        let (xmin, xmax) = slice_min_max(&x, i0, i1);
        println!("selection: t1={:.5} s, t2={:.5} s, Δt={:.5} s", t[i0], t[i1], t[i1] - t[i0]);
        println!("  Δv = {dv:.5} m/s, Δx = {dx:.5} m");
        println!("  accel min/max: {amin:.3} / {amax:.3} {}", args.unit.label());
        println!("  vel min/max:   {vmin:.5} / {vmax:.5} m/s");
        println!("  pos min/max:   {xmin:.5} / {xmax:.5} m");
    }

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let accel_col = format!("accel_{}", args.unit.label());
    wtr.write_record(["time_s", accel_col.as_str(), "vel_mps", "pos_m"])?;
    for i in 0..t.len() {
        wtr.write_record([
            format!("{:.5}", t[i]),
            format!("{:.3}", a_out[i]),
            format!("{:.5}", v[i]),
            format!("{:.5}", x[i]),
        ])?;
    }
    wtr.flush()?;

    println!(
        "Wrote {} samples to {} (final velocity {:.5} m/s, displacement {:.5} m)",
        t.len(),
        args.output.display(),
        v[v.len() - 1],
        x[x.len() - 1]
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("generate-signal failed: {e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
