use crate::data::model::ValuesUnit;

/// Standard gravity: 1 g = 9.80665 m/s².
pub const G: f64 = 9.80665;

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// Clamp `v` into `[lo, hi]`.
pub fn clamp<T: PartialOrd>(v: T, lo: T, hi: T) -> T {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

/// Round to a fixed number of decimals.
pub fn round_to(x: f64, decimals: i32) -> f64 {
    let k = 10f64.powi(decimals);
    (x * k).round() / k
}

/// Locale-tolerant number parse.
///
/// Accepts a comma as decimal separator and ignores whitespace inside the
/// number (regular spaces, NBSP, thin spaces). Returns `NaN` for anything that
/// does not parse to a finite value.
pub fn parse_number(s: &str) -> f64 {
    let compact: String = s.trim().chars().filter(|c| !c.is_whitespace()).collect();
    let normalized = compact.replacen(',', ".", 1);
    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => f64::NAN,
    }
}

// ---------------------------------------------------------------------------
// Reductions
// ---------------------------------------------------------------------------

/// Min and max over the finite entries of `values`; `(0, 0)` when there are none.
pub fn min_max(values: &[f64]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values.iter().filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() {
        (min, max)
    } else {
        (0.0, 0.0)
    }
}

/// [`min_max`] across several series. Empty series contribute `(0, 0)`.
pub fn min_max_many(series: &[&[f64]]) -> (f64, f64) {
    if series.is_empty() {
        return (0.0, 0.0);
    }
    series
        .iter()
        .map(|s| min_max(s))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| {
            (lo.min(a), hi.max(b))
        })
}

/// Min and max over the closed index range `[i0, i1]`.
pub fn slice_min_max(values: &[f64], i0: usize, i1: usize) -> (f64, f64) {
    if values.is_empty() || i1 < i0 || i0 >= values.len() {
        return (0.0, 0.0);
    }
    let end = i1.min(values.len() - 1);
    min_max(&values[i0..=end])
}

/// Root mean square of the finite entries; 0 when there are none.
pub fn rms(values: &[f64]) -> f64 {
    let (sum_sq, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), &v| (s + v * v, n + 1));
    if n == 0 {
        0.0
    } else {
        (sum_sq / n as f64).sqrt()
    }
}

/// Which end of the range [`extreme`] looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremeKind {
    Max,
    Min,
}

/// Location and value of an extreme sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extreme {
    pub index: usize,
    pub value: f64,
}

/// Find the max (or min) finite value, optionally restricted by `keep(value, index)`.
///
/// The first occurrence wins on ties.
pub fn extreme<F>(values: &[f64], kind: ExtremeKind, keep: Option<F>) -> Option<Extreme>
where
    F: Fn(f64, usize) -> bool,
{
    let mut best: Option<Extreme> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        if let Some(pred) = &keep {
            if !pred(v, i) {
                continue;
            }
        }
        let better = match (best, kind) {
            (None, _) => true,
            (Some(b), ExtremeKind::Max) => v > b.value,
            (Some(b), ExtremeKind::Min) => v < b.value,
        };
        if better {
            best = Some(Extreme { index: i, value: v });
        }
    }
    best
}

/// Max/min with their indices, plus RMS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSummary {
    pub max: Option<Extreme>,
    pub min: Option<Extreme>,
    pub rms: f64,
}

pub fn series_summary(values: &[f64]) -> SeriesSummary {
    let none: Option<fn(f64, usize) -> bool> = None;
    SeriesSummary {
        max: extreme(values, ExtremeKind::Max, none),
        min: extreme(values, ExtremeKind::Min, none),
        rms: rms(values),
    }
}

// ---------------------------------------------------------------------------
// Search & grids
// ---------------------------------------------------------------------------

/// First index `i` with `sorted[i] >= x`, or `sorted.len()` if there is none.
///
/// `sorted` must be non-decreasing.
pub fn lower_bound(sorted: &[f64], x: f64) -> usize {
    sorted.partition_point(|&v| v < x)
}

/// Uniform time grid `[0, (n-1)·dt]`.
pub fn time_array(n: usize, dt: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 * dt).collect()
}

/// Per-sample Euclidean norm of two or three components.
///
/// Output length is the shortest of the supplied components.
pub fn resultant(ax: &[f64], ay: &[f64], az: Option<&[f64]>) -> Vec<f64> {
    match az {
        Some(az) => ax
            .iter()
            .zip(ay)
            .zip(az)
            .map(|((&x, &y), &z)| (x * x + y * y + z * z).sqrt())
            .collect(),
        None => ax.iter().zip(ay).map(|(&x, &y)| x.hypot(y)).collect(),
    }
}

/// Convert an acceleration series held in g to the requested unit.
pub fn to_accel_units(values_in_g: &[f64], unit: ValuesUnit) -> Vec<f64> {
    match unit {
        ValuesUnit::G => values_in_g.to_vec(),
        ValuesUnit::MetersPerSecondSquared => values_in_g.iter().map(|v| v * G).collect(),
    }
}
