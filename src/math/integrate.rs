use serde::{Deserialize, Serialize};

use super::kernel::round_to;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Time series
// ---------------------------------------------------------------------------

/// Ordered `(t, value)` samples with strictly increasing `t` and at least two points.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    t: Vec<f64>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(t: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        check_pairs(&t, &values)?;
        Ok(Self { t, values })
    }

    /// Series on the grid `[0, (n-1)·dt]`.
    pub fn uniform(values: Vec<f64>, dt: f64) -> Result<Self> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(Error::invalid("sampling interval must be positive"));
        }
        let t = super::kernel::time_array(values.len(), dt);
        Self::new(t, values)
    }

    pub fn t(&self) -> &[f64] {
        &self.t
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    /// Always false: construction requires at least two samples.
    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.t[self.t.len() - 1] - self.t[0]
    }
}

fn check_pairs(t: &[f64], y: &[f64]) -> Result<()> {
    if t.len() != y.len() {
        return Err(Error::invalid(format!(
            "time has {} samples but values has {}",
            t.len(),
            y.len()
        )));
    }
    if t.len() < 2 {
        return Err(Error::invalid("at least two points are required"));
    }
    assert_strictly_increasing(t)
}

/// Fails unless `t[0] < t[1] < ... < t[n-1]`.
pub fn assert_strictly_increasing(t: &[f64]) -> Result<()> {
    match t.windows(2).position(|w| !(w[1] > w[0])) {
        Some(i) => Err(Error::invalid(format!(
            "times must be strictly increasing (t[{}] = {} after {})",
            i + 1,
            t[i + 1],
            t[i]
        ))),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Trapezoid rule
// ---------------------------------------------------------------------------

/// Running trapezoid integral: `F[0] = y0`, `F[i] = y0 + ∫[t0, ti] y dτ`.
pub fn cumulative(t: &[f64], y: &[f64], y0: f64) -> Result<Vec<f64>> {
    check_pairs(t, y)?;
    Ok(cumulative_unchecked(t, y, y0))
}

pub(crate) fn cumulative_unchecked(t: &[f64], y: &[f64], y0: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(y.len());
    let mut acc = y0;
    out.push(acc);
    for i in 1..y.len() {
        acc += 0.5 * (y[i] + y[i - 1]) * (t[i] - t[i - 1]);
        out.push(acc);
    }
    out
}

/// Integral over `[t[i0], t[i1]]`.
///
/// With a cumulative `prefix` (from [`cumulative`]) this is a single
/// subtraction; otherwise the trapezoids are summed directly. Returns 0 when
/// `i1 <= i0`. Indices past the end are clamped.
pub fn segment(t: &[f64], y: &[f64], i0: usize, i1: usize, prefix: Option<&[f64]>) -> f64 {
    if i1 <= i0 {
        return 0.0;
    }
    if let Some(f) = prefix {
        let last = f.len().saturating_sub(1);
        return f[i1.min(last)] - f[i0.min(last)];
    }
    let end = i1.min(t.len().min(y.len()).saturating_sub(1));
    ((i0 + 1)..=end)
        .map(|i| 0.5 * (y[i] + y[i - 1]) * (t[i] - t[i - 1]))
        .sum()
}

// ---------------------------------------------------------------------------
// Resampling
// ---------------------------------------------------------------------------

/// How values between keyframes are reconstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// Piecewise-linear interpolation.
    #[default]
    Linear,
    /// Hold the last keyframe value.
    Step,
}

impl std::str::FromStr for Shape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Shape::Linear),
            "step" => Ok(Shape::Step),
            other => Err(Error::invalid(format!("unknown shape '{other}'"))),
        }
    }
}

/// Grid points closer than this to the end are dropped in favour of `tEnd`.
const GRID_EPS: f64 = 1e-12;

/// Resample keyframes onto a uniform grid of step `dt`.
///
/// The grid runs from the first to the last keyframe time; the final grid
/// point is always exactly the last keyframe time, so the grid is never cut
/// short when the span is not a multiple of `dt`.
pub fn resample(times: &[f64], values: &[f64], dt: f64, shape: Shape) -> Result<TimeSeries> {
    check_pairs(times, values)?;
    if !(dt > 0.0 && dt.is_finite()) {
        return Err(Error::invalid("dt must be positive"));
    }

    let t0 = times[0];
    let t_end = times[times.len() - 1];

    let mut t = Vec::new();
    let mut k = 0usize;
    loop {
        let x = t0 + k as f64 * dt;
        if x >= t_end - GRID_EPS {
            break;
        }
        t.push(round_to(x, 12));
        k += 1;
    }
    t.push(round_to(t_end, 12));

    let last = times.len() - 1;
    let mut j = 0usize;
    let y = t
        .iter()
        .map(|&tk| {
            while j < last && tk >= times[j + 1] {
                j += 1;
            }
            match shape {
                Shape::Step => values[j],
                Shape::Linear if j == last => values[j],
                Shape::Linear => {
                    let frac = (tk - times[j]) / (times[j + 1] - times[j]);
                    values[j] + (values[j + 1] - values[j]) * frac
                }
            }
        })
        .collect();

    TimeSeries::new(t, y)
}
