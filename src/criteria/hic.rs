//! Head Injury Criterion.
//!
//! `HIC = Δt · ((1/Δt) ∫[t0, t1] a dt)^2.5` over an admissible window of a
//! resultant head acceleration (in g, time in seconds).
//!
//! Three searches are provided:
//! * [`exact_max_window`] – every window not longer than a maximum length
//!   (15 ms / 36 ms in regulations). Exact.
//! * [`exhaustive_search`] – every window, O(n²).
//! * [`coarse_to_fine_search`] – stride-sampled scan, then local refinement
//!   around the best coarse candidates. Heuristic: not guaranteed to return
//!   the global maximum.
//!
//! [`max_unconstrained`] picks the exhaustive search below
//! [`EXHAUSTIVE_LIMIT`] samples and the heuristic above it.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::math::integrate::{cumulative, segment};
use crate::math::kernel::lower_bound;

/// Below this many samples the unconstrained search is exhaustive.
pub const EXHAUSTIVE_LIMIT: usize = 4000;
/// The coarse grid aims at roughly this many points per axis.
pub const COARSE_POINTS: usize = 2000;
/// Coarse candidates kept for refinement.
pub const TOP_K: usize = 24;
/// Regulatory pass/fail limit.
pub const HIC_LIMIT: f64 = 1000.0;

/// Window lengths are compared with this relative slack to absorb grid rounding.
const WINDOW_REL_TOL: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Best window found by a search. `i1 > i0` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowResult {
    pub best_value: f64,
    pub i0: usize,
    pub i1: usize,
}

/// Interval suggestion handed back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HicSuggestion {
    pub i0: usize,
    pub i1: usize,
    pub hic: f64,
}

impl From<WindowResult> for HicSuggestion {
    fn from(r: WindowResult) -> Self {
        Self {
            i0: r.i0,
            i1: r.i1,
            hic: r.best_value,
        }
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared flag a caller can raise to abort a long search.
///
/// Searches poll it between rows of their scan and return [`Error::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Single-window evaluation
// ---------------------------------------------------------------------------

/// Cumulative integral of `a` over `t`, starting at 0.
pub fn build_prefix(t: &[f64], a: &[f64]) -> Result<Vec<f64>> {
    cumulative(t, a, 0.0)
}

/// HIC of `[i0, i1]` from a prefix integral. `NaN` for empty, reversed,
/// out-of-range or zero-length windows.
pub fn hic_from_prefix(prefix: &[f64], t: &[f64], i0: usize, i1: usize) -> f64 {
    if i1 <= i0 || i1 >= t.len() || i1 >= prefix.len() {
        return f64::NAN;
    }
    let dt = t[i1] - t[i0];
    if !(dt > 0.0) {
        return f64::NAN;
    }
    let mean = (prefix[i1] - prefix[i0]) / dt;
    dt * mean.powf(2.5)
}

/// HIC of `[i0, i1]`, integrating directly unless a prefix is supplied.
/// Same `NaN` rules as [`hic_from_prefix`].
pub fn hic_of_range(t: &[f64], a: &[f64], i0: usize, i1: usize, prefix: Option<&[f64]>) -> f64 {
    if t.is_empty() || a.is_empty() || i1 <= i0 || i1 >= t.len() || i1 >= a.len() {
        return f64::NAN;
    }
    let dt = t[i1] - t[i0];
    if !(dt > 0.0) {
        return f64::NAN;
    }
    let area = segment(t, a, i0, i1, prefix);
    dt * (area / dt).powf(2.5)
}

// ---------------------------------------------------------------------------
// Window-constrained search
// ---------------------------------------------------------------------------

/// Whether a span of `span_sec` fits a maximum window of `max_window_sec`.
pub fn fits_window(span_sec: f64, max_window_sec: f64) -> bool {
    span_sec <= max_window_sec * (1.0 + WINDOW_REL_TOL)
}

/// Exact maximum over windows with `t[i1] - t[i0] <= max_window_sec`.
///
/// Every start index gets at least its one-step window even when that step
/// is longer than the limit.
pub fn exact_max_window(t: &[f64], a: &[f64], max_window_sec: f64) -> Result<Option<WindowResult>> {
    exact_max_window_with(t, a, max_window_sec, &CancelFlag::default())
}

pub fn exact_max_window_with(
    t: &[f64],
    a: &[f64],
    max_window_sec: f64,
    cancel: &CancelFlag,
) -> Result<Option<WindowResult>> {
    if !(max_window_sec > 0.0 && max_window_sec.is_finite()) {
        return Err(Error::invalid(format!(
            "window length must be positive, got {max_window_sec} s"
        )));
    }
    let prefix = build_prefix(t, a)?;
    let n = t.len();
    let slack = max_window_sec * WINDOW_REL_TOL;

    let mut best = Best::default();
    for i0 in 0..n - 1 {
        cancel.check()?;
        // first index past the window, so everything before it fits
        let j = lower_bound(t, t[i0] + max_window_sec + slack);
        let i1_max = j.saturating_sub(1).min(n - 1).max(i0 + 1);
        for i1 in i0 + 1..=i1_max {
            best.offer(hic_from_prefix(&prefix, t, i0, i1), i0, i1);
        }
    }
    Ok(best.into_result())
}

// ---------------------------------------------------------------------------
// Unconstrained search
// ---------------------------------------------------------------------------

/// Maximum HIC over all windows. Exhaustive below [`EXHAUSTIVE_LIMIT`]
/// samples, coarse-to-fine heuristic above.
pub fn max_unconstrained(t: &[f64], a: &[f64]) -> Result<Option<WindowResult>> {
    max_unconstrained_with(t, a, &CancelFlag::default())
}

pub fn max_unconstrained_with(
    t: &[f64],
    a: &[f64],
    cancel: &CancelFlag,
) -> Result<Option<WindowResult>> {
    let prefix = build_prefix(t, a)?;
    if t.len() < EXHAUSTIVE_LIMIT {
        exhaustive_search(&prefix, t, cancel)
    } else {
        coarse_to_fine_search(&prefix, t, cancel)
    }
}

/// Evaluate every `(i0, i1)` pair.
pub fn exhaustive_search(prefix: &[f64], t: &[f64], cancel: &CancelFlag) -> Result<Option<WindowResult>> {
    let n = t.len().min(prefix.len());
    let mut best = Best::default();
    for i0 in 0..n.saturating_sub(1) {
        cancel.check()?;
        for i1 in i0 + 1..n {
            best.offer(hic_from_prefix(prefix, t, i0, i1), i0, i1);
        }
    }
    Ok(best.into_result())
}

/// Stride used by the coarse scan for `n` samples.
pub fn coarse_stride(n: usize) -> usize {
    (n / COARSE_POINTS).max(1)
}

/// Coarse scan on a stride grid, keep the [`TOP_K`] best windows, then search
/// exhaustively within `2 × stride` of each of them.
///
/// Heuristic: a maximum that no coarse candidate lands near is missed.
pub fn coarse_to_fine_search(
    prefix: &[f64],
    t: &[f64],
    cancel: &CancelFlag,
) -> Result<Option<WindowResult>> {
    let n = t.len().min(prefix.len());
    if n < 2 {
        return Ok(None);
    }
    let stride = coarse_stride(n);

    let candidates = coarse_scan(prefix, t, n, stride, cancel)?.into_ranked();
    if candidates.is_empty() {
        return Ok(None);
    }
    log::debug!(
        "HIC coarse scan: n={n}, stride={stride}, {} candidates, best coarse {:.3}",
        candidates.len(),
        candidates[0].value
    );

    let radius = 2 * stride;
    let best = refine(prefix, t, n, radius, &candidates, cancel)?;
    if let Some(b) = &best {
        log::debug!("HIC refined: {:.3} on [{}, {}]", b.best_value, b.i0, b.i1);
    }
    Ok(best)
}

fn coarse_row(prefix: &[f64], t: &[f64], n: usize, stride: usize, i0: usize, top: &mut TopK) {
    for i1 in (i0 + 1..n).step_by(stride) {
        let value = hic_from_prefix(prefix, t, i0, i1);
        if value.is_finite() {
            top.offer(Candidate { value, i0, i1 });
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn coarse_scan(prefix: &[f64], t: &[f64], n: usize, stride: usize, cancel: &CancelFlag) -> Result<TopK> {
    coarse_scan_sequential(prefix, t, n, stride, cancel)
}

#[cfg(feature = "parallel")]
fn coarse_scan(prefix: &[f64], t: &[f64], n: usize, stride: usize, cancel: &CancelFlag) -> Result<TopK> {
    coarse_scan_parallel(prefix, t, n, stride, cancel)
}

#[cfg_attr(feature = "parallel", allow(dead_code))]
fn coarse_scan_sequential(
    prefix: &[f64],
    t: &[f64],
    n: usize,
    stride: usize,
    cancel: &CancelFlag,
) -> Result<TopK> {
    let mut top = TopK::new(TOP_K);
    for i0 in (0..n - 1).step_by(stride) {
        cancel.check()?;
        coarse_row(prefix, t, n, stride, i0, &mut top);
    }
    Ok(top)
}

#[cfg(feature = "parallel")]
fn coarse_scan_parallel(
    prefix: &[f64],
    t: &[f64],
    n: usize,
    stride: usize,
    cancel: &CancelFlag,
) -> Result<TopK> {
    use rayon::prelude::*;

    let rows: Vec<usize> = (0..n - 1).step_by(stride).collect();
    let top = rows
        .par_iter()
        .fold(
            || TopK::new(TOP_K),
            |mut top, &i0| {
                if !cancel.is_cancelled() {
                    coarse_row(prefix, t, n, stride, i0, &mut top);
                }
                top
            },
        )
        .reduce(|| TopK::new(TOP_K), TopK::merge);
    cancel.check()?;
    Ok(top)
}

/// Best window within `radius` of a candidate, first strictly larger value wins.
fn refine_one(prefix: &[f64], t: &[f64], n: usize, radius: usize, c: &Candidate) -> Best {
    let i0_lo = c.i0.saturating_sub(radius).min(n - 2);
    let i0_hi = (c.i0 + radius).min(n - 2);
    let i1_lo = c.i1.saturating_sub(radius).max(1);
    let i1_hi = (c.i1 + radius).min(n - 1);

    let mut best = Best::default();
    for i0 in i0_lo..=i0_hi {
        for i1 in i1_lo.max(i0 + 1)..=i1_hi {
            best.offer(hic_from_prefix(prefix, t, i0, i1), i0, i1);
        }
    }
    best
}

#[cfg(not(feature = "parallel"))]
fn refine(
    prefix: &[f64],
    t: &[f64],
    n: usize,
    radius: usize,
    candidates: &[Candidate],
    cancel: &CancelFlag,
) -> Result<Option<WindowResult>> {
    refine_sequential(prefix, t, n, radius, candidates, cancel)
}

#[cfg(feature = "parallel")]
fn refine(
    prefix: &[f64],
    t: &[f64],
    n: usize,
    radius: usize,
    candidates: &[Candidate],
    cancel: &CancelFlag,
) -> Result<Option<WindowResult>> {
    refine_parallel(prefix, t, n, radius, candidates, cancel)
}

#[cfg_attr(feature = "parallel", allow(dead_code))]
fn refine_sequential(
    prefix: &[f64],
    t: &[f64],
    n: usize,
    radius: usize,
    candidates: &[Candidate],
    cancel: &CancelFlag,
) -> Result<Option<WindowResult>> {
    let mut best = Best::default();
    for c in candidates {
        cancel.check()?;
        best.absorb(refine_one(prefix, t, n, radius, c));
    }
    Ok(best.into_result())
}

#[cfg(feature = "parallel")]
fn refine_parallel(
    prefix: &[f64],
    t: &[f64],
    n: usize,
    radius: usize,
    candidates: &[Candidate],
    cancel: &CancelFlag,
) -> Result<Option<WindowResult>> {
    use rayon::prelude::*;

    // rank keeps the reduction identical to the sequential pass
    let best = candidates
        .par_iter()
        .enumerate()
        .filter(|_| !cancel.is_cancelled())
        .filter_map(|(rank, c)| refine_one(prefix, t, n, radius, c).into_result().map(|r| (rank, r)))
        .reduce_with(|a, b| {
            let b_wins = b.1.best_value > a.1.best_value
                || (b.1.best_value == a.1.best_value && b.0 < a.0);
            if b_wins {
                b
            } else {
                a
            }
        });
    cancel.check()?;
    Ok(best.map(|(_, r)| r))
}

// ---------------------------------------------------------------------------
// Host helpers
// ---------------------------------------------------------------------------

/// Best interval for the host: constrained to `window_ms` when it is a
/// positive number, unconstrained otherwise. `None` on invalid input.
pub fn suggest_best_interval(t: &[f64], a: &[f64], window_ms: Option<f64>) -> Option<HicSuggestion> {
    if t.len() < 2 || t.len() != a.len() {
        return None;
    }
    let result = match window_ms.filter(|w| w.is_finite() && *w > 0.0) {
        Some(ms) => exact_max_window(t, a, ms * 1e-3),
        None => max_unconstrained(t, a),
    };
    match result {
        Ok(found) => found.map(HicSuggestion::from),
        Err(e) => {
            log::debug!("no HIC suggestion: {e}");
            None
        }
    }
}

/// Regulatory maximum window lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HicWindow {
    Hic15,
    Hic36,
}

impl HicWindow {
    pub fn millis(self) -> f64 {
        match self {
            HicWindow::Hic15 => 15.0,
            HicWindow::Hic36 => 36.0,
        }
    }

    /// Whether a window of `dt_sec` seconds is admissible, with the same
    /// tolerance [`exact_max_window`] applies.
    pub fn admits(self, dt_sec: f64) -> bool {
        fits_window(dt_sec, self.millis() * 1e-3)
    }
}

/// HIC of a user-selected range with admissibility and pass/fail flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HicAssessment {
    pub i0: usize,
    pub i1: usize,
    pub t0: f64,
    pub t1: f64,
    pub hic: f64,
    pub hic15_admissible: bool,
    pub hic36_admissible: bool,
    pub passes: bool,
}

impl HicAssessment {
    /// Assess the range between two selection indices in either order.
    /// Indices past the end are clamped. `None` when there is no data.
    pub fn evaluate(t: &[f64], a: &[f64], sel_a: usize, sel_b: usize) -> Option<Self> {
        let n = t.len().min(a.len());
        if n == 0 {
            return None;
        }
        let i0 = sel_a.min(sel_b).min(n - 1);
        let i1 = sel_a.max(sel_b).min(n - 1);
        let hic = hic_of_range(t, a, i0, i1, None);
        let dt = t[i1] - t[i0];
        Some(Self {
            i0,
            i1,
            t0: t[i0],
            t1: t[i1],
            hic,
            hic15_admissible: HicWindow::Hic15.admits(dt),
            hic36_admissible: HicWindow::Hic36.admits(dt),
            passes: hic.is_finite() && hic <= HIC_LIMIT,
        })
    }
}

// ---------------------------------------------------------------------------
// Search bookkeeping
// ---------------------------------------------------------------------------

/// Running maximum; only a strictly larger value replaces the current best.
#[derive(Debug, Clone, Copy)]
struct Best {
    value: f64,
    i0: usize,
    i1: usize,
    found: bool,
}

impl Default for Best {
    fn default() -> Self {
        Self {
            value: f64::NEG_INFINITY,
            i0: 0,
            i1: 0,
            found: false,
        }
    }
}

impl Best {
    fn offer(&mut self, value: f64, i0: usize, i1: usize) {
        if value > self.value {
            *self = Best {
                value,
                i0,
                i1,
                found: true,
            };
        }
    }

    fn absorb(&mut self, other: Best) {
        if other.found {
            self.offer(other.value, other.i0, other.i1);
        }
    }

    fn into_result(self) -> Option<WindowResult> {
        self.found.then_some(WindowResult {
            best_value: self.value,
            i0: self.i0,
            i1: self.i1,
        })
    }
}

/// Coarse window candidate. Ordered by value, then earlier window first, so
/// the retained set does not depend on scan order.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    value: f64,
    i0: usize,
    i1: usize,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then_with(|| (other.i0, other.i1).cmp(&(self.i0, self.i1)))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Fixed-capacity min-heap keeping the `cap` best candidates.
#[derive(Debug)]
struct TopK {
    cap: usize,
    heap: BinaryHeap<Reverse<Candidate>>,
}

impl TopK {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            heap: BinaryHeap::with_capacity(cap + 1),
        }
    }

    fn offer(&mut self, c: Candidate) {
        if self.heap.len() < self.cap {
            self.heap.push(Reverse(c));
        } else if let Some(mut worst) = self.heap.peek_mut() {
            if c > worst.0 {
                *worst = Reverse(c);
            }
        }
    }

    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    fn merge(mut self, other: TopK) -> TopK {
        for Reverse(c) in other.heap {
            self.offer(c);
        }
        self
    }

    /// Retained candidates, best first.
    fn into_ranked(self) -> Vec<Candidate> {
        let mut v: Vec<Candidate> = self.heap.into_iter().map(|Reverse(c)| c).collect();
        v.sort_by(|a, b| b.cmp(a));
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pulse_record() -> (Vec<f64>, Vec<f64>) {
        let t: Vec<f64> = (0..=20).map(|i| i as f64 * 0.001).collect();
        let a: Vec<f64> = (0..=20)
            .map(|i| if (5..=15).contains(&i) { 50.0 } else { 0.0 })
            .collect();
        (t, a)
    }

    fn half_sine(n: usize, dt: f64, start: usize, len: usize, peak: f64) -> (Vec<f64>, Vec<f64>) {
        let t: Vec<f64> = (0..n).map(|i| i as f64 * dt).collect();
        let a = (0..n)
            .map(|i| {
                if i >= start && i <= start + len {
                    peak * (std::f64::consts::PI * (i - start) as f64 / len as f64).sin().max(0.0)
                } else {
                    0.0
                }
            })
            .collect();
        (t, a)
    }

    #[test]
    fn degenerate_ranges_are_nan() {
        let (t, a) = pulse_record();
        assert!(hic_of_range(&t, &a, 7, 7, None).is_nan());
        assert!(hic_of_range(&t, &a, 9, 3, None).is_nan());
        assert!(hic_of_range(&t, &a, 0, 99, None).is_nan());
        assert!(hic_of_range(&[], &[], 0, 1, None).is_nan());
        // non-positive span
        let flat_t = [0.0, 0.0, 0.0];
        assert!(hic_of_range(&flat_t, &[1.0, 1.0, 1.0], 0, 2, None).is_nan());
        let prefix = build_prefix(&t, &a).unwrap();
        assert!(hic_from_prefix(&prefix, &t, 4, 4).is_nan());
    }

    #[test]
    fn range_with_and_without_prefix_agree() {
        let (t, a) = half_sine(200, 1e-4, 20, 150, 80.0);
        let prefix = build_prefix(&t, &a).unwrap();
        let direct = hic_of_range(&t, &a, 40, 120, None);
        let fast = hic_of_range(&t, &a, 40, 120, Some(prefix.as_slice()));
        assert_relative_eq!(direct, fast, max_relative = 1e-12);
        assert_relative_eq!(fast, hic_from_prefix(&prefix, &t, 40, 120), max_relative = 1e-12);
    }

    #[test]
    fn rectangular_pulse_hic15() {
        let (t, a) = pulse_record();
        let s = suggest_best_interval(&t, &a, Some(15.0)).unwrap();
        assert_eq!((s.i0, s.i1), (5, 15));
        // closed form for a rectangular pulse: T · A^2.5
        let closed_form = 0.010 * 50f64.powf(2.5);
        assert_relative_eq!(s.hic, closed_form, max_relative = 1e-9);

        let free = suggest_best_interval(&t, &a, None).unwrap();
        assert_eq!((free.i0, free.i1), (5, 15));
    }

    #[test]
    fn window_limit_is_respected() {
        let (t, a) = half_sine(400, 1e-4, 50, 300, 60.0);
        let r = exact_max_window(&t, &a, 0.015).unwrap().unwrap();
        assert!(r.i1 > r.i0);
        assert!(t[r.i1] - t[r.i0] <= 0.015 + 1e-12);
        let wide = exact_max_window(&t, &a, 0.036).unwrap().unwrap();
        assert!(wide.best_value >= r.best_value);
    }

    #[test]
    fn short_window_still_gets_one_step() {
        let t = [0.0, 0.01, 0.02];
        let a = [10.0, 10.0, 10.0];
        let r = exact_max_window(&t, &a, 0.001).unwrap().unwrap();
        assert_eq!(r.i1, r.i0 + 1);
    }

    #[test]
    fn tiny_window_on_offset_axis() {
        // t[0] + window rounds back to t[0]
        let t = [1.0, 1.001, 1.002, 1.003];
        let r = exact_max_window(&t, &[10.0; 4], 1e-17).unwrap().unwrap();
        assert_eq!(r.i1, r.i0 + 1);
        assert_relative_eq!(r.best_value, 0.001 * 10f64.powf(2.5), max_relative = 1e-9);
    }

    #[test]
    fn suggested_hic15_window_is_admissible() {
        for dt in [1e-4, 5e-5, 1.25e-4] {
            for start in [0usize, 37, 113] {
                let t: Vec<f64> = (0..700).map(|i| i as f64 * dt).collect();
                let a: Vec<f64> = (0..700)
                    .map(|i| if i >= start && i < start + 500 { 50.0 } else { 0.0 })
                    .collect();
                let s = suggest_best_interval(&t, &a, Some(15.0)).unwrap();
                assert!(fits_window(t[s.i1] - t[s.i0], 0.015));
                let assessment = HicAssessment::evaluate(&t, &a, s.i0, s.i1).unwrap();
                assert!(assessment.hic15_admissible, "dt={dt} start={start} [{}, {}]", s.i0, s.i1);
                assert!(assessment.hic36_admissible);
            }
        }
    }

    #[test]
    fn admissibility_tolerates_grid_rounding() {
        let just_over = f64::from_bits(0.015f64.to_bits() + 4);
        assert!(just_over > 0.015);
        assert!(HicWindow::Hic15.admits(just_over));
        assert!(HicWindow::Hic15.admits(0.015));
        assert!(!HicWindow::Hic15.admits(0.0151));
        assert!(HicWindow::Hic36.admits(0.0151));
        assert!(!HicWindow::Hic36.admits(0.037));
    }

    #[test]
    fn invalid_input() {
        assert!(suggest_best_interval(&[0.0, 1.0], &[1.0], None).is_none());
        assert!(suggest_best_interval(&[0.0], &[1.0], Some(15.0)).is_none());
        assert!(matches!(
            exact_max_window(&[0.0, 1.0], &[1.0, 1.0], 0.0),
            Err(Error::InvalidInput(_))
        ));
        assert!(max_unconstrained(&[0.0, 1.0, 1.0], &[1.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn all_negative_signal_has_no_window() {
        let t = [0.0, 0.001, 0.002, 0.003];
        let a = [-5.0, -5.0, -5.0, -5.0];
        assert!(max_unconstrained(&t, &a).unwrap().is_none());
        assert!(suggest_best_interval(&t, &a, Some(15.0)).is_none());
    }

    #[test]
    fn exhaustive_and_coarse_to_fine_agree_below_limit() {
        let (t, a) = half_sine(900, 1e-4, 100, 600, 70.0);
        let prefix = build_prefix(&t, &a).unwrap();
        let cancel = CancelFlag::new();
        let exact = exhaustive_search(&prefix, &t, &cancel).unwrap().unwrap();
        let heuristic = coarse_to_fine_search(&prefix, &t, &cancel).unwrap().unwrap();
        assert_relative_eq!(exact.best_value, heuristic.best_value, max_relative = 1e-9);
        assert_eq!(max_unconstrained(&t, &a).unwrap(), Some(exact));
    }

    #[test]
    fn coarse_to_fine_close_to_exhaustive_above_limit() {
        let (t, a) = half_sine(5000, 1e-4, 1000, 2000, 80.0);
        let prefix = build_prefix(&t, &a).unwrap();
        let cancel = CancelFlag::new();
        assert_eq!(coarse_stride(t.len()), 2);
        let exact = exhaustive_search(&prefix, &t, &cancel).unwrap().unwrap();
        let heuristic = max_unconstrained(&t, &a).unwrap().unwrap();
        assert!(heuristic.best_value <= exact.best_value);
        assert_relative_eq!(exact.best_value, heuristic.best_value, max_relative = 1e-5);
    }

    #[test]
    fn cancelled_search_stops() {
        let (t, a) = half_sine(4500, 1e-4, 500, 3000, 50.0);
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert_eq!(max_unconstrained_with(&t, &a, &cancel), Err(Error::Cancelled));
        assert_eq!(
            exact_max_window_with(&t, &a, 0.015, &cancel),
            Err(Error::Cancelled)
        );
    }

    #[test]
    fn top_k_keeps_largest() {
        let mut top = TopK::new(3);
        for (i, v) in [5.0, 1.0, 9.0, 7.0, 3.0, 9.0].iter().enumerate() {
            top.offer(Candidate {
                value: *v,
                i0: i,
                i1: i + 1,
            });
        }
        let ranked = top.into_ranked();
        let values: Vec<f64> = ranked.iter().map(|c| c.value).collect();
        assert_eq!(values, vec![9.0, 9.0, 7.0]);
        // equal values: earlier window ranks first
        assert_eq!(ranked[0].i0, 2);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_matches_sequential() {
        let (t, a) = half_sine(6000, 1e-4, 1500, 2500, 90.0);
        let prefix = build_prefix(&t, &a).unwrap();
        let n = t.len();
        let stride = coarse_stride(n);
        let cancel = CancelFlag::new();
        let seq = coarse_scan_sequential(&prefix, &t, n, stride, &cancel).unwrap().into_ranked();
        let par = coarse_scan_parallel(&prefix, &t, n, stride, &cancel).unwrap().into_ranked();
        assert_eq!(seq, par);
        let r_seq = refine_sequential(&prefix, &t, n, 2 * stride, &seq, &cancel).unwrap();
        let r_par = refine_parallel(&prefix, &t, n, 2 * stride, &par, &cancel).unwrap();
        assert_eq!(r_seq, r_par);
    }

    #[test]
    fn assessment_flags() {
        let (t, a) = pulse_record();
        let s = HicAssessment::evaluate(&t, &a, 15, 5).unwrap();
        assert_eq!((s.i0, s.i1), (5, 15));
        assert!(s.hic15_admissible && s.hic36_admissible);
        assert!(s.passes);
        let long = HicAssessment::evaluate(&t, &a, 0, 20).unwrap();
        assert!(!long.hic15_admissible);
        assert!(HicWindow::Hic36.admits(0.036));
    }
}
