use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::kernel::clamp;

/// SAE J211 convention: cutoff frequency = 1.65 × CFC class.
pub const CUTOFF_RATIO: f64 = 1.65;

/// Quality factors of the two cascaded low-pass sections.
pub const SECTION_Q: [f64; 2] = [0.5411961, 1.306563];

/// Below `MIN_RATE_FACTOR × cutoff` the channel is considered undersampled.
pub const MIN_RATE_FACTOR: f64 = 10.0;

const MIN_PAD: usize = 2;
const MAX_PAD: usize = 24;

// ---------------------------------------------------------------------------
// Filter specification
// ---------------------------------------------------------------------------

/// A CFC class applied at a given sampling rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    cfc_class: f64,
    sample_rate_hz: f64,
}

impl FilterSpec {
    pub fn new(cfc_class: f64, sample_rate_hz: f64) -> Result<Self> {
        if !(sample_rate_hz > 0.0 && sample_rate_hz.is_finite()) {
            return Err(Error::invalid(format!("invalid sampling rate {sample_rate_hz} Hz")));
        }
        if !(cfc_class > 0.0 && cfc_class.is_finite()) {
            return Err(Error::invalid(format!("CFC class must be positive, got {cfc_class}")));
        }
        Ok(Self {
            cfc_class,
            sample_rate_hz,
        })
    }

    pub fn cfc_class(&self) -> f64 {
        self.cfc_class
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    pub fn cutoff_hz(&self) -> f64 {
        CUTOFF_RATIO * self.cfc_class
    }

    /// Sampling rate below which the response may not meet the class corridor.
    pub fn min_sample_rate_hz(&self) -> f64 {
        MIN_RATE_FACTOR * self.cutoff_hz()
    }

    pub fn undersampling(&self) -> Option<UndersamplingWarning> {
        let required_hz = self.min_sample_rate_hz();
        (self.sample_rate_hz < required_hz).then_some(UndersamplingWarning {
            cfc_class: self.cfc_class,
            sample_rate_hz: self.sample_rate_hz,
            required_hz,
        })
    }

    /// The two low-pass sections, in application order.
    pub fn sections(&self) -> [BiquadCoeffs; 2] {
        SECTION_Q.map(|q| BiquadCoeffs::lowpass(self.cutoff_hz(), self.sample_rate_hz, q))
    }
}

/// Informational: the sampling rate is low for the requested class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UndersamplingWarning {
    pub cfc_class: f64,
    pub sample_rate_hz: f64,
    pub required_hz: f64,
}

impl fmt::Display for UndersamplingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CFC{} expects fs >= {:.0} Hz (got {} Hz); results may not meet the class corridor",
            self.cfc_class, self.required_hz, self.sample_rate_hz
        )
    }
}

// ---------------------------------------------------------------------------
// Biquad section
// ---------------------------------------------------------------------------

/// Second-order section normalized so that a0 = 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Bilinear-transform low-pass design for cutoff `fc` at rate `fs`.
    pub fn lowpass(fc: f64, fs: f64, q: f64) -> Self {
        let w0 = 2.0 * std::f64::consts::PI * (fc / fs);
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let b0 = (1.0 - cos_w0) / 2.0;
        let b1 = 1.0 - cos_w0;
        let b2 = (1.0 - cos_w0) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Gain at DC, `H(z = 1)`.
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Run the section forward from a zero state (direct form I).
    pub fn run(&self, x: &[f64]) -> Vec<f64> {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
        x.iter()
            .map(|&xn| {
                let yn = self.b0 * xn + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
                x2 = x1;
                x1 = xn;
                y2 = y1;
                y1 = yn;
                yn
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Zero-phase CFC filter
// ---------------------------------------------------------------------------

/// Zero-phase CFC low-pass filter. Output has the input's length.
///
/// Both sections run forward over a reflect-padded copy, the result is
/// reversed and run through both sections again, then reversed back and the
/// padding removed. Undersampling is logged, not rejected.
pub fn cfc_filter(samples: &[f64], sample_rate_hz: f64, cfc_class: f64) -> Result<Vec<f64>> {
    let spec = FilterSpec::new(cfc_class, sample_rate_hz)?;
    if let Some(i) = samples.iter().position(|v| !v.is_finite()) {
        return Err(Error::invalid(format!("sample {i} is not a finite number")));
    }
    if let Some(w) = spec.undersampling() {
        log::warn!("{w}");
    }
    Ok(apply(&spec, samples))
}

/// [`cfc_filter`] for an already validated spec.
pub fn apply(spec: &FilterSpec, samples: &[f64]) -> Vec<f64> {
    let sections = spec.sections();
    let pad = pad_len(samples.len());
    let padded = reflect_pad(samples, pad);

    let mut y = sections.iter().fold(padded, |acc, s| s.run(&acc));
    y.reverse();
    let mut y = sections.iter().fold(y, |acc, s| s.run(&acc));
    y.reverse();

    y.drain(..pad);
    y.truncate(samples.len());
    y
}

/// Pad length used on each end: `clamp(n / 10, 2, 24)`, never more than `n`.
pub fn pad_len(n: usize) -> usize {
    clamp(n / 10, MIN_PAD, MAX_PAD).min(n)
}

/// Mirror the first and last `m` samples around the ends.
fn reflect_pad(x: &[f64], m: usize) -> Vec<f64> {
    let m = m.min(x.len());
    let mut out = Vec::with_capacity(x.len() + 2 * m);
    out.extend(x[..m].iter().rev());
    out.extend_from_slice(x);
    out.extend(x[x.len() - m..].iter().rev());
    out
}

pub fn cfc60_filter(samples: &[f64], sample_rate_hz: f64) -> Result<Vec<f64>> {
    cfc_filter(samples, sample_rate_hz, CfcPreset::Cfc60.class())
}

pub fn cfc180_filter(samples: &[f64], sample_rate_hz: f64) -> Result<Vec<f64>> {
    cfc_filter(samples, sample_rate_hz, CfcPreset::Cfc180.class())
}

pub fn cfc600_filter(samples: &[f64], sample_rate_hz: f64) -> Result<Vec<f64>> {
    cfc_filter(samples, sample_rate_hz, CfcPreset::Cfc600.class())
}

pub fn cfc1000_filter(samples: &[f64], sample_rate_hz: f64) -> Result<Vec<f64>> {
    cfc_filter(samples, sample_rate_hz, CfcPreset::Cfc1000.class())
}

// ---------------------------------------------------------------------------
// Presets & host selection
// ---------------------------------------------------------------------------

/// Channel classes in common use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CfcPreset {
    Cfc60,
    Cfc180,
    Cfc600,
    Cfc1000,
}

impl CfcPreset {
    pub const ALL: [CfcPreset; 4] = [
        CfcPreset::Cfc60,
        CfcPreset::Cfc180,
        CfcPreset::Cfc600,
        CfcPreset::Cfc1000,
    ];

    pub fn class(self) -> f64 {
        match self {
            CfcPreset::Cfc60 => 60.0,
            CfcPreset::Cfc180 => 180.0,
            CfcPreset::Cfc600 => 600.0,
            CfcPreset::Cfc1000 => 1000.0,
        }
    }
}

/// Conditioning chosen for a set of channels: none, or a CFC class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChannelFilter {
    None,
    Cfc(f64),
}

impl ChannelFilter {
    /// Filter one channel sampled at `sample_rate_hz`.
    pub fn apply(&self, samples: &[f64], sample_rate_hz: f64) -> Result<Vec<f64>> {
        match self {
            ChannelFilter::None => Ok(samples.to_vec()),
            ChannelFilter::Cfc(class) => cfc_filter(samples, sample_rate_hz, *class),
        }
    }

    /// Human-readable name: "Unfiltered", "CFC600", ...
    pub fn label(&self) -> String {
        match self {
            ChannelFilter::None => "Unfiltered".to_string(),
            ChannelFilter::Cfc(class) => format!("CFC{class}"),
        }
    }
}

impl From<CfcPreset> for ChannelFilter {
    fn from(p: CfcPreset) -> Self {
        ChannelFilter::Cfc(p.class())
    }
}

impl FromStr for ChannelFilter {
    type Err = Error;

    /// Accepts `none` or `cfc` followed by 2 to 4 digits, case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s == "none" {
            return Ok(ChannelFilter::None);
        }
        let digits = s
            .strip_prefix("cfc")
            .filter(|d| (2..=4).contains(&d.len()) && d.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| Error::invalid(format!("unknown channel filter '{s}'")))?;
        let class: u32 = digits
            .parse()
            .map_err(|_| Error::invalid(format!("unknown channel filter '{s}'")))?;
        if class == 0 {
            return Err(Error::invalid("CFC class must be positive"));
        }
        Ok(ChannelFilter::Cfc(class as f64))
    }
}

impl TryFrom<String> for ChannelFilter {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ChannelFilter> for String {
    fn from(f: ChannelFilter) -> Self {
        f.to_string()
    }
}

impl fmt::Display for ChannelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelFilter::None => write!(f, "none"),
            ChannelFilter::Cfc(class) => write!(f, "cfc{class}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn gaussian_bump(n: usize, center: f64, sigma: f64) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let x = (i as f64 - center) / sigma;
                100.0 * (-0.5 * x * x).exp()
            })
            .collect()
    }

    #[test]
    fn cutoff_is_fixed_ratio_of_class() {
        for p in CfcPreset::ALL {
            let spec = FilterSpec::new(p.class(), 20_000.0).unwrap();
            assert_eq!(spec.cutoff_hz(), 1.65 * p.class());
        }
        assert_eq!(FilterSpec::new(42.0, 1e4).unwrap().cutoff_hz(), 1.65 * 42.0);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(matches!(cfc_filter(&[1.0; 8], 0.0, 60.0), Err(Error::InvalidInput(_))));
        assert!(cfc_filter(&[1.0; 8], 1e4, 0.0).is_err());
        assert!(cfc_filter(&[1.0; 8], 1e4, -60.0).is_err());
        assert!(cfc_filter(&[1.0, f64::NAN, 2.0], 1e4, 60.0).is_err());
    }

    #[test]
    fn zero_in_zero_out() {
        for p in CfcPreset::ALL {
            for fs in [1_000.0, 10_000.0, 50_000.0] {
                let y = cfc_filter(&[0.0; 300], fs, p.class()).unwrap();
                assert_eq!(y.len(), 300);
                assert!(y.iter().all(|&v| v == 0.0));
            }
        }
    }

    #[test]
    fn output_length_matches_input() {
        for n in [0usize, 1, 2, 3, 7, 19, 20, 241, 1000] {
            let x: Vec<f64> = (0..n).map(|i| (i as f64 * 0.3).sin()).collect();
            assert_eq!(cfc180_filter(&x, 10_000.0).unwrap().len(), n);
        }
    }

    #[test]
    fn sections_have_unit_dc_gain() {
        let spec = FilterSpec::new(600.0, 10_000.0).unwrap();
        for s in spec.sections() {
            assert_relative_eq!(s.dc_gain(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn constant_passes_through_cfc180() {
        let x = vec![5.0; 1000];
        let y = cfc180_filter(&x, 1000.0).unwrap();
        for &v in &y[50..950] {
            assert_abs_diff_eq!(v, 5.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn zero_phase_symmetry() {
        let x = gaussian_bump(2000, 1000.0, 40.0);
        let direct = cfc180_filter(&x, 10_000.0).unwrap();

        let mut reversed = x.clone();
        reversed.reverse();
        let mut via_reverse = cfc180_filter(&reversed, 10_000.0).unwrap();
        via_reverse.reverse();

        for (a, b) in direct.iter().zip(&via_reverse) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn peak_stays_in_place() {
        let x = gaussian_bump(2000, 1000.0, 40.0);
        let y = cfc60_filter(&x, 10_000.0).unwrap();
        let peak = y
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 1000);
    }

    #[test]
    fn undersampling_is_reported_not_fatal() {
        let spec = FilterSpec::new(1000.0, 10_000.0).unwrap();
        let w = spec.undersampling().unwrap();
        assert_eq!(w.required_hz, 10.0 * 1650.0);
        assert!(FilterSpec::new(60.0, 10_000.0).unwrap().undersampling().is_none());
        assert!(cfc1000_filter(&[1.0; 50], 10_000.0).is_ok());
    }

    #[test]
    fn reflect_pad_mirrors_ends() {
        assert_eq!(
            reflect_pad(&[1.0, 2.0, 3.0, 4.0], 2),
            vec![2.0, 1.0, 1.0, 2.0, 3.0, 4.0, 4.0, 3.0]
        );
        assert_eq!(pad_len(5), 2);
        assert_eq!(pad_len(1), 1);
        assert_eq!(pad_len(150), 15);
        assert_eq!(pad_len(10_000), 24);
    }

    #[test]
    fn channel_filter_selection() {
        assert_eq!("none".parse::<ChannelFilter>().unwrap(), ChannelFilter::None);
        assert_eq!("CFC600".parse::<ChannelFilter>().unwrap(), ChannelFilter::Cfc(600.0));
        assert_eq!("cfc60".parse::<ChannelFilter>().unwrap(), ChannelFilter::from(CfcPreset::Cfc60));
        assert!("cfc6".parse::<ChannelFilter>().is_err());
        assert!("cfc00".parse::<ChannelFilter>().is_err());
        assert!("butterworth".parse::<ChannelFilter>().is_err());
        assert_eq!(ChannelFilter::Cfc(180.0).to_string(), "cfc180");
        assert_eq!(ChannelFilter::Cfc(180.0).label(), "CFC180");
        assert_eq!(ChannelFilter::None.apply(&[1.0, 2.0], 1e4).unwrap(), vec![1.0, 2.0]);
    }
}
