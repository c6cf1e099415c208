use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;

use super::model::{ChannelRole, ParsedRecord, RecordFormat};
use crate::error::{Error, Result};
use crate::math::kernel::parse_number;

/// Header key holding the declared number of samples.
pub const KEY_SAMPLE_COUNT: &str = "Number of samples";
/// Header key holding the sampling interval in seconds.
pub const KEY_SAMPLING_INTERVAL: &str = "Sampling interval";
/// Alternative header key holding the sampling rate in Hz.
pub const KEY_SAMPLING_RATE: &str = "Sampling rate";

/// Two records are considered to share a time base within this many seconds.
pub const INTERVAL_TOLERANCE: f64 = 1e-15;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Read and parse a channel file, detecting its dialect.
pub fn load_record(path: &Path) -> anyhow::Result<ParsedRecord> {
    load_record_as(path, None)
}

/// Read and parse a channel file. `format` overrides dialect detection.
pub fn load_record_as(path: &Path, format: Option<RecordFormat>) -> anyhow::Result<ParsedRecord> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading channel file {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();
    let record = parse_record_bytes(&name, &bytes, format)
        .with_context(|| format!("parsing channel file {}", path.display()))?;
    Ok(record)
}

/// Parse raw file contents. Fails only when the bytes are not valid UTF-8 text.
pub fn parse_record_bytes(
    name: &str,
    bytes: &[u8],
    format: Option<RecordFormat>,
) -> Result<ParsedRecord> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::Parse(format!("{name}: not UTF-8 text ({e})")))?;
    Ok(parse_record(name, text, format))
}

/// `/` as first non-whitespace character ⇒ slash header, anything else ⇒ standard.
pub fn detect_format(text: &str) -> RecordFormat {
    match text.trim_start().chars().next() {
        Some('/') => RecordFormat::SlashHeader,
        _ => RecordFormat::Standard,
    }
}

/// Parse a record from text. `format` overrides dialect detection.
///
/// Header lines without a colon are ignored. Data lines that are blank or
/// carry no number are skipped without error.
pub fn parse_record(name: &str, text: &str, format: Option<RecordFormat>) -> ParsedRecord {
    let format = format.unwrap_or_else(|| detect_format(text));
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines = normalized.split('\n');

    let mut meta_pairs = Vec::new();
    let mut meta = BTreeMap::new();
    for raw in lines.by_ref().take(format.header_len()) {
        let Some((key, value)) = raw.split_once(':') else {
            continue;
        };
        let key = normalize_key(key);
        let value = value.trim().to_string();
        meta.insert(key.clone(), value.clone());
        meta_pairs.push((key, value));
    }

    let values: Vec<f64> = lines.filter_map(parse_sample_line).collect();

    let sample_count = meta
        .get(KEY_SAMPLE_COUNT)
        .map(|s| parse_number(s))
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.trunc() as usize);
    let sampling_interval = sampling_interval_from(&meta);

    log::debug!(
        "{name}: {format} record, {} header entries, {} samples",
        meta_pairs.len(),
        values.len()
    );

    ParsedRecord {
        name: name.to_string(),
        meta_pairs,
        meta,
        values,
        format,
        values_unit: format.values_unit(),
        sample_count,
        sampling_interval,
    }
}

// ---------------------------------------------------------------------------
// Header helpers
// ---------------------------------------------------------------------------

/// Strip leading slashes, collapse inner whitespace, trim.
pub fn normalize_key(raw: &str) -> String {
    raw.trim_start()
        .trim_start_matches('/')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse "1000", "1000 Hz", "12,5 kHz" into Hz. `NaN` when unrecognised.
pub fn parse_sampling_rate_hz(s: &str) -> f64 {
    let v = parse_number(s);
    if v.is_finite() {
        return v;
    }
    let lower = s.trim().to_ascii_lowercase();
    let (number, scale) = if let Some(n) = lower.strip_suffix("khz") {
        (n, 1e3)
    } else if let Some(n) = lower.strip_suffix("hz") {
        (n, 1.0)
    } else {
        return f64::NAN;
    };
    parse_number(number) * scale
}

/// Parse "0.0001", "0.1 ms", "100 us", "1e-4 s" into seconds. `NaN` when unrecognised.
pub fn parse_interval_seconds(s: &str) -> f64 {
    let v = parse_number(s);
    if v.is_finite() {
        return v;
    }
    let lower = s.trim().to_ascii_lowercase();
    for (suffix, scale) in [("ms", 1e-3), ("us", 1e-6), ("µs", 1e-6), ("s", 1.0)] {
        if let Some(n) = lower.strip_suffix(suffix) {
            return parse_number(n) * scale;
        }
    }
    f64::NAN
}

fn sampling_interval_from(meta: &BTreeMap<String, String>) -> Option<f64> {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if let Some(dt) = meta
        .get(KEY_SAMPLING_INTERVAL)
        .map(|s| parse_interval_seconds(s))
        .filter(|v| positive(*v))
    {
        return Some(dt);
    }
    meta.get(KEY_SAMPLING_RATE)
        .map(|s| parse_sampling_rate_hz(s))
        .filter(|v| positive(*v))
        .map(|hz| 1.0 / hz)
}

/// Keep only numeric characters, read commas as decimal points, parse.
fn parse_sample_line(line: &str) -> Option<f64> {
    let kept: String = line
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, 'e' | 'E' | '+' | '-' | '.' | ','))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if kept.is_empty() {
        return None;
    }
    let v = parse_number(&kept);
    v.is_finite().then_some(v)
}

// ---------------------------------------------------------------------------
// Multi-record checks
// ---------------------------------------------------------------------------

/// Common time base of a set of aligned records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub sample_count: usize,
    pub sampling_interval: f64,
}

/// Check that all records declare the same sample count and sampling interval.
pub fn verify_aligned(records: &[ParsedRecord]) -> Result<Alignment> {
    let first = records
        .first()
        .ok_or_else(|| Error::invalid("no records supplied"))?;

    let mut declared = Vec::with_capacity(records.len());
    for rec in records {
        let (Some(n), Some(dt)) = (rec.sample_count, rec.sampling_interval) else {
            return Err(Error::invalid(format!(
                "{}: missing or invalid \"{KEY_SAMPLE_COUNT}\" or \"{KEY_SAMPLING_INTERVAL}\" / \"{KEY_SAMPLING_RATE}\"",
                rec.name
            )));
        };
        declared.push((rec, n, dt));
    }

    let (_, n0, dt0) = declared[0];
    for (rec, n, dt) in &declared {
        if *n != n0 || (dt - dt0).abs() >= INTERVAL_TOLERANCE {
            return Err(Error::invalid(format!(
                "{}: {n} samples @ {dt} s does not match {}: {n0} samples @ {dt0} s",
                rec.name, first.name
            )));
        }
        if rec.values.len() < n0 {
            return Err(Error::invalid(format!(
                "{}: {} data lines, expected {n0}",
                rec.name,
                rec.values.len()
            )));
        }
    }

    Ok(Alignment {
        sample_count: n0,
        sampling_interval: dt0,
    })
}

/// Display label for a channel, preferring the channel-name header entries.
pub fn channel_label(record: &ParsedRecord) -> String {
    let combo_keys = [
        "Name of the channel+ Direction",
        "Name of the channel + Direction",
        "Name of the channel +Direction",
        "Name of the channel+Direction",
    ];
    if record.format == RecordFormat::SlashHeader {
        if let Some(v) = combo_keys
            .iter()
            .filter_map(|k| record.meta_value(k))
            .find(|v| !v.trim().is_empty())
        {
            return v.trim().to_string();
        }
    }
    ["Name of the channel", "Channel name"]
        .iter()
        .filter_map(|k| record.meta_value(k))
        .find(|v| !v.trim().is_empty())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| record.name.clone())
}

/// Identify neck load channels from their names ("Upper Neck Force Z", ...).
pub fn guess_role(record: &ParsedRecord) -> ChannelRole {
    let raw = record
        .meta_value("Name of the channel")
        .or_else(|| record.meta_value("Channel name"))
        .unwrap_or(&record.name);
    let s = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    if s.contains("force x") {
        ChannelRole::Fx
    } else if s.contains("force z") {
        ChannelRole::Fz
    } else if s.contains("moment y") {
        ChannelRole::My
    } else {
        ChannelRole::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ValuesUnit;

    fn standard_text(extra_header: &[&str], samples: &[&str]) -> String {
        let mut lines: Vec<String> = extra_header.iter().map(|s| s.to_string()).collect();
        while lines.len() < 30 {
            lines.push(format!("Comment {}: filler", lines.len()));
        }
        lines.extend(samples.iter().map(|s| s.to_string()));
        lines.join("\n")
    }

    #[test]
    fn detects_dialect_from_first_visible_char() {
        assert_eq!(detect_format("  \n\t/Title: x"), RecordFormat::SlashHeader);
        assert_eq!(detect_format("Title: x\n/foo"), RecordFormat::Standard);
        assert_eq!(detect_format(""), RecordFormat::Standard);
    }

    #[test]
    fn parses_standard_record() {
        let text = standard_text(
            &[
                "Number of samples: 4",
                "Sampling  interval :  0.0001",
                "Name of the channel: Head Acceleration X",
            ],
            &["1,5", "", "abc", "  -2.0 ", "3e1", "4"],
        );
        let rec = parse_record("head_x.txt", &text, None);
        assert_eq!(rec.format, RecordFormat::Standard);
        assert_eq!(rec.values_unit, ValuesUnit::G);
        assert_eq!(rec.values, vec![1.5, -2.0, 30.0, 4.0]);
        assert_eq!(rec.sample_count, Some(4));
        assert_eq!(rec.sampling_interval, Some(0.0001));
        assert_eq!(rec.meta_pairs[1].0, "Sampling interval");
        assert_eq!(channel_label(&rec), "Head Acceleration X");
    }

    #[test]
    fn parses_slash_record_and_converts_rate() {
        let mut lines = vec![
            "//Number of samples: 2".to_string(),
            "/Sampling rate: 10 kHz".to_string(),
            "/Name of the channel+ Direction: HEAD ACX".to_string(),
        ];
        while lines.len() < 21 {
            lines.push("/".to_string());
        }
        lines.push("9.80665".into());
        lines.push("19.6133".into());
        let rec = parse_record("a.txt", &lines.join("\r\n"), None);
        assert_eq!(rec.format, RecordFormat::SlashHeader);
        assert_eq!(rec.values_unit, ValuesUnit::MetersPerSecondSquared);
        assert_eq!(rec.sample_count, Some(2));
        assert_eq!(rec.sampling_interval, Some(1e-4));
        assert!(rec.meta_value(KEY_SAMPLING_INTERVAL).is_none());
        assert_eq!(channel_label(&rec), "HEAD ACX");
        let g = rec.values_in_g();
        assert!((g[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn forced_dialect_overrides_detection() {
        let path = std::env::temp_dir().join(format!("injury-lab-forced-{}.txt", std::process::id()));
        let mut lines = vec!["/Number of samples: 1".to_string(), "Sampling interval: 0.001".to_string()];
        while lines.len() < 30 {
            lines.push(format!("Comment {}: -", lines.len()));
        }
        lines.push("12".into());
        std::fs::write(&path, lines.join("\n")).unwrap();

        let detected = load_record(&path).unwrap();
        let forced = load_record_as(&path, Some(RecordFormat::Standard)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(detected.format, RecordFormat::SlashHeader);
        assert_eq!(forced.format, RecordFormat::Standard);
        assert_eq!(forced.values_unit, ValuesUnit::G);
        assert_eq!(forced.values, vec![12.0]);
        assert_eq!(forced.sample_count, Some(1));
    }

    #[test]
    fn non_utf8_is_a_parse_error() {
        let err = parse_record_bytes("bad.bin", &[0xff, 0xfe, 0x00], None).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn rate_and_interval_strings() {
        assert_eq!(parse_sampling_rate_hz("1000"), 1000.0);
        assert_eq!(parse_sampling_rate_hz("1000 Hz"), 1000.0);
        assert_eq!(parse_sampling_rate_hz("12,5 kHz"), 12500.0);
        assert!(parse_sampling_rate_hz("fast").is_nan());
        assert!((parse_interval_seconds("0.1 ms") - 1e-4).abs() < 1e-18);
        assert!(parse_interval_seconds("n/a").is_nan());
    }

    #[test]
    fn alignment_checks_counts_and_intervals() {
        let a = parse_record(
            "a",
            &standard_text(&["Number of samples: 2", "Sampling interval: 0.001"], &["1", "2"]),
            None,
        );
        let b = parse_record(
            "b",
            &standard_text(&["Number of samples: 2", "Sampling rate: 1000 Hz"], &["3", "4"]),
            None,
        );
        let c = parse_record(
            "c",
            &standard_text(&["Number of samples: 2", "Sampling interval: 0.002"], &["3", "4"]),
            None,
        );
        let al = verify_aligned(&[a.clone(), b]).unwrap();
        assert_eq!(al.sample_count, 2);
        assert!(matches!(verify_aligned(&[a, c]), Err(Error::InvalidInput(_))));
        assert!(verify_aligned(&[]).is_err());
    }

    #[test]
    fn roles_from_channel_names() {
        let rec = |n: &str| {
            parse_record("x", &standard_text(&[format!("Name of the channel: {n}").as_str()], &[]), None)
        };
        assert_eq!(guess_role(&rec("Upper Neck  Force X")), ChannelRole::Fx);
        assert_eq!(guess_role(&rec("Upper Neck Force Z")), ChannelRole::Fz);
        assert_eq!(guess_role(&rec("Upper Neck Moment Y")), ChannelRole::My);
        assert_eq!(guess_role(&rec("Chest Acc")), ChannelRole::Unknown);
    }
}
