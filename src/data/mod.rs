/// Data layer: channel records, loading, and channel conditioning.
///
/// Architecture:
/// ```text
///  channel file (.txt, slash or standard header)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  detect dialect, parse header + samples → ParsedRecord
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ ParsedRecord  │  meta pairs, samples, unit, time base
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  CFC zero-phase low-pass → conditioned channel
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
