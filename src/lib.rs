//! Crash-test channel conditioning and occupant injury criteria.
//!
//! ```text
//!  channel records (.txt)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  header + samples → ParsedRecord
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  CFC zero-phase low-pass
//!   └──────────┘
//!        │
//!        ├──────────────┬───────────────┐
//!        ▼              ▼               ▼
//!   ┌──────────┐  ┌──────────┐   ┌───────────┐
//!   │   hic     │  │   nij     │   │ integrate │  (signal generator)
//!   └──────────┘  └──────────┘   └───────────┘
//! ```

pub mod criteria;
pub mod data;
pub mod error;
pub mod math;

pub use error::{Error, Result};
