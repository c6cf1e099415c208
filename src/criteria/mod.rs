//! Occupant injury criteria evaluated on conditioned channels.

pub mod hic;
pub mod nij;
