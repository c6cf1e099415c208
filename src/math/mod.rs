/// Numeric building blocks shared by the filter and the injury criteria.
///
/// * `kernel`    – reductions, binary search, tolerant parsing, unit helpers
/// * `integrate` – trapezoid integration and uniform resampling
pub mod integrate;
pub mod kernel;
