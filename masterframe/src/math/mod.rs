//! Numeric helpers shared by the combiners and the outlier filter.

pub mod statistics;
