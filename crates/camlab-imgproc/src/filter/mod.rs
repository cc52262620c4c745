//! Filter operations
//!
//! This module provides filter operations for image processing.

/// Filter kernels
pub mod kernels;

/// Filter operations
mod ops;
pub use ops::*;

/// Median filter
mod median;
pub use median::*;

/// Separable filter operations
mod separable_filter;
pub use separable_filter::*;
