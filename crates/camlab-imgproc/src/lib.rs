#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// background subtraction models.
pub mod background;

/// color transformations module.
pub mod color;

/// connected regions, contours and hulls.
pub mod contours;

/// utilities to draw on images.
pub mod draw;

/// edge detection module.
pub mod edges;

/// feature detection, matching and model fitting.
pub mod features;

/// image filtering module.
pub mod filter;

/// dense optical flow.
pub mod flow;

/// compute image histogram module.
pub mod histogram;

/// interpolation utilities.
pub mod interpolation;

/// morphological operations.
pub mod morphology;

/// border extrapolation helpers.
pub mod padding;

/// module containing parallization utilities.
pub mod parallel;

/// computational photography effects.
pub mod photo;

/// utility functions for resizing images.
pub mod resize;

/// operations to threshold images.
pub mod threshold;

/// image geometric transformations module.
pub mod warp;
