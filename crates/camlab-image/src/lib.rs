#![deny(missing_docs)]
//! Image types used across the camlab frame pipeline.

/// image representation for frame processing.
pub mod image;

/// Error types for the image module.
pub mod error;

/// Channel level operations on images.
pub mod ops;

pub use crate::error::ImageError;
pub use crate::image::{Frame, GrayImage, Image, ImageSize};
