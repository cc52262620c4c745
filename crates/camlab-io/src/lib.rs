#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Camera sources.
///
/// The [`camera::CameraSource`] trait with a folder replay camera and a
/// synthetic pattern camera.
pub mod camera;

/// Error types for I/O operations.
///
/// Defines [`IoError`] variants for file access, encoding/decoding failures,
/// and format-specific errors.
pub mod error;

/// Frame rate counter for video processing.
pub mod fps_counter;

/// High-level image reading and saving functions.
///
/// See [`functional::save_image`] for extension based dispatch.
pub mod functional;

/// JPEG image encoding.
pub mod jpeg;

/// PNG image encoding and decoding.
pub mod png;

/// Video recording into AVI files.
pub mod video;

/// GStreamer cameras and video encoding.
#[cfg(feature = "gstreamer")]
pub mod stream;

pub use crate::error::IoError;
