/// Cameras read through a GStreamer pipeline.
pub mod camera;

/// Error types for the stream module.
pub mod error;

/// Frame grabbing from a GStreamer pipeline ending in an appsink.
pub mod capture;

/// Video encoding through a GStreamer pipeline starting with an appsrc.
pub mod video;

pub use crate::stream::camera::{v4l2_camera_pipeline_description, V4l2Camera};
pub use crate::stream::capture::StreamCapture;
pub use crate::stream::error::StreamCaptureError;
pub use crate::stream::video::StreamVideoWriter;
