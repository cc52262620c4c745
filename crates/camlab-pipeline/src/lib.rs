#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Capture worker, commands and display sinks.
pub mod capture;

/// Pipeline configuration, method selectors and switches.
pub mod config;

/// Error types for the pipeline module.
pub mod error;

/// Face detection capability and virtual background.
pub mod face;

/// Facial landmarks and the ornaments painted with them.
pub mod landmarks;

/// Single slot frame mailbox.
pub mod mailbox;

/// Motion detection by background subtraction or optical flow.
pub mod motion;

/// Panorama accumulation and stitching.
pub mod panorama;

/// The frame processor.
pub mod processor;

/// Symbol scanning stage and overlay.
pub mod qr;

/// The processing stages.
pub mod stage;

/// Histogram and object detection views.
pub mod views;

pub use crate::capture::{
    CaptureLoop, CaptureOptions, Command, DisplaySink, LogSink, StopOutcome, View,
};
pub use crate::config::{
    PipelineConfig, Toggle, Toggles, MAX_BLUR_SIZE, MAX_HISTOGRAM_TILES,
};
pub use crate::error::PipelineError;
pub use crate::face::{FaceDetector, NoFaceDetector, RustfaceDetector, RustfaceParams};
pub use crate::landmarks::{FaceLandmarks, LandmarkDetector, MeanShapeLandmarks, Ornaments};
pub use crate::mailbox::FrameMailbox;
pub use crate::motion::{BackgroundMotionDetector, MotionDetection};
pub use crate::panorama::{
    FeatureStitcher, PanoramaAccumulator, PanoramaState, StitchStatus, Stitcher,
};
pub use crate::processor::FrameProcessor;
pub use crate::stage::{Stage, STAGE_ORDER};
