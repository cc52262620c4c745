use std::path::Path;

use camlab_io::IoError;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

// A stage method enumeration with 1-based selectors.
macro_rules! selector {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $index:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Every method, in selector order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// The method of a 1-based selector, `None` when nothing matches.
            pub fn from_index(index: i32) -> Option<Self> {
                match index {
                    $($index => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// The 1-based selector of the method.
            pub fn index(&self) -> i32 {
                match self {
                    $($name::$variant => $index,)+
                }
            }
        }
    };
}

selector! {
    /// Blur and morphology methods.
    BlurMethod {
        /// Normalised box filter, odd sizes only.
        #[default]
        Box = 1,
        /// Gaussian filter, odd sizes only.
        Gaussian = 2,
        /// Median filter, odd sizes only.
        Median = 3,
        /// Bilateral filter with colour sigma `2 d` and space sigma `d / 2`.
        Bilateral = 4,
        /// Morphological erosion.
        Erode = 5,
        /// Morphological dilation.
        Dilate = 6,
        /// Morphological opening.
        Open = 7,
        /// Morphological closing.
        Close = 8,
        /// Morphological gradient.
        Gradient = 9,
        /// White top hat.
        TopHat = 10,
        /// Black top hat.
        BlackHat = 11,
        /// Hit-or-miss with a fixed 3x3 cross on the gray frame.
        HitOrMiss = 12,
    }
}

selector! {
    /// Structuring element shapes of the morphology methods.
    MorphElement {
        /// Full rectangle.
        #[default]
        Rect = 1,
        /// Center row and column.
        Cross = 2,
        /// Inscribed ellipse.
        Ellipse = 3,
    }
}

selector! {
    /// Edge detection methods.
    EdgeMethod {
        /// Blend of the absolute sobel derivatives.
        #[default]
        Sobel = 1,
        /// Absolute laplacian.
        Laplacian = 2,
        /// Colour frame masked by the canny edges.
        Canny = 3,
    }
}

selector! {
    /// Thresholding methods.
    ThresholdMethod {
        /// `255` above the threshold.
        #[default]
        Binary = 1,
        /// `0` above the threshold.
        BinaryInv = 2,
        /// Clipped to the threshold.
        Trunc = 3,
        /// Zero at or below the threshold.
        ToZero = 4,
        /// Zero above the threshold.
        ToZeroInv = 5,
        /// Binary at the Otsu level.
        Otsu = 6,
        /// Binary at the triangle level.
        Triangle = 7,
        /// Against the block mean.
        AdaptiveMean = 8,
        /// Against the gaussian weighted block mean.
        AdaptiveGaussian = 9,
    }
}

selector! {
    /// Geometric transformation methods.
    TransformMethod {
        /// Rotation about the frame center.
        #[default]
        Rotation = 1,
    }
}

selector! {
    /// Histogram equalisation methods.
    HistogramMethod {
        /// Equalise the whole luma histogram.
        #[default]
        Global = 1,
        /// Contrast limited adaptive equalisation.
        Clahe = 2,
    }
}

selector! {
    /// Object detection methods of the object view.
    ObjectDetectionMethod {
        /// Standard Hough line transform.
        #[default]
        HoughLines = 1,
        /// Gradient Hough circle transform.
        HoughCircles = 2,
        /// Harris corner response.
        HarrisCorners = 3,
    }
}

selector! {
    /// Motion detection methods.
    MotionMethod {
        /// Adaptive gaussian mixture background model.
        #[default]
        BackgroundSubtraction = 1,
        /// Dense optical flow between consecutive frames.
        DenseOpticalFlow = 2,
    }
}

selector! {
    /// Computational photography effects.
    PhotoMethod {
        /// Contrast preserving decolorization, the colour boost is kept.
        #[default]
        Decolor = 1,
        /// Non-local means denoising.
        Denoise = 2,
        /// Edge preserving smoothing.
        EdgePreserving = 3,
        /// Detail enhancement.
        DetailEnhance = 4,
        /// Colour pencil sketch.
        PencilSketch = 5,
        /// Watercolour stylization.
        Stylization = 6,
        /// Percentile white balance.
        WhiteBalance = 7,
    }
}

/// The stage and view switches of the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Toggle {
    /// Black and white frames.
    #[default]
    BlackWhite,
    /// Inverted colours.
    Inverse,
    /// Blur and morphology.
    Blur,
    /// Edge detection.
    Edge,
    /// Thresholding.
    Threshold,
    /// Geometric transformation.
    Transform,
    /// Histogram equalisation.
    HistogramEq,
    /// Face replacement.
    Face,
    /// Object detection view.
    ObjectDetection,
    /// Motion detection view.
    Motion,
    /// Panorama capture.
    Panorama,
    /// Computational photography.
    Photo,
    /// QR code scanning.
    Qr,
}

impl Toggle {
    /// Every switch.
    pub const ALL: [Toggle; 13] = [
        Toggle::BlackWhite,
        Toggle::Inverse,
        Toggle::Blur,
        Toggle::Edge,
        Toggle::Threshold,
        Toggle::Transform,
        Toggle::HistogramEq,
        Toggle::Face,
        Toggle::ObjectDetection,
        Toggle::Motion,
        Toggle::Panorama,
        Toggle::Photo,
        Toggle::Qr,
    ];

    /// The user facing name of the feature.
    pub fn label(&self) -> &'static str {
        match self {
            Toggle::BlackWhite => "Black and White",
            Toggle::Inverse => "Inversed colours",
            Toggle::Blur => "Blur filter",
            Toggle::Edge => "Edge detection",
            Toggle::Threshold => "Threshold",
            Toggle::Transform => "Geometric transformation",
            Toggle::HistogramEq => "Histogram equalization",
            Toggle::Face => "Face detection",
            Toggle::ObjectDetection => "Point/line/circle detection",
            Toggle::Motion => "Motion detection",
            Toggle::Panorama => "Panorama",
            Toggle::Photo => "Photo",
            Toggle::Qr => "QR code detection",
        }
    }

    /// The status line reported when the feature is switched.
    pub fn status(&self, enabled: bool) -> String {
        let state = if enabled { "activated" } else { "desactivated" };
        format!("{} {state}", self.label())
    }
}

/// The on/off state of every switch, all off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toggles {
    /// Black and white frames.
    pub black_white: bool,
    /// Inverted colours.
    pub inverse: bool,
    /// Blur and morphology.
    pub blur: bool,
    /// Edge detection.
    pub edge: bool,
    /// Thresholding.
    pub threshold: bool,
    /// Geometric transformation.
    pub transform: bool,
    /// Histogram equalisation.
    pub histogram_eq: bool,
    /// Face replacement.
    pub face: bool,
    /// Object detection view.
    pub object_detection: bool,
    /// Motion detection view.
    pub motion: bool,
    /// Panorama capture.
    pub panorama: bool,
    /// Computational photography.
    pub photo: bool,
    /// QR code scanning.
    pub qr: bool,
}

impl Toggles {
    /// Whether a switch is on.
    pub fn get(&self, toggle: Toggle) -> bool {
        *self.slot(toggle)
    }

    /// Turn a switch on or off.
    pub fn set(&mut self, toggle: Toggle, enabled: bool) {
        *self.slot_mut(toggle) = enabled;
    }

    fn slot(&self, toggle: Toggle) -> &bool {
        match toggle {
            Toggle::BlackWhite => &self.black_white,
            Toggle::Inverse => &self.inverse,
            Toggle::Blur => &self.blur,
            Toggle::Edge => &self.edge,
            Toggle::Threshold => &self.threshold,
            Toggle::Transform => &self.transform,
            Toggle::HistogramEq => &self.histogram_eq,
            Toggle::Face => &self.face,
            Toggle::ObjectDetection => &self.object_detection,
            Toggle::Motion => &self.motion,
            Toggle::Panorama => &self.panorama,
            Toggle::Photo => &self.photo,
            Toggle::Qr => &self.qr,
        }
    }

    fn slot_mut(&mut self, toggle: Toggle) -> &mut bool {
        match toggle {
            Toggle::BlackWhite => &mut self.black_white,
            Toggle::Inverse => &mut self.inverse,
            Toggle::Blur => &mut self.blur,
            Toggle::Edge => &mut self.edge,
            Toggle::Threshold => &mut self.threshold,
            Toggle::Transform => &mut self.transform,
            Toggle::HistogramEq => &mut self.histogram_eq,
            Toggle::Face => &mut self.face,
            Toggle::ObjectDetection => &mut self.object_detection,
            Toggle::Motion => &mut self.motion,
            Toggle::Panorama => &mut self.panorama,
            Toggle::Photo => &mut self.photo,
            Toggle::Qr => &mut self.qr,
        }
    }
}

/// Every switch and parameter of the frame pipeline.
///
/// The fields are public for convenient construction; a configuration only
/// reaches a [`crate::FrameProcessor`] through [`PipelineConfig::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// The stage and view switches.
    pub toggles: Toggles,
    /// Kernel size of the blur and morphology stage, in `[1, MAX_BLUR_SIZE]`.
    pub blur_size: i32,
    /// Blur or morphology method.
    pub blur_method: BlurMethod,
    /// Structuring element of the morphology methods.
    pub morph_element: MorphElement,
    /// Edge detection method.
    pub edge_method: EdgeMethod,
    /// Canny low threshold in `[0, 255]`.
    pub canny_threshold: i32,
    /// Canny high to low threshold ratio, positive.
    pub canny_ratio: f64,
    /// Threshold method.
    pub threshold_method: ThresholdMethod,
    /// Threshold level in `[0, 255]`.
    pub threshold_value: i32,
    /// Block size of the adaptive methods, odd and at least 3.
    pub threshold_blocksize: i32,
    /// Inverted output of the adaptive methods.
    pub threshold_inverse: bool,
    /// Geometric transformation method.
    pub transform_method: TransformMethod,
    /// Rotation angle in degrees, in `[-179, 180]`.
    pub rotation: i32,
    /// Histogram equalisation method.
    pub histogram_method: HistogramMethod,
    /// CLAHE tiles per side, in `[1, MAX_HISTOGRAM_TILES]`.
    pub histogram_tiles: i32,
    /// CLAHE clip limit, positive.
    pub histogram_clip_limit: i32,
    /// Object detection method.
    pub object_detection_method: ObjectDetectionMethod,
    /// Threshold shared by the object detection methods, non-negative.
    pub detection_threshold: i32,
    /// Motion detection method.
    pub motion_method: MotionMethod,
    /// Computational photography effect.
    pub photo_method: PhotoMethod,
    /// Spatial sigma of the photo effects in `[0, 200]`.
    pub photo_sigma_s: i32,
    /// Range sigma of the photo effects in `[0, 1]`.
    pub photo_sigma_r: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            toggles: Toggles::default(),
            blur_size: 3,
            blur_method: BlurMethod::Box,
            morph_element: MorphElement::Rect,
            edge_method: EdgeMethod::Sobel,
            canny_threshold: 50,
            canny_ratio: 2.5,
            threshold_method: ThresholdMethod::Binary,
            threshold_value: 127,
            threshold_blocksize: 3,
            threshold_inverse: false,
            transform_method: TransformMethod::Rotation,
            rotation: 0,
            histogram_method: HistogramMethod::Global,
            histogram_tiles: 8,
            histogram_clip_limit: 2,
            object_detection_method: ObjectDetectionMethod::HoughLines,
            detection_threshold: 100,
            motion_method: MotionMethod::BackgroundSubtraction,
            photo_method: PhotoMethod::Decolor,
            photo_sigma_s: 50,
            photo_sigma_r: 0.15,
        }
    }
}

/// Largest kernel size of the blur and morphology stage.
pub const MAX_BLUR_SIZE: i32 = 99;

/// Largest number of CLAHE tiles per side.
pub const MAX_HISTOGRAM_TILES: i32 = 64;

pub(crate) fn check_blur_size(value: i32) -> Result<(), PipelineError> {
    if !(1..=MAX_BLUR_SIZE).contains(&value) {
        return Err(PipelineError::invalid("blur_size", value, "[1, 99]"));
    }
    Ok(())
}

pub(crate) fn check_histogram_tiles(value: i32) -> Result<(), PipelineError> {
    if !(1..=MAX_HISTOGRAM_TILES).contains(&value) {
        return Err(PipelineError::invalid("histogram_tiles", value, "[1, 64]"));
    }
    Ok(())
}

pub(crate) fn check_u8_level(name: &'static str, value: i32) -> Result<(), PipelineError> {
    if !(0..=255).contains(&value) {
        return Err(PipelineError::invalid(name, value, "[0, 255]"));
    }
    Ok(())
}

pub(crate) fn check_canny_ratio(value: f64) -> Result<(), PipelineError> {
    if !(value > 0.0 && value.is_finite()) {
        return Err(PipelineError::invalid("canny_ratio", value, "> 0"));
    }
    Ok(())
}

pub(crate) fn check_blocksize(value: i32) -> Result<(), PipelineError> {
    if value < 3 || value % 2 == 0 {
        return Err(PipelineError::invalid(
            "threshold_blocksize",
            value,
            "odd and >= 3",
        ));
    }
    Ok(())
}

pub(crate) fn check_rotation(value: i32) -> Result<(), PipelineError> {
    if !(-179..=180).contains(&value) {
        return Err(PipelineError::invalid("rotation", value, "[-179, 180]"));
    }
    Ok(())
}

pub(crate) fn check_positive(name: &'static str, value: i32) -> Result<(), PipelineError> {
    if value <= 0 {
        return Err(PipelineError::invalid(name, value, "> 0"));
    }
    Ok(())
}

pub(crate) fn check_detection_threshold(value: i32) -> Result<(), PipelineError> {
    if value < 0 {
        return Err(PipelineError::invalid("detection_threshold", value, ">= 0"));
    }
    Ok(())
}

pub(crate) fn check_sigma_s(value: i32) -> Result<(), PipelineError> {
    if !(0..=200).contains(&value) {
        return Err(PipelineError::invalid("photo_sigma_s", value, "[0, 200]"));
    }
    Ok(())
}

pub(crate) fn check_sigma_r(value: f64) -> Result<(), PipelineError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(PipelineError::invalid("photo_sigma_r", value, "[0, 1]"));
    }
    Ok(())
}

impl PipelineConfig {
    /// Check every parameter against its range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] for the first parameter
    /// out of range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        check_blur_size(self.blur_size)?;
        check_u8_level("canny_threshold", self.canny_threshold)?;
        check_canny_ratio(self.canny_ratio)?;
        check_u8_level("threshold_value", self.threshold_value)?;
        check_blocksize(self.threshold_blocksize)?;
        check_rotation(self.rotation)?;
        check_histogram_tiles(self.histogram_tiles)?;
        check_positive("histogram_clip_limit", self.histogram_clip_limit)?;
        check_detection_threshold(self.detection_threshold)?;
        check_sigma_s(self.photo_sigma_s)?;
        check_sigma_r(self.photo_sigma_r)?;
        Ok(())
    }

    /// Read and validate a JSON configuration file.
    ///
    /// Missing fields take their default value.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(IoError::FileDoesNotExist(path.to_path_buf()).into());
        }
        let text = std::fs::read_to_string(path).map_err(IoError::from)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Write the configuration as pretty printed JSON.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text).map_err(IoError::from)?;
        Ok(())
    }
}
