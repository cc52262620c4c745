use std::path::Path;

use camlab_image::Frame;
use camlab_imgproc::background::MixtureParams;
use camlab_qr::SymbolScanner;

use crate::{
    config::{
        check_blocksize, check_blur_size, check_canny_ratio, check_detection_threshold,
        check_histogram_tiles, check_positive, check_rotation, check_sigma_r, check_sigma_s,
        check_u8_level, BlurMethod, EdgeMethod, HistogramMethod, MorphElement, MotionMethod,
        ObjectDetectionMethod, PhotoMethod, PipelineConfig, ThresholdMethod, Toggle,
        TransformMethod,
    },
    error::PipelineError,
    face::{FaceDetector, FaceStage},
    landmarks::{LandmarkDetector, Ornaments},
    motion::BackgroundMotionDetector,
    panorama::{PanoramaAccumulator, StitchStatus, Stitcher},
    qr::{QrResult, QrStage},
    stage::{self, Stage, STAGE_ORDER},
    views,
};

/// Runs the enabled stages over every frame, in [`STAGE_ORDER`].
///
/// A stage that fails is logged and skipped, the frame goes on through the
/// remaining stages unchanged by it.
///
/// # Example
///
/// ```
/// use camlab_image::Frame;
/// use camlab_pipeline::{FrameProcessor, Toggle};
///
/// let mut processor = FrameProcessor::new();
/// processor.toggle(Toggle::Inverse, true);
///
/// let frame = Frame::from_size_val([4, 4].into(), 10).unwrap();
/// processor.process(&frame);
/// assert!(processor.processed_frame().as_slice().iter().all(|&v| v == 245));
/// ```
pub struct FrameProcessor {
    config: PipelineConfig,
    current: Frame,
    frame: Frame,
    // processed frame before any motion overlay
    clean: Option<Frame>,
    previous: Option<Frame>,
    last_threshold: Option<f64>,
    motion: BackgroundMotionDetector,
    panorama: PanoramaAccumulator,
    face: FaceStage,
    qr: QrStage,
}

impl Default for FrameProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn select<M>(
    stage: Stage,
    index: i32,
    from_index: fn(i32) -> Option<M>,
) -> Result<M, PipelineError> {
    from_index(index).ok_or_else(|| {
        log::warn!("unsupported method {index} for the {} stage", stage.name());
        PipelineError::UnsupportedMethod {
            stage: stage.name(),
            selector: index,
        }
    })
}

impl FrameProcessor {
    /// A processor with every stage disabled and default parameters.
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// A processor starting from `config`, assumed valid.
    ///
    /// Use [`FrameProcessor::set_config`] for configurations from outside.
    pub fn with_config(config: PipelineConfig) -> Self {
        let mut motion = BackgroundMotionDetector::new();
        Self::configure_motion(&mut motion, config.motion_method);
        Self {
            config,
            current: Frame::empty(),
            frame: Frame::empty(),
            clean: None,
            previous: None,
            last_threshold: None,
            motion,
            panorama: PanoramaAccumulator::new(),
            face: FaceStage::new(),
            qr: QrStage::new(),
        }
    }

    fn configure_motion(motion: &mut BackgroundMotionDetector, method: MotionMethod) {
        let defaults = MixtureParams::default();
        motion.configure(
            method,
            defaults.history,
            defaults.var_threshold,
            defaults.detect_shadows,
        );
    }

    /// The active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Replace the whole configuration after validating it.
    pub fn set_config(&mut self, config: PipelineConfig) -> Result<(), PipelineError> {
        config.validate()?;
        if config.motion_method != self.config.motion_method {
            Self::configure_motion(&mut self.motion, config.motion_method);
        }
        if self.config.toggles.qr && !config.toggles.qr {
            self.qr.clear();
        }
        if !self.config.toggles.motion && config.toggles.motion {
            self.motion.invalidate();
        }
        self.config = config;
        log::info!("configuration replaced");
        Ok(())
    }

    /// Run the enabled stages over a copy of `frame`.
    pub fn process(&mut self, frame: &Frame) {
        if self.config.toggles.motion {
            self.previous = self.clean.take();
        }
        self.current = frame.clone();
        self.frame = frame.clone();

        if frame.is_empty() {
            log::debug!("empty frame skipped");
            return;
        }

        for stage in STAGE_ORDER {
            if !stage.is_enabled(&self.config) {
                continue;
            }
            match self.run_stage(stage) {
                Ok(()) => log::debug!("{} stage applied", stage.name()),
                Err(err) => log::warn!("{} stage skipped: {err}", stage.name()),
            }
        }

        if self.config.toggles.motion {
            self.clean = Some(self.frame.clone());
        }
    }

    fn run_stage(&mut self, stage: Stage) -> Result<(), PipelineError> {
        let c = &self.config;
        let frame = &mut self.frame;
        match stage {
            Stage::Face => self.face.apply(frame),
            Stage::Grayscale => stage::grayscale(frame),
            Stage::Photo => stage::photo(
                frame,
                c.photo_method,
                c.photo_sigma_s as f32,
                c.photo_sigma_r as f32,
            ),
            Stage::Inversion => {
                stage::inversion(frame);
                Ok(())
            }
            Stage::HistogramEq => stage::equalize_luma(
                frame,
                c.histogram_method,
                c.histogram_tiles as usize,
                c.histogram_clip_limit as f32,
            ),
            Stage::Edges => stage::edges(
                frame,
                c.edge_method,
                c.canny_threshold as f32,
                c.canny_ratio as f32,
            ),
            Stage::Blur => stage::blur(frame, c.blur_method, c.blur_size as usize, c.morph_element),
            Stage::Threshold => {
                let level = stage::threshold_frame(
                    frame,
                    c.threshold_method,
                    c.threshold_value as u8,
                    c.threshold_blocksize as usize,
                    c.threshold_inverse,
                )?;
                self.last_threshold = Some(level);
                Ok(())
            }
            Stage::Transform => stage::transform(frame, c.transform_method, c.rotation as f32),
            Stage::Qr => self.qr.apply(frame),
        }
    }

    /// The frame produced by the last [`FrameProcessor::process`] call.
    pub fn processed_frame(&self) -> &Frame {
        &self.frame
    }

    /// The histogram chart of the last input frame.
    pub fn histogram_view(&self) -> Result<Frame, PipelineError> {
        views::histogram_view(&self.current)
    }

    /// The objects found in the processed frame by the selected method.
    pub fn object_detection_view(&self) -> Result<Frame, PipelineError> {
        views::object_detection_view(
            &self.frame,
            self.config.object_detection_method,
            self.config.detection_threshold,
        )
    }

    /// The moving part of the processed frame.
    ///
    /// The bounding boxes of the moving regions are drawn on the processed
    /// frame.
    pub fn motion_detection_view(&mut self) -> Result<Frame, PipelineError> {
        let detection = self.motion.detect(&mut self.frame, self.previous.as_ref())?;
        log::debug!("{} moving regions", detection.boxes.len());
        Ok(detection.view)
    }

    /// The last stitched panorama.
    pub fn panorama_view(&self) -> &Frame {
        self.panorama.result()
    }

    /// The panorama frames and state.
    pub fn panorama(&self) -> &PanoramaAccumulator {
        &self.panorama
    }

    /// Add the processed frame to the panorama.
    pub fn panorama_insert(&mut self) {
        self.panorama.insert(&self.frame);
    }

    /// Drop the last frame added to the panorama.
    pub fn panorama_pop_last(&mut self) {
        self.panorama.pop_last();
    }

    /// Stitch the panorama frames.
    pub fn panorama_compute(&mut self) -> StitchStatus {
        self.panorama.compute()
    }

    /// Clear the panorama, its view becomes the processed frame.
    pub fn panorama_reset(&mut self) {
        self.panorama.reset(&self.frame);
    }

    /// Save the panorama view to an image file.
    pub fn save_panorama(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        self.panorama.save(path)
    }

    /// Use another stitcher for the panorama, its frames are dropped.
    pub fn set_stitcher<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn Stitcher> + Send + 'static,
    {
        self.panorama = PanoramaAccumulator::with_stitcher(factory);
    }

    /// Enable or disable a stage or view.
    ///
    /// # Returns
    ///
    /// The status message, e.g. "Blur filter activated".
    pub fn toggle(&mut self, toggle: Toggle, enabled: bool) -> String {
        let was = self.config.toggles.get(toggle);
        self.config.toggles.set(toggle, enabled);
        match toggle {
            Toggle::Motion if enabled && !was => self.motion.invalidate(),
            Toggle::Motion if !enabled => {
                self.previous = None;
                self.clean = None;
            }
            Toggle::Qr if !enabled => self.qr.clear(),
            _ => {}
        }
        let status = toggle.status(enabled);
        log::info!("{status}");
        status
    }

    /// The threshold level used on the last frame, if the stage ran.
    pub fn last_threshold(&self) -> Option<f64> {
        self.last_threshold
    }

    /// The last decoded symbol.
    pub fn qr_result(&self) -> Option<&QrResult> {
        self.qr.result()
    }

    /// Use another symbol scanner.
    pub fn set_symbol_scanner(&mut self, scanner: Box<dyn SymbolScanner>) {
        self.qr.set_scanner(scanner);
    }

    /// Use another face detector.
    pub fn set_face_detector(&mut self, detector: Box<dyn FaceDetector>) {
        self.face.set_detector(detector);
    }

    /// Use another landmark detector for the ornaments.
    pub fn set_landmark_detector(&mut self, landmarks: Box<dyn LandmarkDetector>) {
        self.face.set_landmark_detector(landmarks);
    }

    /// Paint these ornaments on the detected faces, `None` to stop.
    pub fn set_ornaments(&mut self, ornaments: Option<Ornaments>) {
        self.face.set_ornaments(ornaments);
    }

    /// Load the background image of the face stage.
    ///
    /// # Returns
    ///
    /// `false` when the file cannot be read.
    pub fn set_background_image(&mut self, path: impl AsRef<Path>) -> bool {
        self.face.load_background(path.as_ref())
    }

    /// Set the background image of the face stage.
    pub fn set_background(&mut self, background: Frame) {
        self.face.set_background(background);
    }

    /// Set the blur kernel size.
    pub fn set_blur_size(&mut self, size: i32) -> Result<(), PipelineError> {
        check_blur_size(size)?;
        self.config.blur_size = size;
        Ok(())
    }

    /// Set the blur method.
    pub fn set_blur_method(&mut self, method: BlurMethod) {
        self.config.blur_method = method;
    }

    /// Set the blur method from its 1-based selector.
    pub fn set_blur_method_index(&mut self, index: i32) -> Result<(), PipelineError> {
        self.config.blur_method = select(Stage::Blur, index, BlurMethod::from_index)?;
        Ok(())
    }

    /// Set the structuring element of the morphology methods.
    pub fn set_morph_element(&mut self, element: MorphElement) {
        self.config.morph_element = element;
    }

    /// Set the structuring element from its 1-based selector.
    pub fn set_morph_element_index(&mut self, index: i32) -> Result<(), PipelineError> {
        self.config.morph_element = select(Stage::Blur, index, MorphElement::from_index)?;
        Ok(())
    }

    /// Set the edge detection method.
    pub fn set_edge_method(&mut self, method: EdgeMethod) {
        self.config.edge_method = method;
    }

    /// Set the edge detection method from its 1-based selector.
    pub fn set_edge_method_index(&mut self, index: i32) -> Result<(), PipelineError> {
        self.config.edge_method = select(Stage::Edges, index, EdgeMethod::from_index)?;
        Ok(())
    }

    /// Set the low canny threshold.
    pub fn set_canny_threshold(&mut self, value: i32) -> Result<(), PipelineError> {
        check_u8_level("canny_threshold", value)?;
        self.config.canny_threshold = value;
        Ok(())
    }

    /// Set the ratio between the high and low canny thresholds.
    pub fn set_canny_ratio(&mut self, ratio: f64) -> Result<(), PipelineError> {
        check_canny_ratio(ratio)?;
        self.config.canny_ratio = ratio;
        Ok(())
    }

    /// Set the threshold method.
    pub fn set_threshold_method(&mut self, method: ThresholdMethod) {
        self.config.threshold_method = method;
    }

    /// Set the threshold method from its 1-based selector.
    pub fn set_threshold_method_index(&mut self, index: i32) -> Result<(), PipelineError> {
        self.config.threshold_method =
            select(Stage::Threshold, index, ThresholdMethod::from_index)?;
        Ok(())
    }

    /// Set the level of the fixed threshold methods.
    pub fn set_threshold_value(&mut self, value: i32) -> Result<(), PipelineError> {
        check_u8_level("threshold_value", value)?;
        self.config.threshold_value = value;
        Ok(())
    }

    /// Set the block size of the adaptive threshold methods.
    pub fn set_threshold_blocksize(&mut self, size: i32) -> Result<(), PipelineError> {
        check_blocksize(size)?;
        self.config.threshold_blocksize = size;
        Ok(())
    }

    /// Invert the output of the adaptive threshold methods.
    pub fn set_threshold_inverse(&mut self, inverse: bool) {
        self.config.threshold_inverse = inverse;
    }

    /// Set the geometric transformation.
    pub fn set_transform_method(&mut self, method: TransformMethod) {
        self.config.transform_method = method;
    }

    /// Set the geometric transformation from its 1-based selector.
    pub fn set_transform_method_index(&mut self, index: i32) -> Result<(), PipelineError> {
        self.config.transform_method =
            select(Stage::Transform, index, TransformMethod::from_index)?;
        Ok(())
    }

    /// Set the rotation angle in degrees.
    pub fn set_rotation(&mut self, angle: i32) -> Result<(), PipelineError> {
        check_rotation(angle)?;
        self.config.rotation = angle;
        Ok(())
    }

    /// Set the histogram equalisation method.
    pub fn set_histogram_method(&mut self, method: HistogramMethod) {
        self.config.histogram_method = method;
    }

    /// Set the histogram equalisation method from its 1-based selector.
    pub fn set_histogram_method_index(&mut self, index: i32) -> Result<(), PipelineError> {
        self.config.histogram_method =
            select(Stage::HistogramEq, index, HistogramMethod::from_index)?;
        Ok(())
    }

    /// Set the number of CLAHE tiles along each axis.
    pub fn set_histogram_tiles(&mut self, tiles: i32) -> Result<(), PipelineError> {
        check_histogram_tiles(tiles)?;
        self.config.histogram_tiles = tiles;
        Ok(())
    }

    /// Set the CLAHE clip limit.
    pub fn set_histogram_clip_limit(&mut self, limit: i32) -> Result<(), PipelineError> {
        check_positive("histogram_clip_limit", limit)?;
        self.config.histogram_clip_limit = limit;
        Ok(())
    }

    /// Set the object detection method.
    pub fn set_object_detection_method(&mut self, method: ObjectDetectionMethod) {
        self.config.object_detection_method = method;
    }

    /// Set the object detection method from its 1-based selector.
    pub fn set_object_detection_method_index(&mut self, index: i32) -> Result<(), PipelineError> {
        // the object view is not a stage, the closest one names it
        let method = ObjectDetectionMethod::from_index(index).ok_or_else(|| {
            log::warn!("unsupported method {index} for the object detection view");
            PipelineError::UnsupportedMethod {
                stage: "object detection",
                selector: index,
            }
        })?;
        self.config.object_detection_method = method;
        Ok(())
    }

    /// Set the threshold shared by the object detection methods.
    pub fn set_detection_threshold(&mut self, value: i32) -> Result<(), PipelineError> {
        check_detection_threshold(value)?;
        self.config.detection_threshold = value;
        Ok(())
    }

    /// Set the motion detection method, the background model is rebuilt.
    pub fn set_motion_method(&mut self, method: MotionMethod) {
        self.config.motion_method = method;
        Self::configure_motion(&mut self.motion, method);
    }

    /// Set the motion detection method from its 1-based selector.
    pub fn set_motion_method_index(&mut self, index: i32) -> Result<(), PipelineError> {
        let method = MotionMethod::from_index(index).ok_or_else(|| {
            log::warn!("unsupported method {index} for the motion detection view");
            PipelineError::UnsupportedMethod {
                stage: "motion detection",
                selector: index,
            }
        })?;
        self.set_motion_method(method);
        Ok(())
    }

    /// How many background models the motion detector built.
    pub fn motion_model_generation(&self) -> usize {
        self.motion.model_generation()
    }

    /// Set the photo effect.
    pub fn set_photo_method(&mut self, method: PhotoMethod) {
        self.config.photo_method = method;
    }

    /// Set the photo effect from its 1-based selector.
    pub fn set_photo_method_index(&mut self, index: i32) -> Result<(), PipelineError> {
        self.config.photo_method = select(Stage::Photo, index, PhotoMethod::from_index)?;
        Ok(())
    }

    /// Set the spatial sigma of the photo effects.
    pub fn set_photo_sigma_s(&mut self, sigma: i32) -> Result<(), PipelineError> {
        check_sigma_s(sigma)?;
        self.config.photo_sigma_s = sigma;
        Ok(())
    }

    /// Set the range sigma of the photo effects.
    pub fn set_photo_sigma_r(&mut self, sigma: f64) -> Result<(), PipelineError> {
        check_sigma_r(sigma)?;
        self.config.photo_sigma_r = sigma;
        Ok(())
    }
}
