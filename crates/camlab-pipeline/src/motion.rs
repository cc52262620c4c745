use camlab_image::{ops::copy_with_mask, Frame, GrayImage};
use camlab_imgproc::{
    background::{GaussianMixtureModel, MixtureParams},
    color::to_gray,
    contours::{find_external_contours, Rect},
    draw::draw_rect,
    flow::{dense_lucas_kanade, flow_magnitude_mask},
    morphology::{dilate, erode, Kernel, KernelShape},
    threshold::{threshold, ThresholdType},
};

use crate::{config::MotionMethod, error::PipelineError};

/// Mask level above which a pixel is moving.
const MOTION_LEVEL: u8 = 25;
const DILATE_ITERATIONS: usize = 3;
const FLOW_WINDOW: usize = 5;
const FLOW_MIN_MAGNITUDE: f32 = 1.0;
const BOX_COLOR: [u8; 3] = [255, 0, 0];

/// The outcome of one motion detection step.
#[derive(Debug, Clone)]
pub struct MotionDetection {
    /// The moving pixels of the frame over a black background.
    pub view: Frame,
    /// The bounding rectangles of the moving regions.
    pub boxes: Vec<Rect>,
}

/// Finds moving regions with a background model or the dense optical flow.
///
/// The background model is created lazily and kept across frames. It is
/// rebuilt only after [`BackgroundMotionDetector::configure`] or
/// [`BackgroundMotionDetector::invalidate`].
pub struct BackgroundMotionDetector {
    method: MotionMethod,
    params: MixtureParams,
    model: Option<GaussianMixtureModel>,
    dirty: bool,
    generation: usize,
}

impl Default for BackgroundMotionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundMotionDetector {
    /// A detector using background subtraction with the default model.
    pub fn new() -> Self {
        Self {
            method: MotionMethod::default(),
            params: MixtureParams::default(),
            model: None,
            dirty: true,
            generation: 0,
        }
    }

    /// Select the method and the background model parameters.
    ///
    /// The model is rebuilt on the next detection.
    pub fn configure(
        &mut self,
        method: MotionMethod,
        history: usize,
        var_threshold: f32,
        detect_shadows: bool,
    ) {
        self.method = method;
        self.params = MixtureParams {
            history,
            var_threshold,
            detect_shadows,
            ..self.params
        };
        self.dirty = true;
    }

    /// Drop the learnt background on the next detection.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// The active method.
    pub fn method(&self) -> MotionMethod {
        self.method
    }

    /// How many background models were built so far.
    pub fn model_generation(&self) -> usize {
        self.generation
    }

    fn model(&mut self) -> &mut GaussianMixtureModel {
        if self.dirty {
            self.model = None;
            self.dirty = false;
        }
        let params = self.params;
        let generation = &mut self.generation;
        self.model.get_or_insert_with(|| {
            *generation += 1;
            log::debug!("background model {} built with {:?}", generation, params);
            GaussianMixtureModel::new(params)
        })
    }

    fn raw_mask(
        &mut self,
        frame: &Frame,
        previous: Option<&Frame>,
    ) -> Result<GrayImage, PipelineError> {
        match self.method {
            MotionMethod::BackgroundSubtraction => Ok(self.model().apply(frame)?),
            MotionMethod::DenseOpticalFlow => match previous {
                Some(prev) if prev.size() == frame.size() => {
                    let flow = dense_lucas_kanade(&to_gray(prev)?, &to_gray(frame)?, FLOW_WINDOW)?;
                    Ok(flow_magnitude_mask(&flow, FLOW_MIN_MAGNITUDE))
                }
                _ => Ok(GrayImage::from_size_val(frame.size(), 0)?),
            },
        }
    }

    /// Detect the moving regions of `frame` and outline them in red on it.
    ///
    /// `previous` is the frame before, used by the optical flow method. Without
    /// it the flow method reports no motion.
    pub fn detect(
        &mut self,
        frame: &mut Frame,
        previous: Option<&Frame>,
    ) -> Result<MotionDetection, PipelineError> {
        if frame.is_empty() {
            return Ok(MotionDetection {
                view: Frame::empty(),
                boxes: Vec::new(),
            });
        }

        let raw = self.raw_mask(frame, previous)?;

        let mut mask = GrayImage::from_size_val(raw.size(), 0)?;
        threshold(&raw, &mut mask, MOTION_LEVEL, 255, ThresholdType::Binary)?;
        let kernel = Kernel::new(KernelShape::Rect, 3, 3);
        let mask = erode(&mask, &kernel, 1)?;
        let mask = dilate(&mask, &kernel, DILATE_ITERATIONS)?;

        let mut view = Frame::from_size_val(frame.size(), 0)?;
        copy_with_mask(frame, &mut view, &mask)?;

        let boxes: Vec<Rect> = find_external_contours(&mask)
            .iter()
            .map(|c| c.bounding_rect())
            .collect();
        for rect in &boxes {
            draw_rect(frame, (rect.x, rect.y), rect.bottom_right(), BOX_COLOR, 1);
        }
        Ok(MotionDetection { view, boxes })
    }
}
