use std::{fmt, path::Path};

use camlab_image::{ops::copy_with_mask, Frame, GrayImage, ImageSize};
use camlab_imgproc::{
    color::to_gray,
    features::{
        harris_corners, match_descriptors, patch_descriptors, ransac_homography, CornerParams,
        RansacParams,
    },
    interpolation::InterpolationMode,
    warp::{compose_homography, transform_point, warp_perspective, Homography, IDENTITY_HOMOGRAPHY},
};
use camlab_io::functional::save_image;

use crate::error::PipelineError;

/// The outcome of a stitching attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StitchStatus {
    /// The panorama was composed.
    Ok,
    /// The frames do not overlap enough yet.
    NeedMoreImages,
    /// No homography explains the matches between two frames.
    HomographyEstimationFailed,
    /// The frames cannot be laid out on a common canvas.
    CameraParamsAdjustFailed,
}

impl StitchStatus {
    /// The numeric status code, 0 for success.
    pub fn code(&self) -> i32 {
        match self {
            StitchStatus::Ok => 0,
            StitchStatus::NeedMoreImages => 1,
            StitchStatus::HomographyEstimationFailed => 2,
            StitchStatus::CameraParamsAdjustFailed => 3,
        }
    }

    /// The status message shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            StitchStatus::Ok => "Stitcher normal return status 0",
            StitchStatus::NeedMoreImages => "Stitcher requires additionnal images 1",
            StitchStatus::HomographyEstimationFailed => {
                "Stitcher error: homography estimation fail 2"
            }
            StitchStatus::CameraParamsAdjustFailed => {
                "Stitcher error: camera parameters adjust fail 3"
            }
        }
    }

    /// Whether the status drops the last inserted frame.
    pub fn evicts_last(&self) -> bool {
        matches!(
            self,
            StitchStatus::HomographyEstimationFailed | StitchStatus::CameraParamsAdjustFailed
        )
    }
}

impl fmt::Display for StitchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// The lifecycle of a [`PanoramaAccumulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanoramaState {
    /// No frame inserted.
    #[default]
    Empty,
    /// Frames inserted since the last attempt.
    Accumulating,
    /// The last attempt succeeded.
    Stitched,
    /// The last attempt failed and dropped a frame.
    Failed,
}

/// A capability that composes overlapping frames into one image.
pub trait Stitcher: Send {
    /// Stitch the frames, in order, or tell why it is not possible.
    fn stitch(&mut self, frames: &[Frame]) -> Result<Frame, StitchStatus>;
}

/// Parameters of the [`FeatureStitcher`].
#[derive(Debug, Clone, Copy)]
pub struct FeatureStitcherParams {
    /// Corner detection.
    pub corners: CornerParams,
    /// Half side of the descriptor patches.
    pub patch_radius: usize,
    /// Ratio test of the descriptor matching.
    pub match_ratio: f32,
    /// Robust homography estimation.
    pub ransac: RansacParams,
    /// Largest composite relative to the summed frame areas.
    pub max_canvas_scale: f64,
}

impl Default for FeatureStitcherParams {
    fn default() -> Self {
        Self {
            corners: CornerParams::default(),
            patch_radius: 4,
            match_ratio: 0.8,
            ransac: RansacParams::default(),
            max_canvas_scale: 4.0,
        }
    }
}

/// Stitches frames by chaining the homographies between consecutive frames.
///
/// Every frame is warped into the plane of the first one and pasted over the
/// frames before it.
#[derive(Debug, Clone, Default)]
pub struct FeatureStitcher {
    params: FeatureStitcherParams,
}

impl FeatureStitcher {
    /// Create a stitcher with the given parameters.
    pub fn new(params: FeatureStitcherParams) -> Self {
        Self { params }
    }

    // homography from `next` to `prev`
    fn pairwise(&self, prev: &GrayImage, next: &GrayImage) -> Result<Homography, StitchStatus> {
        let describe = |img: &GrayImage| -> Result<_, StitchStatus> {
            let corners = harris_corners(img, &self.params.corners)
                .map_err(|_| StitchStatus::NeedMoreImages)?;
            Ok(patch_descriptors(img, &corners, self.params.patch_radius, 1))
        };
        let (kp_prev, desc_prev) = describe(prev)?;
        let (kp_next, desc_next) = describe(next)?;

        let matches = match_descriptors(&desc_next, &desc_prev, Some(self.params.match_ratio));
        log::debug!("{} matches between consecutive frames", matches.len());
        if matches.len() < self.params.ransac.min_inliers.max(4) {
            return Err(StitchStatus::NeedMoreImages);
        }

        let (src, dst): (Vec<_>, Vec<_>) = matches
            .iter()
            .map(|&(i, j)| {
                let (a, b) = (kp_next[i], kp_prev[j]);
                ((a.x as f64, a.y as f64), (b.x as f64, b.y as f64))
            })
            .unzip();

        let estimate = ransac_homography(&src, &dst, &self.params.ransac)
            .ok_or(StitchStatus::HomographyEstimationFailed)?;
        log::debug!(
            "homography with {}/{} inliers",
            estimate.num_inliers(),
            matches.len()
        );
        Ok(estimate.homography)
    }

    fn compose(&self, frames: &[Frame], to_first: &[Homography]) -> Result<Frame, StitchStatus> {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (frame, h) in frames.iter().zip(to_first) {
            let w = frame.width().saturating_sub(1) as f64;
            let hgt = frame.height().saturating_sub(1) as f64;
            for (x, y) in [(0.0, 0.0), (w, 0.0), (w, hgt), (0.0, hgt)] {
                let (u, v) =
                    transform_point(h, x, y).ok_or(StitchStatus::CameraParamsAdjustFailed)?;
                min_x = min_x.min(u);
                min_y = min_y.min(v);
                max_x = max_x.max(u);
                max_y = max_y.max(v);
            }
        }

        if !(min_x.is_finite() && max_x.is_finite() && min_y.is_finite() && max_y.is_finite()) {
            log::debug!("composite with a corner at infinity rejected");
            return Err(StitchStatus::CameraParamsAdjustFailed);
        }

        // the extent is checked in floating point before any cast
        let (extent_x, extent_y) = ((max_x - min_x).ceil() + 1.0, (max_y - min_y).ceil() + 1.0);
        let budget = frames.iter().map(|f| f.size().area() as f64).sum::<f64>()
            * self.params.max_canvas_scale;
        if extent_x * extent_y > budget {
            log::debug!("composite of {extent_x}x{extent_y} rejected");
            return Err(StitchStatus::CameraParamsAdjustFailed);
        }
        let size = ImageSize {
            width: extent_x as usize,
            height: extent_y as usize,
        };
        if size.width.checked_mul(size.height).is_none() {
            return Err(StitchStatus::CameraParamsAdjustFailed);
        }

        let offset = [1.0, 0.0, -min_x, 0.0, 1.0, -min_y, 0.0, 0.0, 1.0];
        let adjust = |_| StitchStatus::CameraParamsAdjustFailed;
        let mut canvas = Frame::from_size_val(size, 0).map_err(adjust)?;
        for (frame, h) in frames.iter().zip(to_first) {
            let m = compose_homography(&offset, h);
            let mut warped = Frame::from_size_val(size, 0).map_err(adjust)?;
            warp_perspective(frame, &mut warped, &m, InterpolationMode::Bilinear).map_err(adjust)?;

            let coverage = GrayImage::from_size_val(frame.size(), 255).map_err(adjust)?;
            let mut mask = GrayImage::from_size_val(size, 0).map_err(adjust)?;
            warp_perspective(&coverage, &mut mask, &m, InterpolationMode::Nearest)
                .map_err(adjust)?;
            copy_with_mask(&warped, &mut canvas, &mask).map_err(adjust)?;
        }
        Ok(canvas)
    }
}

impl Stitcher for FeatureStitcher {
    fn stitch(&mut self, frames: &[Frame]) -> Result<Frame, StitchStatus> {
        if frames.len() < 2 {
            return Err(StitchStatus::NeedMoreImages);
        }

        let grays = frames
            .iter()
            .map(to_gray)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| StitchStatus::NeedMoreImages)?;

        let mut to_first = vec![IDENTITY_HOMOGRAPHY];
        for pair in grays.windows(2) {
            let h = self.pairwise(&pair[0], &pair[1])?;
            let last = to_first[to_first.len() - 1];
            to_first.push(compose_homography(&last, &h));
        }

        self.compose(frames, &to_first)
    }
}

type StitcherFactory = Box<dyn Fn() -> Box<dyn Stitcher> + Send>;

/// An ordered set of frames and the panorama stitched from them.
///
/// A failed homography estimation or layout drops the last inserted frame,
/// so inserting another frame is enough to retry.
pub struct PanoramaAccumulator {
    frames: Vec<Frame>,
    result: Frame,
    // a stitch succeeded since the last reset
    stitched: bool,
    state: PanoramaState,
    factory: StitcherFactory,
    stitcher: Option<Box<dyn Stitcher>>,
}

impl Default for PanoramaAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl PanoramaAccumulator {
    /// An empty accumulator using the [`FeatureStitcher`].
    pub fn new() -> Self {
        Self::with_stitcher(|| Box::new(FeatureStitcher::default()))
    }

    /// An empty accumulator building its stitcher with `factory`.
    pub fn with_stitcher<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn Stitcher> + Send + 'static,
    {
        Self {
            frames: Vec::new(),
            result: Frame::empty(),
            stitched: false,
            state: PanoramaState::Empty,
            factory: Box::new(factory),
            stitcher: None,
        }
    }

    /// Append a frame, empty frames are ignored.
    pub fn insert(&mut self, frame: &Frame) {
        if frame.is_empty() {
            return;
        }
        self.frames.push(frame.clone());
        if !self.stitched {
            self.result = frame.clone();
        }
        self.state = PanoramaState::Accumulating;
        log::info!("panorama frame inserted, {} frames", self.frames.len());
    }

    /// Remove the last inserted frame, if any.
    pub fn pop_last(&mut self) -> Option<Frame> {
        let frame = self.frames.pop();
        if self.frames.is_empty() {
            self.state = PanoramaState::Empty;
        }
        frame
    }

    /// Stitch the current frames.
    pub fn compute(&mut self) -> StitchStatus {
        if self.frames.len() == 1 || self.stitcher.is_none() {
            self.stitcher = Some((self.factory)());
        }
        let outcome = match self.stitcher.as_mut() {
            Some(stitcher) => stitcher.stitch(&self.frames),
            None => Err(StitchStatus::NeedMoreImages),
        };

        let status = match outcome {
            Ok(panorama) => {
                self.result = panorama;
                self.stitched = true;
                self.state = PanoramaState::Stitched;
                StitchStatus::Ok
            }
            Err(status) => {
                if status.evicts_last() {
                    self.frames.pop();
                    self.state = PanoramaState::Failed;
                } else if !self.frames.is_empty() {
                    self.state = PanoramaState::Accumulating;
                }
                status
            }
        };
        log::info!("{status}");
        status
    }

    /// Drop every frame, the result becomes `current`.
    pub fn reset(&mut self, current: &Frame) {
        self.frames.clear();
        self.result = current.clone();
        self.stitched = false;
        self.state = PanoramaState::Empty;
        log::info!("panorama reset");
    }

    /// The number of frames.
    pub fn size(&self) -> usize {
        self.frames.len()
    }

    /// The last stitched panorama, or the latest frame before any success.
    pub fn result(&self) -> &Frame {
        &self.result
    }

    /// The current state.
    pub fn state(&self) -> PanoramaState {
        self.state
    }

    /// Write the current result to an image file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        if self.result.is_empty() {
            return Err(PipelineError::ResourceUnavailable(
                "no panorama to save".to_string(),
            ));
        }
        save_image(&self.result, path)?;
        Ok(())
    }
}
