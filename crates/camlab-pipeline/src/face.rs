use std::path::Path;
use std::sync::mpsc;

use camlab_image::{ops::copy_with_mask, Frame, GrayImage, ImageSize};
use camlab_imgproc::{
    color::to_gray,
    contours::Rect,
    draw::{ellipse_poly, fill_convex_poly},
    interpolation::InterpolationMode,
    resize::resize_to,
};
use camlab_io::functional::read_image_any_rgb8;

use crate::{
    error::PipelineError,
    landmarks::{LandmarkDetector, MeanShapeLandmarks, Ornaments},
};

/// A capability that locates faces in a frame.
pub trait FaceDetector: Send {
    /// The bounding rectangles of the faces found in `frame`.
    fn detect(&mut self, frame: &Frame) -> Vec<Rect>;
}

/// The absent detector, finds no face.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaceDetector;

impl FaceDetector for NoFaceDetector {
    fn detect(&mut self, _frame: &Frame) -> Vec<Rect> {
        Vec::new()
    }
}

/// Parameters of the [`RustfaceDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RustfaceParams {
    /// Smallest face side in pixels.
    pub min_face_size: u32,
    /// Classifier score a window needs to be a face.
    pub score_thresh: f64,
    /// Ratio between two levels of the image pyramid, below 1.
    pub pyramid_scale_factor: f32,
    /// Step in pixels of the sliding window.
    pub slide_window_step: u32,
}

impl Default for RustfaceParams {
    fn default() -> Self {
        Self {
            min_face_size: 30,
            score_thresh: 2.0,
            pyramid_scale_factor: 0.9,
            slide_window_step: 4,
        }
    }
}

/// Frontal face detection with the SeetaFace funnel cascade of `rustface`.
///
/// The cascade runs on its own thread, frames are sent to it in gray.
pub struct RustfaceDetector {
    requests: Option<mpsc::Sender<GrayImage>>,
    replies: mpsc::Receiver<Vec<Rect>>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl RustfaceDetector {
    /// Load a SeetaFace model file, e.g. `seeta_fd_frontal_v1.0.bin`.
    pub fn from_model_file(
        path: impl AsRef<Path>,
        params: RustfaceParams,
    ) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| {
            PipelineError::ResourceUnavailable(format!("face model {}: {err}", path.display()))
        })?;
        let detector = Self::from_model_bytes(bytes, params)?;
        log::info!("face model {} loaded", path.display());
        Ok(detector)
    }

    /// Start the detector on the content of a SeetaFace model file.
    pub fn from_model_bytes(bytes: Vec<u8>, params: RustfaceParams) -> Result<Self, PipelineError> {
        let (request_tx, request_rx) = mpsc::channel::<GrayImage>();
        let (reply_tx, reply_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        let worker = std::thread::Builder::new()
            .name("face-detector".to_string())
            .spawn(move || {
                let model = match rustface::read_model(std::io::Cursor::new(bytes)) {
                    Ok(model) => model,
                    Err(err) => {
                        if ready_tx.send(Err(err.to_string())).is_err() {
                            log::warn!("face detector owner gone");
                        }
                        return;
                    }
                };
                // the detector never leaves this thread
                let mut detector = rustface::create_detector_with_model(model);
                detector.set_min_face_size(params.min_face_size);
                detector.set_score_thresh(params.score_thresh);
                detector.set_pyramid_scale_factor(params.pyramid_scale_factor);
                detector.set_slide_window_step(params.slide_window_step, params.slide_window_step);
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }

                for gray in request_rx {
                    let mut image = rustface::ImageData::new(
                        gray.as_slice(),
                        gray.width() as u32,
                        gray.height() as u32,
                    );
                    let faces: Vec<Rect> = detector
                        .detect(&mut image)
                        .iter()
                        .map(|face| {
                            let bbox = face.bbox();
                            Rect {
                                x: bbox.x() as i64,
                                y: bbox.y() as i64,
                                width: bbox.width() as i64,
                                height: bbox.height() as i64,
                            }
                        })
                        .collect();
                    if reply_tx.send(faces).is_err() {
                        break;
                    }
                }
            })
            .map_err(|err| {
                PipelineError::ResourceUnavailable(format!("cannot start the face detector: {err}"))
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                requests: Some(request_tx),
                replies: reply_rx,
                worker: Some(worker),
            }),
            Ok(Err(reason)) => {
                if worker.join().is_err() {
                    log::error!("the face detector thread panicked");
                }
                Err(PipelineError::ResourceUnavailable(format!(
                    "invalid face model: {reason}"
                )))
            }
            Err(_) => Err(PipelineError::ResourceUnavailable(
                "the face detector stopped".to_string(),
            )),
        }
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&mut self, frame: &Frame) -> Vec<Rect> {
        let Some(requests) = self.requests.as_ref() else {
            return Vec::new();
        };
        let gray = match to_gray(frame) {
            Ok(gray) => gray,
            Err(err) => {
                log::warn!("cannot convert the frame for face detection: {err}");
                return Vec::new();
            }
        };
        if requests.send(gray).is_err() {
            log::warn!("the face detector stopped");
            self.requests = None;
            return Vec::new();
        }
        self.replies.recv().unwrap_or_else(|_| {
            log::warn!("the face detector stopped");
            self.requests = None;
            Vec::new()
        })
    }
}

impl Drop for RustfaceDetector {
    fn drop(&mut self) {
        // closing the request channel ends the worker loop
        self.requests = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("the face detector thread panicked");
            }
        }
    }
}

/// Step in degrees of the polygons approximating the face ellipses.
const ELLIPSE_STEP: i32 = 10;

/// The mask of the background region: 255 everywhere but inside the faces.
///
/// Each face is the ellipse centered on its rectangle with half axes of
/// 0.6 times its width and 0.8 times its height.
pub fn face_mask(size: ImageSize, faces: &[Rect]) -> Result<GrayImage, PipelineError> {
    let mut mask = GrayImage::from_size_val(size, 255)?;
    for face in faces {
        let center = (
            face.x + (face.width as f64 * 0.5) as i64,
            face.y + (face.height as f64 * 0.5) as i64,
        );
        let axes = (
            (face.width as f64 * 0.6) as i64,
            (face.height as f64 * 0.8) as i64,
        );
        let poly = ellipse_poly(center, axes, 0, 0, 360, ELLIPSE_STEP);
        fill_convex_poly(&mut mask, &poly, [0]);
    }
    Ok(mask)
}

/// Replaces the frame around detected faces by a background image and
/// paints the ornaments on them.
pub(crate) struct FaceStage {
    detector: Box<dyn FaceDetector>,
    landmarks: Box<dyn LandmarkDetector>,
    ornaments: Option<Ornaments>,
    background: Option<Frame>,
}

impl FaceStage {
    pub(crate) fn new() -> Self {
        Self {
            detector: Box::new(NoFaceDetector),
            landmarks: Box::new(MeanShapeLandmarks::default()),
            ornaments: None,
            background: None,
        }
    }

    pub(crate) fn set_detector(&mut self, detector: Box<dyn FaceDetector>) {
        self.detector = detector;
    }

    pub(crate) fn set_landmark_detector(&mut self, landmarks: Box<dyn LandmarkDetector>) {
        self.landmarks = landmarks;
    }

    pub(crate) fn set_ornaments(&mut self, ornaments: Option<Ornaments>) {
        self.ornaments = ornaments;
    }

    pub(crate) fn set_background(&mut self, background: Frame) {
        self.background = (!background.is_empty()).then_some(background);
    }

    pub(crate) fn load_background(&mut self, path: &Path) -> bool {
        match read_image_any_rgb8(path) {
            Ok(frame) => {
                log::info!("background image {} loaded", path.display());
                self.set_background(frame);
                self.background.is_some()
            }
            Err(err) => {
                log::warn!("cannot load background image {}: {err}", path.display());
                false
            }
        }
    }

    pub(crate) fn apply(&mut self, frame: &mut Frame) -> Result<(), PipelineError> {
        let Some(background) = self.background.as_mut() else {
            return Err(PipelineError::ResourceUnavailable(
                "no background image loaded".to_string(),
            ));
        };
        if background.size() != frame.size() {
            *background = resize_to(background, frame.size(), InterpolationMode::Bilinear)?;
        }

        let faces = self.detector.detect(frame);
        log::debug!("{} faces detected", faces.len());
        let mask = face_mask(frame.size(), &faces)?;
        if let Some(ornaments) = &self.ornaments {
            for face in &faces {
                if let Some(marks) = self.landmarks.fit(frame, face) {
                    ornaments.paint(frame, &marks)?;
                }
            }
        }
        copy_with_mask(background, frame, &mask)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::FaceLandmarks;

    struct FixedFaces(Vec<Rect>);

    impl FaceDetector for FixedFaces {
        fn detect(&mut self, _frame: &Frame) -> Vec<Rect> {
            self.0.clone()
        }
    }

    #[test]
    fn test_face_mask() -> Result<(), PipelineError> {
        let size = ImageSize {
            width: 64,
            height: 64,
        };
        let face = Rect {
            x: 22,
            y: 22,
            width: 20,
            height: 20,
        };
        let mask = face_mask(size, &[face])?;
        assert_eq!(mask.pixel(32, 32)[0], 0);
        assert_eq!(mask.pixel(32, 44)[0], 0);
        assert_eq!(mask.pixel(2, 2)[0], 255);
        assert_eq!(mask.pixel(60, 32)[0], 255);

        let none = face_mask(size, &[])?;
        assert!(none.as_slice().iter().all(|&v| v == 255));
        Ok(())
    }

    #[test]
    fn test_virtual_background() -> Result<(), PipelineError> {
        let size = ImageSize {
            width: 48,
            height: 40,
        };
        let mut stage = FaceStage::new();

        let mut frame = Frame::from_size_val(size, 10)?;
        assert!(matches!(
            stage.apply(&mut frame),
            Err(PipelineError::ResourceUnavailable(_))
        ));
        assert!(frame.as_slice().iter().all(|&v| v == 10));

        // the background is resized to the frame
        stage.set_background(Frame::from_size_val([24, 20].into(), 200)?);
        stage.set_detector(Box::new(FixedFaces(vec![Rect {
            x: 14,
            y: 10,
            width: 20,
            height: 20,
        }])));
        stage.apply(&mut frame)?;
        assert_eq!(frame.pixel(24, 20), &[10, 10, 10]);
        assert_eq!(frame.pixel(1, 1), &[200, 200, 200]);
        Ok(())
    }

    #[test]
    fn test_missing_background_file() {
        let mut stage = FaceStage::new();
        assert!(!stage.load_background(Path::new("missing/background.png")));
    }

    #[test]
    fn test_ornaments_on_faces() -> Result<(), PipelineError> {
        let size = ImageSize {
            width: 200,
            height: 200,
        };
        let face = Rect {
            x: 60,
            y: 60,
            width: 80,
            height: 80,
        };
        let mut stage = FaceStage::new();
        stage.set_background(Frame::from_size_val(size, 30)?);
        stage.set_detector(Box::new(FixedFaces(vec![face])));

        let mut plain = Frame::from_size_val(size, 255)?;
        stage.apply(&mut plain)?;
        assert_eq!(plain.pixel(100, 84), &[255, 255, 255]);

        let black = Frame::from_size_val([10, 4].into(), 0)?;
        stage.set_ornaments(Some(Ornaments {
            glasses: black.clone(),
            mustache: black.clone(),
            mouse_nose: black,
        }));
        let mut frame = Frame::from_size_val(size, 255)?;
        stage.apply(&mut frame)?;
        // glasses between the eye corners, background outside the face
        assert_eq!(frame.pixel(100, 84), &[0, 0, 0]);
        assert_eq!(frame.pixel(5, 5), &[30, 30, 30]);

        // no landmarks, no ornaments
        struct NoLandmarks;
        impl LandmarkDetector for NoLandmarks {
            fn fit(&mut self, _frame: &Frame, _face: &Rect) -> Option<FaceLandmarks> {
                None
            }
        }
        stage.set_landmark_detector(Box::new(NoLandmarks));
        let mut frame = Frame::from_size_val(size, 255)?;
        stage.apply(&mut frame)?;
        assert_eq!(frame.pixel(100, 84), &[255, 255, 255]);
        Ok(())
    }

    #[test]
    fn test_rustface_rejects_bad_models() {
        let _ = env_logger::builder().is_test(true).try_init();
        assert!(matches!(
            RustfaceDetector::from_model_file(
                "missing/seeta_fd_frontal_v1.0.bin",
                RustfaceParams::default()
            ),
            Err(PipelineError::ResourceUnavailable(_))
        ));
        assert!(matches!(
            RustfaceDetector::from_model_bytes(Vec::new(), RustfaceParams::default()),
            Err(PipelineError::ResourceUnavailable(_))
        ));
    }

    #[test]
    #[ignore = "needs the model file named by CAMLAB_FACE_MODEL"]
    fn test_rustface_blank_frame() -> Result<(), PipelineError> {
        let path = std::env::var("CAMLAB_FACE_MODEL")
            .map_err(|err| PipelineError::ResourceUnavailable(err.to_string()))?;
        let mut detector = RustfaceDetector::from_model_file(path, RustfaceParams::default())?;
        let frame = Frame::from_size_val([160, 120].into(), 128)?;
        assert!(detector.detect(&frame).is_empty());
        assert!(detector.detect(&frame).is_empty());
        Ok(())
    }
}
