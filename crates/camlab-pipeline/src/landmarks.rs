use std::f32::consts::PI;
use std::path::Path;

use camlab_image::{ops::bitwise_not, Frame, ImageSize};
use camlab_imgproc::{
    contours::Rect,
    draw::{draw_circle, draw_filled_circle, draw_line, ellipse_poly, fill_convex_poly},
    interpolation::InterpolationMode,
    resize::resize_to,
    warp::{get_rotation_matrix2d, warp_affine},
};
use camlab_io::functional::read_image_any_rgb8;

use crate::error::PipelineError;

/// Number of points of a face shape.
pub const LANDMARK_COUNT: usize = 68;

/// Ornament width relative to the landmark distance it spans.
const ORNAMENT_SPAN: f32 = 1.5;

/// The 68 landmarks of one face in the iBUG 300-W order.
///
/// 0-16 jaw, 17-26 brows, 27-35 nose, 36-47 eyes, 48-67 mouth.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceLandmarks {
    points: Vec<(f32, f32)>,
}

impl FaceLandmarks {
    /// Create a shape from its points.
    ///
    /// Returns `None` unless exactly [`LANDMARK_COUNT`] points are given.
    pub fn new(points: Vec<(f32, f32)>) -> Option<Self> {
        (points.len() == LANDMARK_COUNT).then_some(Self { points })
    }

    /// The point at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`LANDMARK_COUNT`].
    pub fn point(&self, index: usize) -> (f32, f32) {
        self.points[index]
    }

    /// All the points.
    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    /// The shape mapped from the unit square onto a face rectangle.
    pub fn fit_to(&self, face: &Rect) -> Self {
        let (w, h) = (face.width as f32, face.height as f32);
        Self {
            points: self
                .points
                .iter()
                .map(|&(x, y)| (face.x as f32 + x * w, face.y as f32 + y * h))
                .collect(),
        }
    }
}

fn ellipse_point(center: (f32, f32), axes: (f32, f32), angle: f32) -> (f32, f32) {
    let (sin, cos) = angle.sin_cos();
    (center.0 + axes.0 * cos, center.1 + axes.1 * sin)
}

/// The average face shape in the unit square of the face rectangle.
pub fn mean_face_shape() -> FaceLandmarks {
    let mut points = Vec::with_capacity(LANDMARK_COUNT);

    // jaw, temple to temple under the chin
    points.extend((0..17).map(|k| {
        ellipse_point((0.5, 0.2), (0.5, 0.8), PI - k as f32 * PI / 16.0)
    }));
    // brows
    for cx in [0.27, 0.73] {
        points.extend((0..5).map(|k| {
            ellipse_point((cx, 0.14), (0.17, 0.05), PI + k as f32 * PI / 4.0)
        }));
    }
    // nose bridge down to the tip, then the nostrils
    points.extend((0..4).map(|k| (0.5, 0.22 + k as f32 * 0.12)));
    points.extend((0..5).map(|k| {
        ellipse_point((0.5, 0.62), (0.1, 0.06), PI - k as f32 * PI / 4.0)
    }));
    // eyes, outer corner first on the left one, inner corner first on the right one
    for cx in [0.3, 0.7] {
        points.extend((0..6).map(|k| {
            ellipse_point((cx, 0.3), (0.09, 0.035), PI + k as f32 * PI / 3.0)
        }));
    }
    // outer then inner lips, from the left corner over the upper lip
    points.extend((0..12).map(|k| {
        ellipse_point((0.5, 0.8), (0.17, 0.07), PI + k as f32 * PI / 6.0)
    }));
    points.extend((0..8).map(|k| {
        ellipse_point((0.5, 0.8), (0.11, 0.03), PI + k as f32 * PI / 4.0)
    }));

    FaceLandmarks { points }
}

/// A capability that locates the landmarks of a detected face.
pub trait LandmarkDetector: Send {
    /// The landmarks of the face inside `face`, `None` if it cannot be fitted.
    fn fit(&mut self, frame: &Frame, face: &Rect) -> Option<FaceLandmarks>;
}

/// Places the average face shape in the face rectangle.
#[derive(Debug, Clone)]
pub struct MeanShapeLandmarks {
    shape: FaceLandmarks,
}

impl Default for MeanShapeLandmarks {
    fn default() -> Self {
        Self {
            shape: mean_face_shape(),
        }
    }
}

impl LandmarkDetector for MeanShapeLandmarks {
    fn fit(&mut self, _frame: &Frame, face: &Rect) -> Option<FaceLandmarks> {
        (face.width > 0 && face.height > 0).then(|| self.shape.fit_to(face))
    }
}

/// The pictures painted over the faces, black on white.
///
/// They are combined with the frame by a bitwise and, so white is
/// transparent.
#[derive(Debug, Clone)]
pub struct Ornaments {
    /// Painted over the eyes.
    pub glasses: Frame,
    /// Painted between the nose and the mouth.
    pub mustache: Frame,
    /// Painted over the nose tip, spans the cheeks.
    pub mouse_nose: Frame,
}

impl Ornaments {
    /// Load the three pictures from image files.
    pub fn load(
        glasses: impl AsRef<Path>,
        mustache: impl AsRef<Path>,
        mouse_nose: impl AsRef<Path>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            glasses: read_image_any_rgb8(glasses)?,
            mustache: read_image_any_rgb8(mustache)?,
            mouse_nose: read_image_any_rgb8(mouse_nose)?,
        })
    }

    /// Built-in line drawings.
    pub fn drawn() -> Result<Self, PipelineError> {
        const INK: [u8; 3] = [0, 0, 0];

        let mut glasses = Frame::from_size_val([120, 40].into(), 255)?;
        draw_circle(&mut glasses, (26, 20), 16, INK, 4);
        draw_circle(&mut glasses, (94, 20), 16, INK, 4);
        draw_line(&mut glasses, (42, 18), (78, 18), INK, 3);

        let mut mustache = Frame::from_size_val([90, 30].into(), 255)?;
        for (center, angle) in [((25, 15), 15), ((65, 15), -15)] {
            let lobe = ellipse_poly(center, (22, 8), angle, 0, 360, 10);
            fill_convex_poly(&mut mustache, &lobe, INK);
        }

        let mut mouse_nose = Frame::from_size_val([120, 50].into(), 255)?;
        draw_filled_circle(&mut mouse_nose, (60, 25), 8, INK);
        for (dy, end) in [(-4, 10), (0, 25), (4, 40)] {
            draw_line(&mut mouse_nose, (48, 25 + dy), (5, end), INK, 2);
            draw_line(&mut mouse_nose, (72, 25 + dy), (115, end), INK, 2);
        }

        Ok(Self {
            glasses,
            mustache,
            mouse_nose,
        })
    }
}

fn midpoint(a: (f32, f32), b: (f32, f32)) -> (f32, f32) {
    ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
}

/// Scale an ornament to span `ORNAMENT_SPAN` times `width_from`-`width_to`,
/// tilt it like `tilt_from`-`tilt_to` and combine it with the frame at
/// `center` by bitwise and.
///
/// Returns `false` when the ornament does not fit entirely in the frame.
fn paint_ornament(
    frame: &mut Frame,
    ornament: &Frame,
    (width_from, width_to): ((f32, f32), (f32, f32)),
    (tilt_from, tilt_to): ((f32, f32), (f32, f32)),
    center: (f32, f32),
) -> Result<bool, PipelineError> {
    if ornament.is_empty() {
        return Ok(false);
    }
    let span = (width_to.0 - width_from.0).hypot(width_to.1 - width_from.1) * ORNAMENT_SPAN;
    let scale = span / ornament.width() as f32;
    let size = ImageSize {
        width: (ornament.width() as f32 * scale).round() as usize,
        height: (ornament.height() as f32 * scale).round() as usize,
    };
    if size.width == 0 || size.height == 0 {
        return Ok(false);
    }

    let left = center.0.round() as i64 - (size.width / 2) as i64;
    let top = center.1.round() as i64 - (size.height / 2) as i64;
    if left < 0
        || top < 0
        || left as usize + size.width > frame.width()
        || top as usize + size.height > frame.height()
    {
        return Ok(false);
    }

    let mut scaled = resize_to(ornament, size, InterpolationMode::Nearest)?;

    let tilt = -((tilt_to.1 - tilt_from.1) / (tilt_to.0 - tilt_from.0)).atan();
    let tilt = if tilt.is_nan() { 0.0 } else { tilt };
    // rotated on the negative so the uncovered corners come out white
    bitwise_not(&mut scaled);
    let pivot = ((size.width / 2) as f32, (size.height / 2) as f32);
    let m = get_rotation_matrix2d(pivot, tilt.to_degrees(), 1.0);
    let mut rotated = Frame::from_size_val(size, 0)?;
    warp_affine(&scaled, &mut rotated, &m, InterpolationMode::Bilinear);
    bitwise_not(&mut rotated);

    let (left, top) = (left as usize, top as usize);
    let stride = frame.width() * 3;
    let row_len = size.width * 3;
    let data = frame.as_slice_mut();
    for (y, src_row) in rotated.as_slice().chunks_exact(row_len).enumerate() {
        let start = (top + y) * stride + left * 3;
        data[start..start + row_len]
            .iter_mut()
            .zip(src_row)
            .for_each(|(dst, &src)| *dst &= src);
    }
    Ok(true)
}

/// Paint glasses across the eye corners 36 and 45.
pub fn draw_glasses(
    frame: &mut Frame,
    marks: &FaceLandmarks,
    glasses: &Frame,
) -> Result<bool, PipelineError> {
    let eyes = (marks.point(36), marks.point(45));
    paint_ornament(frame, glasses, eyes, eyes, midpoint(eyes.0, eyes.1))
}

/// Paint a mustache as wide as the mouth corners 48 and 54, between the
/// nose bottom 33 and the upper lip 51.
pub fn draw_mustache(
    frame: &mut Frame,
    marks: &FaceLandmarks,
    mustache: &Frame,
) -> Result<bool, PipelineError> {
    let mouth = (marks.point(48), marks.point(54));
    let center = midpoint(marks.point(33), marks.point(51));
    paint_ornament(frame, mustache, mouth, mouth, center)
}

/// Paint a mouse nose on the nose tip 30, as wide as the cheeks 3 and 13
/// and tilted like the temples 0 and 16.
pub fn draw_mouse_nose(
    frame: &mut Frame,
    marks: &FaceLandmarks,
    mouse_nose: &Frame,
) -> Result<bool, PipelineError> {
    paint_ornament(
        frame,
        mouse_nose,
        (marks.point(3), marks.point(13)),
        (marks.point(0), marks.point(16)),
        marks.point(30),
    )
}

impl Ornaments {
    /// Paint every ornament on one face.
    ///
    /// Returns how many of them fitted in the frame.
    pub fn paint(
        &self,
        frame: &mut Frame,
        marks: &FaceLandmarks,
    ) -> Result<usize, PipelineError> {
        let painted = [
            draw_glasses(frame, marks, &self.glasses)?,
            draw_mustache(frame, marks, &self.mustache)?,
            draw_mouse_nose(frame, marks, &self.mouse_nose)?,
        ];
        Ok(painted.into_iter().filter(|&p| p).count())
    }
}
