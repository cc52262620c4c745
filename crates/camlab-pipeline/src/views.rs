//! Auxiliary views computed on demand from the current frame.

use camlab_image::Frame;
use camlab_imgproc::{
    color::{to_gray, to_rgb},
    draw::{draw_circle, draw_filled_circle, draw_line},
    edges::canny,
    features::{harris_response, hough_circles, hough_lines, normalize_min_max, HoughCircleParams},
    filter::gaussian_blur_u8,
    histogram::draw_histogram_chart,
};

use crate::{config::ObjectDetectionMethod, error::PipelineError};

/// The per-channel histogram chart of a frame.
pub fn histogram_view(frame: &Frame) -> Result<Frame, PipelineError> {
    Ok(draw_histogram_chart(frame)?)
}

const LINE_CANNY_LOW: f32 = 50.0;
const LINE_CANNY_HIGH: f32 = 200.0;
const LINE_REACH: f32 = 1000.0;
const LINE_COLOR: [u8; 3] = [0, 0, 255];

const CIRCLE_BLUR_SIZE: usize = 9;
const CIRCLE_BLUR_SIGMA: f32 = 2.0;
const CIRCLE_CENTER_COLOR: [u8; 3] = [0, 255, 0];
const CIRCLE_COLOR: [u8; 3] = [0, 0, 255];

const HARRIS_BLOCK_SIZE: usize = 2;
const HARRIS_K: f32 = 0.04;
const CORNER_COLOR: [u8; 3] = [0, 0, 255];

/// Annotate the objects found in a frame.
///
/// The drawing canvas is the gray level frame, or the canny edges for the
/// line transform. `threshold` is the vote threshold of the Hough methods
/// and the normalised response threshold of the Harris method.
pub fn object_detection_view(
    frame: &Frame,
    method: ObjectDetectionMethod,
    threshold: i32,
) -> Result<Frame, PipelineError> {
    let gray = to_gray(frame)?;
    let threshold = threshold.max(0);

    let view = match method {
        ObjectDetectionMethod::HoughLines => {
            let edges = canny(&gray, LINE_CANNY_LOW, LINE_CANNY_HIGH)?;
            let mut view = to_rgb(&edges)?;
            let lines = hough_lines(&edges, 1.0, 1f32.to_radians(), threshold as usize)?;
            log::debug!("{} lines", lines.len());
            for line in lines {
                let (p0, p1) = line.endpoints(LINE_REACH);
                draw_line(&mut view, p0, p1, LINE_COLOR, 3);
            }
            view
        }
        ObjectDetectionMethod::HoughCircles => {
            let mut view = to_rgb(&gray)?;
            let blurred = gaussian_blur_u8(&gray, CIRCLE_BLUR_SIZE, CIRCLE_BLUR_SIGMA)?;
            let params = HoughCircleParams {
                dp: 1.0,
                min_dist: 10.0,
                canny_high: 100.0,
                acc_threshold: threshold as usize,
                min_radius: 5,
                max_radius: 0,
            };
            let circles = hough_circles(&blurred, &params)?;
            log::debug!("{} circles", circles.len());
            for circle in circles {
                let center = (circle.x.round() as i64, circle.y.round() as i64);
                draw_filled_circle(&mut view, center, 3, CIRCLE_CENTER_COLOR);
                draw_circle(&mut view, center, circle.radius.round() as i64, CIRCLE_COLOR, 3);
            }
            view
        }
        ObjectDetectionMethod::HarrisCorners => {
            let mut view = to_rgb(&gray)?;
            let response = harris_response(&gray, HARRIS_BLOCK_SIZE, HARRIS_K)?;
            let response = normalize_min_max(&response, 0.0, 255.0);
            let width = response.width();
            for (i, &r) in response.as_slice().iter().enumerate() {
                if r as i32 > threshold {
                    let center = ((i % width) as i64, (i / width) as i64);
                    draw_circle(&mut view, center, 5, CORNER_COLOR, 2);
                }
            }
            view
        }
    };
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::ImageSize;
    use camlab_imgproc::draw::draw_rect;

    fn square_frame() -> Result<Frame, PipelineError> {
        let mut frame = Frame::from_size_val([80, 60].into(), 20)?;
        for y in 15..45 {
            for x in 25..55 {
                frame.pixel_mut(x, y).copy_from_slice(&[230, 230, 230]);
            }
        }
        Ok(frame)
    }

    fn count_color(frame: &Frame, color: [u8; 3]) -> usize {
        frame
            .as_slice()
            .chunks_exact(3)
            .filter(|p| *p == color)
            .count()
    }

    #[test]
    fn test_histogram_view_size() -> Result<(), PipelineError> {
        let view = histogram_view(&square_frame()?)?;
        assert_eq!(
            view.size(),
            ImageSize {
                width: 512,
                height: 400
            }
        );
        Ok(())
    }

    #[test]
    fn test_lines_on_square() -> Result<(), PipelineError> {
        let frame = square_frame()?;
        let view = object_detection_view(&frame, ObjectDetectionMethod::HoughLines, 20)?;
        assert_eq!(view.size(), frame.size());
        assert!(count_color(&view, LINE_COLOR) > 0);

        // an unreachable threshold leaves the edges only
        let view = object_detection_view(&frame, ObjectDetectionMethod::HoughLines, 10_000)?;
        assert_eq!(count_color(&view, LINE_COLOR), 0);
        Ok(())
    }

    #[test]
    fn test_corners_on_square() -> Result<(), PipelineError> {
        let frame = square_frame()?;
        let view = object_detection_view(&frame, ObjectDetectionMethod::HarrisCorners, 100)?;
        assert!(count_color(&view, CORNER_COLOR) > 0);
        // nothing exceeds the top of the normalised range
        let view = object_detection_view(&frame, ObjectDetectionMethod::HarrisCorners, 255)?;
        assert_eq!(count_color(&view, CORNER_COLOR), 0);
        Ok(())
    }

    #[test]
    fn test_circle_view() -> Result<(), PipelineError> {
        let mut frame = Frame::from_size_val([100, 100].into(), 0)?;
        draw_filled_circle(&mut frame, (50, 50), 20, [255, 255, 255]);
        draw_rect(&mut frame, (0, 0), (99, 99), [0, 0, 0], 1);
        let view = object_detection_view(&frame, ObjectDetectionMethod::HoughCircles, 20)?;
        assert_eq!(view.size(), frame.size());
        assert!(count_color(&view, CIRCLE_CENTER_COLOR) > 0);
        Ok(())
    }
}
