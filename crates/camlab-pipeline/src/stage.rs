//! The processing stages and their fixed order.
//!
//! Stages that need no state beyond the configuration live here as plain
//! functions over the frame. Each one computes its result aside and only
//! replaces the frame on success, so a failed stage leaves the frame as it
//! found it.

use camlab_image::{
    ops::{bitwise_not, copy_with_mask},
    Frame, GrayImage, Image,
};
use camlab_imgproc::{
    color::{gray_round_trip, rgb_from_ycrcb, to_gray, to_rgb, ycrcb_from_rgb},
    edges::canny,
    filter::{
        bilateral_filter, box_blur_u8, convert_scale_abs, gaussian_blur_u8, laplacian,
        median_blur, sobel_abs_blend_u8,
    },
    histogram::{clahe, equalize_hist},
    morphology::{hit_or_miss, morphology_ex, Kernel, KernelShape, MorphOp},
    photo::{
        decolor, detail_enhance, edge_preserving, fast_nl_means_denoising_colored,
        pencil_sketch, simple_white_balance, stylization, NlMeansParams, WHITE_BALANCE_PERCENT,
    },
    threshold::{
        adaptive_threshold, otsu_threshold, threshold, triangle_threshold, AdaptiveMethod,
        ThresholdType,
    },
    warp::rotate,
};

use crate::{
    config::{
        BlurMethod, EdgeMethod, HistogramMethod, MorphElement, PhotoMethod, PipelineConfig,
        ThresholdMethod, Toggle, TransformMethod,
    },
    error::PipelineError,
};

/// A step of the frame pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Replace everything but the faces with a background image.
    Face,
    /// Gray level frame kept on three channels.
    Grayscale,
    /// Computational photography effect.
    Photo,
    /// Colour inversion.
    Inversion,
    /// Luma histogram equalisation.
    HistogramEq,
    /// Edge detection.
    Edges,
    /// Blur or morphology.
    Blur,
    /// Thresholding.
    Threshold,
    /// Geometric transformation.
    Transform,
    /// QR code scan and overlay.
    Qr,
}

/// The order in which enabled stages run on every frame.
pub const STAGE_ORDER: [Stage; 10] = [
    Stage::Face,
    Stage::Grayscale,
    Stage::Photo,
    Stage::Inversion,
    Stage::HistogramEq,
    Stage::Edges,
    Stage::Blur,
    Stage::Threshold,
    Stage::Transform,
    Stage::Qr,
];

impl Stage {
    /// The stage name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Face => "face",
            Stage::Grayscale => "grayscale",
            Stage::Photo => "photo",
            Stage::Inversion => "inversion",
            Stage::HistogramEq => "histogram equalization",
            Stage::Edges => "edge detection",
            Stage::Blur => "blur",
            Stage::Threshold => "threshold",
            Stage::Transform => "transformation",
            Stage::Qr => "qr code",
        }
    }

    /// The switch that enables the stage.
    pub fn toggle(&self) -> Toggle {
        match self {
            Stage::Face => Toggle::Face,
            Stage::Grayscale => Toggle::BlackWhite,
            Stage::Photo => Toggle::Photo,
            Stage::Inversion => Toggle::Inverse,
            Stage::HistogramEq => Toggle::HistogramEq,
            Stage::Edges => Toggle::Edge,
            Stage::Blur => Toggle::Blur,
            Stage::Threshold => Toggle::Threshold,
            Stage::Transform => Toggle::Transform,
            Stage::Qr => Toggle::Qr,
        }
    }

    /// Whether the stage runs under a configuration.
    pub fn is_enabled(&self, config: &PipelineConfig) -> bool {
        config.toggles.get(self.toggle())
    }
}

/// Pencil shade factor of the sketch effect.
pub const PENCIL_SHADE: f32 = 0.03;

/// The hit-or-miss pattern, a cross of foreground around a background center.
#[rustfmt::skip]
pub const HIT_OR_MISS_PATTERN: [i8; 9] = [
    0,  1, 0,
    1, -1, 1,
    0,  1, 0,
];

pub(crate) fn grayscale(frame: &mut Frame) -> Result<(), PipelineError> {
    let mut out = frame.clone();
    gray_round_trip(&mut out)?;
    *frame = out;
    Ok(())
}

pub(crate) fn photo(
    frame: &mut Frame,
    method: PhotoMethod,
    sigma_s: f32,
    sigma_r: f32,
) -> Result<(), PipelineError> {
    let out = match method {
        PhotoMethod::Decolor => decolor(frame)?.1,
        PhotoMethod::Denoise => fast_nl_means_denoising_colored(frame, &NlMeansParams::default())?,
        PhotoMethod::EdgePreserving => edge_preserving(frame, sigma_s, sigma_r)?,
        PhotoMethod::DetailEnhance => detail_enhance(frame, sigma_s, sigma_r)?,
        PhotoMethod::PencilSketch => pencil_sketch(frame, sigma_s, sigma_r, PENCIL_SHADE)?.1,
        PhotoMethod::Stylization => stylization(frame, sigma_s, sigma_r)?,
        PhotoMethod::WhiteBalance => simple_white_balance(frame, WHITE_BALANCE_PERCENT)?,
    };
    *frame = out;
    Ok(())
}

pub(crate) fn inversion(frame: &mut Frame) {
    bitwise_not(frame);
}

pub(crate) fn equalize_luma(
    frame: &mut Frame,
    method: HistogramMethod,
    tiles: usize,
    clip_limit: f32,
) -> Result<(), PipelineError> {
    let mut ycrcb = Frame::from_size_val(frame.size(), 0)?;
    ycrcb_from_rgb(frame, &mut ycrcb)?;

    let mut channels = ycrcb.split_channels()?;
    channels[0] = match method {
        HistogramMethod::Global => equalize_hist(&channels[0])?,
        HistogramMethod::Clahe => clahe(&channels[0], clip_limit, (tiles, tiles))?,
    };

    let merged = Frame::from_channels(&channels)?;
    let mut out = Frame::from_size_val(frame.size(), 0)?;
    rgb_from_ycrcb(&merged, &mut out)?;
    *frame = out;
    Ok(())
}

pub(crate) fn edges(
    frame: &mut Frame,
    method: EdgeMethod,
    canny_low: f32,
    canny_ratio: f32,
) -> Result<(), PipelineError> {
    let blurred = gaussian_blur_u8(frame, 3, 0.0)?;
    let gray = to_gray(&blurred)?;

    let out = match method {
        EdgeMethod::Sobel => to_rgb(&sobel_abs_blend_u8(&gray)?)?,
        EdgeMethod::Laplacian => {
            let mut lap = Image::<f32, 1>::from_size_val(gray.size(), 0.0)?;
            laplacian(&gray.cast::<f32>()?, &mut lap)?;
            to_rgb(&convert_scale_abs(&lap, 1.0))?
        }
        EdgeMethod::Canny => {
            let detected = canny(&gray, canny_low, canny_low * canny_ratio)?;
            let mut out = Frame::from_size_val(frame.size(), 0)?;
            copy_with_mask(&blurred, &mut out, &detected)?;
            out
        }
    };
    *frame = out;
    Ok(())
}

fn kernel_shape(element: MorphElement) -> KernelShape {
    match element {
        MorphElement::Rect => KernelShape::Rect,
        MorphElement::Cross => KernelShape::Cross,
        MorphElement::Ellipse => KernelShape::Ellipse,
    }
}

fn morph_op(method: BlurMethod) -> Option<MorphOp> {
    match method {
        BlurMethod::Erode => Some(MorphOp::Erode),
        BlurMethod::Dilate => Some(MorphOp::Dilate),
        BlurMethod::Open => Some(MorphOp::Open),
        BlurMethod::Close => Some(MorphOp::Close),
        BlurMethod::Gradient => Some(MorphOp::Gradient),
        BlurMethod::TopHat => Some(MorphOp::TopHat),
        BlurMethod::BlackHat => Some(MorphOp::BlackHat),
        _ => None,
    }
}

pub(crate) fn blur(
    frame: &mut Frame,
    method: BlurMethod,
    size: usize,
    element: MorphElement,
) -> Result<(), PipelineError> {
    let needs_odd = matches!(
        method,
        BlurMethod::Box | BlurMethod::Gaussian | BlurMethod::Median
    );
    if needs_odd && size % 2 == 0 {
        return Err(camlab_image::ImageError::InvalidKernelSize(size).into());
    }

    let out = match method {
        BlurMethod::Box => box_blur_u8(frame, size)?,
        BlurMethod::Gaussian => gaussian_blur_u8(frame, size, 0.0)?,
        BlurMethod::Median => median_blur(frame, size)?,
        BlurMethod::Bilateral => {
            bilateral_filter(frame, size, size as f32 * 2.0, size as f32 * 0.5)?
        }
        BlurMethod::HitOrMiss => {
            let gray = to_gray(frame)?;
            to_rgb(&hit_or_miss(&gray, &HIT_OR_MISS_PATTERN, 3, 3)?)?
        }
        morph => {
            let op = morph_op(morph).ok_or(PipelineError::UnsupportedMethod {
                stage: Stage::Blur.name(),
                selector: morph.index(),
            })?;
            let kernel = Kernel::new(kernel_shape(element), size, size);
            morphology_ex(frame, op, &kernel)?
        }
    };
    *frame = out;
    Ok(())
}

/// Threshold the gray level of the frame, keeping three channels.
///
/// # Returns
///
/// The level actually used, computed for the Otsu and triangle methods.
pub(crate) fn threshold_frame(
    frame: &mut Frame,
    method: ThresholdMethod,
    value: u8,
    blocksize: usize,
    inverse: bool,
) -> Result<f64, PipelineError> {
    let gray = to_gray(frame)?;
    let mut out = GrayImage::from_size_val(gray.size(), 0)?;

    let fixed = |kind: ThresholdType, out: &mut GrayImage, level: u8| {
        threshold(&gray, out, level, 255, kind)
    };
    let used = match method {
        ThresholdMethod::Binary => fixed(ThresholdType::Binary, &mut out, value).map(|_| value),
        ThresholdMethod::BinaryInv => {
            fixed(ThresholdType::BinaryInv, &mut out, value).map(|_| value)
        }
        ThresholdMethod::Trunc => fixed(ThresholdType::Trunc, &mut out, value).map(|_| value),
        ThresholdMethod::ToZero => fixed(ThresholdType::ToZero, &mut out, value).map(|_| value),
        ThresholdMethod::ToZeroInv => {
            fixed(ThresholdType::ToZeroInv, &mut out, value).map(|_| value)
        }
        ThresholdMethod::Otsu => {
            let level = otsu_threshold(&gray);
            fixed(ThresholdType::Binary, &mut out, level).map(|_| level)
        }
        ThresholdMethod::Triangle => {
            let level = triangle_threshold(&gray);
            fixed(ThresholdType::Binary, &mut out, level).map(|_| level)
        }
        ThresholdMethod::AdaptiveMean | ThresholdMethod::AdaptiveGaussian => {
            let statistic = if method == ThresholdMethod::AdaptiveMean {
                AdaptiveMethod::Mean
            } else {
                AdaptiveMethod::Gaussian
            };
            adaptive_threshold(&gray, &mut out, 255, statistic, inverse, blocksize, 0.0)
                .map(|_| value)
        }
    }?;

    *frame = to_rgb(&out)?;
    Ok(used as f64)
}

pub(crate) fn transform(
    frame: &mut Frame,
    method: TransformMethod,
    angle: f32,
) -> Result<(), PipelineError> {
    let out = match method {
        TransformMethod::Rotation => rotate(frame, angle)?,
    };
    *frame = out;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::ImageSize;

    fn gradient(size: ImageSize) -> Result<Frame, PipelineError> {
        let data = (0..size.area())
            .flat_map(|i| {
                let (x, y) = (i % size.width, i / size.width);
                [(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) % 256) as u8]
            })
            .collect();
        Ok(Frame::new(size, data)?)
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(STAGE_ORDER[0], Stage::Face);
        assert_eq!(STAGE_ORDER[2], Stage::Photo);
        assert_eq!(STAGE_ORDER[3], Stage::Inversion);
        assert_eq!(STAGE_ORDER[9], Stage::Qr);
        let mut toggles: Vec<Toggle> = STAGE_ORDER.iter().map(|s| s.toggle()).collect();
        toggles.dedup();
        assert_eq!(toggles.len(), STAGE_ORDER.len());
    }

    #[test]
    fn test_threshold_keeps_channels() -> Result<(), PipelineError> {
        let size = ImageSize {
            width: 24,
            height: 16,
        };
        let src = gradient(size)?;
        for &method in ThresholdMethod::ALL {
            for value in [0u8, 1, 127, 254, 255] {
                let mut frame = src.clone();
                threshold_frame(&mut frame, method, value, 3, false)?;
                assert_eq!(frame.size(), size);
                assert_eq!(frame.num_channels(), 3);
                assert_eq!(frame.as_slice().len(), size.area() * 3);
                // gray level output
                assert!(frame.as_slice().chunks_exact(3).all(|p| p[0] == p[1] && p[1] == p[2]));
            }
        }
        Ok(())
    }

    #[test]
    fn test_blur_keeps_size() -> Result<(), PipelineError> {
        let size = ImageSize {
            width: 21,
            height: 13,
        };
        let src = gradient(size)?;
        for &method in BlurMethod::ALL {
            for radius in [1usize, 3, 5, 7] {
                for &element in MorphElement::ALL {
                    let mut frame = src.clone();
                    blur(&mut frame, method, radius, element)?;
                    assert_eq!(frame.size(), size, "{method:?} {radius}");
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_threshold_sweep() -> Result<(), PipelineError> {
        let size = ImageSize {
            width: 16,
            height: 16,
        };
        let data = (0..=255u8)
            .flat_map(|v| [v, v.wrapping_mul(3), 255 - v])
            .collect();
        let src = Frame::new(size, data)?;
        let gray = to_gray(&src)?;

        for value in 0..=255u8 {
            for &method in ThresholdMethod::ALL {
                let mut frame = src.clone();
                let level = threshold_frame(&mut frame, method, value, 3, false)?;
                assert_eq!(frame.size(), size);
                assert!((0.0..=255.0).contains(&level));

                for (p, &g) in frame.as_slice().chunks_exact(3).zip(gray.as_slice()) {
                    assert!(p[0] == p[1] && p[1] == p[2], "{method:?} {value} {p:?}");
                    let above = g > value;
                    let expected = match method {
                        ThresholdMethod::Binary => Some(if above { 255 } else { 0 }),
                        ThresholdMethod::BinaryInv => Some(if above { 0 } else { 255 }),
                        ThresholdMethod::Trunc => Some(if above { value } else { g }),
                        ThresholdMethod::ToZero => Some(if above { g } else { 0 }),
                        ThresholdMethod::ToZeroInv => Some(if above { 0 } else { g }),
                        ThresholdMethod::Otsu | ThresholdMethod::Triangle => {
                            Some(if g > level as u8 { 255 } else { 0 })
                        }
                        ThresholdMethod::AdaptiveMean | ThresholdMethod::AdaptiveGaussian => None,
                    };
                    match expected {
                        Some(expected) => assert_eq!(p[0], expected, "{method:?} {value} {g}"),
                        None => assert!(p[0] == 0 || p[0] == 255, "{method:?} {value}"),
                    }
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_blur_at_size_limit() -> Result<(), PipelineError> {
        // the kernel is far larger than the frame
        let size = ImageSize {
            width: 21,
            height: 13,
        };
        let size_limit = crate::config::MAX_BLUR_SIZE as usize;
        let uniform = Frame::from_size_val(size, 128)?;
        let src = gradient(size)?;

        for &method in BlurMethod::ALL {
            for &element in MorphElement::ALL {
                let mut frame = src.clone();
                blur(&mut frame, method, size_limit, element)?;
                assert_eq!(frame.size(), size, "{method:?} {element:?}");

                let mut frame = uniform.clone();
                blur(&mut frame, method, size_limit, element)?;
                let flat = matches!(
                    method,
                    BlurMethod::Box
                        | BlurMethod::Gaussian
                        | BlurMethod::Median
                        | BlurMethod::Bilateral
                        | BlurMethod::Erode
                        | BlurMethod::Dilate
                        | BlurMethod::Open
                        | BlurMethod::Close
                );
                if flat {
                    assert!(
                        frame.as_slice().iter().all(|&v| v.abs_diff(128) <= 1),
                        "{method:?} {element:?}"
                    );
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_even_kernel_rejected() -> Result<(), PipelineError> {
        let src = gradient([8, 8].into())?;
        let mut frame = src.clone();
        assert!(blur(&mut frame, BlurMethod::Median, 4, MorphElement::Rect).is_err());
        assert_eq!(frame, src);
        // the bilateral filter takes any diameter
        blur(&mut frame, BlurMethod::Bilateral, 4, MorphElement::Rect)?;
        assert_eq!(frame.size(), src.size());
        Ok(())
    }

    #[test]
    fn test_otsu_uniform() -> Result<(), PipelineError> {
        let mut frame = Frame::from_size_val([16, 16].into(), 128)?;
        let level = threshold_frame(&mut frame, ThresholdMethod::Otsu, 0, 3, false)?;
        assert!((0.0..=255.0).contains(&level));
        assert!(frame.as_slice().iter().all(|&v| v == 0 || v == 255));
        Ok(())
    }

    #[test]
    fn test_otsu_two_tones() -> Result<(), PipelineError> {
        let size = ImageSize {
            width: 16,
            height: 16,
        };
        let data = (0..size.area())
            .flat_map(|i| if i % 16 < 8 { [40u8; 3] } else { [200u8; 3] })
            .collect();
        let mut frame = Frame::new(size, data)?;
        let level = threshold_frame(&mut frame, ThresholdMethod::Otsu, 0, 3, false)?;
        assert!((40.0..200.0).contains(&level));

        let mut values: Vec<u8> = frame.as_slice().to_vec();
        values.sort_unstable();
        values.dedup();
        assert_eq!(values, vec![0, 255]);
        Ok(())
    }

    #[test]
    fn test_rotate_twice() -> Result<(), PipelineError> {
        // odd sizes put the rotation center on a pixel
        let src = gradient([41, 31].into())?;
        let mut frame = src.clone();
        transform(&mut frame, TransformMethod::Rotation, 180.0)?;
        assert_ne!(frame, src);
        transform(&mut frame, TransformMethod::Rotation, 180.0)?;

        let diff: u64 = frame
            .as_slice()
            .iter()
            .zip(src.as_slice())
            .map(|(&a, &b)| (a as i64 - b as i64).unsigned_abs())
            .sum();
        let mean = diff as f64 / src.as_slice().len() as f64;
        assert!(mean < 2.0, "mean error {mean}");
        Ok(())
    }

    #[test]
    fn test_edges_and_histogram() -> Result<(), PipelineError> {
        let src = gradient([32, 24].into())?;
        for &method in EdgeMethod::ALL {
            let mut frame = src.clone();
            edges(&mut frame, method, 50.0, 2.5)?;
            assert_eq!(frame.size(), src.size());
        }
        for &method in HistogramMethod::ALL {
            let mut frame = src.clone();
            equalize_luma(&mut frame, method, 8, 2.0)?;
            assert_eq!(frame.size(), src.size());
        }
        let mut frame = src.clone();
        inversion(&mut frame);
        assert_eq!(frame.as_slice()[0], 255 - src.as_slice()[0]);
        Ok(())
    }
}
