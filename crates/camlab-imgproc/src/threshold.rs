use num_traits::Zero;
use std::cmp::PartialOrd;

use camlab_image::{ops::check_same_size, Image, ImageError};

use crate::{filter, parallel};

/// The type of thresholding to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdType {
    /// `max` above the threshold, zero otherwise.
    Binary,
    /// Zero above the threshold, `max` otherwise.
    BinaryInv,
    /// Values above the threshold are clipped to it.
    Trunc,
    /// Values at or below the threshold become zero.
    ToZero,
    /// Values above the threshold become zero.
    ToZeroInv,
}

impl ThresholdType {
    #[inline]
    fn apply<T: Copy + PartialOrd + Zero>(self, v: T, threshold: T, max_value: T) -> T {
        let above = v > threshold;
        match self {
            ThresholdType::Binary => {
                if above {
                    max_value
                } else {
                    T::zero()
                }
            }
            ThresholdType::BinaryInv => {
                if above {
                    T::zero()
                } else {
                    max_value
                }
            }
            ThresholdType::Trunc => {
                if above {
                    threshold
                } else {
                    v
                }
            }
            ThresholdType::ToZero => {
                if above {
                    v
                } else {
                    T::zero()
                }
            }
            ThresholdType::ToZeroInv => {
                if above {
                    T::zero()
                } else {
                    v
                }
            }
        }
    }
}

/// Apply a fixed-level threshold to an image.
///
/// # Arguments
///
/// * `src` - The input image of an arbitrary number of channels and type.
/// * `dst` - The output image with the same size as the input.
/// * `threshold` - The threshold value.
/// * `max_value` - The value written by the binary types.
/// * `thres_type` - How values are mapped around the threshold.
///
/// # Examples
///
/// ```
/// use camlab_image::{Image, ImageSize};
/// use camlab_imgproc::threshold::{threshold, ThresholdType};
///
/// let data = vec![100u8, 200, 50, 150, 200, 250];
/// let image = Image::<_, 1>::new(ImageSize { width: 2, height: 3 }, data).unwrap();
///
/// let mut thresholded = Image::<_, 1>::from_size_val(image.size(), 0).unwrap();
///
/// threshold(&image, &mut thresholded, 100, 255, ThresholdType::Binary).unwrap();
/// assert_eq!(thresholded.as_slice(), &[0, 255, 0, 255, 255, 255]);
/// ```
pub fn threshold<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    threshold: T,
    max_value: T,
    thres_type: ThresholdType,
) -> Result<(), ImageError>
where
    T: Copy + Send + Sync + PartialOrd + Zero,
{
    check_same_size(src, dst)?;

    // run the thresholding operation in parallel
    parallel::par_iter_rows_val(src, dst, |src_pixel, dst_pixel| {
        *dst_pixel = thres_type.apply(*src_pixel, threshold, max_value);
    });

    Ok(())
}

fn histogram_u8<const C: usize>(src: &Image<u8, C>) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for &pixel in src.as_slice() {
        histogram[pixel as usize] += 1;
    }
    histogram
}

/// Compute the threshold that maximises the between-class variance (Otsu).
///
/// A uniform image yields its single value, so a binary threshold at the
/// returned level maps the whole image to zero.
///
/// # Examples
///
/// ```
/// use camlab_image::{Image, ImageSize};
/// use camlab_imgproc::threshold::otsu_threshold;
///
/// let data = vec![10u8, 10, 10, 200, 200, 200];
/// let image = Image::<_, 1>::new(ImageSize { width: 3, height: 2 }, data).unwrap();
///
/// let t = otsu_threshold(&image);
/// assert!((10..200).contains(&t));
/// ```
pub fn otsu_threshold<const C: usize>(src: &Image<u8, C>) -> u8 {
    let histogram = histogram_u8(src);

    let total_pixels = src.as_slice().len() as f64;
    let sum_total = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum::<f64>();

    let first_level = histogram.iter().position(|&c| c > 0).unwrap_or(0) as u8;
    let mut best_variance = 0.0;
    let mut best_threshold = first_level;

    let mut weight_back = 0.0;
    let mut sum_back = 0.0;

    for (level, &count) in histogram.iter().enumerate() {
        weight_back += count as f64;
        sum_back += level as f64 * count as f64;

        // skip empty classes
        if weight_back == 0.0 || weight_back == total_pixels {
            continue;
        }

        let weight_fore = total_pixels - weight_back;
        let mean_back = sum_back / weight_back;
        let mean_fore = (sum_total - sum_back) / weight_fore;

        let variance = weight_back * weight_fore * (mean_back - mean_fore).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_threshold = level as u8;
        }
    }

    best_threshold
}

/// Compute a threshold with the triangle method.
///
/// A line is drawn from the histogram peak to the far end of the longer
/// tail; the level with the largest distance below that line is returned.
pub fn triangle_threshold<const C: usize>(src: &Image<u8, C>) -> u8 {
    let mut hist = histogram_u8(src);

    let Some(mut left) = hist.iter().position(|&c| c > 0) else {
        return 0;
    };
    let mut right = hist.iter().rposition(|&c| c > 0).unwrap_or(left);
    left = left.saturating_sub(1);
    if right < 255 {
        right += 1;
    }

    let mut max_ind = 0;
    for (i, &c) in hist.iter().enumerate() {
        if c > hist[max_ind] {
            max_ind = i;
        }
    }

    let flipped = max_ind - left < right - max_ind;
    if flipped {
        hist.reverse();
        left = 255 - right;
        max_ind = 255 - max_ind;
    }

    let mut thresh = left as i64;
    let a = hist[max_ind] as f64;
    let b = left as f64 - max_ind as f64;
    let mut dist = 0.0;
    for (i, &h) in hist.iter().enumerate().take(max_ind + 1).skip(left + 1) {
        let d = a * i as f64 + b * h as f64;
        if d > dist {
            dist = d;
            thresh = i as i64;
        }
    }
    thresh -= 1;

    if flipped {
        thresh = 255 - thresh;
    }
    thresh.clamp(0, 255) as u8
}

/// Neighbourhood statistic used by [`adaptive_threshold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptiveMethod {
    /// Mean of the block.
    Mean,
    /// Gaussian weighted mean of the block.
    Gaussian,
}

/// Threshold each pixel against a statistic of its neighbourhood.
///
/// A pixel is foreground when it exceeds the local statistic minus `c`.
///
/// # Arguments
///
/// * `src` - The single channel input image.
/// * `dst` - The output image with the same size.
/// * `max_value` - The foreground value.
/// * `method` - The local statistic.
/// * `inverse` - Swap foreground and background.
/// * `block_size` - The odd neighbourhood size, at least 3.
/// * `c` - The constant subtracted from the statistic.
pub fn adaptive_threshold(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    max_value: u8,
    method: AdaptiveMethod,
    inverse: bool,
    block_size: usize,
    c: f32,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;
    if block_size < 3 || block_size % 2 == 0 {
        return Err(ImageError::InvalidKernelSize(block_size));
    }

    let local = match method {
        AdaptiveMethod::Mean => filter::box_blur_u8(src, block_size)?,
        AdaptiveMethod::Gaussian => filter::gaussian_blur_u8(src, block_size, 0.0)?,
    };

    let delta = if inverse { c.floor() } else { c.ceil() } as i32;

    dst.as_slice_mut()
        .iter_mut()
        .zip(src.as_slice().iter().zip(local.as_slice()))
        .for_each(|(out, (&s, &m))| {
            let fg = s as i32 - m as i32 > -delta;
            *out = if fg != inverse { max_value } else { 0 };
        });

    Ok(())
}
