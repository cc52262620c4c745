use camlab_image::{Image, ImageError, ImageSize};

use crate::interpolation::{interpolate_pixel, InterpolationMode};
use crate::parallel;

/// Resize an image to the size of the destination.
///
/// Output pixel centers are mapped onto input pixel centers, so the image
/// content keeps its position when scaled.
///
/// # Arguments
///
/// * `src` - The input image container.
/// * `dst` - The output image container.
/// * `interpolation` - The interpolation mode to use.
///
/// # Errors
///
/// Returns an error if the input image is empty.
///
/// # Example
///
/// ```
/// use camlab_image::{Image, ImageSize};
/// use camlab_imgproc::interpolation::InterpolationMode;
/// use camlab_imgproc::resize::resize;
///
/// let image = Image::<u8, 3>::from_size_val(ImageSize { width: 4, height: 5 }, 7).unwrap();
/// let mut resized =
///     Image::<u8, 3>::from_size_val(ImageSize { width: 2, height: 3 }, 0).unwrap();
///
/// resize(&image, &mut resized, InterpolationMode::Nearest).unwrap();
///
/// assert_eq!(resized.num_channels(), 3);
/// assert!(resized.as_slice().iter().all(|&v| v == 7));
/// ```
pub fn resize<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    interpolation: InterpolationMode,
) -> Result<(), ImageError> {
    if src.is_empty() {
        return Err(ImageError::EmptyImage);
    }

    let scale_x = src.cols() as f32 / dst.cols().max(1) as f32;
    let scale_y = src.rows() as f32 / dst.rows().max(1) as f32;
    let (max_u, max_v) = ((src.cols() - 1) as f32, (src.rows() - 1) as f32);
    let cols = dst.cols();

    parallel::par_fill_rows(dst, |y, row| {
        let v = ((y as f32 + 0.5) * scale_y - 0.5).clamp(0.0, max_v);
        for x in 0..cols {
            let u = ((x as f32 + 0.5) * scale_x - 0.5).clamp(0.0, max_u);
            if let Some(px) = interpolate_pixel(src, u, v, interpolation) {
                row[x * C..(x + 1) * C].copy_from_slice(&px);
            }
        }
    });

    Ok(())
}

/// Resize an image into a newly allocated image of the given size.
pub fn resize_to<const C: usize>(
    src: &Image<u8, C>,
    size: ImageSize,
    interpolation: InterpolationMode,
) -> Result<Image<u8, C>, ImageError> {
    if src.size() == size {
        return Ok(src.clone());
    }
    let mut dst = Image::from_size_val(size, 0)?;
    resize(src, &mut dst, interpolation)?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_smoke_ch3() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new(
            ImageSize {
                width: 4,
                height: 5,
            },
            vec![0u8; 4 * 5 * 3],
        )?;

        let new_size = ImageSize {
            width: 2,
            height: 3,
        };

        let mut image_resized = Image::<u8, 3>::from_size_val(new_size, 0)?;
        resize(&image, &mut image_resized, InterpolationMode::Bilinear)?;

        assert_eq!(image_resized.num_channels(), 3);
        assert_eq!(image_resized.size(), new_size);
        Ok(())
    }

    #[test]
    fn resize_upscale_bilinear() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new(
            ImageSize {
                width: 2,
                height: 1,
            },
            vec![0, 100],
        )?;
        let up = resize_to(
            &image,
            ImageSize {
                width: 4,
                height: 1,
            },
            InterpolationMode::Bilinear,
        )?;
        assert_eq!(up.as_slice(), &[0, 25, 75, 100]);
        Ok(())
    }

    #[test]
    fn resize_empty_input() {
        let image = Image::<u8, 1>::empty();
        let res = resize_to(
            &image,
            ImageSize {
                width: 2,
                height: 2,
            },
            InterpolationMode::Nearest,
        );
        assert_eq!(res, Err(ImageError::EmptyImage));
    }
}
