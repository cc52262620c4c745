use camlab_image::{ops::check_same_size, Image, ImageError};

use crate::{padding::reflect_101, parallel};

/// Apply a separable filter to an image.
///
/// The rows are convolved with `kernel_x` first, then the columns with
/// `kernel_y`. Borders are extrapolated by reflection without repeating the
/// border pixel.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel_x` - The horizontal kernel, odd length.
/// * `kernel_y` - The vertical kernel, odd length.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn separable_filter<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    kernel_x: &[f32],
    kernel_y: &[f32],
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;

    if kernel_x.len() % 2 == 0 {
        return Err(ImageError::InvalidKernelSize(kernel_x.len()));
    }
    if kernel_y.len() % 2 == 0 {
        return Err(ImageError::InvalidKernelSize(kernel_y.len()));
    }
    if src.is_empty() {
        return Ok(());
    }

    let width = src.width();
    let height = src.height();
    let half_x = (kernel_x.len() / 2) as isize;
    let half_y = (kernel_y.len() / 2) as isize;

    // horizontal pass
    let mut tmp = Image::<f32, C>::from_size_val(src.size(), 0.0)?;
    parallel::par_fill_rows(&mut tmp, |y, row| {
        let src_row = src.row(y);
        for x in 0..width {
            for c in 0..C {
                let mut acc = 0.0;
                for (k, &kv) in kernel_x.iter().enumerate() {
                    let xx = reflect_101(x as isize + k as isize - half_x, width);
                    acc += src_row[xx * C + c] * kv;
                }
                row[x * C + c] = acc;
            }
        }
    });

    // vertical pass
    parallel::par_fill_rows(dst, |y, row| {
        for (i, out) in row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, &kv) in kernel_y.iter().enumerate() {
                let yy = reflect_101(y as isize + k as isize - half_y, height);
                acc += tmp.row(yy)[i] * kv;
            }
            *out = acc;
        }
    });

    Ok(())
}

/// Apply a separable filter to an 8-bit image, saturating the result.
pub fn separable_filter_u8<const C: usize>(
    src: &Image<u8, C>,
    kernel_x: &[f32],
    kernel_y: &[f32],
) -> Result<Image<u8, C>, ImageError> {
    let src_f32 = src.cast::<f32>()?;
    let mut dst_f32 = Image::<f32, C>::from_size_val(src.size(), 0.0)?;
    separable_filter(&src_f32, &mut dst_f32, kernel_x, kernel_y)?;
    Ok(dst_f32.to_u8_saturate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::ImageSize;

    #[test]
    fn test_separable_filter_impulse() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 5,
            height: 5,
        };

        let mut img = Image::<f32, 1>::from_size_val(size, 0.0)?;
        img.as_slice_mut()[12] = 1.0;

        let kernel_x = vec![1.0, 1.0, 1.0];
        let kernel_y = vec![1.0, 1.0, 1.0];

        let mut dst = Image::<f32, 1>::from_size_val(size, 0.0)?;

        separable_filter(&img, &mut dst, &kernel_x, &kernel_y)?;

        #[rustfmt::skip]
        assert_eq!(
            dst.as_slice(),
            &[
                0.0, 0.0, 0.0, 0.0, 0.0,
                0.0, 1.0, 1.0, 1.0, 0.0,
                0.0, 1.0, 1.0, 1.0, 0.0,
                0.0, 1.0, 1.0, 1.0, 0.0,
                0.0, 0.0, 0.0, 0.0, 0.0,
            ]
        );

        Ok(())
    }

    #[test]
    fn test_separable_filter_even_kernel() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 3,
            height: 3,
        };
        let img = Image::<f32, 1>::from_size_val(size, 0.0)?;
        let mut dst = img.clone();
        let res = separable_filter(&img, &mut dst, &[0.5, 0.5], &[1.0]);
        assert_eq!(res, Err(ImageError::InvalidKernelSize(2)));
        Ok(())
    }
}
