use camlab_image::{ops::check_same_size, Image, ImageError};

use super::{kernels, separable_filter, separable_filter_u8};
use crate::{padding::reflect_101, parallel};

/// Blur an image using a box blur filter
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel_size` - The size of the kernel (kernel_x, kernel_y).
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn box_blur<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    kernel_size: (usize, usize),
) -> Result<(), ImageError> {
    let kernel_x = kernels::box_blur_kernel_1d(kernel_size.0);
    let kernel_y = kernels::box_blur_kernel_1d(kernel_size.1);
    separable_filter(src, dst, &kernel_x, &kernel_y)?;
    Ok(())
}

/// Blur an image using a gaussian blur filter
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel_size` - The size of the kernel (kernel_x, kernel_y).
/// * `sigma` - The sigma of the gaussian kernel. Non-positive values derive it from the size.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn gaussian_blur<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    kernel_size: (usize, usize),
    sigma: (f32, f32),
) -> Result<(), ImageError> {
    let kernel_x = kernels::gaussian_kernel_1d(kernel_size.0, sigma.0);
    let kernel_y = kernels::gaussian_kernel_1d(kernel_size.1, sigma.1);
    separable_filter(src, dst, &kernel_x, &kernel_y)?;
    Ok(())
}

/// Box blur an 8-bit image with a square kernel.
pub fn box_blur_u8<const C: usize>(
    src: &Image<u8, C>,
    kernel_size: usize,
) -> Result<Image<u8, C>, ImageError> {
    let kernel = kernels::box_blur_kernel_1d(kernel_size);
    separable_filter_u8(src, &kernel, &kernel)
}

/// Gaussian blur an 8-bit image with a square kernel.
pub fn gaussian_blur_u8<const C: usize>(
    src: &Image<u8, C>,
    kernel_size: usize,
    sigma: f32,
) -> Result<Image<u8, C>, ImageError> {
    let kernel = kernels::gaussian_kernel_1d(kernel_size, sigma);
    separable_filter_u8(src, &kernel, &kernel)
}

/// Compute the 3x3 sobel derivatives of an image.
///
/// # Returns
///
/// The horizontal and vertical derivatives `(gx, gy)`.
pub fn spatial_gradient<const C: usize>(
    src: &Image<f32, C>,
) -> Result<(Image<f32, C>, Image<f32, C>), ImageError> {
    let (deriv, smooth) = kernels::sobel_kernel_1d();

    let mut gx = Image::<f32, C>::from_size_val(src.size(), 0.0)?;
    separable_filter(src, &mut gx, &deriv, &smooth)?;

    let mut gy = Image::<f32, C>::from_size_val(src.size(), 0.0)?;
    separable_filter(src, &mut gy, &smooth, &deriv)?;

    Ok((gx, gy))
}

/// Computer sobel filter
///
/// The output is the magnitude of the 3x3 sobel gradient.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn sobel<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;
    let (gx, gy) = spatial_gradient(src)?;

    dst.as_slice_mut()
        .iter_mut()
        .zip(gx.as_slice().iter())
        .zip(gy.as_slice().iter())
        .for_each(|((dst, &gx), &gy)| {
            *dst = (gx * gx + gy * gy).sqrt();
        });

    Ok(())
}

/// Sobel edges of an 8-bit image as the equal blend of both absolute derivatives.
///
/// Each output value is `0.5 * |gx| + 0.5 * |gy|`, saturated to 8 bits.
pub fn sobel_abs_blend_u8<const C: usize>(
    src: &Image<u8, C>,
) -> Result<Image<u8, C>, ImageError> {
    let (gx, gy) = spatial_gradient(&src.cast::<f32>()?)?;
    let abs_x = convert_scale_abs(&gx, 1.0);
    let abs_y = convert_scale_abs(&gy, 1.0);
    add_weighted(&abs_x, 0.5, &abs_y, 0.5, 0.0)
}

/// Compute the 3x3 laplacian of an image.
///
/// The aperture is `[2, 0, 2; 0, -8, 0; 2, 0, 2]`.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn laplacian<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;
    let (deriv, smooth) = kernels::second_derivative_kernel_1d();

    let mut dxx = Image::<f32, C>::from_size_val(src.size(), 0.0)?;
    separable_filter(src, &mut dxx, &deriv, &smooth)?;

    separable_filter(src, dst, &smooth, &deriv)?;

    dst.as_slice_mut()
        .iter_mut()
        .zip(dxx.as_slice())
        .for_each(|(d, &xx)| *d += xx);

    Ok(())
}

/// Scale, take the absolute value and saturate a float image to 8 bits.
pub fn convert_scale_abs<const C: usize>(src: &Image<f32, C>, alpha: f32) -> Image<u8, C> {
    src.map(|v| (v * alpha).abs().round().min(255.0) as u8)
}

/// Compute the weighted sum `alpha * a + beta * b + gamma` of two 8-bit images.
///
/// # Errors
///
/// Returns an error if the images have different sizes.
pub fn add_weighted<const C: usize>(
    a: &Image<u8, C>,
    alpha: f32,
    b: &Image<u8, C>,
    beta: f32,
    gamma: f32,
) -> Result<Image<u8, C>, ImageError> {
    check_same_size(a, b)?;
    let data = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(&x, &y)| {
            let v = x as f32 * alpha + y as f32 * beta + gamma;
            v.round().clamp(0.0, 255.0) as u8
        })
        .collect();
    Image::new(a.size(), data)
}

/// Edge preserving smoothing with a bilateral filter.
///
/// Each output pixel is a weighted mean over a circular window of diameter
/// `diameter`. The weights combine the spatial distance and the L1 colour
/// distance to the center pixel.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `diameter` - The window diameter in pixels.
/// * `sigma_color` - The sigma of the range kernel.
/// * `sigma_space` - The sigma of the spatial kernel.
pub fn bilateral_filter<const C: usize>(
    src: &Image<u8, C>,
    diameter: usize,
    sigma_color: f32,
    sigma_space: f32,
) -> Result<Image<u8, C>, ImageError> {
    let mut dst = Image::<u8, C>::from_size_val(src.size(), 0)?;
    if src.is_empty() {
        return Ok(dst);
    }

    let sigma_color = if sigma_color <= 0.0 { 1.0 } else { sigma_color };
    let sigma_space = if sigma_space <= 0.0 { 1.0 } else { sigma_space };
    let radius = (diameter / 2).max(1) as isize;

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    // spatial weights restricted to the circular window
    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2.sqrt() > radius as f32 {
                continue;
            }
            offsets.push((dx, dy, (r2 * space_coeff).exp()));
        }
    }

    // range weights indexed by the L1 distance
    let color_lut = (0..=255 * C)
        .map(|i| ((i * i) as f32 * color_coeff).exp())
        .collect::<Vec<_>>();

    let (width, height) = (src.width(), src.height());

    parallel::par_fill_rows(&mut dst, |y, row| {
        for x in 0..width {
            let center = src.pixel(x, y);
            let mut sum = [0.0f32; C];
            let mut wsum = 0.0f32;
            for &(dx, dy, ws) in offsets.iter() {
                let xx = reflect_101(x as isize + dx, width);
                let yy = reflect_101(y as isize + dy, height);
                let px = src.pixel(xx, yy);
                let dist = px
                    .iter()
                    .zip(center)
                    .map(|(&a, &b)| (a as i32 - b as i32).unsigned_abs() as usize)
                    .sum::<usize>();
                let w = ws * color_lut[dist];
                for c in 0..C {
                    sum[c] += px[c] as f32 * w;
                }
                wsum += w;
            }
            for c in 0..C {
                row[x * C + c] = (sum[c] / wsum).round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::ImageSize;

    #[test]
    fn test_box_blur() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 5,
            height: 5,
        };

        #[rustfmt::skip]
        let img = Image::<f32, 1>::new(
            size,
            vec![
                0.0, 0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 9.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 0.0, 0.0,
            ],
        )?;

        let mut dst = Image::<f32, 1>::from_size_val(size, 0.0)?;

        super::box_blur(&img, &mut dst, (3, 3))?;

        #[rustfmt::skip]
        let expected = [
            0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 1.0, 1.0, 0.0,
            0.0, 1.0, 1.0, 1.0, 0.0,
            0.0, 1.0, 1.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0,
        ];
        for (a, b) in dst.as_slice().iter().zip(expected.iter()) {
            approx::assert_relative_eq!(a, b, epsilon = 1e-5);
        }

        Ok(())
    }

    #[test]
    fn test_gaussian_blur_preserves_constant() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 6,
            height: 4,
        };
        let img = Image::<u8, 3>::from_size_val(size, 77)?;
        let blurred = gaussian_blur_u8(&img, 5, 0.0)?;
        assert_eq!(blurred, img);
        Ok(())
    }

    #[test]
    fn test_laplacian_of_impulse() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 5,
            height: 5,
        };
        let mut img = Image::<f32, 1>::from_size_val(size, 0.0)?;
        img.as_slice_mut()[12] = 1.0;

        let mut dst = Image::<f32, 1>::from_size_val(size, 0.0)?;
        super::laplacian(&img, &mut dst)?;

        assert_eq!(dst.get([2, 2, 0]), Some(&-8.0));
        assert_eq!(dst.get([1, 1, 0]), Some(&2.0));
        assert_eq!(dst.get([1, 2, 0]), Some(&0.0));
        Ok(())
    }

    #[test]
    fn test_sobel_on_step() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 4,
            height: 3,
        };
        #[rustfmt::skip]
        let img = Image::<u8, 1>::new(
            size,
            vec![
                0, 0, 100, 100,
                0, 0, 100, 100,
                0, 0, 100, 100,
            ],
        )?;

        let edges = sobel_abs_blend_u8(&img)?;
        // |gx| = 400 saturates to 255 before the blend, |gy| = 0
        assert_eq!(edges.get([1, 1, 0]), Some(&128));
        assert_eq!(edges.get([1, 0, 0]), Some(&0));
        Ok(())
    }

    #[test]
    fn test_bilateral_keeps_edges() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 6,
            height: 2,
        };
        #[rustfmt::skip]
        let img = Image::<u8, 1>::new(
            size,
            vec![
                10, 10, 10, 200, 200, 200,
                10, 10, 10, 200, 200, 200,
            ],
        )?;

        let out = bilateral_filter(&img, 3, 6.0, 1.5)?;
        assert_eq!(out.size(), img.size());
        assert_eq!(out.get([0, 2, 0]), Some(&10));
        assert_eq!(out.get([0, 3, 0]), Some(&200));
        Ok(())
    }
}
