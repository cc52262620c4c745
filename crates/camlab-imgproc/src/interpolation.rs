use camlab_image::Image;

/// Interpolation mode for the resampling operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    /// Bilinear interpolation
    Bilinear,
    /// Nearest neighbor interpolation
    Nearest,
}

// tolerance for coordinates that land on the border up to rounding
const EPS: f32 = 1e-3;

/// Sample an 8-bit image at a sub-pixel position.
///
/// # Arguments
///
/// * `image` - The input image container with shape (height, width, C).
/// * `u` - The x coordinate of the sample.
/// * `v` - The y coordinate of the sample.
/// * `interpolation` - The interpolation mode to use.
///
/// # Returns
///
/// The interpolated pixel, or `None` when the position lies outside the image.
pub fn interpolate_pixel<const C: usize>(
    image: &Image<u8, C>,
    u: f32,
    v: f32,
    interpolation: InterpolationMode,
) -> Option<[u8; C]> {
    let (cols, rows) = (image.cols(), image.rows());
    if cols == 0 || rows == 0 {
        return None;
    }
    let (max_u, max_v) = ((cols - 1) as f32, (rows - 1) as f32);
    if !(u >= -EPS && v >= -EPS && u <= max_u + EPS && v <= max_v + EPS) {
        return None;
    }
    let u = u.clamp(0.0, max_u);
    let v = v.clamp(0.0, max_v);

    let mut pixel = [0u8; C];
    match interpolation {
        InterpolationMode::Nearest => {
            pixel.copy_from_slice(image.pixel(u.round() as usize, v.round() as usize));
        }
        InterpolationMode::Bilinear => {
            let (iu0, iv0) = (u.trunc() as usize, v.trunc() as usize);
            let iu1 = (iu0 + 1).min(cols - 1);
            let iv1 = (iv0 + 1).min(rows - 1);
            let (fu, fv) = (u - iu0 as f32, v - iv0 as f32);

            let p00 = image.pixel(iu0, iv0);
            let p01 = image.pixel(iu1, iv0);
            let p10 = image.pixel(iu0, iv1);
            let p11 = image.pixel(iu1, iv1);

            for k in 0..C {
                let top = p00[k] as f32 * (1.0 - fu) + p01[k] as f32 * fu;
                let bottom = p10[k] as f32 * (1.0 - fu) + p11[k] as f32 * fu;
                pixel[k] = (top * (1.0 - fv) + bottom * fv).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    Some(pixel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::{ImageError, ImageSize};

    #[test]
    fn test_interpolate_pixel() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new(
            ImageSize {
                width: 2,
                height: 2,
            },
            vec![0, 100, 100, 200],
        )?;
        assert_eq!(
            interpolate_pixel(&image, 0.5, 0.5, InterpolationMode::Bilinear),
            Some([100])
        );
        assert_eq!(
            interpolate_pixel(&image, 0.6, 0.0, InterpolationMode::Nearest),
            Some([100])
        );
        assert_eq!(
            interpolate_pixel(&image, -0.5, 0.0, InterpolationMode::Bilinear),
            None
        );
        assert_eq!(
            interpolate_pixel(&image, 1.0, 1.0, InterpolationMode::Bilinear),
            Some([200])
        );
        Ok(())
    }
}
