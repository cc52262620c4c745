use camlab_image::{Image, ImageError};

use crate::interpolation::{interpolate_pixel, InterpolationMode};
use crate::parallel;

/// Inverts a 2x3 affine transformation matrix.
///
/// A singular matrix yields the zero matrix.
///
/// # Arguments
///
/// * `m` - The 2x3 affine transformation matrix in row-major order.
///
/// # Returns
///
/// The inverted 2x3 affine transformation matrix.
pub fn invert_affine_transform(m: &[f32; 6]) -> [f32; 6] {
    let (a, b, c, d, e, f) = (m[0], m[1], m[2], m[3], m[4], m[5]);

    let determinant = a * e - b * d;
    let inv_determinant = if determinant != 0.0 {
        1.0 / determinant
    } else {
        0.0
    };

    let new_a = e * inv_determinant;
    let new_b = -b * inv_determinant;
    let new_d = -d * inv_determinant;
    let new_e = a * inv_determinant;
    let new_c = -(new_a * c + new_b * f);
    let new_f = -(new_d * c + new_e * f);

    [new_a, new_b, new_c, new_d, new_e, new_f]
}

/// Returns a 2x3 rotation matrix for a 2D rotation around a center point.
///
/// The rotation matrix is defined as:
///
/// | alpha  beta  tx |
/// | -beta  alpha ty |
///
/// where:
///
/// alpha = scale * cos(angle)
/// beta = scale * sin(angle)
/// tx = (1 - alpha) * center.x - beta * center.y
/// ty = beta * center.x + (1 - alpha) * center.y
///
/// Positive angles rotate counter-clockwise on screen.
///
/// # Arguments
///
/// * `center` - The center point of the rotation.
/// * `angle` - The angle of rotation in degrees.
/// * `scale` - The scale factor.
///
/// # Example
///
/// ```
/// use camlab_imgproc::warp::get_rotation_matrix2d;
///
/// let m = get_rotation_matrix2d((0.0, 0.0), 90.0, 1.0);
/// assert!((m[1] - 1.0).abs() < 1e-6);
/// ```
pub fn get_rotation_matrix2d(center: (f32, f32), angle: f32, scale: f32) -> [f32; 6] {
    let (sin, cos) = angle.to_radians().sin_cos();
    let alpha = scale * cos;
    let beta = scale * sin;

    let tx = (1.0 - alpha) * center.0 - beta * center.1;
    let ty = beta * center.0 + (1.0 - alpha) * center.1;

    [alpha, beta, tx, -beta, alpha, ty]
}

/// Applies an affine transformation to an image.
///
/// Destination pixels whose source position falls outside the input are
/// set to zero.
///
/// # Arguments
///
/// * `src` - The input image with shape (height, width, C).
/// * `dst` - The output image, its size selects the output extent.
/// * `m` - The 2x3 affine transformation matrix src -> dst.
/// * `interpolation` - The interpolation mode to use.
///
/// # Example
///
/// ```
/// use camlab_image::{Image, ImageSize};
/// use camlab_imgproc::interpolation::InterpolationMode;
/// use camlab_imgproc::warp::warp_affine;
///
/// let src = Image::<u8, 1>::new(ImageSize { width: 2, height: 1 }, vec![10, 20]).unwrap();
/// let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0).unwrap();
///
/// // shift right by one pixel
/// warp_affine(&src, &mut dst, &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0], InterpolationMode::Nearest);
/// assert_eq!(dst.as_slice(), &[0, 10]);
/// ```
pub fn warp_affine<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    m: &[f32; 6],
    interpolation: InterpolationMode,
) {
    let m_inv = invert_affine_transform(m);
    let cols = dst.cols();

    parallel::par_fill_rows(dst, |y, row| {
        let yf = y as f32;
        for x in 0..cols {
            let xf = x as f32;
            let u = m_inv[0] * xf + m_inv[1] * yf + m_inv[2];
            let v = m_inv[3] * xf + m_inv[4] * yf + m_inv[5];
            let out = &mut row[x * C..(x + 1) * C];
            match interpolate_pixel(src, u, v, interpolation) {
                Some(px) => out.copy_from_slice(&px),
                None => out.fill(0),
            }
        }
    });
}

/// Rotate an image about its integer center, keeping the input size.
///
/// # Arguments
///
/// * `src` - The input image.
/// * `angle` - The angle of rotation in degrees.
pub fn rotate<const C: usize>(src: &Image<u8, C>, angle: f32) -> Result<Image<u8, C>, ImageError> {
    let center = ((src.cols() / 2) as f32, (src.rows() / 2) as f32);
    let m = get_rotation_matrix2d(center, angle, 1.0);
    let mut dst = Image::from_size_val(src.size(), 0)?;
    warp_affine(src, &mut dst, &m, InterpolationMode::Bilinear);
    Ok(dst)
}

/// A 3x3 homography in row-major order.
pub type Homography = [f64; 9];

/// The identity homography.
pub const IDENTITY_HOMOGRAPHY: Homography = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

#[rustfmt::skip]
fn determinant3x3(m: &Homography) -> f64 {
    m[0] * (m[4] * m[8] - m[5] * m[7]) -
    m[1] * (m[3] * m[8] - m[5] * m[6]) +
    m[2] * (m[3] * m[7] - m[4] * m[6])
}

#[rustfmt::skip]
fn adjugate3x3(m: &Homography) -> Homography {
    [
        m[4] * m[8] - m[5] * m[7],  // [0, 0]
        m[2] * m[7] - m[1] * m[8],  // [0, 1]
        m[1] * m[5] - m[2] * m[4],  // [0, 2]
        m[5] * m[6] - m[3] * m[8],  // [1, 0]
        m[0] * m[8] - m[2] * m[6],  // [1, 1]
        m[2] * m[3] - m[0] * m[5],  // [1, 2]
        m[3] * m[7] - m[4] * m[6],  // [2, 0]
        m[1] * m[6] - m[0] * m[7],  // [2, 1]
        m[0] * m[4] - m[1] * m[3],  // [2, 2]
    ]
}

/// Invert a homography.
///
/// Returns `None` for a (numerically) singular matrix.
pub fn invert_homography(m: &Homography) -> Option<Homography> {
    let det = determinant3x3(m);
    if det.abs() < 1e-12 {
        return None;
    }
    let adj = adjugate3x3(m);
    let mut inv = [0.0; 9];
    for (o, a) in inv.iter_mut().zip(adj) {
        *o = a / det;
    }
    Some(inv)
}

/// Compose two homographies, `a` applied after `b`.
pub fn compose_homography(a: &Homography, b: &Homography) -> Homography {
    let mut out = [0.0; 9];
    for r in 0..3 {
        for c in 0..3 {
            out[r * 3 + c] = (0..3).map(|k| a[r * 3 + k] * b[k * 3 + c]).sum();
        }
    }
    out
}

/// Map a point through a homography.
///
/// Returns `None` when the point maps to infinity.
pub fn transform_point(m: &Homography, x: f64, y: f64) -> Option<(f64, f64)> {
    let w = m[6] * x + m[7] * y + m[8];
    if w.abs() < 1e-12 {
        return None;
    }
    Some((
        (m[0] * x + m[1] * y + m[2]) / w,
        (m[3] * x + m[4] * y + m[5]) / w,
    ))
}

/// Applies a perspective transformation to an image.
///
/// Destination pixels whose source position falls outside the input are
/// set to zero.
///
/// # Arguments
///
/// * `src` - The input image with shape (height, width, C).
/// * `dst` - The output image, its size selects the output extent.
/// * `m` - The 3x3 perspective transformation matrix src -> dst.
/// * `interpolation` - The interpolation mode to use.
///
/// # Errors
///
/// Returns an error if the matrix cannot be inverted.
pub fn warp_perspective<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    m: &Homography,
    interpolation: InterpolationMode,
) -> Result<(), ImageError> {
    let m_inv = invert_homography(m).ok_or(ImageError::CannotComputeDeterminant)?;
    let cols = dst.cols();

    parallel::par_fill_rows(dst, |y, row| {
        for x in 0..cols {
            let out = &mut row[x * C..(x + 1) * C];
            let sample = transform_point(&m_inv, x as f64, y as f64)
                .and_then(|(u, v)| interpolate_pixel(src, u as f32, v as f32, interpolation));
            match sample {
                Some(px) => out.copy_from_slice(&px),
                None => out.fill(0),
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::ImageSize;

    #[test]
    fn test_invert_affine_transform() {
        let m = [1.0, 0.0, 3.0, 0.0, 2.0, -4.0];
        let inv = invert_affine_transform(&m);
        assert_eq!(inv, [1.0, 0.0, -3.0, 0.0, 0.5, 2.0]);
    }

    #[test]
    fn test_get_rotation_matrix2d() {
        let m = get_rotation_matrix2d((5.0, 5.0), 0.0, 1.0);
        assert_eq!(m, [1.0, 0.0, 0.0, -0.0, 1.0, 0.0]);

        let m = get_rotation_matrix2d((0.0, 0.0), 90.0, 2.0);
        approx::assert_relative_eq!(m[0], 0.0, epsilon = 1e-6);
        approx::assert_relative_eq!(m[1], 2.0, epsilon = 1e-6);
        approx::assert_relative_eq!(m[3], -2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rotate_180_twice() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 9,
            height: 7,
        };
        let data = (0..size.area() * 3).map(|i| (i * 7 % 251) as u8).collect();
        let image = Image::<u8, 3>::new(size, data)?;

        let once = rotate(&image, 180.0)?;
        assert_ne!(once, image);
        // the integer center is the middle pixel for odd sizes
        assert_eq!(once.pixel(0, 0), image.pixel(8, 6));

        let twice = rotate(&once, 180.0)?;
        let max_err = twice
            .as_slice()
            .iter()
            .zip(image.as_slice())
            .map(|(&a, &b)| (a as i32 - b as i32).abs())
            .max()
            .unwrap_or(0);
        assert!(max_err <= 1, "max error {max_err}");
        Ok(())
    }

    #[test]
    fn test_warp_perspective_translation() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 4,
            height: 3,
        };
        let src = Image::<u8, 1>::new(size, (1..=12).collect())?;
        let mut dst = Image::<u8, 1>::from_size_val(size, 99)?;
        let shift = [1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0];
        warp_perspective(&src, &mut dst, &shift, InterpolationMode::Bilinear)?;
        assert_eq!(dst.row(0), &[0, 0, 0, 0]);
        assert_eq!(dst.row(1), src.row(0));
        assert_eq!(dst.row(2), src.row(1));

        let singular = [0.0; 9];
        assert!(warp_perspective(&src, &mut dst, &singular, InterpolationMode::Nearest).is_err());
        Ok(())
    }

    #[test]
    fn test_compose_and_invert_homography() {
        let h = [1.2, 0.1, 5.0, -0.05, 0.9, 3.0, 1e-4, 2e-4, 1.0];
        let inv = invert_homography(&h).unwrap_or(IDENTITY_HOMOGRAPHY);
        let id = compose_homography(&h, &inv);
        for (a, b) in id.iter().zip(IDENTITY_HOMOGRAPHY) {
            approx::assert_relative_eq!(*a, b, epsilon = 1e-9);
        }
        let (x, y) = transform_point(&h, 10.0, 20.0).unwrap_or_default();
        let (u, v) = transform_point(&inv, x, y).unwrap_or_default();
        approx::assert_relative_eq!(u, 10.0, epsilon = 1e-9);
        approx::assert_relative_eq!(v, 20.0, epsilon = 1e-9);
    }
}
