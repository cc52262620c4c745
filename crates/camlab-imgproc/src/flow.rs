use camlab_image::{ops::check_same_size, Image, ImageError};

use crate::filter::{box_blur, spatial_gradient};

// the sobel kernels scale the derivative by 8
const SOBEL_SCALE: f32 = 1.0 / 8.0;

const MIN_EIGENVALUE: f32 = 1e-2;

/// Dense Lucas-Kanade optical flow between two gray frames.
///
/// For every pixel the brightness constancy equations of its
/// `window x window` neighbourhood are solved in the least squares sense.
/// Pixels whose structure tensor is close to singular (flat areas, straight
/// edges) get a zero vector.
///
/// # Arguments
///
/// * `prev` - The earlier frame.
/// * `next` - The later frame, same size.
/// * `window` - The odd size of the integration window.
///
/// # Returns
///
/// A two channel image holding the displacement `(dx, dy)` of each pixel.
pub fn dense_lucas_kanade(
    prev: &Image<u8, 1>,
    next: &Image<u8, 1>,
    window: usize,
) -> Result<Image<f32, 2>, ImageError> {
    check_same_size(prev, next)?;
    if window % 2 == 0 {
        return Err(ImageError::InvalidKernelSize(window));
    }

    let prev_f = prev.cast::<f32>()?;
    let next_f = next.cast::<f32>()?;

    // average both frames so the gradient sits between them
    let mid = Image::<f32, 1>::new(
        prev.size(),
        prev_f
            .as_slice()
            .iter()
            .zip(next_f.as_slice())
            .map(|(a, b)| 0.5 * (a + b))
            .collect(),
    )?;
    let (gx, gy) = spatial_gradient(&mid)?;

    // per pixel products [ixx, ixy, iyy, ixt, iyt]
    let mut products = Vec::with_capacity(prev.size().area() * 5);
    for i in 0..prev.size().area() {
        let ix = gx.as_slice()[i] * SOBEL_SCALE;
        let iy = gy.as_slice()[i] * SOBEL_SCALE;
        let it = next_f.as_slice()[i] - prev_f.as_slice()[i];
        products.extend_from_slice(&[ix * ix, ix * iy, iy * iy, ix * it, iy * it]);
    }
    let products = Image::<f32, 5>::new(prev.size(), products)?;
    let mut sums = Image::<f32, 5>::from_size_val(prev.size(), 0.0)?;
    box_blur(&products, &mut sums, (window, window))?;

    let flow_data = sums
        .as_slice()
        .chunks_exact(5)
        .flat_map(|s| {
            let (a, b, c, d, e) = (s[0], s[1], s[2], s[3], s[4]);
            let det = a * c - b * b;
            // smallest eigenvalue of the window averaged normal matrix
            let min_eig = 0.5 * ((a + c) - ((a - c).powi(2) + 4.0 * b * b).sqrt());
            if det.abs() <= f32::EPSILON || min_eig < MIN_EIGENVALUE {
                [0.0, 0.0]
            } else {
                [(b * e - c * d) / det, (b * d - a * e) / det]
            }
        })
        .collect();

    Image::new(prev.size(), flow_data)
}

/// Mark the pixels whose displacement is longer than `min_magnitude`.
pub fn flow_magnitude_mask(flow: &Image<f32, 2>, min_magnitude: f32) -> Image<u8, 1> {
    let min2 = min_magnitude * min_magnitude;
    let data = flow
        .as_slice()
        .chunks_exact(2)
        .map(|v| if v[0] * v[0] + v[1] * v[1] > min2 { 255 } else { 0 })
        .collect();
    Image::new(flow.size(), data).unwrap_or_else(|_| Image::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::ImageSize;

    fn pattern(shift: f32) -> Result<Image<u8, 1>, ImageError> {
        let size = ImageSize {
            width: 40,
            height: 40,
        };
        let data = (0..size.area())
            .map(|i| {
                let (x, y) = ((i % 40) as f32 - shift, (i / 40) as f32);
                (128.0 + 50.0 * (x / 5.0).sin() + 40.0 * (y / 6.0).cos()).round() as u8
            })
            .collect();
        Image::new(size, data)
    }

    #[test]
    fn test_lucas_kanade_translation() -> Result<(), ImageError> {
        let prev = pattern(0.0)?;
        let next = pattern(1.0)?;
        let flow = dense_lucas_kanade(&prev, &next, 5)?;

        let at = |x: usize, y: usize| {
            let i = 2 * (y * 40 + x);
            (flow.as_slice()[i], flow.as_slice()[i + 1])
        };
        let (dx, dy) = at(20, 20);
        assert!((dx - 1.0).abs() < 0.3, "dx {dx}");
        assert!(dy.abs() < 0.3, "dy {dy}");

        let mask = flow_magnitude_mask(&flow, 0.5);
        assert_eq!(mask.get([20, 20, 0]), Some(&255));
        Ok(())
    }

    #[test]
    fn test_lucas_kanade_static() -> Result<(), ImageError> {
        let prev = pattern(0.0)?;
        let flow = dense_lucas_kanade(&prev, &prev, 5)?;
        assert!(flow.as_slice().iter().all(|&v| v == 0.0));
        assert!(flow_magnitude_mask(&flow, 1.0)
            .as_slice()
            .iter()
            .all(|&v| v == 0));

        assert!(dense_lucas_kanade(&prev, &prev, 4).is_err());
        Ok(())
    }
}
