use rayon::prelude::*;

use camlab_image::{Frame, Image, ImageError};

use crate::{
    color::{rgb_from_ycrcb, ycrcb_from_rgb},
    padding::reflect_101,
};

/// Parameters of [`fast_nl_means_denoising_colored`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NlMeansParams {
    /// Filter strength of the luma plane.
    pub h: f32,
    /// Filter strength of the chroma planes.
    pub h_color: f32,
    /// Odd side of the compared patches.
    pub template_window: usize,
    /// Odd side of the area searched for similar patches.
    pub search_window: usize,
}

impl Default for NlMeansParams {
    fn default() -> Self {
        Self {
            h: 3.0,
            h_color: 3.0,
            template_window: 7,
            search_window: 21,
        }
    }
}

// windowed sums of a plane through its summed area table, windows clipped at the border
fn box_mean(src: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
    let stride = width + 1;
    let mut table = vec![0.0f64; stride * (height + 1)];
    for y in 0..height {
        let mut acc = 0.0f64;
        for x in 0..width {
            acc += src[y * width + x] as f64;
            table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + acc;
        }
    }

    let mut out = vec![0.0; width * height];
    for y in 0..height {
        let (y0, y1) = (y.saturating_sub(radius), (y + radius + 1).min(height));
        for x in 0..width {
            let (x0, x1) = (x.saturating_sub(radius), (x + radius + 1).min(width));
            let sum = table[y1 * stride + x1] - table[y0 * stride + x1] - table[y1 * stride + x0]
                + table[y0 * stride + x0];
            out[y * width + x] = (sum / ((y1 - y0) * (x1 - x0)) as f64) as f32;
        }
    }
    out
}

/// Non-local means denoising of a colour frame.
///
/// The frame is converted to YCrCb. Every pixel becomes the weighted mean of
/// the pixels of its search window, weighted by how similar their
/// surrounding patches are. Patch distances are normalised by `h` on the
/// luma plane and by `h_color` on the chroma planes.
///
/// # Errors
///
/// Returns an error if a window size is even.
pub fn fast_nl_means_denoising_colored(
    src: &Frame,
    params: &NlMeansParams,
) -> Result<Frame, ImageError> {
    for window in [params.template_window, params.search_window] {
        if window % 2 == 0 {
            return Err(ImageError::InvalidKernelSize(window));
        }
    }
    if src.is_empty() {
        return Ok(src.clone());
    }

    let (width, height) = (src.width(), src.height());
    let n = width * height;

    let mut ycrcb = Frame::from_size_val(src.size(), 0)?;
    ycrcb_from_rgb(src, &mut ycrcb)?;
    let values: Vec<f32> = ycrcb.as_slice().iter().map(|&v| v as f32).collect();

    let inv_h2 = [
        1.0 / (params.h * params.h).max(f32::EPSILON),
        1.0 / (params.h_color * params.h_color).max(f32::EPSILON),
        1.0 / (params.h_color * params.h_color).max(f32::EPSILON),
    ];
    let template_radius = params.template_window / 2;
    let search_radius = (params.search_window / 2) as isize;

    let offsets: Vec<(isize, isize)> = (-search_radius..=search_radius)
        .flat_map(|dy| (-search_radius..=search_radius).map(move |dx| (dx, dy)))
        .collect();

    // per pixel weighted sums of the three planes and the total weight
    let (sums, weights) = offsets
        .par_iter()
        .fold(
            || (vec![0.0f32; n * 3], vec![0.0f32; n]),
            |(mut sums, mut weights), &(dx, dy)| {
                let neighbour = |x: usize, y: usize| {
                    let nx = reflect_101(x as isize + dx, width);
                    let ny = reflect_101(y as isize + dy, height);
                    (ny * width + nx) * 3
                };

                let mut dist = vec![0.0f32; n];
                for y in 0..height {
                    for x in 0..width {
                        let i = (y * width + x) * 3;
                        let j = neighbour(x, y);
                        dist[y * width + x] = (0..3)
                            .map(|c| (values[i + c] - values[j + c]).powi(2) * inv_h2[c])
                            .sum::<f32>()
                            / 3.0;
                    }
                }
                let patch = box_mean(&dist, width, height, template_radius);

                for y in 0..height {
                    for x in 0..width {
                        let p = y * width + x;
                        let w = (-patch[p]).exp();
                        let j = neighbour(x, y);
                        weights[p] += w;
                        for c in 0..3 {
                            sums[p * 3 + c] += w * values[j + c];
                        }
                    }
                }
                (sums, weights)
            },
        )
        .reduce(
            || (vec![0.0f32; n * 3], vec![0.0f32; n]),
            |(mut sa, mut wa), (sb, wb)| {
                sa.iter_mut().zip(sb).for_each(|(a, b)| *a += b);
                wa.iter_mut().zip(wb).for_each(|(a, b)| *a += b);
                (sa, wa)
            },
        );

    let data = sums
        .chunks_exact(3)
        .zip(&weights)
        .flat_map(|(s, &w)| s.iter().map(move |v| (v / w).round().clamp(0.0, 255.0) as u8))
        .collect();
    let denoised = Image::<u8, 3>::new(src.size(), data)?;

    let mut dst = Frame::from_size_val(src.size(), 0)?;
    rgb_from_ycrcb(&denoised, &mut dst)?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_box_mean_clipped() {
        let src = vec![1.0, 2.0, 3.0, 4.0];
        let out = box_mean(&src, 2, 2, 1);
        assert!(out.iter().all(|&v| (v - 2.5).abs() < 1e-6));
    }

    #[test]
    fn test_nl_means_reduces_noise() -> Result<(), ImageError> {
        let mut rng = StdRng::seed_from_u64(3);
        let mut noisy = Frame::from_size_val([24, 24].into(), 0)?;
        noisy.as_slice_mut().chunks_exact_mut(3).for_each(|px| {
            let v = 120 + rng.random_range(-6..=6);
            px.copy_from_slice(&[v as u8, v as u8, v as u8]);
        });

        let params = NlMeansParams {
            search_window: 7,
            ..Default::default()
        };
        let denoised = fast_nl_means_denoising_colored(&noisy, &params)?;

        let spread = |f: &Frame| {
            let (lo, hi) = f
                .as_slice()
                .iter()
                .fold((255u8, 0u8), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            hi - lo
        };
        assert!(spread(&denoised) < spread(&noisy));

        let even = NlMeansParams {
            template_window: 6,
            ..Default::default()
        };
        assert!(fast_nl_means_denoising_colored(&noisy, &even).is_err());
        Ok(())
    }
}
