use rayon::prelude::*;

use camlab_image::{Image, ImageError, ImageSize};

/// Mask value of pixels explained by the background.
pub const MASK_BACKGROUND: u8 = 0;
/// Mask value of shadowed background pixels.
pub const MASK_SHADOW: u8 = 127;
/// Mask value of foreground pixels.
pub const MASK_FOREGROUND: u8 = 255;

/// Parameters of the [`GaussianMixtureModel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixtureParams {
    /// Number of frames that shape the model, the learning rate settles at
    /// its inverse.
    pub history: usize,
    /// Squared Mahalanobis distance under which a pixel is background.
    pub var_threshold: f32,
    /// Mark shadows with [`MASK_SHADOW`] instead of foreground.
    pub detect_shadows: bool,
    /// Maximum number of gaussians per pixel.
    pub max_modes: usize,
    /// Share of the total weight that the background modes must cover.
    pub background_ratio: f32,
    /// Squared Mahalanobis distance under which a sample updates a mode.
    pub var_threshold_gen: f32,
    /// Variance of a new mode.
    pub var_init: f32,
    /// Lower bound of a mode variance.
    pub var_min: f32,
    /// Upper bound of a mode variance.
    pub var_max: f32,
    /// Complexity reduction prior, modes whose weight falls below it are dropped.
    pub complexity_reduction: f32,
    /// Darkest relative brightness still considered a shadow.
    pub shadow_threshold: f32,
}

impl Default for MixtureParams {
    fn default() -> Self {
        Self {
            history: 50,
            var_threshold: 16.0,
            detect_shadows: false,
            max_modes: 5,
            background_ratio: 0.9,
            var_threshold_gen: 9.0,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            complexity_reduction: 0.05,
            shadow_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Mode {
    weight: f32,
    variance: f32,
    mean: [f32; 3],
}

/// Adaptive per-pixel gaussian mixture model of a static background.
///
/// Each pixel keeps up to `max_modes` isotropic RGB gaussians sorted by
/// weight. A sample close to one of the heaviest modes, those covering
/// `background_ratio` of the weight, is background. Samples refine the
/// first mode they fit; unexplained samples start a new mode.
///
/// The model is sized by the first frame and restarts when the frame size
/// changes.
pub struct GaussianMixtureModel {
    params: MixtureParams,
    size: ImageSize,
    modes: Vec<Mode>,
    used: Vec<u8>,
    frames: usize,
}

impl GaussianMixtureModel {
    /// Create an empty model.
    pub fn new(params: MixtureParams) -> Self {
        Self {
            params: MixtureParams {
                max_modes: params.max_modes.clamp(1, u8::MAX as usize),
                history: params.history.max(1),
                ..params
            },
            size: ImageSize {
                width: 0,
                height: 0,
            },
            modes: Vec::new(),
            used: Vec::new(),
            frames: 0,
        }
    }

    /// The parameters of the model.
    pub fn params(&self) -> &MixtureParams {
        &self.params
    }

    /// Number of frames learnt since the model was (re)started.
    pub fn frames(&self) -> usize {
        self.frames
    }

    fn reset(&mut self, size: ImageSize) {
        self.size = size;
        self.modes = vec![Mode::default(); size.area() * self.params.max_modes];
        self.used = vec![0; size.area()];
        self.frames = 0;
    }

    /// Learn a frame and classify its pixels.
    ///
    /// # Returns
    ///
    /// The foreground mask with [`MASK_FOREGROUND`], [`MASK_BACKGROUND`] and,
    /// when enabled, [`MASK_SHADOW`] values.
    pub fn apply(&mut self, frame: &Image<u8, 3>) -> Result<Image<u8, 1>, ImageError> {
        if frame.is_empty() {
            return Err(ImageError::EmptyImage);
        }
        if frame.size() != self.size {
            log::debug!("background model sized for {}", frame.size());
            self.reset(frame.size());
        }

        self.frames += 1;
        let alpha = 1.0 / (2 * self.frames).min(self.params.history) as f32;

        let params = self.params;
        let width = self.size.width;
        let max_modes = params.max_modes;
        let mut mask = Image::<u8, 1>::from_size_val(self.size, MASK_BACKGROUND)?;

        self.modes
            .par_chunks_exact_mut(width * max_modes)
            .zip(self.used.par_chunks_exact_mut(width))
            .zip(mask.as_slice_mut().par_chunks_exact_mut(width))
            .zip(frame.as_slice().par_chunks_exact(width * 3))
            .for_each(|(((modes_row, used_row), mask_row), pixels)| {
                for x in 0..width {
                    let sample = [
                        pixels[3 * x] as f32,
                        pixels[3 * x + 1] as f32,
                        pixels[3 * x + 2] as f32,
                    ];
                    let modes = &mut modes_row[x * max_modes..(x + 1) * max_modes];
                    mask_row[x] = update_pixel(&params, alpha, modes, &mut used_row[x], sample);
                }
            });

        Ok(mask)
    }
}

fn dist2(mean: &[f32; 3], sample: &[f32; 3]) -> f32 {
    mean.iter()
        .zip(sample)
        .map(|(m, s)| (m - s) * (m - s))
        .sum()
}

fn update_pixel(
    params: &MixtureParams,
    alpha: f32,
    modes: &mut [Mode],
    used: &mut u8,
    sample: [f32; 3],
) -> u8 {
    let prune = alpha * params.complexity_reduction;
    let mut n = *used as usize;

    let mut background = false;
    let mut fitted = false;
    let mut total_weight = 0.0;

    for mode in modes.iter_mut().take(n) {
        mode.weight = (1.0 - alpha) * mode.weight - prune;
        if fitted {
            continue;
        }

        let d2 = dist2(&mode.mean, &sample);
        if total_weight < params.background_ratio && d2 < params.var_threshold * mode.variance {
            background = true;
        }
        if d2 < params.var_threshold_gen * mode.variance {
            fitted = true;
            mode.weight += alpha;
            let k = alpha / mode.weight;
            for (m, s) in mode.mean.iter_mut().zip(sample) {
                *m -= k * (*m - s);
            }
            mode.variance = (mode.variance + k * (d2 - mode.variance))
                .clamp(params.var_min, params.var_max);
        }
        total_weight += mode.weight;
    }

    // drop the modes that faded away
    let mut kept = 0;
    for i in 0..n {
        if modes[i].weight > prune {
            modes[kept] = modes[i];
            kept += 1;
        }
    }
    n = kept;

    if !fitted {
        let slot = if n == modes.len() { n - 1 } else { n };
        if slot == n {
            n += 1;
        }
        modes[slot] = Mode {
            weight: if n == 1 { 1.0 } else { alpha },
            variance: params.var_init,
            mean: sample,
        };
    }

    let sum: f32 = modes[..n].iter().map(|m| m.weight).sum();
    if sum > 0.0 {
        modes[..n].iter_mut().for_each(|m| m.weight /= sum);
    }
    modes[..n].sort_by(|a, b| b.weight.total_cmp(&a.weight));
    *used = n as u8;

    if background {
        MASK_BACKGROUND
    } else if params.detect_shadows && is_shadow(params, &modes[..n], &sample) {
        MASK_SHADOW
    } else {
        MASK_FOREGROUND
    }
}

// a shadow is a darker copy of a background colour
fn is_shadow(params: &MixtureParams, modes: &[Mode], sample: &[f32; 3]) -> bool {
    let mut total_weight = 0.0;
    for mode in modes {
        let numerator: f32 = mode.mean.iter().zip(sample).map(|(m, s)| m * s).sum();
        let denominator: f32 = mode.mean.iter().map(|m| m * m).sum();
        if denominator > 0.0 {
            let a = numerator / denominator;
            if (params.shadow_threshold..=1.0).contains(&a) {
                let d2: f32 = mode
                    .mean
                    .iter()
                    .zip(sample)
                    .map(|(m, s)| (a * m - s) * (a * m - s))
                    .sum();
                if d2 < params.var_threshold * mode.variance * a * a {
                    return true;
                }
            }
        }
        total_weight += mode.weight;
        if total_weight > params.background_ratio {
            break;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: u8) -> Result<Image<u8, 3>, ImageError> {
        Image::from_size_val(
            ImageSize {
                width: 16,
                height: 12,
            },
            value,
        )
    }

    #[test]
    fn test_first_frame_is_foreground() -> Result<(), ImageError> {
        let mut model = GaussianMixtureModel::new(MixtureParams::default());
        let mask = model.apply(&frame(40)?)?;
        assert!(mask.as_slice().iter().all(|&v| v == MASK_FOREGROUND));
        let mask = model.apply(&frame(40)?)?;
        assert!(mask.as_slice().iter().all(|&v| v == MASK_BACKGROUND));
        assert_eq!(model.frames(), 2);
        Ok(())
    }

    #[test]
    fn test_patch_is_foreground() -> Result<(), ImageError> {
        let mut model = GaussianMixtureModel::new(MixtureParams::default());
        let background = frame(30)?;
        for _ in 0..50 {
            model.apply(&background)?;
        }

        let mut moved = background.clone();
        for y in 4..8 {
            for x in 5..10 {
                moved.pixel_mut(x, y).copy_from_slice(&[230, 220, 210]);
            }
        }
        let mask = model.apply(&moved)?;
        for y in 0..12 {
            for x in 0..16 {
                let inside = (5..10).contains(&x) && (4..8).contains(&y);
                let expected = if inside {
                    MASK_FOREGROUND
                } else {
                    MASK_BACKGROUND
                };
                assert_eq!(mask.get([y, x, 0]), Some(&expected), "({x}, {y})");
            }
        }
        Ok(())
    }

    #[test]
    fn test_shadow_detection() -> Result<(), ImageError> {
        let mut model = GaussianMixtureModel::new(MixtureParams {
            detect_shadows: true,
            ..Default::default()
        });
        for _ in 0..30 {
            model.apply(&frame(200)?)?;
        }
        let mask = model.apply(&frame(140)?)?;
        assert!(mask.as_slice().iter().all(|&v| v == MASK_SHADOW));
        Ok(())
    }

    #[test]
    fn test_resize_restarts_model() -> Result<(), ImageError> {
        let mut model = GaussianMixtureModel::new(MixtureParams::default());
        model.apply(&frame(10)?)?;
        model.apply(&frame(10)?)?;
        let other = Image::<u8, 3>::from_size_val(
            ImageSize {
                width: 4,
                height: 4,
            },
            10,
        )?;
        let mask = model.apply(&other)?;
        assert_eq!(model.frames(), 1);
        assert!(mask.as_slice().iter().all(|&v| v == MASK_FOREGROUND));
        Ok(())
    }
}
