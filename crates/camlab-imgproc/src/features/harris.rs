use camlab_image::{Image, ImageError};

use crate::{filter::spatial_gradient, padding::reflect_101, parallel};

/// A detected interest point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Column of the point.
    pub x: f32,
    /// Row of the point.
    pub y: f32,
    /// Detector response at the point.
    pub response: f32,
}

/// Computes the harris corner response `det(M) - k * trace(M)^2`.
///
/// `M` is the structure tensor of the 3x3 sobel gradients summed over a
/// `block_size` window. Even block sizes extend one pixel further towards
/// the top-left. Borders are reflected.
///
/// # Arguments
///
/// * `src` - The 8-bit single channel image.
/// * `block_size` - The neighbourhood size, at least 1.
/// * `k` - The harris free parameter, typically 0.04.
pub fn harris_response(
    src: &Image<u8, 1>,
    block_size: usize,
    k: f32,
) -> Result<Image<f32, 1>, ImageError> {
    if block_size == 0 {
        return Err(ImageError::InvalidKernelSize(block_size));
    }
    let (gx, gy) = spatial_gradient(&src.cast::<f32>()?)?;
    let (gx, gy) = (gx.as_slice(), gy.as_slice());
    let (width, height) = (src.width(), src.height());

    let lo = -((block_size / 2) as isize);
    let hi = (block_size - block_size / 2) as isize - 1;
    let scale = 1.0 / (block_size * block_size) as f32;

    let mut dst = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
    parallel::par_fill_rows(&mut dst, |y, row| {
        for (x, out) in row.iter_mut().enumerate() {
            let (mut sxx, mut syy, mut sxy) = (0.0f32, 0.0f32, 0.0f32);
            for dy in lo..=hi {
                let yy = reflect_101(y as isize + dy, height);
                for dx in lo..=hi {
                    let xx = reflect_101(x as isize + dx, width);
                    let i = yy * width + xx;
                    sxx += gx[i] * gx[i];
                    syy += gy[i] * gy[i];
                    sxy += gx[i] * gy[i];
                }
            }
            let (sxx, syy, sxy) = (sxx * scale, syy * scale, sxy * scale);
            let det = sxx * syy - sxy * sxy;
            let trace = sxx + syy;
            *out = det - k * trace * trace;
        }
    });

    Ok(dst)
}

/// Linearly rescale an image so its values span `[lo, hi]`.
///
/// A constant image maps to `lo`.
pub fn normalize_min_max(src: &Image<f32, 1>, lo: f32, hi: f32) -> Image<f32, 1> {
    let (min, max) = src
        .as_slice()
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(a, b), &v| {
            (a.min(v), b.max(v))
        });
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return src.map(|_| lo);
    }
    let scale = (hi - lo) / range;
    src.map(|v| (v - min) * scale + lo)
}

/// Parameters of [`harris_corners`].
#[derive(Debug, Clone, Copy)]
pub struct CornerParams {
    /// Upper bound of returned corners, strongest first.
    pub max_corners: usize,
    /// Minimal response relative to the strongest one.
    pub quality_level: f32,
    /// Minimal distance between two returned corners.
    pub min_distance: f32,
    /// Pixels at the image border that never hold a corner.
    pub border: usize,
}

impl Default for CornerParams {
    fn default() -> Self {
        Self {
            max_corners: 500,
            quality_level: 0.01,
            min_distance: 8.0,
            border: 8,
        }
    }
}

/// Detect strong, well separated harris corners.
///
/// Corners are the 3x3 local maxima of the response above
/// `quality_level * max_response`, taken strongest first while keeping
/// `min_distance` between them.
pub fn harris_corners(
    src: &Image<u8, 1>,
    params: &CornerParams,
) -> Result<Vec<Keypoint>, ImageError> {
    let response = harris_response(src, 3, 0.04)?;
    let (width, height) = (src.width(), src.height());
    let border = params.border.max(1);
    if width <= 2 * border || height <= 2 * border {
        return Ok(Vec::new());
    }

    let data = response.as_slice();
    let max_response = data.iter().copied().fold(0.0f32, f32::max);
    if max_response <= 0.0 {
        return Ok(Vec::new());
    }
    let min_response = max_response * params.quality_level;

    let mut candidates = Vec::new();
    for y in border..height - border {
        for x in border..width - border {
            let v = data[y * width + x];
            if v < min_response {
                continue;
            }
            let is_max = (y - 1..=y + 1)
                .all(|yy| (x - 1..=x + 1).all(|xx| data[yy * width + xx] <= v));
            if is_max {
                candidates.push(Keypoint {
                    x: x as f32,
                    y: y as f32,
                    response: v,
                });
            }
        }
    }
    candidates.sort_by(|a, b| b.response.total_cmp(&a.response));

    let min_d2 = params.min_distance * params.min_distance;
    let mut corners: Vec<Keypoint> = Vec::new();
    for c in candidates {
        if corners.len() >= params.max_corners {
            break;
        }
        let far = corners.iter().all(|k| {
            let (dx, dy) = (k.x - c.x, k.y - c.y);
            dx * dx + dy * dy >= min_d2
        });
        if far {
            corners.push(c);
        }
    }

    Ok(corners)
}
