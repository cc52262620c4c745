use camlab_image::{Image, ImageError, ImageSize};
use rayon::prelude::*;

use crate::{draw, padding::reflect_101};

/// Compute the pixel intensity histogram of an 8-bit single channel image.
///
/// # Arguments
///
/// * `src` - The input image to compute the histogram.
/// * `num_bins` - The number of bins, in `1..=256`.
///
/// # Errors
///
/// Returns an error if the number of bins is invalid.
///
/// # Example
///
/// ```
/// use camlab_image::{Image, ImageSize};
/// use camlab_imgproc::histogram::compute_histogram;
///
/// let image = Image::<u8, 1>::new(
///   ImageSize {
///     width: 3,
///     height: 3,
///   },
///   vec![0, 2, 4, 128, 130, 132, 254, 255, 255],
/// ).unwrap();
///
/// let histogram = compute_histogram(&image, 3).unwrap();
/// assert_eq!(histogram, vec![3, 3, 3]);
/// ```
pub fn compute_histogram(src: &Image<u8, 1>, num_bins: usize) -> Result<Vec<usize>, ImageError> {
    if num_bins == 0 || num_bins > 256 {
        return Err(ImageError::InvalidHistogramBins(num_bins));
    }

    let bin_lut: Vec<usize> = (0..256).map(|i| (i * num_bins) >> 8).collect();

    let counts = src
        .as_slice()
        .par_chunks(4096)
        .fold(
            || vec![0usize; num_bins],
            |mut local, chunk| {
                for &px in chunk {
                    local[bin_lut[px as usize]] += 1;
                }
                local
            },
        )
        .reduce(
            || vec![0usize; num_bins],
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                a
            },
        );

    Ok(counts)
}

fn apply_lut(src: &Image<u8, 1>, lut: &[u8; 256]) -> Result<Image<u8, 1>, ImageError> {
    Image::new(
        src.size(),
        src.as_slice().iter().map(|&v| lut[v as usize]).collect(),
    )
}

/// Equalize the histogram of an 8-bit single channel image.
///
/// The lowest occupied level maps to 0 and the cumulative distribution is
/// stretched over the full range. A uniform image is returned unchanged.
pub fn equalize_hist(src: &Image<u8, 1>) -> Result<Image<u8, 1>, ImageError> {
    let hist = compute_histogram(src, 256)?;
    let total = src.size().area();

    let Some(first) = hist.iter().position(|&c| c > 0) else {
        return Ok(src.clone());
    };
    if hist[first] == total {
        return Ok(src.clone());
    }

    let scale = 255.0 / (total - hist[first]) as f64;
    let mut lut = [0u8; 256];
    let mut sum = 0usize;
    for i in first + 1..256 {
        sum += hist[i];
        lut[i] = (sum as f64 * scale).round().min(255.0) as u8;
    }

    apply_lut(src, &lut)
}

/// Contrast limited adaptive histogram equalization.
///
/// The image is split into `tiles.0 x tiles.1` tiles. Each tile histogram is
/// clipped at `clip_limit` times the mean bin height and the excess is
/// redistributed before the tile mapping is built. Pixels blend the mappings
/// of the four nearest tile centers bilinearly.
///
/// # Arguments
///
/// * `src` - The 8-bit single channel image.
/// * `clip_limit` - The relative clip limit, non-positive disables clipping.
/// * `tiles` - The tile grid as (columns, rows).
pub fn clahe(
    src: &Image<u8, 1>,
    clip_limit: f32,
    tiles: (usize, usize),
) -> Result<Image<u8, 1>, ImageError> {
    let (tiles_x, tiles_y) = (tiles.0.max(1), tiles.1.max(1));
    let (width, height) = (src.width(), src.height());
    if src.is_empty() {
        return Ok(src.clone());
    }

    // tiles cover a reflected extension when the size is not a multiple
    let tile_w = width.div_ceil(tiles_x);
    let tile_h = height.div_ceil(tiles_y);
    let tile_area = tile_w * tile_h;

    let clip = if clip_limit > 0.0 {
        ((clip_limit as f64 * tile_area as f64 / 256.0) as usize).max(1)
    } else {
        0
    };
    let lut_scale = 255.0 / tile_area as f64;

    let luts: Vec<[u8; 256]> = (0..tiles_x * tiles_y)
        .into_par_iter()
        .map(|t| {
            let (tx, ty) = (t % tiles_x, t / tiles_x);
            let mut hist = [0usize; 256];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let yy = reflect_101(y as isize, height);
                for x in tx * tile_w..(tx + 1) * tile_w {
                    let xx = reflect_101(x as isize, width);
                    hist[src.pixel(xx, yy)[0] as usize] += 1;
                }
            }

            if clip > 0 {
                let mut excess = 0usize;
                for h in hist.iter_mut() {
                    if *h > clip {
                        excess += *h - clip;
                        *h = clip;
                    }
                }
                let batch = excess / 256;
                let mut residual = excess - batch * 256;
                let step = if residual > 0 { (256 / residual).max(1) } else { 1 };
                hist.iter_mut().for_each(|h| *h += batch);
                let mut i = 0;
                while residual > 0 && i < 256 {
                    hist[i] += 1;
                    residual -= 1;
                    i += step;
                }
            }

            let mut lut = [0u8; 256];
            let mut sum = 0usize;
            for (i, &h) in hist.iter().enumerate() {
                sum += h;
                lut[i] = (sum as f64 * lut_scale).round().min(255.0) as u8;
            }
            lut
        })
        .collect();

    let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;
    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;

    crate::parallel::par_fill_rows(&mut dst, |y, row| {
        let tyf = y as f32 * inv_th - 0.5;
        let ty1 = tyf.floor() as isize;
        let ya = tyf - ty1 as f32;
        let ty2 = ((ty1 + 1).min(tiles_y as isize - 1)).max(0) as usize;
        let ty1 = ty1.max(0) as usize;

        for (x, out) in row.iter_mut().enumerate() {
            let txf = x as f32 * inv_tw - 0.5;
            let tx1 = txf.floor() as isize;
            let xa = txf - tx1 as f32;
            let tx2 = ((tx1 + 1).min(tiles_x as isize - 1)).max(0) as usize;
            let tx1 = tx1.max(0) as usize;

            let v = src.pixel(x, y)[0] as usize;
            let lut = |tx: usize, ty: usize| luts[ty * tiles_x + tx][v] as f32;

            let top = lut(tx1, ty1) * (1.0 - xa) + lut(tx2, ty1) * xa;
            let bottom = lut(tx1, ty2) * (1.0 - xa) + lut(tx2, ty2) * xa;
            *out = (top * (1.0 - ya) + bottom * ya).round().clamp(0.0, 255.0) as u8;
        }
    });

    Ok(dst)
}

/// Size of the chart produced by [`draw_histogram_chart`].
pub const HISTOGRAM_CHART_SIZE: ImageSize = ImageSize {
    width: 512,
    height: 400,
};

/// Render the three channel histograms of a color image as a line chart.
///
/// Each 256 bin histogram is min-max normalised to the chart height on its
/// own and drawn with a 2 pixel line in the color of its channel, on a black
/// 512x400 canvas.
pub fn draw_histogram_chart(src: &Image<u8, 3>) -> Result<Image<u8, 3>, ImageError> {
    let size = HISTOGRAM_CHART_SIZE;
    let mut chart = Image::<u8, 3>::from_size_val(size, 0)?;
    let bin_w = (size.width as f64 / 256.0).round() as i64;
    let h = size.height as i64;

    // blue first so red ends on top
    let channels = [(2, [0, 0, 255]), (1, [0, 255, 0]), (0, [255, 0, 0])];

    for (ch, color) in channels {
        let hist = compute_histogram(&src.channel(ch)?, 256)?;
        let norm = min_max_normalize(&hist, size.height as f64);
        for i in 1..256 {
            draw::draw_line(
                &mut chart,
                (bin_w * (i as i64 - 1), h - norm[i - 1].round() as i64),
                (bin_w * i as i64, h - norm[i].round() as i64),
                color,
                2,
            );
        }
    }

    Ok(chart)
}

fn min_max_normalize(hist: &[usize], upper: f64) -> Vec<f64> {
    let min = hist.iter().copied().min().unwrap_or(0) as f64;
    let max = hist.iter().copied().max().unwrap_or(0) as f64;
    let range = max - min;
    hist.iter()
        .map(|&v| {
            if range > 0.0 {
                (v as f64 - min) * upper / range
            } else {
                0.0
            }
        })
        .collect()
}
