use camlab_image::{Frame, GrayImage, Image, ImageError};

use crate::color::{rgb_from_ycrcb, ycrcb_from_rgb};

// the weights are searched on a grid no larger than this per side
const SAMPLE_SIDE: usize = 64;

// tolerance of the contrast match, in unit intensity
const CONTRAST_SIGMA: f32 = 0.02;

const LUMA_WEIGHTS: [f32; 3] = [0.3, 0.6, 0.1];

// every (r, g, b) weight triple summing to one in steps of 0.1
fn candidate_weights() -> Vec<[f32; 3]> {
    let mut weights = Vec::with_capacity(66);
    for r in 0..=10 {
        for g in 0..=(10 - r) {
            let b = 10 - r - g;
            weights.push([r as f32 / 10.0, g as f32 / 10.0, b as f32 / 10.0]);
        }
    }
    weights
}

fn gray_value(px: &[u8], w: &[f32; 3]) -> f32 {
    px[0] as f32 * w[0] + px[1] as f32 * w[1] + px[2] as f32 * w[2]
}

/// Contrast preserving conversion of a colour frame to gray.
///
/// The gray image is a linear mix of the colour channels. The mix is chosen
/// among the weight triples summing to one, in steps of 0.1, so that gray
/// differences between neighbouring pixels best match their colour
/// differences. Isoluminant colours that a fixed luma mix would merge stay
/// distinct.
///
/// # Returns
///
/// The gray image and the colour boosted frame, which is the source frame
/// with its luma replaced by the gray image.
pub fn decolor(src: &Frame) -> Result<(GrayImage, Frame), ImageError> {
    if src.is_empty() {
        return Err(ImageError::EmptyImage);
    }

    let (width, height) = (src.width(), src.height());
    let step = (width.max(height) / SAMPLE_SIDE).max(1);

    // sampled neighbour pairs with their normalised colour contrast
    let mut pairs = Vec::new();
    for y in (0..height).step_by(step) {
        for x in (0..width).step_by(step) {
            let p = src.pixel(x, y);
            for (nx, ny) in [(x + step, y), (x, y + step)] {
                if nx >= width || ny >= height {
                    continue;
                }
                let q = src.pixel(nx, ny);
                let contrast = p
                    .iter()
                    .zip(q)
                    .map(|(&a, &b)| (a as f32 - b as f32).powi(2))
                    .sum::<f32>()
                    .sqrt()
                    / (255.0 * 3f32.sqrt());
                pairs.push((p, q, contrast));
            }
        }
    }

    let energy = |w: &[f32; 3]| -> f32 {
        pairs
            .iter()
            .map(|(p, q, contrast)| {
                let diff = (gray_value(p, w) - gray_value(q, w)).abs() / 255.0;
                (-(diff - contrast).powi(2) / (2.0 * CONTRAST_SIGMA * CONTRAST_SIGMA)).exp()
            })
            .sum()
    };

    let mut best = LUMA_WEIGHTS;
    let mut best_energy = energy(&best);
    for w in candidate_weights() {
        let e = energy(&w);
        if e > best_energy {
            best = w;
            best_energy = e;
        }
    }
    log::trace!("decolor weights {best:?}");

    let gray_data = src
        .as_slice()
        .chunks_exact(3)
        .map(|px| gray_value(px, &best).round().clamp(0.0, 255.0) as u8)
        .collect();
    let gray = Image::<u8, 1>::new(src.size(), gray_data)?;

    let mut ycrcb = Frame::from_size_val(src.size(), 0)?;
    ycrcb_from_rgb(src, &mut ycrcb)?;
    ycrcb
        .as_slice_mut()
        .chunks_exact_mut(3)
        .zip(gray.as_slice())
        .for_each(|(px, &g)| px[0] = g);
    let mut boost = Frame::from_size_val(src.size(), 0)?;
    rgb_from_ycrcb(&ycrcb, &mut boost)?;

    Ok((gray, boost))
}
