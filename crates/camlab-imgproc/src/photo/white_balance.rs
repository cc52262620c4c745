use camlab_image::{Frame, ImageError};

use crate::histogram::compute_histogram;

/// Percentage of the darkest and of the brightest values ignored per channel.
pub const WHITE_BALANCE_PERCENT: f32 = 2.0;

/// Simple white balance by stretching every channel independently.
///
/// For each channel the values below the `percent` lowest and above the
/// `percent` highest quantile are saturated and the range in between is
/// stretched to `[0, 255]`. Channels with a single level are left untouched.
pub fn simple_white_balance(src: &Frame, percent: f32) -> Result<Frame, ImageError> {
    let mut dst = src.clone();
    if src.is_empty() {
        return Ok(dst);
    }

    let total = src.size().area() as f32;
    let cut = total * percent.clamp(0.0, 50.0) / 100.0;

    for (c, channel) in src.split_channels()?.iter().enumerate() {
        let hist = compute_histogram(channel, 256)?;

        let mut acc = 0usize;
        let low = hist
            .iter()
            .position(|&n| {
                acc += n;
                acc as f32 > cut
            })
            .unwrap_or(0);
        let mut acc = 0usize;
        let high = 255
            - hist
                .iter()
                .rev()
                .position(|&n| {
                    acc += n;
                    acc as f32 > cut
                })
                .unwrap_or(0);

        if high <= low {
            continue;
        }
        let scale = 255.0 / (high - low) as f32;
        dst.as_slice_mut()
            .chunks_exact_mut(3)
            .for_each(|px| {
                let v = (px[c] as f32 - low as f32) * scale;
                px[c] = v.round().clamp(0.0, 255.0) as u8;
            });
    }

    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_balance_stretches_channels() -> Result<(), ImageError> {
        let mut frame = Frame::from_size_val([100, 1].into(), 0)?;
        for x in 0..100 {
            let v = 50 + x as u8;
            frame.pixel_mut(x, 0).copy_from_slice(&[v, v / 2, 90]);
        }

        let dst = simple_white_balance(&frame, WHITE_BALANCE_PERCENT)?;
        let red: Vec<u8> = dst.as_slice().chunks_exact(3).map(|p| p[0]).collect();
        assert_eq!(red[0], 0);
        assert_eq!(red[99], 255);
        assert!(red.windows(2).all(|w| w[0] <= w[1]));
        // a flat channel is left alone
        assert!(dst.as_slice().chunks_exact(3).all(|p| p[2] == 90));
        Ok(())
    }
}
