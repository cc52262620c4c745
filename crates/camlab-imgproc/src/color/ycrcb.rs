use crate::parallel;
use camlab_image::{ops::check_same_size, Frame, ImageError};

/// Convert an RGB8 image to YCrCb with the channel order (Y, Cr, Cb).
///
/// Y  = 0.299 R + 0.587 G + 0.114 B
/// Cr = (R - Y) * 0.713 + 128
/// Cb = (B - Y) * 0.564 + 128
pub fn ycrcb_from_rgb(src: &Frame, dst: &mut Frame) -> Result<(), ImageError> {
    check_same_size(src, dst)?;

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        let r = src_pixel[0] as f32;
        let g = src_pixel[1] as f32;
        let b = src_pixel[2] as f32;
        let y = 0.299 * r + 0.587 * g + 0.114 * b;
        dst_pixel[0] = y.round().clamp(0.0, 255.0) as u8;
        dst_pixel[1] = ((r - y) * 0.713 + 128.0).round().clamp(0.0, 255.0) as u8;
        dst_pixel[2] = ((b - y) * 0.564 + 128.0).round().clamp(0.0, 255.0) as u8;
    });

    Ok(())
}

/// Convert a (Y, Cr, Cb) image back to RGB8.
pub fn rgb_from_ycrcb(src: &Frame, dst: &mut Frame) -> Result<(), ImageError> {
    check_same_size(src, dst)?;

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        let y = src_pixel[0] as f32;
        let cr = src_pixel[1] as f32 - 128.0;
        let cb = src_pixel[2] as f32 - 128.0;
        dst_pixel[0] = (y + 1.403 * cr).round().clamp(0.0, 255.0) as u8;
        dst_pixel[1] = (y - 0.714 * cr - 0.344 * cb).round().clamp(0.0, 255.0) as u8;
        dst_pixel[2] = (y + 1.773 * cb).round().clamp(0.0, 255.0) as u8;
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::{Image, ImageSize};

    #[test]
    fn ycrcb_round_trip() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new(
            ImageSize {
                width: 3,
                height: 1,
            },
            vec![255, 0, 0, 20, 160, 90, 128, 128, 128],
        )?;
        let mut ycrcb = image.clone();
        ycrcb_from_rgb(&image, &mut ycrcb)?;
        assert_eq!(ycrcb.pixel(2, 0), &[128, 128, 128]);

        let mut back = image.clone();
        rgb_from_ycrcb(&ycrcb, &mut back)?;
        for (a, b) in back.as_slice().iter().zip(image.as_slice()) {
            assert!((*a as i32 - *b as i32).abs() <= 2);
        }
        Ok(())
    }
}
