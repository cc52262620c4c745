use camlab_image::{Image, ImageError};

use crate::{padding::replicate, parallel};

/// Blur an 8-bit image with a median filter.
///
/// Every channel is filtered independently. The window histogram slides along
/// each row so the cost per pixel grows linearly with the kernel size.
/// Borders repeat the edge pixel.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `kernel_size` - The side of the square window, odd.
///
/// # Errors
///
/// Returns [`ImageError::InvalidKernelSize`] for an even kernel size.
pub fn median_blur<const C: usize>(
    src: &Image<u8, C>,
    kernel_size: usize,
) -> Result<Image<u8, C>, ImageError> {
    if kernel_size % 2 == 0 {
        return Err(ImageError::InvalidKernelSize(kernel_size));
    }

    let mut dst = Image::<u8, C>::from_size_val(src.size(), 0)?;
    if src.is_empty() || kernel_size == 1 {
        dst.as_slice_mut().copy_from_slice(src.as_slice());
        return Ok(dst);
    }

    let (width, height) = (src.width(), src.height());
    let half = (kernel_size / 2) as isize;
    let window = kernel_size * kernel_size;
    let rank = window / 2;

    parallel::par_fill_rows(&mut dst, |y, row| {
        for c in 0..C {
            let mut hist = [0u32; 256];

            // seed the window of the first column
            for dy in -half..=half {
                let yy = replicate(y as isize + dy, height);
                for dx in -half..=half {
                    let xx = replicate(dx, width);
                    hist[src.pixel(xx, yy)[c] as usize] += 1;
                }
            }
            row[c] = kth_value(&hist, rank);

            for x in 1..width {
                let x_out = replicate(x as isize - half - 1, width);
                let x_in = replicate(x as isize + half, width);
                for dy in -half..=half {
                    let yy = replicate(y as isize + dy, height);
                    hist[src.pixel(x_out, yy)[c] as usize] -= 1;
                    hist[src.pixel(x_in, yy)[c] as usize] += 1;
                }
                row[x * C + c] = kth_value(&hist, rank);
            }
        }
    });

    Ok(dst)
}

fn kth_value(hist: &[u32; 256], rank: usize) -> u8 {
    let mut acc = 0usize;
    for (v, &count) in hist.iter().enumerate() {
        acc += count as usize;
        if acc > rank {
            return v as u8;
        }
    }
    255
}
