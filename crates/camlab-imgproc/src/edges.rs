use camlab_image::{Image, ImageError};

use crate::filter::spatial_gradient;

// tan(22.5) and tan(67.5) for direction quantisation
const TAN_22_5: f32 = 0.414_213_57;
const TAN_67_5: f32 = 2.414_213_6;

/// Detect edges with the Canny algorithm.
///
/// The 3x3 sobel gradient is measured with the L1 norm `|gx| + |gy|`, thinned
/// by non-maximum suppression along the quantised gradient direction and
/// linked by hysteresis: pixels above `high` seed edges which then grow
/// through 8-connected pixels above `low`.
///
/// # Arguments
///
/// * `src` - The 8-bit single channel image.
/// * `low` - The lower hysteresis threshold.
/// * `high` - The upper hysteresis threshold.
///
/// # Returns
///
/// A binary image with edges at 255.
pub fn canny(src: &Image<u8, 1>, low: f32, high: f32) -> Result<Image<u8, 1>, ImageError> {
    let (low, high) = if low > high { (high, low) } else { (low, high) };
    let (width, height) = (src.width(), src.height());
    let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;
    if width < 3 || height < 3 {
        return Ok(dst);
    }

    let (gx, gy) = spatial_gradient(&src.cast::<f32>()?)?;
    let (gx, gy) = (gx.as_slice(), gy.as_slice());
    let mag: Vec<f32> = gx.iter().zip(gy).map(|(a, b)| a.abs() + b.abs()).collect();

    // 0 = suppressed, 1 = weak, 2 = strong
    let mut state = vec![0u8; width * height];
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let i = y * width + x;
            let m = mag[i];
            if m <= low {
                continue;
            }

            let (ax, ay) = (gx[i].abs(), gy[i].abs());
            let (before, after) = if ay < ax * TAN_22_5 {
                (i - 1, i + 1)
            } else if ay > ax * TAN_67_5 {
                (i - width, i + width)
            } else if (gx[i] < 0.0) != (gy[i] < 0.0) {
                (i - width + 1, i + width - 1)
            } else {
                (i - width - 1, i + width + 1)
            };

            if m > mag[before] && m >= mag[after] {
                state[i] = if m > high { 2 } else { 1 };
            }
        }
    }

    // hysteresis from every strong pixel
    let mut stack: Vec<usize> = state
        .iter()
        .enumerate()
        .filter(|(_, &s)| s == 2)
        .map(|(i, _)| i)
        .collect();
    let out = dst.as_slice_mut();
    while let Some(i) = stack.pop() {
        if out[i] != 0 {
            continue;
        }
        out[i] = 255;
        let (x, y) = ((i % width) as isize, (i / width) as isize);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                    continue;
                }
                let j = ny as usize * width + nx as usize;
                if state[j] != 0 && out[j] == 0 {
                    stack.push(j);
                }
            }
        }
    }

    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::ImageSize;

    fn step_image() -> Result<Image<u8, 1>, ImageError> {
        let size = ImageSize {
            width: 10,
            height: 8,
        };
        let data = (0..size.area())
            .map(|i| if i % 10 < 5 { 0 } else { 200 })
            .collect();
        Image::new(size, data)
    }

    #[test]
    fn test_canny_vertical_step() -> Result<(), ImageError> {
        let img = step_image()?;
        let edges = canny(&img, 50.0, 125.0)?;

        // one thin vertical edge on the inner rows
        for y in 1..7 {
            let row = edges.row(y);
            let count = row.iter().filter(|&&v| v == 255).count();
            assert_eq!(count, 1, "row {y}: {row:?}");
            assert!(row[4] == 255 || row[5] == 255);
        }
        assert!(edges.row(0).iter().all(|&v| v == 0));
        Ok(())
    }

    #[test]
    fn test_canny_flat_image() -> Result<(), ImageError> {
        let img = Image::<u8, 1>::from_size_val(
            ImageSize {
                width: 6,
                height: 6,
            },
            90,
        )?;
        let edges = canny(&img, 10.0, 30.0)?;
        assert!(edges.as_slice().iter().all(|&v| v == 0));
        Ok(())
    }

    #[test]
    fn test_canny_high_threshold_rejects() -> Result<(), ImageError> {
        let img = step_image()?;
        // the L1 magnitude of the step is 800
        let edges = canny(&img, 900.0, 1000.0)?;
        assert!(edges.as_slice().iter().all(|&v| v == 0));
        Ok(())
    }
}
