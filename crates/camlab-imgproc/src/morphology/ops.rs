use camlab_image::{ops::check_same_size, Image, ImageError};

use super::Kernel;
use crate::parallel;

/// Compound morphological operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOp {
    /// Minimum over the kernel.
    Erode,
    /// Maximum over the kernel.
    Dilate,
    /// Erosion followed by dilation.
    Open,
    /// Dilation followed by erosion.
    Close,
    /// Dilation minus erosion.
    Gradient,
    /// Source minus its opening.
    TopHat,
    /// Closing minus the source.
    BlackHat,
}

// pixels outside the image never win the min/max, which is the same as
// padding with the neutral element of the operation
fn rank_filter<const C: usize>(
    src: &Image<u8, C>,
    kernel: &Kernel,
    take_max: bool,
) -> Result<Image<u8, C>, ImageError> {
    let neutral = if take_max { 0 } else { 255 };
    let mut dst = Image::<u8, C>::from_size_val(src.size(), neutral)?;
    let offsets = kernel.offsets();
    let (width, height) = (src.width() as isize, src.height() as isize);

    parallel::par_fill_rows(&mut dst, |y, row| {
        for x in 0..width {
            for &(dx, dy) in offsets.iter() {
                let (xx, yy) = (x + dx, y as isize + dy);
                if xx < 0 || yy < 0 || xx >= width || yy >= height {
                    continue;
                }
                let px = src.pixel(xx as usize, yy as usize);
                let out = &mut row[x as usize * C..(x as usize + 1) * C];
                for c in 0..C {
                    out[c] = if take_max {
                        out[c].max(px[c])
                    } else {
                        out[c].min(px[c])
                    };
                }
            }
        }
    });

    Ok(dst)
}

/// Erode an image using a [`Kernel`].
///
/// Erosion shrinks white regions in the image. Each pixel is replaced
/// by the minimum value in the neighborhood defined by the kernel.
///
/// # Arguments
///
/// * `src` - The source image.
/// * `kernel` - The morphological structuring element ([`Kernel`]).
/// * `iterations` - How many times the erosion is applied.
pub fn erode<const C: usize>(
    src: &Image<u8, C>,
    kernel: &Kernel,
    iterations: usize,
) -> Result<Image<u8, C>, ImageError> {
    let mut img = src.clone();
    for _ in 0..iterations {
        img = rank_filter(&img, kernel, false)?;
    }
    Ok(img)
}

/// Dilate an image using a [`Kernel`].
///
/// Dilation expands white regions in the image. Each pixel is replaced
/// by the maximum value in the neighborhood defined by the kernel.
///
/// # Arguments
///
/// * `src` - The source image.
/// * `kernel` - The morphological structuring element ([`Kernel`]).
/// * `iterations` - How many times the dilation is applied.
pub fn dilate<const C: usize>(
    src: &Image<u8, C>,
    kernel: &Kernel,
    iterations: usize,
) -> Result<Image<u8, C>, ImageError> {
    let mut img = src.clone();
    for _ in 0..iterations {
        img = rank_filter(&img, kernel, true)?;
    }
    Ok(img)
}

fn saturating_diff<const C: usize>(
    a: &Image<u8, C>,
    b: &Image<u8, C>,
) -> Result<Image<u8, C>, ImageError> {
    check_same_size(a, b)?;
    let data = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(&x, &y)| x.saturating_sub(y))
        .collect();
    Image::new(a.size(), data)
}

/// Apply a compound morphological operation.
///
/// # Arguments
///
/// * `src` - The source image.
/// * `op` - The operation to run.
/// * `kernel` - The structuring element.
pub fn morphology_ex<const C: usize>(
    src: &Image<u8, C>,
    op: MorphOp,
    kernel: &Kernel,
) -> Result<Image<u8, C>, ImageError> {
    match op {
        MorphOp::Erode => erode(src, kernel, 1),
        MorphOp::Dilate => dilate(src, kernel, 1),
        MorphOp::Open => dilate(&erode(src, kernel, 1)?, kernel, 1),
        MorphOp::Close => erode(&dilate(src, kernel, 1)?, kernel, 1),
        MorphOp::Gradient => saturating_diff(&dilate(src, kernel, 1)?, &erode(src, kernel, 1)?),
        MorphOp::TopHat => {
            let opened = morphology_ex(src, MorphOp::Open, kernel)?;
            saturating_diff(src, &opened)
        }
        MorphOp::BlackHat => {
            let closed = morphology_ex(src, MorphOp::Close, kernel)?;
            saturating_diff(&closed, src)
        }
    }
}

/// Hit-or-miss transform of a single channel image.
///
/// The pattern holds `1` where the neighbourhood must be foreground, `-1`
/// where it must be background and `0` where it does not matter.
///
/// # Arguments
///
/// * `src` - The binary source image.
/// * `pattern` - The row-major pattern values.
/// * `width` - The pattern width.
/// * `height` - The pattern height.
///
/// # Errors
///
/// Returns [`ImageError::InvalidKernelSize`] if the pattern length mismatches.
pub fn hit_or_miss(
    src: &Image<u8, 1>,
    pattern: &[i8],
    width: usize,
    height: usize,
) -> Result<Image<u8, 1>, ImageError> {
    if pattern.len() != width * height {
        return Err(ImageError::InvalidKernelSize(pattern.len()));
    }

    let to_kernel = |sign: i8| {
        let data = pattern.iter().map(|&v| (v == sign) as u8).collect();
        Kernel::from_data(data, width, height).ok_or(ImageError::InvalidKernelSize(pattern.len()))
    };
    let hit_kernel = to_kernel(1)?;
    let miss_kernel = to_kernel(-1)?;

    let hit = erode(src, &hit_kernel, 1)?;

    let mut complement = src.clone();
    camlab_image::ops::bitwise_not(&mut complement);
    let miss = erode(&complement, &miss_kernel, 1)?;

    let data = hit
        .as_slice()
        .iter()
        .zip(miss.as_slice())
        .map(|(&h, &m)| h & m)
        .collect();
    Image::new(src.size(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::KernelShape;
    use camlab_image::ImageSize;

    fn square_image() -> Result<Image<u8, 1>, ImageError> {
        #[rustfmt::skip]
        let img = Image::<u8, 1>::new(
            ImageSize {
                width: 5,
                height: 5,
            },
            vec![
                0, 0, 0, 0, 0,
                0, 255, 255, 255, 0,
                0, 255, 255, 255, 0,
                0, 255, 255, 255, 0,
                0, 0, 0, 0, 0,
            ],
        )?;
        Ok(img)
    }

    #[test]
    fn test_erode_dilate() -> Result<(), ImageError> {
        let img = square_image()?;
        let kernel = Kernel::new(KernelShape::Rect, 3, 3);

        let eroded = erode(&img, &kernel, 1)?;
        assert_eq!(eroded.as_slice().iter().filter(|&&v| v == 255).count(), 1);
        assert_eq!(eroded.get([2, 2, 0]), Some(&255));

        let dilated = dilate(&img, &kernel, 1)?;
        assert!(dilated.as_slice().iter().all(|&v| v == 255));
        Ok(())
    }

    #[test]
    fn test_open_removes_speck() -> Result<(), ImageError> {
        let mut img = Image::<u8, 1>::from_size_val(
            ImageSize {
                width: 6,
                height: 6,
            },
            0,
        )?;
        *img.get_mut([1, 1, 0]).unwrap() = 255;

        let kernel = Kernel::new(KernelShape::Rect, 3, 3);
        let opened = morphology_ex(&img, MorphOp::Open, &kernel)?;
        assert!(opened.as_slice().iter().all(|&v| v == 0));
        Ok(())
    }

    #[test]
    fn test_gradient_outlines() -> Result<(), ImageError> {
        let img = square_image()?;
        let kernel = Kernel::new(KernelShape::Cross, 3, 3);
        let grad = morphology_ex(&img, MorphOp::Gradient, &kernel)?;
        assert_eq!(grad.get([2, 2, 0]), Some(&0));
        assert_eq!(grad.get([1, 1, 0]), Some(&255));
        assert_eq!(grad.get([0, 0, 0]), Some(&0));
        Ok(())
    }

    #[test]
    fn test_hit_or_miss_isolated_hole() -> Result<(), ImageError> {
        #[rustfmt::skip]
        let img = Image::<u8, 1>::new(
            ImageSize {
                width: 3,
                height: 3,
            },
            vec![
                0, 255, 0,
                255, 0, 255,
                0, 255, 0,
            ],
        )?;
        #[rustfmt::skip]
        let pattern = [
            0, 1, 0,
            1, -1, 1,
            0, 1, 0,
        ];
        let out = hit_or_miss(&img, &pattern, 3, 3)?;
        assert_eq!(out.get([1, 1, 0]), Some(&255));
        assert_eq!(out.get([0, 1, 0]), Some(&0));
        Ok(())
    }
}
