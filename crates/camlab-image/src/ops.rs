use crate::{Image, ImageError};

/// Return an error unless both images have the same size.
pub fn check_same_size<T, U, const C1: usize, const C2: usize>(
    a: &Image<T, C1>,
    b: &Image<U, C2>,
) -> Result<(), ImageError> {
    if a.size() != b.size() {
        return Err(ImageError::InvalidImageSize(
            a.width(),
            a.height(),
            b.width(),
            b.height(),
        ));
    }
    Ok(())
}

/// Copy the pixels of `src` into `dst` wherever `mask` is non-zero.
///
/// # Arguments
///
/// * `src` - The source image.
/// * `dst` - The destination image.
/// * `mask` - The single channel selection mask.
///
/// Example:
///
/// ```
/// use camlab_image::{Image, ImageSize};
/// use camlab_image::ops::copy_with_mask;
///
/// let size = ImageSize { width: 2, height: 1 };
/// let src = Image::<u8, 1>::new(size, vec![7, 9]).unwrap();
/// let mut dst = Image::<u8, 1>::from_size_val(size, 0).unwrap();
/// let mask = Image::<u8, 1>::new(size, vec![0, 255]).unwrap();
///
/// copy_with_mask(&src, &mut dst, &mask).unwrap();
/// assert_eq!(dst.as_slice(), &[0, 9]);
/// ```
pub fn copy_with_mask<T: Copy, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    mask: &Image<u8, 1>,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;
    check_same_size(src, mask)?;

    dst.as_slice_mut()
        .chunks_exact_mut(C)
        .zip(src.as_slice().chunks_exact(C))
        .zip(mask.as_slice())
        .filter(|(_, &m)| m != 0)
        .for_each(|((d, s), _)| d.copy_from_slice(s));

    Ok(())
}

/// Invert every value of an 8-bit image in place.
pub fn bitwise_not<const C: usize>(img: &mut Image<u8, C>) {
    img.as_slice_mut().iter_mut().for_each(|v| *v = !*v);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageSize;

    #[test]
    fn test_bitwise_not() -> Result<(), ImageError> {
        let mut image = Image::<u8, 3>::new(
            ImageSize {
                height: 1,
                width: 2,
            },
            vec![0u8, 10, 255, 1, 2, 128],
        )?;

        bitwise_not(&mut image);
        assert_eq!(image.as_slice(), &[255, 245, 0, 254, 253, 127]);

        Ok(())
    }

    #[test]
    fn test_copy_with_mask_size_mismatch() -> Result<(), ImageError> {
        let src = Image::<u8, 3>::from_size_val(
            ImageSize {
                width: 2,
                height: 2,
            },
            1,
        )?;
        let mut dst = src.clone();
        let mask = Image::<u8, 1>::from_size_val(
            ImageSize {
                width: 1,
                height: 2,
            },
            1,
        )?;
        assert!(copy_with_mask(&src, &mut dst, &mask).is_err());
        Ok(())
    }
}
