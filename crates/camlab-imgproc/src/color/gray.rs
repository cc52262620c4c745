use crate::parallel;
use camlab_image::{ops::check_same_size, Frame, GrayImage, Image, ImageError};

/// Convert an RGB8 image to grayscale using the formula:
///
/// Y = (77 * R + 150 * G + 29 * B + 128) >> 8
///
/// # Arguments
///
/// * `src` - The input RGB8 image.
/// * `dst` - The output grayscale image.
///
/// Precondition: the input and output images must have the same size.
///
/// # Example
///
/// ```
/// use camlab_image::{Image, ImageSize};
/// use camlab_imgproc::color::gray_from_rgb_u8;
///
/// let image = Image::<u8, 3>::new(
///     ImageSize {
///         width: 1,
///         height: 2,
///     },
///     vec![0, 128, 255, 128, 0, 128],
/// )
/// .unwrap();
///
/// let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0).unwrap();
///
/// gray_from_rgb_u8(&image, &mut gray).unwrap();
/// assert_eq!(gray.as_slice(), &[104, 53]);
/// ```
pub fn gray_from_rgb_u8(src: &Frame, dst: &mut GrayImage) -> Result<(), ImageError> {
    check_same_size(src, dst)?;

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        let r = src_pixel[0] as u32;
        let g = src_pixel[1] as u32;
        let b = src_pixel[2] as u32;
        dst_pixel[0] = ((77 * r + 150 * g + 29 * b + 128) >> 8) as u8;
    });

    Ok(())
}

/// Convert a grayscale image to RGB by replicating the intensity.
pub fn rgb_from_gray_u8(src: &GrayImage, dst: &mut Frame) -> Result<(), ImageError> {
    check_same_size(src, dst)?;

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        dst_pixel.fill(src_pixel[0]);
    });

    Ok(())
}

/// Allocate and return the grayscale version of an RGB8 image.
pub fn to_gray(src: &Frame) -> Result<GrayImage, ImageError> {
    let mut gray = Image::from_size_val(src.size(), 0u8)?;
    gray_from_rgb_u8(src, &mut gray)?;
    Ok(gray)
}

/// Allocate and return a three channel copy of a grayscale image.
pub fn to_rgb(src: &GrayImage) -> Result<Frame, ImageError> {
    let mut rgb = Image::from_size_val(src.size(), 0u8)?;
    rgb_from_gray_u8(src, &mut rgb)?;
    Ok(rgb)
}

/// Replace the frame by its gray level, keeping three channels.
pub fn gray_round_trip(frame: &mut Frame) -> Result<(), ImageError> {
    let gray = to_gray(frame)?;
    rgb_from_gray_u8(&gray, frame)
}
