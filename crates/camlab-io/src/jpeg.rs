use crate::error::IoError;
use camlab_image::{Image, ImageSize};
use jpeg_encoder::{ColorType, Encoder};
use std::path::Path;

/// Quality used when saving still frames.
pub const JPEG_QUALITY: u8 = 100;

/// Writes the given JPEG _(rgb8)_ data to the given file path.
///
/// # Arguments
///
/// - `file_path` - The path to the JPEG image.
/// - `image` - The image to encode.
/// - `quality` - The quality of the JPEG encoding, range from 0 (lowest) to 100 (highest)
pub fn write_image_jpeg_rgb8(
    file_path: impl AsRef<Path>,
    image: &Image<u8, 3>,
    quality: u8,
) -> Result<(), IoError> {
    let (width, height) = checked_dims(image.size())?;
    let encoder = Encoder::new_file(file_path, quality)?;
    encoder.encode(image.as_slice(), width, height, ColorType::Rgb)?;
    Ok(())
}

/// Writes the given JPEG _(grayscale)_ data to the given file path.
pub fn write_image_jpeg_gray8(
    file_path: impl AsRef<Path>,
    image: &Image<u8, 1>,
    quality: u8,
) -> Result<(), IoError> {
    let (width, height) = checked_dims(image.size())?;
    let encoder = Encoder::new_file(file_path, quality)?;
    encoder.encode(image.as_slice(), width, height, ColorType::Luma)?;
    Ok(())
}

/// Encodes an _(rgb8)_ image into an in-memory JPEG stream.
///
/// # Returns
///
/// The bytes of the complete JPEG file.
pub fn encode_image_jpeg_rgb8(image: &Image<u8, 3>, quality: u8) -> Result<Vec<u8>, IoError> {
    let (width, height) = checked_dims(image.size())?;
    let mut buf = Vec::new();
    let encoder = Encoder::new(&mut buf, quality);
    encoder.encode(image.as_slice(), width, height, ColorType::Rgb)?;
    Ok(buf)
}

fn checked_dims(size: ImageSize) -> Result<(u16, u16), IoError> {
    match (u16::try_from(size.width), u16::try_from(size.height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(IoError::UnsupportedImageSize(size)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functional::read_image_any_rgb8;

    #[test]
    fn write_read_jpeg() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("frame.jpg");

        let image = Image::<u8, 3>::from_size_val([32, 24].into(), 128)?;
        write_image_jpeg_rgb8(&file_path, &image, JPEG_QUALITY)?;
        assert!(file_path.exists(), "File does not exist: {:?}", file_path);

        let back = read_image_any_rgb8(&file_path)?;
        assert_eq!(back.size(), image.size());
        assert!(back.as_slice().iter().all(|&v| (v as i32 - 128).abs() <= 2));
        Ok(())
    }

    #[test]
    fn encode_in_memory() -> Result<(), IoError> {
        let image = Image::<u8, 3>::from_size_val([8, 8].into(), 10)?;
        let bytes = encode_image_jpeg_rgb8(&image, 90)?;
        // SOI and EOI markers
        assert_eq!(&bytes[..2], &[0xff, 0xd8]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xff, 0xd9]);

        let empty = Image::<u8, 3>::empty();
        assert!(matches!(
            encode_image_jpeg_rgb8(&empty, 90),
            Err(IoError::UnsupportedImageSize(_))
        ));
        Ok(())
    }
}
