use std::{fs, fs::File, io::BufWriter, path::Path};

use camlab_image::{Image, ImageSize};
use png::{BitDepth, ColorType, Compression, Decoder, Encoder};

use crate::error::IoError;

/// Read a PNG image with three channels _(rgb8)_.
///
/// # Arguments
///
/// * `file_path` - The path to the PNG file.
///
/// # Errors
///
/// Returns an error if the file is not an 8-bit RGB PNG.
pub fn read_image_png_rgb8(file_path: impl AsRef<Path>) -> Result<Image<u8, 3>, IoError> {
    let file_path = file_path.as_ref();
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    if file_path
        .extension()
        .map_or(true, |ext| !ext.eq_ignore_ascii_case("png"))
    {
        return Err(IoError::InvalidFileExtension(file_path.to_path_buf()));
    }

    let file = fs::File::open(file_path)?;
    let mut reader = Decoder::new(file)
        .read_info()
        .map_err(|e| IoError::PngDecodeError(e.to_string()))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| IoError::PngDecodeError(e.to_string()))?;

    if info.color_type != ColorType::Rgb || info.bit_depth != BitDepth::Eight {
        return Err(IoError::PngDecodeError(format!(
            "expected rgb8, found {:?} {:?}",
            info.color_type, info.bit_depth
        )));
    }
    buf.truncate(info.buffer_size());

    let size = ImageSize {
        width: info.width as usize,
        height: info.height as usize,
    };
    Ok(Image::new(size, buf)?)
}

/// Writes the given PNG _(rgb8)_ data to the given file path.
///
/// The encoder runs with its balanced compression preset.
pub fn write_image_png_rgb8(
    file_path: impl AsRef<Path>,
    image: &Image<u8, 3>,
) -> Result<(), IoError> {
    write_png_impl(file_path, image.as_slice(), image.size(), ColorType::Rgb)
}

/// Writes the given PNG _(mono8)_ data to the given file path.
pub fn write_image_png_gray8(
    file_path: impl AsRef<Path>,
    image: &Image<u8, 1>,
) -> Result<(), IoError> {
    write_png_impl(file_path, image.as_slice(), image.size(), ColorType::Grayscale)
}

fn write_png_impl(
    file_path: impl AsRef<Path>,
    image_data: &[u8],
    image_size: ImageSize,
    color_type: ColorType,
) -> Result<(), IoError> {
    if image_size.is_empty() {
        return Err(IoError::UnsupportedImageSize(image_size));
    }
    let file = File::create(file_path)?;

    let mut encoder = Encoder::new(
        BufWriter::new(file),
        image_size.width as u32,
        image_size.height as u32,
    );
    encoder.set_color(color_type);
    encoder.set_depth(BitDepth::Eight);
    encoder.set_compression(Compression::Default);

    let mut writer = encoder
        .write_header()
        .map_err(|e| IoError::PngEncodingError(e.to_string()))?;
    writer
        .write_image_data(image_data)
        .map_err(|e| IoError::PngEncodingError(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| IoError::PngEncodingError(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_png_rgb8() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("frame.png");

        let data = (0..6 * 4 * 3).map(|i| (i * 5) as u8).collect();
        let image = Image::<u8, 3>::new([6, 4].into(), data)?;
        write_image_png_rgb8(&file_path, &image)?;

        let back = read_image_png_rgb8(&file_path)?;
        assert_eq!(back, image);
        Ok(())
    }

    #[test]
    fn read_png_wrong_kind() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let gray_path = tmp_dir.path().join("gray.png");
        let gray = Image::<u8, 1>::from_size_val([3, 3].into(), 9)?;
        write_image_png_gray8(&gray_path, &gray)?;
        assert!(matches!(
            read_image_png_rgb8(&gray_path),
            Err(IoError::PngDecodeError(_))
        ));

        assert!(matches!(
            read_image_png_rgb8(tmp_dir.path().join("missing.png")),
            Err(IoError::FileDoesNotExist(_))
        ));
        Ok(())
    }
}
