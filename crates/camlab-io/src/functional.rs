use std::path::Path;

use camlab_image::{Frame, Image, ImageSize};

use crate::{
    error::IoError,
    jpeg::{write_image_jpeg_rgb8, JPEG_QUALITY},
    png::write_image_png_rgb8,
};

/// Reads an image of any format supported by the image crate as _(rgb8)_.
///
/// Gray, alpha and 16-bit images are converted to 8-bit RGB.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
pub fn read_image_any_rgb8(file_path: impl AsRef<Path>) -> Result<Frame, IoError> {
    let file_path = file_path.as_ref();
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let img = image::ImageReader::open(file_path)?
        .with_guessed_format()?
        .decode()?;

    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };
    Ok(Image::new(size, img.into_rgb8().into_raw())?)
}

/// Save a frame, choosing the encoder from the file extension.
///
/// `.jpg` and `.jpeg` files are written at full quality, `.png` files with
/// the balanced compression preset.
///
/// # Errors
///
/// Returns [`IoError::InvalidFileExtension`] for any other extension.
pub fn save_image(frame: &Frame, file_path: impl AsRef<Path>) -> Result<(), IoError> {
    let file_path = file_path.as_ref();
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => write_image_jpeg_rgb8(file_path, frame, JPEG_QUALITY),
        Some("png") => write_image_png_rgb8(file_path, frame),
        _ => Err(IoError::InvalidFileExtension(file_path.to_path_buf())),
    }?;

    log::info!("saved {}", file_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_dispatch() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let frame = Frame::from_size_val([16, 12].into(), 200)?;

        for name in ["a.jpg", "b.JPEG", "c.png"] {
            let path = tmp_dir.path().join(name);
            save_image(&frame, &path)?;
            let back = read_image_any_rgb8(&path)?;
            assert_eq!(back.size(), frame.size());
        }

        let bad = tmp_dir.path().join("d.tiff");
        assert!(matches!(
            save_image(&frame, &bad),
            Err(IoError::InvalidFileExtension(_))
        ));
        assert!(!bad.exists());
        Ok(())
    }

    #[test]
    fn read_missing() {
        assert!(matches!(
            read_image_any_rgb8("does/not/exist.png"),
            Err(IoError::FileDoesNotExist(_))
        ));
    }
}
