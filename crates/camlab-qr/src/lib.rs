//! Symbol scanning for camlab.
//!
//! The pipeline only depends on the [`SymbolScanner`] capability. The
//! [`RqrrScanner`] finds and decodes QR codes with the `rqrr` crate and
//! [`NoSymbolScanner`] stands in when no decoder is wanted.

use camlab_image::GrayImage;
use rqrr::PreparedImage;
use thiserror::Error;

/// Error type for symbol scanning.
#[derive(Error, Debug)]
pub enum QrError {
    /// The image has no pixels.
    #[error("Cannot scan an empty image")]
    EmptyImage,

    /// Symbols were located but none could be decoded.
    #[error("Failed to decode QR code: {0}")]
    DecodingError(String),
}

/// A decoded symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// The symbology name, e.g. `QR-Code`.
    pub symbol_type: String,
    /// The decoded payload.
    pub data: String,
    /// The outline of the symbol in image coordinates.
    pub location: Vec<(i64, i64)>,
}

/// A capability that finds and decodes symbols in gray images.
pub trait SymbolScanner: Send {
    /// Scan a gray image.
    ///
    /// # Returns
    ///
    /// The decoded symbols, possibly none.
    fn scan(&mut self, image: &GrayImage) -> Result<Vec<Symbol>, QrError>;
}

/// Symbology name reported for QR codes.
pub const QR_CODE_TYPE: &str = "QR-Code";

/// QR code scanner backed by `rqrr`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrScanner;

impl SymbolScanner for RqrrScanner {
    fn scan(&mut self, image: &GrayImage) -> Result<Vec<Symbol>, QrError> {
        if image.is_empty() {
            return Err(QrError::EmptyImage);
        }

        let width = image.width();
        let data = image.as_slice();
        let mut prepared =
            PreparedImage::prepare_from_greyscale(width, image.height(), |x, y| data[y * width + x]);
        let grids = prepared.detect_grids();

        let mut symbols = Vec::with_capacity(grids.len());
        let mut last_error = None;
        for grid in grids {
            match grid.decode() {
                Ok((meta, content)) => {
                    log::debug!("decoded QR with ecc level {}", meta.ecc_level);
                    symbols.push(Symbol {
                        symbol_type: QR_CODE_TYPE.to_string(),
                        data: content,
                        location: grid
                            .bounds
                            .iter()
                            .map(|p| (p.x as i64, p.y as i64))
                            .collect(),
                    });
                }
                Err(err) => {
                    log::debug!("QR grid not decoded: {err}");
                    last_error = Some(err.to_string());
                }
            }
        }

        match (symbols.is_empty(), last_error) {
            (true, Some(err)) => Err(QrError::DecodingError(err)),
            _ => Ok(symbols),
        }
    }
}

/// The absent scanner, finds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSymbolScanner;

impl SymbolScanner for NoSymbolScanner {
    fn scan(&mut self, _image: &GrayImage) -> Result<Vec<Symbol>, QrError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::{Image, ImageSize};

    #[test]
    fn test_blank_image_has_no_symbols() -> Result<(), QrError> {
        let size = ImageSize {
            width: 64,
            height: 48,
        };
        let blank = Image::<u8, 1>::from_size_val(size, 255).map_err(|_| QrError::EmptyImage)?;
        assert!(RqrrScanner.scan(&blank)?.is_empty());
        assert!(NoSymbolScanner.scan(&blank)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_empty_image() {
        assert!(matches!(
            RqrrScanner.scan(&Image::empty()),
            Err(QrError::EmptyImage)
        ));
    }

    #[test]
    fn test_scanner_trait_object() -> Result<(), QrError> {
        let mut scanners: Vec<Box<dyn SymbolScanner>> =
            vec![Box::new(RqrrScanner), Box::new(NoSymbolScanner)];
        let gray = Image::<u8, 1>::from_size_val([40, 40].into(), 90)
            .map_err(|_| QrError::EmptyImage)?;
        for scanner in scanners.iter_mut() {
            assert!(scanner.scan(&gray)?.is_empty());
        }
        Ok(())
    }
}
