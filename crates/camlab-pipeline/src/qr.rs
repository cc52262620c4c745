use camlab_image::Frame;
use camlab_imgproc::{
    color::to_gray,
    contours::convex_hull,
    draw::{draw_polyline, draw_text},
};
use camlab_qr::{NoSymbolScanner, Symbol, SymbolScanner};

use crate::error::PipelineError;

/// The payload and symbology of the last decoded symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QrResult {
    /// The decoded payload.
    pub data: String,
    /// The symbology name.
    pub symbol_type: String,
}

const HULL_COLOR: [u8; 3] = [0, 0, 255];
const HULL_THICKNESS: usize = 3;
const TEXT_COLOR: [u8; 3] = [118, 185, 0];
const TEXT_SCALE: usize = 2;
const TEXT_LEFT: i64 = 10;
const TEXT_TOP: i64 = 40;
const LINE_HEIGHT: i64 = 50;

/// Outline a symbol and print its type and payload on two text lines.
///
/// `line` is the first free text line and is advanced past the two lines.
pub fn draw_symbol(frame: &mut Frame, symbol: &Symbol, line: &mut i64) {
    let hull = if symbol.location.len() > 4 {
        convex_hull(&symbol.location)
    } else {
        symbol.location.clone()
    };
    draw_polyline(frame, &hull, true, HULL_COLOR, HULL_THICKNESS);

    for text in [&symbol.symbol_type, &symbol.data] {
        let origin = (TEXT_LEFT, *line * LINE_HEIGHT + TEXT_TOP);
        draw_text(frame, text, origin, TEXT_SCALE, TEXT_COLOR);
        *line += 1;
    }
}

/// Scans frames for symbols and keeps the last decoded one.
pub(crate) struct QrStage {
    scanner: Box<dyn SymbolScanner>,
    result: Option<QrResult>,
}

impl QrStage {
    pub(crate) fn new() -> Self {
        Self {
            scanner: Box::new(NoSymbolScanner),
            result: None,
        }
    }

    pub(crate) fn set_scanner(&mut self, scanner: Box<dyn SymbolScanner>) {
        self.scanner = scanner;
    }

    pub(crate) fn result(&self) -> Option<&QrResult> {
        self.result.as_ref()
    }

    pub(crate) fn clear(&mut self) {
        self.result = None;
    }

    pub(crate) fn apply(&mut self, frame: &mut Frame) -> Result<(), PipelineError> {
        let gray = to_gray(frame)?;
        let symbols = self.scanner.scan(&gray)?;

        let mut line = 0;
        for symbol in symbols {
            log::info!("Type: {} Data: {}", symbol.symbol_type, symbol.data);
            draw_symbol(frame, &symbol, &mut line);
            self.result = Some(QrResult {
                data: symbol.data,
                symbol_type: symbol.symbol_type,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::GrayImage;
    use camlab_qr::QrError;

    struct FixedSymbols(Vec<Symbol>);

    impl SymbolScanner for FixedSymbols {
        fn scan(&mut self, _image: &GrayImage) -> Result<Vec<Symbol>, QrError> {
            Ok(self.0.clone())
        }
    }

    fn symbol(data: &str) -> Symbol {
        Symbol {
            symbol_type: "QR-Code".to_string(),
            data: data.to_string(),
            location: vec![(60, 60), (90, 60), (90, 90), (60, 90)],
        }
    }

    #[test]
    fn test_last_symbol_is_kept() -> Result<(), PipelineError> {
        let mut stage = QrStage::new();
        stage.set_scanner(Box::new(FixedSymbols(vec![symbol("first"), symbol("second")])));

        let mut frame = Frame::from_size_val([160, 240].into(), 0)?;
        stage.apply(&mut frame)?;
        assert_eq!(
            stage.result().map(|r| r.data.as_str()),
            Some("second")
        );

        // outline and text are drawn
        assert_eq!(frame.pixel(75, 60), &HULL_COLOR);
        let text_pixels = frame
            .as_slice()
            .chunks_exact(3)
            .filter(|p| *p == TEXT_COLOR)
            .count();
        assert!(text_pixels > 0);
        Ok(())
    }

    #[test]
    fn test_hull_of_many_points() -> Result<(), PipelineError> {
        let mut frame = Frame::from_size_val([100, 100].into(), 0)?;
        let sym = Symbol {
            symbol_type: "QR-Code".to_string(),
            data: String::new(),
            location: vec![(10, 10), (50, 12), (90, 10), (90, 90), (50, 50), (10, 90)],
        };
        let mut line = 0;
        draw_symbol(&mut frame, &sym, &mut line);
        assert_eq!(line, 2);
        // the inner point is not part of the outline
        assert_eq!(frame.pixel(50, 50), &[0, 0, 0]);
        assert_eq!(frame.pixel(10, 50), &HULL_COLOR);
        Ok(())
    }

    #[test]
    fn test_scan_without_symbols() -> Result<(), PipelineError> {
        let mut stage = QrStage::new();
        let mut frame = Frame::from_size_val([32, 32].into(), 77)?;
        stage.apply(&mut frame)?;
        assert!(stage.result().is_none());
        assert!(frame.as_slice().iter().all(|&v| v == 77));
        Ok(())
    }
}
