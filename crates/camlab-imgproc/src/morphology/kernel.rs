/// Shapes of morphological [`Kernel`]s.
///
/// All kernels are centered at their geometric center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelShape {
    /// A rectangular box, every element included.
    Rect,
    /// Only the horizontal and vertical center lines.
    Cross,
    /// The ellipse inscribed in the kernel rectangle.
    Ellipse,
}

/// A morphological structuring element.
///
/// Stores a binary mask where 1 marks the pixels included in the operation.
///
/// # Example
///
/// ```rust
/// use camlab_imgproc::morphology::{Kernel, KernelShape};
///
/// let kernel = Kernel::new(KernelShape::Rect, 3, 3);
/// assert_eq!(kernel.width(), 3);
/// assert_eq!(kernel.pad(), (1, 1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl Kernel {
    /// Create a structuring element of the given shape and size.
    pub fn new(shape: KernelShape, width: usize, height: usize) -> Self {
        let data = match shape {
            KernelShape::Rect => vec![1u8; width * height],
            KernelShape::Cross => cross_data(width, height),
            KernelShape::Ellipse => ellipse_data(width, height),
        };
        Self {
            data,
            width,
            height,
        }
    }

    /// Create a kernel from raw 0/1 data in row-major order.
    ///
    /// Returns `None` when the data length does not match the size.
    pub fn from_data(data: Vec<u8>, width: usize, height: usize) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            data,
            width,
            height,
        })
    }

    /// Get a reference to the kernel data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the width of the kernel.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Get the height of the kernel.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Get the padding for the kernel as (rows, cols) offset from the center.
    pub fn pad(&self) -> (usize, usize) {
        (self.height / 2, self.width / 2)
    }

    /// Offsets `(dx, dy)` of the active elements relative to the anchor.
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let (pad_h, pad_w) = self.pad();
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0)
            .map(|(i, _)| {
                let (r, c) = (i / self.width, i % self.width);
                (c as isize - pad_w as isize, r as isize - pad_h as isize)
            })
            .collect()
    }
}

fn cross_data(width: usize, height: usize) -> Vec<u8> {
    let mut data = vec![0u8; width * height];
    let (cy, cx) = (height / 2, width / 2);
    for c in 0..width {
        data[cy * width + c] = 1;
    }
    for r in 0..height {
        data[r * width + cx] = 1;
    }
    data
}

// row spans are rounded the same way a rasterised ellipse is, so a 3x3
// ellipse degenerates to a cross
fn ellipse_data(width: usize, height: usize) -> Vec<u8> {
    let mut data = vec![0u8; width * height];
    let r = (height / 2) as f64;
    let c = (width / 2) as f64;
    let inv_r2 = if r > 0.0 { 1.0 / (r * r) } else { 0.0 };

    for i in 0..height {
        let dy = i as f64 - r;
        let (j1, j2) = if dy.abs() <= r {
            let dx = (c * ((r * r - dy * dy) * inv_r2).sqrt()).round();
            (
                (c - dx).max(0.0) as usize,
                ((c + dx + 1.0) as usize).min(width),
            )
        } else {
            (0, 0)
        };
        for j in j1..j2 {
            data[i * width + j] = 1;
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_kernel() {
        let kernel = Kernel::new(KernelShape::Rect, 3, 3);
        assert!(kernel.data().iter().all(|&v| v == 1));
        assert_eq!(kernel.offsets().len(), 9);
    }

    #[test]
    fn test_cross_kernel() {
        let kernel = Kernel::new(KernelShape::Cross, 3, 3);
        assert_eq!(kernel.data(), &[0, 1, 0, 1, 1, 1, 0, 1, 0]);
    }

    #[test]
    fn test_ellipse_kernel() {
        let small = Kernel::new(KernelShape::Ellipse, 3, 3);
        assert_eq!(small.data(), &[0, 1, 0, 1, 1, 1, 0, 1, 0]);

        let kernel = Kernel::new(KernelShape::Ellipse, 5, 5);
        #[rustfmt::skip]
        assert_eq!(
            kernel.data(),
            &[
                0, 0, 1, 0, 0,
                1, 1, 1, 1, 1,
                1, 1, 1, 1, 1,
                1, 1, 1, 1, 1,
                0, 0, 1, 0, 0,
            ]
        );
    }

    #[test]
    fn test_from_data_size_mismatch() {
        assert!(Kernel::from_data(vec![1, 0, 1], 2, 2).is_none());
    }
}
