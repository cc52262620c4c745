/// An error type for the image module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ImageError {
    /// Error when channel and shape are not valid.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidChannelShape(usize, usize),

    /// Error when the image sizes do not match.
    #[error("Image size mismatch ({0}x{1}) vs ({2}x{3})")]
    InvalidImageSize(usize, usize, usize, usize),

    /// Error when the channel index is out of bounds.
    #[error("Channel index {0} is out of bounds ({1} channels)")]
    ChannelIndexOutOfBounds(usize, usize),

    /// Error when the pixel index is out of bounds.
    #[error("Pixel ({0}, {1}) is out of bounds ({2}x{3})")]
    PixelIndexOutOfBounds(usize, usize, usize, usize),

    /// Error when a value cannot be cast to the target type.
    #[error("Failed to cast image data")]
    CastError,

    /// Error when a kernel size is not supported by an operator.
    #[error("Invalid kernel size {0}")]
    InvalidKernelSize(usize),

    /// Error when the number of histogram bins is invalid.
    #[error("Invalid number of histogram bins {0}")]
    InvalidHistogramBins(usize),

    /// Error when a transformation matrix is singular.
    #[error("Cannot invert a singular transformation matrix")]
    CannotComputeDeterminant,

    /// Error when an operator receives an image without pixels.
    #[error("Image is empty")]
    EmptyImage,
}
