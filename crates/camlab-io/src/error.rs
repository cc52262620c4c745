/// An error type for the io module.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    /// Error when the file does not exist.
    #[error("File does not exist: {0}")]
    FileDoesNotExist(std::path::PathBuf),

    /// The extension does not name a supported format.
    #[error("File does not have a supported extension: {0}")]
    InvalidFileExtension(std::path::PathBuf),

    /// Error to open, read or write the file.
    #[error("Failed to manipulate the file. {0}")]
    FileError(#[from] std::io::Error),

    /// Error to encode the JPEG image.
    #[error("Error with Jpeg encoding. {0}")]
    JpegEncodingError(#[from] jpeg_encoder::EncodingError),

    /// Error to create the image.
    #[error("Failed to create image. {0}")]
    ImageCreationError(#[from] camlab_image::ImageError),

    /// Error to decode the image.
    #[error("Failed to decode the image. {0}")]
    ImageDecodeError(#[from] image::ImageError),

    /// Error to encode the PNG image.
    #[error("Failed to encode the png image. {0}")]
    PngEncodingError(String),

    /// Error to decode the PNG image.
    #[error("Failed to decode the png image. {0}")]
    PngDecodeError(String),

    /// The frame does not match the size the video was opened with.
    #[error("Video frame size {0} does not match the stream size {1}")]
    VideoFrameSize(camlab_image::ImageSize, camlab_image::ImageSize),

    /// The image size is empty or beyond the limits of the format.
    #[error("Image size {0} is not supported by the format")]
    UnsupportedImageSize(camlab_image::ImageSize),

    /// The codec cannot be encoded by this build.
    #[error("Codec {0} is not available, it needs the gstreamer feature")]
    UnsupportedCodec(&'static str),

    /// The video file would outgrow the 32 bit sizes of its container.
    #[error("Video file would reach {0} bytes, beyond the 32 bit container limit")]
    VideoTooLarge(u64),

    /// Error from a GStreamer pipeline.
    #[cfg(feature = "gstreamer")]
    #[error(transparent)]
    StreamError(#[from] crate::stream::StreamCaptureError),
}
