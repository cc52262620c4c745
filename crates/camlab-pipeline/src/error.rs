use camlab_image::ImageError;
use camlab_io::IoError;
use camlab_qr::QrError;

/// An error type for the pipeline module.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// A setter received a value outside of its documented range.
    #[error("Invalid value {value} for {name}, expected {expected}")]
    InvalidParameter {
        /// The parameter name.
        name: &'static str,
        /// The rejected value.
        value: String,
        /// The accepted range.
        expected: &'static str,
    },

    /// A stage selector has no implementation.
    #[error("Unsupported method {selector} for the {stage} stage")]
    UnsupportedMethod {
        /// The stage name.
        stage: &'static str,
        /// The 1-based selector.
        selector: i32,
    },

    /// A camera, model or image file could not be opened.
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Error raised by an image operation.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Error raised while reading or writing files.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Error raised by the symbol scanner.
    #[error(transparent)]
    Scan(#[from] QrError),

    /// Error to parse or write a configuration file.
    #[error("Invalid configuration file. {0}")]
    Config(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn invalid(
        name: &'static str,
        value: impl ToString,
        expected: &'static str,
    ) -> Self {
        PipelineError::InvalidParameter {
            name,
            value: value.to_string(),
            expected,
        }
    }
}
