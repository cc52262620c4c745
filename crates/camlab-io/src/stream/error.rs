/// An error type for the stream module.
#[derive(thiserror::Error, Debug)]
pub enum StreamCaptureError {
    /// An error occurred during GStreamer initialization or parsing.
    #[error(transparent)]
    GStreamerError(#[from] gst::glib::Error),

    /// An error occurred during GStreamer downcast of pipeline element.
    #[error("Failed to downcast pipeline")]
    DowncastPipelineError(gst::Element),

    /// An element of the pipeline was not found by its name.
    #[error("Failed to get an element by name")]
    GetElementByNameError,

    /// The pipeline has no bus.
    #[error("Failed to get the bus")]
    BusError,

    /// An error occurred during GStreamer to set the pipeline state.
    #[error(transparent)]
    SetPipelineStateError(#[from] gst::StateChangeError),

    /// An error occurred during GStreamer to pull a sample or map a buffer.
    #[error(transparent)]
    PullSampleError(#[from] gst::glib::BoolError),

    /// The sample carries no usable caps.
    #[error("Failed caps: {0}")]
    GetCapsError(String),

    /// The sample carries no buffer.
    #[error("Failed to get the buffer from the sample")]
    GetBufferError,

    /// The buffer does not hold a frame of the announced size.
    #[error("Failed to create an image frame")]
    CreateImageFrameError,

    /// The end of stream event could not be sent.
    #[error("Failed to send eos event")]
    SendEosError,

    /// An error for an invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A buffer was refused by the pipeline.
    #[error(transparent)]
    GstreamerFlowError(#[from] gst::FlowError),

    /// The pipeline is not running.
    #[error("Pipeline is not running")]
    PipelineNotRunning,

    /// The frame slot mutex was poisoned.
    #[error("Could not lock the mutex")]
    MutexPoisonError,
}
