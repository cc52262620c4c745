use std::sync::{Arc, Mutex};

use camlab_image::{Frame, ImageSize};
use gst::prelude::*;

use crate::stream::error::StreamCaptureError;

/// A GStreamer pipeline whose `appsink` named `sink` delivers RGB frames.
///
/// Only the latest frame is kept; a frame that is not grabbed before the
/// next one arrives is dropped.
pub struct StreamCapture {
    pipeline: gst::Pipeline,
    last_frame: Arc<Mutex<Option<Frame>>>,
    running: bool,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl StreamCapture {
    /// Creates a new StreamCapture instance with the given pipeline description.
    ///
    /// # Arguments
    ///
    /// * `pipeline_desc` - A string describing the GStreamer pipeline.
    pub fn new(pipeline_desc: &str) -> Result<Self, StreamCaptureError> {
        gst::init()?;

        let pipeline = gst::parse::launch(pipeline_desc)?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(StreamCaptureError::DowncastPipelineError)?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or(StreamCaptureError::GetElementByNameError)?
            .dynamic_cast::<gst_app::AppSink>()
            .map_err(StreamCaptureError::DowncastPipelineError)?;

        let last_frame = Arc::new(Mutex::new(None));

        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample({
                    let last_frame = last_frame.clone();
                    move |sink| {
                        let frame = Self::extract_image_frame(sink).map_err(|err| {
                            log::error!("cannot extract the frame: {err}");
                            gst::FlowError::Error
                        })?;
                        let mut slot = last_frame.lock().map_err(|_| gst::FlowError::Error)?;
                        *slot = Some(frame);
                        Ok(gst::FlowSuccess::Ok)
                    }
                })
                .build(),
        );

        Ok(Self {
            pipeline,
            last_frame,
            running: false,
            handle: None,
        })
    }

    /// Starts the pipeline and watches its bus on a background thread.
    pub fn start(&mut self) -> Result<(), StreamCaptureError> {
        self.pipeline.set_state(gst::State::Playing)?;
        self.running = true;

        let bus = self.pipeline.bus().ok_or(StreamCaptureError::BusError)?;

        let handle = std::thread::spawn(move || {
            for msg in bus.iter_timed(gst::ClockTime::NONE) {
                use gst::MessageView;
                match msg.view() {
                    MessageView::Eos(..) => break,
                    MessageView::Error(err) => {
                        log::error!(
                            "Error from {:?}: {} ({:?})",
                            msg.src().map(|s| s.path_string()),
                            err.error(),
                            err.debug()
                        );
                        break;
                    }
                    _ => (),
                }
            }
        });

        self.handle = Some(handle);
        Ok(())
    }

    /// Whether the pipeline was started and not closed.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Takes the last captured frame.
    ///
    /// Returns `None` when no new frame arrived since the previous grab.
    pub fn grab(&self) -> Result<Option<Frame>, StreamCaptureError> {
        if !self.running {
            return Err(StreamCaptureError::PipelineNotRunning);
        }
        let mut slot = self
            .last_frame
            .lock()
            .map_err(|_| StreamCaptureError::MutexPoisonError)?;
        Ok(slot.take())
    }

    /// Stops the pipeline and joins the bus thread.
    pub fn close(&mut self) -> Result<(), StreamCaptureError> {
        if !self.running {
            return Ok(());
        }
        if !self.pipeline.send_event(gst::event::Eos::new()) {
            log::warn!("the capture pipeline refused the eos event");
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("the capture bus thread panicked");
            }
        }

        self.pipeline.set_state(gst::State::Null)?;
        self.running = false;
        Ok(())
    }

    fn extract_image_frame(appsink: &gst_app::AppSink) -> Result<Frame, StreamCaptureError> {
        let sample = appsink.pull_sample()?;

        let caps = sample
            .caps()
            .ok_or_else(|| StreamCaptureError::GetCapsError("sample without caps".to_string()))?;

        let structure = caps
            .structure(0)
            .ok_or_else(|| StreamCaptureError::GetCapsError("caps without structure".to_string()))?;

        let height = structure
            .get::<i32>("height")
            .map_err(|err| StreamCaptureError::GetCapsError(err.to_string()))?;
        let width = structure
            .get::<i32>("width")
            .map_err(|err| StreamCaptureError::GetCapsError(err.to_string()))?;
        let size = ImageSize {
            width: usize::try_from(width).map_err(|_| StreamCaptureError::CreateImageFrameError)?,
            height: usize::try_from(height).map_err(|_| StreamCaptureError::CreateImageFrameError)?,
        };

        let buffer = sample
            .buffer()
            .ok_or(StreamCaptureError::GetBufferError)?
            .map_readable()?;

        // rows may be padded to a stride, keep the packed prefix of each row
        let row = size.width * 3;
        let data = buffer.as_slice();
        let stride = if size.height > 0 { data.len() / size.height } else { row };
        if stride < row {
            return Err(StreamCaptureError::CreateImageFrameError);
        }
        let packed = if stride == row {
            data[..row * size.height].to_vec()
        } else {
            data.chunks(stride)
                .take(size.height)
                .flat_map(|r| &r[..row])
                .copied()
                .collect()
        };

        Frame::new(size, packed).map_err(|_| StreamCaptureError::CreateImageFrameError)
    }
}

impl Drop for StreamCapture {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::error!("failed to close the capture pipeline: {err}");
        }
    }
}
