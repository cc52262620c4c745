use std::path::{Path, PathBuf};

use camlab_image::{Frame, ImageSize};
use gst::prelude::*;

use crate::{stream::error::StreamCaptureError, video::VideoCodec};

// encoders tried in order for each codec
fn encoders(codec: VideoCodec) -> &'static [&'static str] {
    match codec {
        VideoCodec::Xvid => &["xvidenc", "avenc_mpeg4"],
        VideoCodec::Mjpeg => &["jpegenc"],
    }
}

/// The first encoder of the codec found in the GStreamer registry.
pub fn find_encoder(codec: VideoCodec) -> Result<&'static str, StreamCaptureError> {
    gst::init()?;
    encoders(codec)
        .iter()
        .copied()
        .find(|name| gst::ElementFactory::find(name).is_some())
        .ok_or_else(|| {
            StreamCaptureError::InvalidConfig(format!("no encoder for {}", codec.fourcc()))
        })
}

/// The pipeline encoding RGB frames pushed to the appsrc `src` into an AVI file.
pub fn avi_writer_pipeline_description(encoder: &str, path: &Path) -> String {
    let location = if cfg!(windows) {
        path.to_string_lossy().replace('\\', "/")
    } else {
        path.to_string_lossy().into_owned()
    };
    format!(
        "appsrc name=src ! \
        videoconvert ! video/x-raw,format=I420 ! \
        {encoder} ! \
        avimux ! \
        filesink location=\"{location}\""
    )
}

/// Writes RGB frames into an AVI file through a GStreamer encoder.
pub struct StreamVideoWriter {
    path: PathBuf,
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    fps: u64,
    size: ImageSize,
    counter: u64,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl StreamVideoWriter {
    /// Create the pipeline and start it.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to save the video file.
    /// * `codec` - The codec of the video stream.
    /// * `fps` - The frames per second of the video.
    /// * `size` - The size of every frame.
    pub fn new(
        path: impl AsRef<Path>,
        codec: VideoCodec,
        fps: u32,
        size: ImageSize,
    ) -> Result<Self, StreamCaptureError> {
        let encoder = find_encoder(codec)?;
        let path = path.as_ref().to_path_buf();

        let pipeline_str = avi_writer_pipeline_description(encoder, &path);
        log::debug!("writer pipeline: {pipeline_str}");

        let pipeline = gst::parse::launch(&pipeline_str)?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(StreamCaptureError::DowncastPipelineError)?;

        let appsrc = pipeline
            .by_name("src")
            .ok_or(StreamCaptureError::GetElementByNameError)?
            .dynamic_cast::<gst_app::AppSrc>()
            .map_err(StreamCaptureError::DowncastPipelineError)?;

        let fps = fps.max(1);
        let caps = gst::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .field("width", size.width as i32)
            .field("height", size.height as i32)
            .field("framerate", gst::Fraction::new(fps as i32, 1))
            .build();
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);
        appsrc.set_is_live(true);
        appsrc.set_property("block", false);

        let mut writer = Self {
            path,
            pipeline,
            appsrc,
            fps: fps as u64,
            size,
            counter: 0,
            handle: None,
        };
        writer.start()?;
        Ok(writer)
    }

    fn start(&mut self) -> Result<(), StreamCaptureError> {
        self.pipeline.set_state(gst::State::Playing)?;
        let bus = self.pipeline.bus().ok_or(StreamCaptureError::BusError)?;
        let pipeline_weak = self.pipeline.downgrade();

        let handle = std::thread::spawn(move || {
            for msg in bus.iter_timed(gst::ClockTime::NONE) {
                if pipeline_weak.upgrade().is_none() {
                    break;
                }
                match msg.view() {
                    gst::MessageView::Eos(..) => break,
                    gst::MessageView::Error(err) => {
                        log::error!(
                            "writer error from {:?}: {} ({:?})",
                            msg.src().map(|s| s.path_string()),
                            err.error(),
                            err.debug()
                        );
                        break;
                    }
                    _ => {}
                }
            }
        });
        self.handle = Some(handle);
        Ok(())
    }

    /// The path of the video file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The size of the frames.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Push a frame to the encoder.
    pub fn write(&mut self, frame: &Frame) -> Result<(), StreamCaptureError> {
        if self.handle.is_none() {
            return Err(StreamCaptureError::PipelineNotRunning);
        }
        let mut buffer = gst::Buffer::from_mut_slice(frame.as_slice().to_vec());
        let pts = gst::ClockTime::from_nseconds(self.counter * 1_000_000_000 / self.fps);
        let duration = gst::ClockTime::from_nseconds(1_000_000_000 / self.fps);
        let buffer_ref = buffer.get_mut().ok_or_else(|| {
            StreamCaptureError::InvalidConfig("the frame buffer is shared".to_string())
        })?;
        buffer_ref.set_pts(Some(pts));
        buffer_ref.set_duration(Some(duration));
        self.counter += 1;
        self.appsrc.push_buffer(buffer)?;
        Ok(())
    }

    /// Send the end of stream, wait for the muxer and stop the pipeline.
    ///
    /// Closing an already closed writer does nothing.
    pub fn close(&mut self) -> Result<(), StreamCaptureError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match self.appsrc.end_of_stream() {
            Ok(_) | Err(gst::FlowError::NotLinked) => {}
            Err(err) => return Err(StreamCaptureError::GstreamerFlowError(err)),
        }
        // the bus thread ends on the eos reaching the file sink
        if handle.join().is_err() {
            log::error!("the writer bus thread panicked");
        }
        self.pipeline.set_state(gst::State::Null)?;
        log::debug!("closed {} after {} frames", self.path.display(), self.counter);
        Ok(())
    }
}

impl Drop for StreamVideoWriter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::error!("failed to close {}: {err}", self.path.display());
        }
        if let Err(err) = self.pipeline.set_state(gst::State::Null) {
            log::error!("failed to stop the writer pipeline: {err}");
        }
    }
}
