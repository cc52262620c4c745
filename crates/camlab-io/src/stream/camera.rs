use camlab_image::{Frame, ImageSize};

use crate::{camera::CameraSource, stream::capture::StreamCapture};

/// The pipeline reading RGB frames from a V4L2 device into an appsink.
///
/// # Arguments
///
/// * `device` - The device path, e.g. `/dev/video0`.
/// * `size` - The size the frames are scaled to, the device size if `None`.
/// * `fps` - The requested frame rate.
pub fn v4l2_camera_pipeline_description(device: &str, size: Option<ImageSize>, fps: u32) -> String {
    let scale = match size {
        Some(size) => format!(
            "videoscale ! video/x-raw,format=RGB,width={},height={},framerate={fps}/1",
            size.width, size.height
        ),
        None => "video/x-raw,format=RGB".to_string(),
    };
    format!(
        "v4l2src device={device} ! videoconvert ! {scale} ! \
        appsink name=sink emit-signals=true sync=false max-buffers=1 drop=true"
    )
}

/// A V4L2 camera read through GStreamer.
///
/// The camera id `n` selects the device `/dev/video{n}`.
pub struct V4l2Camera {
    size: Option<ImageSize>,
    fps: u32,
    stream: Option<StreamCapture>,
}

impl V4l2Camera {
    /// Create a closed camera.
    ///
    /// # Arguments
    ///
    /// * `size` - The frame size to request, the device size if `None`.
    /// * `fps` - The frame rate to request.
    pub fn new(size: Option<ImageSize>, fps: u32) -> Self {
        Self {
            size,
            fps: fps.max(1),
            stream: None,
        }
    }

    /// The device path of a camera id.
    pub fn device_path(id: i32) -> String {
        format!("/dev/video{id}")
    }
}

impl CameraSource for V4l2Camera {
    fn open(&mut self, id: i32) -> bool {
        self.close();
        if id < 0 {
            log::warn!("cannot open camera {id}");
            return false;
        }

        let device = Self::device_path(id);
        let pipeline = v4l2_camera_pipeline_description(&device, self.size, self.fps);
        log::debug!("camera pipeline: {pipeline}");

        let stream = StreamCapture::new(&pipeline).and_then(|mut stream| {
            stream.start()?;
            Ok(stream)
        });
        match stream {
            Ok(stream) => {
                log::info!("opened {device}");
                self.stream = Some(stream);
                true
            }
            Err(err) => {
                log::warn!("cannot open {device}: {err}");
                false
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.as_ref().is_some_and(StreamCapture::is_running)
    }

    fn read_frame(&mut self) -> Option<Frame> {
        let stream = self.stream.as_ref()?;
        match stream.grab() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("cannot grab a frame: {err}");
                None
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.close() {
                log::warn!("cannot close the camera: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_description() {
        let desc = v4l2_camera_pipeline_description(
            &V4l2Camera::device_path(2),
            Some(ImageSize {
                width: 640,
                height: 480,
            }),
            30,
        );
        assert!(desc.starts_with("v4l2src device=/dev/video2 "));
        assert!(desc.contains("width=640,height=480,framerate=30/1"));
        assert!(desc.ends_with("drop=true"));

        let desc = v4l2_camera_pipeline_description("/dev/video0", None, 30);
        assert!(desc.contains("format=RGB ! appsink"));
    }

    #[test]
    fn negative_id_stays_closed() {
        let mut camera = V4l2Camera::new(None, 30);
        assert!(!camera.open(-1));
        assert!(!camera.is_open());
        assert!(camera.read_frame().is_none());
    }

    #[test]
    #[ignore = "needs gstreamer and a camera at /dev/video0"]
    fn grab_from_device() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut camera = V4l2Camera::new(
            Some(ImageSize {
                width: 320,
                height: 240,
            }),
            30,
        );
        assert!(camera.open(0));
        let frame = (0..100).find_map(|_| {
            std::thread::sleep(std::time::Duration::from_millis(20));
            camera.read_frame()
        });
        assert!(frame.is_some_and(|f| f.width() == 320 && f.height() == 240));
        camera.close();
        assert!(!camera.is_open());
    }
}
