use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        mpsc, Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use camlab_image::{Frame, ImageSize};
use camlab_io::{
    camera::CameraSource, fps_counter::FpsCounter, functional::save_image, video::VideoRecorder,
};

use crate::{
    config::{PipelineConfig, Toggle},
    error::PipelineError,
    mailbox::FrameMailbox,
    processor::FrameProcessor,
};

/// The frames published by the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// The processed frame.
    Main,
    /// The moving part of the frame.
    Motion,
    /// The detected objects.
    Objects,
    /// The histogram chart of the input frame.
    Histogram,
    /// The stitched panorama.
    Panorama,
}

/// The display side of the capture loop.
pub trait DisplaySink: Send {
    /// A new frame of a view is available.
    fn frame(&mut self, view: View, frame: &Frame);

    /// A user facing status message.
    fn status(&mut self, message: &str);
}

/// A sink that logs statuses and counts frames.
#[derive(Debug, Default)]
pub struct LogSink {
    frames: u64,
}

impl LogSink {
    /// The number of main frames received.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl DisplaySink for LogSink {
    fn frame(&mut self, view: View, frame: &Frame) {
        if view == View::Main {
            self.frames += 1;
            if self.frames % 100 == 0 {
                log::info!("{} frames of {}", self.frames, frame.size());
            }
        }
    }

    fn status(&mut self, message: &str) {
        log::info!("{message}");
    }
}

/// A change applied by the capture worker between two frames.
pub type ProcessorAction =
    Box<dyn FnOnce(&mut FrameProcessor) -> Result<(), PipelineError> + Send>;

/// Requests sent to the capture worker.
pub enum Command {
    /// Enable or disable a stage or view.
    Toggle(Toggle, bool),
    /// Replace the whole configuration.
    SetConfig(Box<PipelineConfig>),
    /// Add the processed frame to the panorama.
    PanoramaInsert,
    /// Drop the last panorama frame.
    PanoramaPopLast,
    /// Stitch the panorama.
    PanoramaCompute,
    /// Clear the panorama.
    PanoramaReset,
    /// Start or stop recording the processed frames.
    Record {
        /// Start when true, stop otherwise.
        enable: bool,
        /// The video file.
        path: PathBuf,
        /// The frame rate written in the file.
        fps: u32,
    },
    /// Save the processed frame to an image file.
    SaveImage(PathBuf),
    /// Run any setter on the processor.
    Apply(ProcessorAction),
}

/// Settings of the capture loop.
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    /// The camera device id.
    pub camera_id: i32,
    /// Size of the black frames processed while no camera is open.
    pub fallback_size: ImageSize,
    /// Publish the histogram chart of every frame.
    pub histogram: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            camera_id: 0,
            fallback_size: ImageSize {
                width: 640,
                height: 480,
            },
            histogram: false,
        }
    }
}

/// One slot per published view.
#[derive(Clone, Default)]
pub struct ViewMailboxes {
    /// The processed frames.
    pub main: FrameMailbox,
    /// The motion views.
    pub motion: FrameMailbox,
    /// The object detection views.
    pub objects: FrameMailbox,
    /// The histogram charts.
    pub histogram: FrameMailbox,
    /// The panorama views.
    pub panorama: FrameMailbox,
}

impl ViewMailboxes {
    /// The slot of a view.
    pub fn get(&self, view: View) -> &FrameMailbox {
        match view {
            View::Main => &self.main,
            View::Motion => &self.motion,
            View::Objects => &self.objects,
            View::Histogram => &self.histogram,
            View::Panorama => &self.panorama,
        }
    }
}

/// How the capture worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The worker finished its frame and released the camera in time.
    Graceful,
    /// The worker did not finish in time and was detached.
    Forced,
}

#[derive(Default)]
struct Counters {
    frames: AtomicU64,
    fps_bits: AtomicU32,
}

/// The capture, process and publish loop running on its own thread.
pub struct CaptureLoop {
    stop: Arc<AtomicBool>,
    commands: mpsc::Sender<Command>,
    done: mpsc::Receiver<()>,
    handle: Option<JoinHandle<()>>,
    mailboxes: ViewMailboxes,
    counters: Arc<Counters>,
}

struct Worker {
    camera: Box<dyn CameraSource>,
    processor: FrameProcessor,
    sink: Box<dyn DisplaySink>,
    options: CaptureOptions,
    recorder: VideoRecorder,
    mailboxes: ViewMailboxes,
    counters: Arc<Counters>,
}

impl CaptureLoop {
    /// Open the camera and start the loop.
    ///
    /// A camera that does not open is replaced by black frames of
    /// `options.fallback_size`.
    pub fn spawn(
        camera: Box<dyn CameraSource>,
        processor: FrameProcessor,
        sink: Box<dyn DisplaySink>,
        options: CaptureOptions,
    ) -> Result<Self, PipelineError> {
        let stop = Arc::new(AtomicBool::new(false));
        let (commands, command_rx) = mpsc::channel();
        let (done_tx, done) = mpsc::channel();
        let mailboxes = ViewMailboxes::default();
        let counters = Arc::new(Counters::default());

        let mut worker = Worker {
            camera,
            processor,
            sink,
            options,
            recorder: VideoRecorder::new(),
            mailboxes: mailboxes.clone(),
            counters: counters.clone(),
        };

        let handle = std::thread::Builder::new()
            .name("camlab-capture".to_string())
            .spawn({
                let stop = stop.clone();
                move || {
                    worker.run(&stop, &command_rx);
                    // the receiver is gone when the loop was detached
                    let _ = done_tx.send(());
                }
            })
            .map_err(|err| PipelineError::ResourceUnavailable(err.to_string()))?;

        Ok(Self {
            stop,
            commands,
            done,
            handle: Some(handle),
            mailboxes,
            counters,
        })
    }

    /// A handle to send commands to the worker.
    pub fn sender(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    /// Send a command to the worker.
    ///
    /// # Returns
    ///
    /// `false` when the worker has stopped.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// The published views.
    pub fn mailboxes(&self) -> &ViewMailboxes {
        &self.mailboxes
    }

    /// The number of frames processed so far.
    pub fn frames(&self) -> u64 {
        self.counters.frames.load(Ordering::Relaxed)
    }

    /// The smoothed processing rate.
    pub fn fps(&self) -> f32 {
        f32::from_bits(self.counters.fps_bits.load(Ordering::Relaxed))
    }

    /// Whether the worker is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the worker to stop and wait at most `timeout` for it.
    pub fn stop(mut self, timeout: Duration) -> StopOutcome {
        self.stop.store(true, Ordering::SeqCst);
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        log::warn!("capture worker panicked");
                    }
                }
                log::info!("capture stopped");
                StopOutcome::Graceful
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!("capture worker still busy after {timeout:?}, detached");
                self.handle.take();
                StopOutcome::Forced
            }
        }
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Worker {
    fn run(&mut self, stop: &AtomicBool, commands: &mpsc::Receiver<Command>) {
        if !self.camera.open(self.options.camera_id) {
            let message = format!("cannot open camera {}", self.options.camera_id);
            log::warn!("{message}");
            self.sink.status(&message);
        }
        let fallback = Frame::from_size_val(self.options.fallback_size, 0)
            .unwrap_or_else(|_| Frame::empty());
        let mut fps = FpsCounter::new();

        while !stop.load(Ordering::SeqCst) {
            for command in commands.try_iter() {
                self.apply(command);
            }

            let frame = if self.camera.is_open() {
                match self.next_frame(stop) {
                    Some(frame) => frame,
                    None => continue,
                }
            } else {
                fallback.clone()
            };

            self.process(&frame);

            fps.update();
            self.counters.frames.store(fps.frames(), Ordering::Relaxed);
            self.counters
                .fps_bits
                .store(fps.fps().to_bits(), Ordering::Relaxed);
        }

        if self.recorder.is_recording() {
            self.set_recording(false, PathBuf::new(), 0);
        }
        self.camera.close();
        log::debug!("capture loop left after {} frames", fps.frames());
    }

    // empty reads are retried until a frame arrives or a stop is requested
    fn next_frame(&mut self, stop: &AtomicBool) -> Option<Frame> {
        while !stop.load(Ordering::SeqCst) && self.camera.is_open() {
            if let Some(frame) = self.camera.read_frame() {
                return Some(frame);
            }
            std::thread::yield_now();
        }
        None
    }

    fn process(&mut self, frame: &Frame) {
        self.processor.process(frame);
        let toggles = self.processor.config().toggles;

        // the motion boxes land on the main frame, so this comes first
        if toggles.motion {
            match self.processor.motion_detection_view() {
                Ok(view) => self.publish(View::Motion, view),
                Err(err) => log::warn!("motion view skipped: {err}"),
            }
        }
        if toggles.object_detection {
            match self.processor.object_detection_view() {
                Ok(view) => self.publish(View::Objects, view),
                Err(err) => log::warn!("object view skipped: {err}"),
            }
        }
        if self.options.histogram {
            match self.processor.histogram_view() {
                Ok(view) => self.publish(View::Histogram, view),
                Err(err) => log::warn!("histogram view skipped: {err}"),
            }
        }
        if toggles.panorama {
            let view = self.processor.panorama_view().clone();
            if !view.is_empty() {
                self.publish(View::Panorama, view);
            }
        }

        let mut main = self.processor.processed_frame().clone();
        if let Err(err) = self.recorder.record(&mut main) {
            log::warn!("recording stopped: {err}");
            self.set_recording(false, PathBuf::new(), 0);
        }
        self.publish(View::Main, main);
    }

    fn publish(&mut self, view: View, frame: Frame) {
        self.sink.frame(view, &frame);
        self.mailboxes.get(view).put(frame);
    }

    fn set_recording(&mut self, enable: bool, path: PathBuf, fps: u32) {
        let mut size = self.processor.processed_frame().size();
        if size.is_empty() {
            size = self.options.fallback_size;
        }
        let status = match self.recorder.set_recording(enable, &path, fps, size) {
            Ok(()) if enable => format!("Recording to {}", path.display()),
            Ok(()) => "Recording stopped".to_string(),
            Err(err) => format!("Recording error: {err}"),
        };
        self.sink.status(&status);
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Toggle(toggle, enabled) => {
                let status = self.processor.toggle(toggle, enabled);
                self.sink.status(&status);
            }
            Command::SetConfig(config) => {
                if let Err(err) = self.processor.set_config(*config) {
                    log::warn!("configuration rejected: {err}");
                    self.sink.status(&err.to_string());
                }
            }
            Command::PanoramaInsert => {
                self.processor.panorama_insert();
                let size = self.processor.panorama().size();
                self.sink.status(&format!("Panorama: {size} images"));
            }
            Command::PanoramaPopLast => {
                self.processor.panorama_pop_last();
                let size = self.processor.panorama().size();
                self.sink.status(&format!("Panorama: {size} images"));
            }
            Command::PanoramaCompute => {
                let status = self.processor.panorama_compute();
                self.sink.status(status.message());
            }
            Command::PanoramaReset => {
                self.processor.panorama_reset();
                self.sink.status("Panorama reset");
            }
            Command::Record { enable, path, fps } => self.set_recording(enable, path, fps),
            Command::SaveImage(path) => {
                let status = match save_image(self.processor.processed_frame(), &path) {
                    Ok(()) => format!("Image saved to {}", path.display()),
                    Err(err) => {
                        log::warn!("cannot save {}: {err}", path.display());
                        format!("Cannot save image: {err}")
                    }
                };
                self.sink.status(&status);
            }
            Command::Apply(action) => {
                if let Err(err) = action(&mut self.processor) {
                    self.sink.status(&err.to_string());
                }
            }
        }
    }
}
