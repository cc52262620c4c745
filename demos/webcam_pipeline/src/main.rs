use argh::FromArgs;
use camlab::{
    image::ImageSize,
    io::camera::{CameraSource, ImageFolderCamera, PatternCamera},
    pipeline::{
        CaptureLoop, CaptureOptions, Command, FrameProcessor, LogSink, Ornaments,
        PipelineConfig, RustfaceDetector, RustfaceParams, StopOutcome,
    },
    qr::RqrrScanner,
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

#[derive(FromArgs)]
/// Run the frame pipeline over a camera source
struct Args {
    /// the camera id to use, /dev/video<id> with the gstreamer feature,
    /// negative for black frames
    #[argh(option, short = 'c', default = "0")]
    camera_id: i32,

    /// replay the images of this directory instead of the camera
    #[argh(option, short = 'i')]
    images: Option<PathBuf>,

    /// read the synthetic test pattern instead of the camera
    #[argh(switch, short = 'p')]
    pattern: bool,

    /// the pipeline configuration file
    #[argh(option)]
    config: Option<PathBuf>,

    /// the duration in seconds to run the app
    #[argh(option, short = 'd')]
    duration: Option<u64>,

    /// the directory receiving the recording and the last frame
    #[argh(option, short = 'o', default = "PathBuf::from(\"output\")")]
    output: PathBuf,

    /// record the processed frames
    #[argh(switch, short = 'r')]
    record: bool,

    /// the frames per second of the recording
    #[argh(option, short = 'f', default = "30")]
    fps: u32,

    /// decode QR codes
    #[argh(switch)]
    qr: bool,

    /// the SeetaFace model used to detect faces
    #[argh(option)]
    face_model: Option<PathBuf>,

    /// paint glasses, mustache and mouse nose on the faces
    #[argh(switch)]
    ornaments: bool,
}

#[cfg(feature = "gstreamer")]
fn device_camera(size: ImageSize, fps: u32) -> Box<dyn CameraSource> {
    Box::new(camlab::io::stream::V4l2Camera::new(Some(size), fps))
}

#[cfg(not(feature = "gstreamer"))]
fn device_camera(size: ImageSize, _fps: u32) -> Box<dyn CameraSource> {
    log::info!("built without the gstreamer feature, reading the test pattern");
    Box::new(PatternCamera::new(size))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    std::fs::create_dir_all(&args.output)?;

    let mut processor = FrameProcessor::new();
    if let Some(path) = &args.config {
        processor.set_config(PipelineConfig::from_json_file(path)?)?;
    }
    if args.qr {
        processor.set_symbol_scanner(Box::new(RqrrScanner));
    }
    if let Some(path) = &args.face_model {
        let detector = RustfaceDetector::from_model_file(path, RustfaceParams::default())?;
        processor.set_face_detector(Box::new(detector));
    }
    if args.ornaments {
        processor.set_ornaments(Some(Ornaments::drawn()?));
    }

    let size = ImageSize {
        width: 640,
        height: 480,
    };
    let camera: Box<dyn CameraSource> = match &args.images {
        Some(dir) => Box::new(ImageFolderCamera::new(dir)),
        None if args.pattern => Box::new(PatternCamera::new(size)),
        None => device_camera(size, args.fps),
    };

    let options = CaptureOptions {
        camera_id: args.camera_id,
        fallback_size: size,
        histogram: true,
    };
    let capture = CaptureLoop::spawn(camera, processor, Box::new(LogSink::default()), options)?;

    if args.record {
        capture.send(Command::Record {
            enable: true,
            path: args.output.join("recording.avi"),
            fps: args.fps,
        });
    }

    // create a cancel token to stop the capture
    let cancel_token = Arc::new(AtomicBool::new(false));

    ctrlc::set_handler({
        let cancel_token = cancel_token.clone();
        move || {
            println!("Received Ctrl-C signal. Sending cancel signal !!");
            cancel_token.store(true, Ordering::SeqCst);
        }
    })?;

    let start = Instant::now();
    let duration = args.duration.map(Duration::from_secs);
    while !cancel_token.load(Ordering::SeqCst) {
        if duration.is_some_and(|d| start.elapsed() >= d) {
            break;
        }
        std::thread::sleep(Duration::from_millis(500));
        log::info!("{} frames, {:.1} fps", capture.frames(), capture.fps());
    }

    capture.send(Command::SaveImage(args.output.join("last_frame.png")));
    std::thread::sleep(Duration::from_millis(100));

    match capture.stop(Duration::from_secs(2)) {
        StopOutcome::Graceful => println!("Finished capture. Closing app."),
        StopOutcome::Forced => println!("Capture did not stop in time. Closing app."),
    }

    Ok(())
}
