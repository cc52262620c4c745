use std::path::{Path, PathBuf};

use camlab_image::{Frame, ImageSize};

use crate::functional::read_image_any_rgb8;

/// A source of camera frames.
pub trait CameraSource: Send {
    /// Open the device with the given id.
    ///
    /// Negative ids never open. Returns whether the device is open.
    fn open(&mut self, id: i32) -> bool;

    /// Whether the device is open.
    fn is_open(&self) -> bool;

    /// Grab the next frame.
    ///
    /// `None` is a transient empty read; callers retry.
    fn read_frame(&mut self) -> Option<Frame>;

    /// Release the device.
    fn close(&mut self);
}

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A camera replaying the images of a directory in name order, forever.
pub struct ImageFolderCamera {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    open: bool,
}

impl ImageFolderCamera {
    /// Create a camera over the images of `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            files: Vec::new(),
            next: 0,
            open: false,
        }
    }

    /// The image files found when the camera was opened.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl CameraSource for ImageFolderCamera {
    fn open(&mut self, id: i32) -> bool {
        self.close();
        if id < 0 {
            log::warn!("cannot open camera {id}");
            return false;
        }

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("cannot list {}: {err}", self.dir.display());
                return false;
            }
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        files.sort();

        self.open = !files.is_empty();
        log::info!("{} images in {}", files.len(), self.dir.display());
        self.files = files;
        self.open
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_frame(&mut self) -> Option<Frame> {
        if !self.open {
            return None;
        }
        let path = &self.files[self.next];
        self.next = (self.next + 1) % self.files.len();
        match read_image_any_rgb8(path) {
            Ok(frame) => Some(frame),
            Err(err) => {
                log::warn!("skipping {}: {err}", path.display());
                None
            }
        }
    }

    fn close(&mut self) {
        self.open = false;
        self.files.clear();
        self.next = 0;
    }
}

/// A camera producing a deterministic moving test pattern.
///
/// The frames show a diagonal colour gradient with a bright square moving
/// two pixels per frame along the rows.
pub struct PatternCamera {
    size: ImageSize,
    tick: usize,
    empty_every: usize,
    open: bool,
}

impl PatternCamera {
    /// Side of the moving square.
    pub const SQUARE: usize = 24;

    /// Create a pattern camera producing frames of `size`.
    pub fn new(size: ImageSize) -> Self {
        Self {
            size,
            tick: 0,
            empty_every: 0,
            open: false,
        }
    }

    /// Make every `n`-th read an empty read, `0` disables them.
    pub fn with_empty_reads(mut self, n: usize) -> Self {
        self.empty_every = n;
        self
    }

    /// Render the pattern of a given frame index.
    pub fn render(size: ImageSize, index: usize) -> Option<Frame> {
        let mut frame = Frame::from_size_val(size, 0).ok()?;
        let (w, h) = (size.width, size.height);
        for y in 0..h {
            for x in 0..w {
                let px = frame.pixel_mut(x, y);
                px[0] = ((x * 255) / w.max(1)) as u8;
                px[1] = ((y * 255) / h.max(1)) as u8;
                px[2] = (((x + y) * 255) / (w + h).max(1)) as u8;
            }
        }

        let side = Self::SQUARE.min(w).min(h);
        let span = w.saturating_sub(side).max(1);
        let x0 = (index * 2) % span;
        let y0 = h.saturating_sub(side) / 2;
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                frame.pixel_mut(x, y).copy_from_slice(&[250, 250, 250]);
            }
        }
        Some(frame)
    }
}

impl CameraSource for PatternCamera {
    fn open(&mut self, id: i32) -> bool {
        self.open = id >= 0 && !self.size.is_empty();
        self.tick = 0;
        self.open
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_frame(&mut self) -> Option<Frame> {
        if !self.open {
            return None;
        }
        self.tick += 1;
        if self.empty_every > 0 && self.tick % self.empty_every == 0 {
            return None;
        }
        Self::render(self.size, self.tick)
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::IoError, functional::save_image};

    #[test]
    fn pattern_camera() {
        let size = ImageSize {
            width: 64,
            height: 48,
        };
        let mut camera = PatternCamera::new(size).with_empty_reads(3);
        assert!(camera.read_frame().is_none());
        assert!(!camera.open(-1));
        assert!(camera.open(0));

        let reads: Vec<Option<Frame>> = (0..6).map(|_| camera.read_frame()).collect();
        assert_eq!(reads.iter().filter(|r| r.is_none()).count(), 2);
        assert!(reads[2].is_none() && reads[5].is_none());
        assert_ne!(reads[0], reads[1]);
        assert_eq!(reads[0].as_ref().map(|f| f.size()), Some(size));

        camera.close();
        assert!(!camera.is_open());
    }

    #[test]
    fn folder_camera_cycles() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        for (name, v) in [("b.png", 20u8), ("a.png", 10), ("c.jpg", 30)] {
            save_image(&Frame::from_size_val([4, 4].into(), v)?, tmp_dir.path().join(name))?;
        }
        std::fs::write(tmp_dir.path().join("notes.txt"), "not an image")?;

        let mut camera = ImageFolderCamera::new(tmp_dir.path());
        assert!(camera.open(0));
        assert_eq!(camera.files().len(), 3);

        let first: Vec<u8> = (0..4)
            .filter_map(|_| camera.read_frame())
            .map(|f| f.as_slice()[0])
            .collect();
        assert_eq!(first.len(), 4);
        assert_eq!(first[0], 10);
        assert_eq!(first[1], 20);
        assert!((first[2] as i32 - 30).abs() <= 2);
        assert_eq!(first[3], 10);

        let mut empty = ImageFolderCamera::new(tmp_dir.path().join("missing"));
        assert!(!empty.open(0));
        Ok(())
    }
}
