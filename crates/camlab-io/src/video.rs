use std::{
    fs::File,
    io::{BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use camlab_image::{Frame, ImageSize};
use camlab_imgproc::draw::draw_filled_circle;

use crate::{error::IoError, jpeg::encode_image_jpeg_rgb8};

/// Quality of the Motion-JPEG frames.
const VIDEO_JPEG_QUALITY: u8 = 90;

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;

// bytes of a chunk header and of an idx1 entry
const CHUNK_HEADER: u64 = 8;
const INDEX_ENTRY: u64 = 16;

/// The codec requested for a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// MPEG-4 part 2, fourcc `XVID`. Needs the `gstreamer` feature.
    Xvid,
    /// Motion-JPEG, fourcc `MJPG`.
    Mjpeg,
}

impl VideoCodec {
    /// The four character code of the codec.
    pub fn fourcc(&self) -> &'static str {
        match self {
            VideoCodec::Xvid => "XVID",
            VideoCodec::Mjpeg => "MJPG",
        }
    }
}

// byte offsets of the header fields patched when the file is closed
struct HeaderFields {
    total_frames: u64,
    stream_length: u64,
    movi_size: u64,
    movi_start: u64,
}

/// A writer of AVI files holding Motion-JPEG compressed RGB frames.
///
/// The file is written as frames arrive; the frame counts, the chunk sizes
/// and the index are completed by [`AviWriter::close`]. RIFF sizes are
/// 32 bit: a frame that would grow the closed file past `u32::MAX` bytes
/// is refused with [`IoError::VideoTooLarge`].
pub struct AviWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    size: ImageSize,
    fields: HeaderFields,
    index: Vec<(u32, u32)>,
    max_chunk: u32,
    position: u64,
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

// a RIFF size or offset
fn riff_u32(value: u64) -> Result<u32, IoError> {
    u32::try_from(value).map_err(|_| IoError::VideoTooLarge(value))
}

/// The offset of the next chunk from the `movi` tag.
///
/// Fails when the file, closed right after this chunk and its index entry,
/// would not fit the 32 bit RIFF size.
fn next_chunk_offset(
    position: u64,
    movi_start: u64,
    chunk_len: u64,
    indexed: usize,
) -> Result<u32, IoError> {
    let padded = chunk_len + chunk_len % 2;
    let index_len = (indexed as u64 + 1) * INDEX_ENTRY;
    let file_end = position + CHUNK_HEADER + padded + CHUNK_HEADER + index_len;
    riff_u32(file_end - 8)?;
    riff_u32(position - movi_start)
}

fn header(size: ImageSize, fps: u32) -> (Vec<u8>, HeaderFields) {
    let (w, h) = (size.width as u32, size.height as u32);
    // a hint for players, saturated for large frames
    let frame_bytes = (w as u64 * h as u64 * 3).min(u32::MAX as u64) as u32;
    let mut buf = Vec::with_capacity(256);

    buf.extend_from_slice(b"RIFF");
    put_u32(&mut buf, 0);
    buf.extend_from_slice(b"AVI ");

    buf.extend_from_slice(b"LIST");
    let hdrl_size_at = buf.len();
    put_u32(&mut buf, 0);
    buf.extend_from_slice(b"hdrl");

    // main header
    buf.extend_from_slice(b"avih");
    put_u32(&mut buf, 56);
    put_u32(&mut buf, 1_000_000 / fps);
    put_u32(&mut buf, 0);
    put_u32(&mut buf, 0);
    put_u32(&mut buf, AVIF_HASINDEX);
    let total_frames = buf.len() as u64;
    put_u32(&mut buf, 0);
    put_u32(&mut buf, 0);
    put_u32(&mut buf, 1);
    put_u32(&mut buf, frame_bytes);
    put_u32(&mut buf, w);
    put_u32(&mut buf, h);
    buf.extend_from_slice(&[0; 16]);

    buf.extend_from_slice(b"LIST");
    let strl_size_at = buf.len();
    put_u32(&mut buf, 0);
    buf.extend_from_slice(b"strl");

    // stream header
    buf.extend_from_slice(b"strh");
    put_u32(&mut buf, 56);
    buf.extend_from_slice(b"vids");
    buf.extend_from_slice(b"MJPG");
    put_u32(&mut buf, 0);
    put_u16(&mut buf, 0);
    put_u16(&mut buf, 0);
    put_u32(&mut buf, 0);
    put_u32(&mut buf, 1);
    put_u32(&mut buf, fps);
    put_u32(&mut buf, 0);
    let stream_length = buf.len() as u64;
    put_u32(&mut buf, 0);
    put_u32(&mut buf, frame_bytes);
    put_u32(&mut buf, u32::MAX);
    put_u32(&mut buf, 0);
    put_u16(&mut buf, 0);
    put_u16(&mut buf, 0);
    put_u16(&mut buf, w as u16);
    put_u16(&mut buf, h as u16);

    // stream format, a bitmap info header
    buf.extend_from_slice(b"strf");
    put_u32(&mut buf, 40);
    put_u32(&mut buf, 40);
    put_u32(&mut buf, w);
    put_u32(&mut buf, h);
    put_u16(&mut buf, 1);
    put_u16(&mut buf, 24);
    buf.extend_from_slice(b"MJPG");
    put_u32(&mut buf, frame_bytes);
    buf.extend_from_slice(&[0; 16]);

    let strl_size = (buf.len() - strl_size_at - 4) as u32;
    buf[strl_size_at..strl_size_at + 4].copy_from_slice(&strl_size.to_le_bytes());
    let hdrl_size = (buf.len() - hdrl_size_at - 4) as u32;
    buf[hdrl_size_at..hdrl_size_at + 4].copy_from_slice(&hdrl_size.to_le_bytes());

    buf.extend_from_slice(b"LIST");
    let movi_size = buf.len() as u64;
    put_u32(&mut buf, 0);
    let movi_start = buf.len() as u64;
    buf.extend_from_slice(b"movi");

    (
        buf,
        HeaderFields {
            total_frames,
            stream_length,
            movi_size,
            movi_start,
        },
    )
}

impl AviWriter {
    /// Create a new Motion-JPEG video file.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to save the video file.
    /// * `fps` - The frames per second of the video.
    /// * `size` - The size of every frame.
    pub fn new(path: impl AsRef<Path>, fps: u32, size: ImageSize) -> Result<Self, IoError> {
        if size.is_empty() || size.width > u16::MAX as usize || size.height > u16::MAX as usize {
            return Err(IoError::UnsupportedImageSize(size));
        }

        let path = path.as_ref().to_path_buf();
        let (head, fields) = header(size, fps.max(1));
        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(&head)?;

        Ok(Self {
            path,
            writer: Some(writer),
            size,
            fields,
            index: Vec::new(),
            max_chunk: 0,
            position: head.len() as u64,
        })
    }

    /// The path of the video file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The number of frames written so far.
    pub fn frames(&self) -> usize {
        self.index.len()
    }

    /// Append a frame to the video.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame size differs from the video size or if
    /// the writer was closed.
    pub fn write(&mut self, frame: &Frame) -> Result<(), IoError> {
        if frame.size() != self.size {
            return Err(IoError::VideoFrameSize(frame.size(), self.size));
        }
        let writer = self.writer.as_mut().ok_or_else(|| {
            IoError::FileError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "video writer is closed",
            ))
        })?;

        let jpeg = encode_image_jpeg_rgb8(frame, VIDEO_JPEG_QUALITY)?;
        let offset = next_chunk_offset(
            self.position,
            self.fields.movi_start,
            jpeg.len() as u64,
            self.index.len(),
        )?;
        let len = riff_u32(jpeg.len() as u64)?;

        writer.write_all(b"00dc")?;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&jpeg)?;
        if len % 2 == 1 {
            writer.write_all(&[0])?;
        }
        self.position += CHUNK_HEADER + len as u64 + len as u64 % 2;

        self.index.push((offset, len));
        self.max_chunk = self.max_chunk.max(len);
        Ok(())
    }

    /// Write the index, complete the headers and close the file.
    ///
    /// Closing an already closed writer does nothing.
    pub fn close(&mut self) -> Result<(), IoError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };

        let movi_end = self.position;
        let index_len = riff_u32(self.index.len() as u64 * INDEX_ENTRY)?;

        writer.write_all(b"idx1")?;
        writer.write_all(&index_len.to_le_bytes())?;
        for &(offset, len) in &self.index {
            writer.write_all(b"00dc")?;
            writer.write_all(&AVIIF_KEYFRAME.to_le_bytes())?;
            writer.write_all(&offset.to_le_bytes())?;
            writer.write_all(&len.to_le_bytes())?;
        }
        let file_end = movi_end + CHUNK_HEADER + index_len as u64;

        let frames = riff_u32(self.index.len() as u64)?;
        let patches = [
            (4, riff_u32(file_end - 8)?),
            (self.fields.total_frames, frames),
            (self.fields.stream_length, frames),
            (self.fields.movi_size, riff_u32(movi_end - self.fields.movi_start)?),
        ];
        for (at, value) in patches {
            writer.seek(SeekFrom::Start(at))?;
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()?;

        log::debug!(
            "closed {} with {} frames, largest frame {} bytes",
            self.path.display(),
            frames,
            self.max_chunk
        );
        Ok(())
    }
}

impl Drop for AviWriter {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(err) = self.close() {
                log::error!("failed to close {}: {err}", self.path.display());
            }
        }
    }
}

enum Backend {
    Avi(AviWriter),
    #[cfg(feature = "gstreamer")]
    Stream(crate::stream::StreamVideoWriter),
}

/// A writer of video files.
///
/// `MJPG` is written by the built-in [`AviWriter`]. `XVID` is encoded by
/// GStreamer and is only available with the `gstreamer` feature.
pub struct VideoWriter {
    codec: VideoCodec,
    size: ImageSize,
    frames: usize,
    backend: Backend,
}

impl VideoWriter {
    /// Create a new video file.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to save the video file.
    /// * `codec` - The codec of the video stream.
    /// * `fps` - The frames per second of the video.
    /// * `size` - The size of every frame.
    ///
    /// # Errors
    ///
    /// [`IoError::UnsupportedCodec`] if the codec is not available in this
    /// build.
    pub fn new(
        path: impl AsRef<Path>,
        codec: VideoCodec,
        fps: u32,
        size: ImageSize,
    ) -> Result<Self, IoError> {
        if size.is_empty() {
            return Err(IoError::UnsupportedImageSize(size));
        }
        let backend = match codec {
            VideoCodec::Mjpeg => Backend::Avi(AviWriter::new(path, fps, size)?),
            #[cfg(feature = "gstreamer")]
            VideoCodec::Xvid => Backend::Stream(crate::stream::StreamVideoWriter::new(
                path, codec, fps, size,
            )?),
            #[cfg(not(feature = "gstreamer"))]
            VideoCodec::Xvid => return Err(IoError::UnsupportedCodec(codec.fourcc())),
        };
        Ok(Self {
            codec,
            size,
            frames: 0,
            backend,
        })
    }

    /// The codec of the video stream.
    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    /// The path of the video file.
    pub fn path(&self) -> &Path {
        match &self.backend {
            Backend::Avi(writer) => writer.path(),
            #[cfg(feature = "gstreamer")]
            Backend::Stream(writer) => writer.path(),
        }
    }

    /// The number of frames written so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Append a frame to the video.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame size differs from the video size, if
    /// the writer was closed or if the file would outgrow its container.
    pub fn write(&mut self, frame: &Frame) -> Result<(), IoError> {
        if frame.size() != self.size {
            return Err(IoError::VideoFrameSize(frame.size(), self.size));
        }
        match &mut self.backend {
            Backend::Avi(writer) => writer.write(frame)?,
            #[cfg(feature = "gstreamer")]
            Backend::Stream(writer) => writer.write(frame)?,
        }
        self.frames += 1;
        Ok(())
    }

    /// Finalise the file. Closing an already closed writer does nothing.
    pub fn close(&mut self) -> Result<(), IoError> {
        match &mut self.backend {
            Backend::Avi(writer) => writer.close(),
            #[cfg(feature = "gstreamer")]
            Backend::Stream(writer) => Ok(writer.close()?),
        }
    }
}

// frames of the blink period during which the recording dot is shown
const BLINK_ON: u32 = 20;
const BLINK_PERIOD: u32 = 40;

/// Records processed frames and marks the live view while recording.
#[derive(Default)]
pub struct VideoRecorder {
    writer: Option<VideoWriter>,
    blink: u32,
}

impl VideoRecorder {
    /// Create a recorder that is not recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether frames are currently recorded.
    pub fn is_recording(&self) -> bool {
        self.writer.is_some()
    }

    /// The codec of the current recording.
    pub fn codec(&self) -> Option<VideoCodec> {
        self.writer.as_ref().map(VideoWriter::codec)
    }

    /// Start or stop a recording.
    ///
    /// Starting opens a new file requesting the `XVID` codec and falls back
    /// to Motion-JPEG when `XVID` cannot be encoded; stopping finalises the
    /// current file. Starting while recording restarts on the new path.
    pub fn set_recording(
        &mut self,
        enable: bool,
        path: impl AsRef<Path>,
        fps: u32,
        size: ImageSize,
    ) -> Result<(), IoError> {
        if let Some(mut writer) = self.writer.take() {
            writer.close()?;
            log::info!(
                "recording stopped, {} frames in {}",
                writer.frames(),
                writer.path().display()
            );
        }
        if enable {
            let path = path.as_ref();
            let writer = match VideoWriter::new(path, VideoCodec::Xvid, fps, size) {
                Ok(writer) => writer,
                Err(err @ IoError::UnsupportedImageSize(_)) => return Err(err),
                Err(err) => {
                    log::info!("{err}, recording Motion-JPEG");
                    VideoWriter::new(path, VideoCodec::Mjpeg, fps, size)?
                }
            };
            log::info!("recording {} started", writer.codec().fourcc());
            self.writer = Some(writer);
            self.blink = 0;
        }
        Ok(())
    }

    /// Record a frame, then draw the blinking recording dot on it.
    ///
    /// The frame is stored before the overlay. A filled red circle of
    /// radius 15 at (20, 20) is drawn while the blink counter is at most 20;
    /// the counter wraps at 40. Frames pass untouched when not recording.
    pub fn record(&mut self, frame: &mut Frame) -> Result<(), IoError> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        writer.write(frame)?;

        if self.blink <= BLINK_ON {
            draw_filled_circle(frame, (20, 20), 15, [255, 0, 0]);
        }
        self.blink += 1;
        if self.blink >= BLINK_PERIOD {
            self.blink = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn write_avi() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("video.avi");
        let size = ImageSize {
            width: 32,
            height: 16,
        };

        let mut writer = VideoWriter::new(&path, VideoCodec::Mjpeg, 25, size)?;
        for v in [0, 100, 200] {
            writer.write(&Frame::from_size_val(size, v)?)?;
        }
        let wrong = Frame::from_size_val([8, 8].into(), 0)?;
        assert!(matches!(
            writer.write(&wrong),
            Err(IoError::VideoFrameSize(..))
        ));
        writer.close()?;

        let bytes = std::fs::read(&path)?;
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"AVI ");
        assert_eq!(u32_at(&bytes, 4) as usize, bytes.len() - 8);
        assert_eq!(u32_at(&bytes, 48), 3);

        // the first chunk directly follows the movi list tag
        let movi = bytes
            .windows(4)
            .position(|w| w == b"movi")
            .unwrap_or_default();
        assert_eq!(&bytes[movi + 4..movi + 8], b"00dc");
        let len = u32_at(&bytes, movi + 8) as usize;
        let first = image::load_from_memory(&bytes[movi + 12..movi + 12 + len])?;
        assert_eq!(first.width(), 32);

        let idx = bytes
            .windows(4)
            .rposition(|w| w == b"idx1")
            .unwrap_or_default();
        assert_eq!(u32_at(&bytes, idx + 4), 48);
        assert_eq!(u32_at(&bytes, idx + 16), 4);
        Ok(())
    }

    #[test]
    fn recorder_blinks() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let size = ImageSize {
            width: 48,
            height: 48,
        };
        let mut recorder = VideoRecorder::new();

        // not recording, nothing drawn
        let mut frame = Frame::from_size_val(size, 0)?;
        recorder.record(&mut frame)?;
        assert_eq!(frame.pixel(20, 20), &[0, 0, 0]);

        recorder.set_recording(true, tmp_dir.path().join("rec.avi"), 25, size)?;
        assert!(recorder.is_recording());

        let mut shown = Vec::new();
        for _ in 0..45 {
            let mut frame = Frame::from_size_val(size, 0)?;
            recorder.record(&mut frame)?;
            shown.push(frame.pixel(20, 20) == [255, 0, 0]);
        }
        assert!(shown[..21].iter().all(|&s| s));
        assert!(shown[21..40].iter().all(|&s| !s));
        assert!(shown[40..].iter().all(|&s| s));

        let codec = recorder.codec();
        recorder.set_recording(false, "", 25, size)?;
        assert!(!recorder.is_recording());
        assert_eq!(recorder.codec(), None);
        let bytes = std::fs::read(tmp_dir.path().join("rec.avi"))?;
        assert_eq!(&bytes[0..4], b"RIFF");
        if codec == Some(VideoCodec::Mjpeg) {
            assert_eq!(u32_at(&bytes, 48), 45);
        }
        Ok(())
    }

    #[test]
    #[cfg(not(feature = "gstreamer"))]
    fn xvid_needs_gstreamer() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let size = ImageSize {
            width: 32,
            height: 32,
        };
        let res = VideoWriter::new(tmp_dir.path().join("x.avi"), VideoCodec::Xvid, 25, size);
        assert!(matches!(res, Err(IoError::UnsupportedCodec("XVID"))));

        let mut recorder = VideoRecorder::new();
        recorder.set_recording(true, tmp_dir.path().join("rec.avi"), 25, size)?;
        assert_eq!(recorder.codec(), Some(VideoCodec::Mjpeg));
        Ok(())
    }

    #[test]
    fn chunk_offsets_fit_32_bits() -> Result<(), IoError> {
        let max = u32::MAX as u64;
        let movi = 200;

        // chunk header, payload, idx1 header and one entry
        assert_eq!(next_chunk_offset(1000, movi, 1000, 0)?, 800);
        assert_eq!(next_chunk_offset(max - 1024, movi, 1000, 0)?, (max - 1224) as u32);
        assert!(matches!(
            next_chunk_offset(max - 1023, movi, 1000, 0),
            Err(IoError::VideoTooLarge(_))
        ));

        // odd payloads are padded, earlier frames keep index entries
        assert!(next_chunk_offset(max - 1024, movi, 999, 0).is_ok());
        assert!(next_chunk_offset(max - 1024, movi, 999, 1).is_err());
        assert!(next_chunk_offset(max + 10, movi, 1, 0).is_err());
        Ok(())
    }

    #[test]
    fn oversized_writer_refuses_frames() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let size = ImageSize {
            width: 16,
            height: 16,
        };
        let mut writer = AviWriter::new(tmp_dir.path().join("big.avi"), 25, size)?;
        writer.write(&Frame::from_size_val(size, 10)?)?;

        // as if 4 GB were already written
        writer.position = u32::MAX as u64 - 64;
        let res = writer.write(&Frame::from_size_val(size, 20)?);
        assert!(matches!(res, Err(IoError::VideoTooLarge(_))));
        assert_eq!(writer.frames(), 1);
        writer.close()?;
        Ok(())
    }
}
