use std::sync::{Arc, Mutex, MutexGuard};

use camlab_image::Frame;

/// A single frame slot shared between the capture worker and a consumer.
///
/// The latest write wins: a frame not taken before the next `put` is lost,
/// a slow consumer skips frames instead of queueing them.
#[derive(Clone, Default)]
pub struct FrameMailbox {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl FrameMailbox {
    /// An empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Frame>> {
        // a panic while holding the lock leaves a whole frame or none
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish a frame, replacing any frame not taken yet.
    pub fn put(&self, frame: Frame) {
        *self.lock() = Some(frame);
    }

    /// Take the latest frame, leaving the mailbox empty.
    pub fn take(&self) -> Option<Frame> {
        self.lock().take()
    }

    /// A copy of the latest frame, left in the mailbox.
    pub fn peek(&self) -> Option<Frame> {
        self.lock().clone()
    }

    /// Whether a frame waits in the mailbox.
    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::ImageError;

    #[test]
    fn test_latest_write_wins() -> Result<(), ImageError> {
        let mailbox = FrameMailbox::new();
        assert!(mailbox.take().is_none());

        mailbox.put(Frame::from_size_val([2, 2].into(), 1)?);
        mailbox.put(Frame::from_size_val([2, 2].into(), 2)?);
        assert_eq!(mailbox.peek().map(|f| f.as_slice()[0]), Some(2));
        assert!(!mailbox.is_empty());

        let frame = mailbox.take();
        assert_eq!(frame.map(|f| f.as_slice()[0]), Some(2));
        assert!(mailbox.is_empty());
        Ok(())
    }

    #[test]
    fn test_shared_between_threads() -> Result<(), ImageError> {
        let mailbox = FrameMailbox::new();
        let producer = std::thread::spawn({
            let mailbox = mailbox.clone();
            move || -> Result<(), ImageError> {
                for v in 0..10 {
                    mailbox.put(Frame::from_size_val([4, 4].into(), v)?);
                }
                Ok(())
            }
        });
        assert!(producer.join().is_ok_and(|r| r.is_ok()));
        assert_eq!(mailbox.take().map(|f| f.as_slice()[0]), Some(9));
        Ok(())
    }
}
