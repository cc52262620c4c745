use std::time::{Duration, Instant};

/// The smoothing factor for the FPS calculation.
const SMOOTHING: f32 = 0.95;

/// A frame per second (FPS) counter with exponential smoothing.
///
/// # Examples
///
/// ```
/// use camlab_io::fps_counter::FpsCounter;
///
/// let mut fps_counter = FpsCounter::new();
///
/// for _ in 0..100 {
///    fps_counter.update();
/// }
/// assert_eq!(fps_counter.frames(), 100);
/// ```
pub struct FpsCounter {
    last_time: Instant,
    frame_count: u64,
    fps: f32,
}

impl FpsCounter {
    /// Creates a new `FpsCounter`.
    pub fn new() -> Self {
        Self {
            last_time: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        }
    }

    /// Returns the current FPS.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Returns the number of frames counted so far.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frame_count
    }

    /// Updates the frame count and calculates the FPS.
    pub fn update(&mut self) {
        let now = Instant::now();
        self.update_with(now.duration_since(self.last_time));
        self.last_time = now;
    }

    fn update_with(&mut self, elapsed: Duration) {
        self.frame_count += 1;

        let secs = elapsed.as_secs_f32();
        if secs <= 0.0 {
            return;
        }
        let instant_fps = 1.0 / secs;
        self.fps = if self.fps == 0.0 {
            instant_fps
        } else {
            self.fps * SMOOTHING + instant_fps * (1.0 - SMOOTHING)
        };
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_counter() {
        let mut fps_counter = FpsCounter::new();
        fps_counter.update_with(Duration::from_millis(100));
        assert!((fps_counter.fps() - 10.0).abs() < 1e-3);

        fps_counter.update_with(Duration::from_millis(50));
        assert!((fps_counter.fps() - 10.5).abs() < 1e-3);

        // a zero interval only counts the frame
        fps_counter.update_with(Duration::ZERO);
        assert!((fps_counter.fps() - 10.5).abs() < 1e-3);
        assert_eq!(fps_counter.frames(), 3);
    }
}
