//! Per-session transfer counters.

use std::time::Instant;

// ── SessionStats ─────────────────────────────────────────────────

/// Counters accumulated by a running session.
///
/// The pipeline owns the live copy and publishes a snapshot over a
/// `tokio::sync::watch` channel after every frame, so observers always
/// read one consistent tuple without touching the pipeline.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Frames transferred since the session started.
    pub frames: u64,
    /// Payload bytes transferred (compressed, headers excluded).
    pub bytes: u64,
    /// Instantaneous rate from the two most recent frames. Zero until
    /// the second frame.
    pub fps: f64,
    /// When the most recent frame was transferred.
    pub last_frame_at: Option<Instant>,
}

impl SessionStats {
    /// Fold one transferred frame into the counters.
    ///
    /// The rate is the reciprocal of the gap between this frame and
    /// the previous one; there is no smoothing window.
    pub fn record_frame(&mut self, payload_len: usize, now: Instant) {
        self.frames += 1;
        self.bytes += payload_len as u64;
        self.fps = match self.last_frame_at {
            Some(prev) => {
                let gap = now.duration_since(prev).as_secs_f64();
                if gap > 0.0 { 1.0 / gap } else { 0.0 }
            }
            None => 0.0,
        };
        self.last_frame_at = Some(now);
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_frame_has_zero_rate() {
        let mut stats = SessionStats::default();
        stats.record_frame(1500, Instant::now());
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.bytes, 1500);
        assert_eq!(stats.fps, 0.0);
        assert!(stats.last_frame_at.is_some());
    }

    #[test]
    fn rate_follows_consecutive_gap() {
        let t0 = Instant::now();
        let mut stats = SessionStats::default();
        stats.record_frame(100, t0);
        stats.record_frame(200, t0 + Duration::from_millis(100));

        assert_eq!(stats.frames, 2);
        assert_eq!(stats.bytes, 300);
        assert!((stats.fps - 10.0).abs() < 0.01);

        // A slower third frame drags the instantaneous rate down.
        stats.record_frame(300, t0 + Duration::from_millis(600));
        assert!((stats.fps - 2.0).abs() < 0.01);
    }

    #[test]
    fn zero_gap_does_not_blow_up() {
        let t0 = Instant::now();
        let mut stats = SessionStats::default();
        stats.record_frame(1, t0);
        stats.record_frame(1, t0);
        assert_eq!(stats.fps, 0.0);
    }
}
