use std::time::{Duration, Instant};

/// Hold time of the target sensor.
///
/// Armed on every target sighting; expires `duration` after the most recent
/// one.
#[derive(Debug, Clone)]
pub struct TargetIndicator {
    armed_at: Option<Instant>,
    duration: Duration,
}

impl TargetIndicator {
    pub fn new(duration: Duration) -> Self {
        Self {
            armed_at: None,
            duration,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    /// Start (or restart) the hold time at `now`
    pub fn arm(&mut self, now: Instant) {
        self.armed_at = Some(now);
    }

    /// `true` exactly once when the hold time has run out; the indicator is
    /// disarmed at that point
    pub fn take_expired(&mut self, now: Instant) -> bool {
        match self.armed_at {
            Some(armed_at) if now.saturating_duration_since(armed_at) > self.duration => {
                self.armed_at = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unarmed_never_expires() {
        let mut indicator = TargetIndicator::new(Duration::from_secs(30));
        assert!(!indicator.is_armed());
        assert!(!indicator.take_expired(Instant::now() + Duration::from_secs(3600)));
    }

    #[test]
    fn test_expires_once_after_duration() {
        let start = Instant::now();
        let mut indicator = TargetIndicator::new(Duration::from_secs(30));
        indicator.arm(start);

        assert!(!indicator.take_expired(start + Duration::from_secs(10)));
        assert!(!indicator.take_expired(start + Duration::from_secs(30)));
        assert!(indicator.take_expired(start + Duration::from_secs(31)));
        assert!(!indicator.is_armed());
        assert!(!indicator.take_expired(start + Duration::from_secs(40)));
    }

    #[test]
    fn test_rearming_extends_hold_time() {
        let start = Instant::now();
        let mut indicator = TargetIndicator::new(Duration::from_secs(30));
        indicator.arm(start);
        indicator.arm(start + Duration::from_secs(20));

        assert!(!indicator.take_expired(start + Duration::from_secs(45)));
        assert!(indicator.take_expired(start + Duration::from_secs(51)));
    }
}
