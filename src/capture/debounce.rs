//! Two-timer extraction debounce
//!
//! A soft quiet-period deadline is re-armed on every mutation. A hard ceiling
//! deadline is armed on the first mutation of a burst and never re-armed, so a
//! page that mutates forever still gets extracted.

use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1500);
pub const DEFAULT_CEILING: Duration = Duration::from_millis(8000);

#[derive(Debug, Clone)]
pub struct ExtractionTimer {
    quiet: Duration,
    ceiling: Duration,
    soft_deadline: Option<Instant>,
    hard_deadline: Option<Instant>,
}

impl Default for ExtractionTimer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD, DEFAULT_CEILING)
    }
}

impl ExtractionTimer {
    pub fn new(quiet: Duration, ceiling: Duration) -> Self {
        Self {
            quiet,
            ceiling,
            soft_deadline: None,
            hard_deadline: None,
        }
    }

    /// Re-arm the soft timer; arm the hard timer if idle.
    pub fn on_mutation(&mut self, now: Instant) {
        self.soft_deadline = Some(now + self.quiet);
        if self.hard_deadline.is_none() {
            self.hard_deadline = Some(now + self.ceiling);
        }
    }

    /// True when either timer has expired. Firing clears both.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_deadline() {
            Some(deadline) if now >= deadline => {
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Earliest armed deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.soft_deadline, self.hard_deadline) {
            (Some(s), Some(h)) => Some(s.min(h)),
            (s, h) => s.or(h),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.soft_deadline.is_some() || self.hard_deadline.is_some()
    }

    pub fn reset(&mut self) {
        self.soft_deadline = None;
        self.hard_deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn quiet_period_fires_after_last_mutation() {
        let t0 = Instant::now();
        let mut timer = ExtractionTimer::default();
        timer.on_mutation(t0);
        timer.on_mutation(t0 + ms(1000));
        assert!(!timer.poll(t0 + ms(1600)));
        assert!(timer.poll(t0 + ms(2500)));
        assert!(!timer.is_armed());
    }

    #[test]
    fn ceiling_fires_under_continuous_mutation() {
        let t0 = Instant::now();
        let mut timer = ExtractionTimer::default();
        let mut fired_at = None;
        for step in 0..20u64 {
            let now = t0 + ms(step * 1000);
            if timer.poll(now) {
                fired_at = Some(step);
                break;
            }
            timer.on_mutation(now);
        }
        assert_eq!(fired_at, Some(8));
    }

    #[test]
    fn hard_deadline_not_rearmed() {
        let t0 = Instant::now();
        let mut timer = ExtractionTimer::new(ms(100), ms(500));
        timer.on_mutation(t0);
        timer.on_mutation(t0 + ms(90));
        timer.on_mutation(t0 + ms(180));
        assert_eq!(timer.next_deadline(), Some(t0 + ms(280)));
        timer.on_mutation(t0 + ms(450));
        assert_eq!(timer.next_deadline(), Some(t0 + ms(500)));
    }

    #[test]
    fn idle_timer_never_fires() {
        let mut timer = ExtractionTimer::default();
        assert!(timer.next_deadline().is_none());
        assert!(!timer.poll(Instant::now() + ms(60_000)));
    }

    #[test]
    fn reset_clears_both_timers() {
        let t0 = Instant::now();
        let mut timer = ExtractionTimer::default();
        timer.on_mutation(t0);
        timer.reset();
        assert!(!timer.poll(t0 + ms(10_000)));
    }
}
