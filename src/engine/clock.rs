//! Auction countdown clock.
//!
//! Every accepted bid RESTARTS the full window — never extends it — so a
//! last-second snipe always faces a fresh countdown. Each arm/reset bumps
//! a generation counter; an expiry that fires for a superseded generation
//! must be ignored by the caller (the race between a last-instant bid and
//! the timer resolves in favor of the bid).

use tokio::time::{Duration, Instant};

#[derive(Debug)]
pub struct AuctionClock {
    deadline: Option<Instant>,
    window: Duration,
    generation: u64,
}

impl AuctionClock {
    pub fn new(window_secs: u64) -> Self {
        Self {
            deadline: None,
            window: Duration::from_secs(window_secs),
            generation: 0,
        }
    }

    /// Arm (or restart) the countdown for the full configured window.
    /// Returns the generation of the new deadline.
    pub fn reset(&mut self) -> u64 {
        self.generation += 1;
        self.deadline = Some(Instant::now() + self.window);
        self.generation
    }

    /// Arm the countdown for an arbitrary duration (settlement retry,
    /// resume-from-pause). Returns the new generation.
    pub fn arm_for(&mut self, duration: Duration) -> u64 {
        self.generation += 1;
        self.deadline = Some(Instant::now() + duration);
        self.generation
    }

    /// Disarm without firing.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.deadline = None;
    }

    /// Snapshot remaining whole seconds and disarm. Returns `None` when
    /// the clock was not armed.
    pub fn pause(&mut self) -> Option<u64> {
        let remaining = self.remaining()?;
        self.cancel();
        Some(remaining.as_secs())
    }

    /// Re-arm with a verbatim remaining-seconds snapshot from `pause`.
    pub fn resume(&mut self, remaining_secs: u64) -> u64 {
        self.arm_for(Duration::from_secs(remaining_secs))
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether an expiry for `generation` is still current.
    pub fn is_current(&self, generation: u64) -> bool {
        self.deadline.is_some() && self.generation == generation
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Update the configured window. Applies from the next reset; an
    /// already-armed deadline is left running.
    pub fn set_window_secs(&mut self, secs: u64) {
        self.window = Duration::from_secs(secs);
    }

    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_reset_restarts_full_window() {
        let mut clock = AuctionClock::new(20);
        clock.reset();
        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(clock.remaining().unwrap().as_secs(), 5);

        // A reset 5s before expiry yields a fresh 20s, not 25s.
        clock.reset();
        assert_eq!(clock.remaining().unwrap().as_secs(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_supersedes_old_expiry() {
        let mut clock = AuctionClock::new(20);
        let first = clock.reset();
        assert!(clock.is_current(first));

        let second = clock.reset();
        assert!(!clock.is_current(first));
        assert!(clock.is_current(second));

        clock.cancel();
        assert!(!clock.is_current(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_restores_remaining_verbatim() {
        let mut clock = AuctionClock::new(20);
        clock.reset();
        tokio::time::advance(Duration::from_secs(7)).await;

        let remaining = clock.pause().unwrap();
        assert_eq!(remaining, 13);
        assert!(!clock.is_armed());

        clock.resume(remaining);
        assert_eq!(clock.remaining().unwrap().as_secs(), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_unarmed_is_none() {
        let mut clock = AuctionClock::new(20);
        assert!(clock.pause().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_window_applies_on_next_reset() {
        let mut clock = AuctionClock::new(20);
        clock.reset();
        clock.set_window_secs(40);
        assert_eq!(clock.remaining().unwrap().as_secs(), 20);
        clock.reset();
        assert_eq!(clock.remaining().unwrap().as_secs(), 40);
    }
}
