use dashmap::DashMap;
use serenity::model::id::UserId;
use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};
use tracing::debug;

/// Per-user sliding window limit on bot commands.
pub struct Cooldown {
    max_commands: usize,
    window: Duration,
    history: DashMap<UserId, VecDeque<Instant>>,
}

impl Cooldown {
    pub fn new(max_commands: u32, window: Duration) -> Self {
        Self {
            max_commands: max_commands as usize,
            window,
            history: DashMap::new(),
        }
    }

    /// Records a command from `user`, or returns how long until they may send
    /// another one.
    pub fn check(&self, user: UserId) -> Result<(), Duration> {
        self.check_at(user, Instant::now())
    }

    fn check_at(&self, user: UserId, now: Instant) -> Result<(), Duration> {
        // Users whose latest command left the window have nothing left to count.
        self.history
            .retain(|_, sent| sent.back().is_some_and(|last| now.duration_since(*last) < self.window));

        let mut history = self.history.entry(user).or_default();

        while history
            .front()
            .is_some_and(|sent| now.duration_since(*sent) >= self.window)
        {
            history.pop_front();
        }

        if history.len() >= self.max_commands {
            let oldest = history.front().copied().unwrap_or(now);
            let retry_after = self.window.saturating_sub(now.duration_since(oldest));
            debug!("user {} on cooldown for {:?}", user, retry_after);
            return Err(retry_after);
        }

        history.push_back(now);
        Ok(())
    }

    pub fn message(retry_after: Duration) -> String {
        format!(
            "This command is on cooldown. Try again in {:.2} seconds.",
            retry_after.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_within_window() {
        let cooldown = Cooldown::new(2, Duration::from_secs(10));
        let user = UserId::new(1);
        let start = Instant::now();

        assert!(cooldown.check_at(user, start).is_ok());
        assert!(cooldown.check_at(user, start + Duration::from_secs(1)).is_ok());

        let retry = cooldown.check_at(user, start + Duration::from_secs(4)).unwrap_err();
        assert_eq!(retry, Duration::from_secs(6));
    }

    #[test]
    fn test_window_slides() {
        let cooldown = Cooldown::new(1, Duration::from_secs(10));
        let user = UserId::new(1);
        let start = Instant::now();

        assert!(cooldown.check_at(user, start).is_ok());
        assert!(cooldown.check_at(user, start + Duration::from_secs(9)).is_err());
        assert!(cooldown.check_at(user, start + Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn test_users_are_independent() {
        let cooldown = Cooldown::new(1, Duration::from_secs(10));
        let start = Instant::now();

        assert!(cooldown.check_at(UserId::new(1), start).is_ok());
        assert!(cooldown.check_at(UserId::new(2), start).is_ok());
    }

    #[test]
    fn test_idle_users_are_forgotten() {
        let cooldown = Cooldown::new(2, Duration::from_secs(10));
        let start = Instant::now();

        assert!(cooldown.check_at(UserId::new(1), start).is_ok());
        assert!(cooldown.check_at(UserId::new(2), start + Duration::from_secs(5)).is_ok());
        assert_eq!(cooldown.history.len(), 2);

        assert!(cooldown.check_at(UserId::new(2), start + Duration::from_secs(11)).is_ok());
        assert_eq!(cooldown.history.len(), 1);
        assert!(!cooldown.history.contains_key(&UserId::new(1)));
    }

    #[test]
    fn test_message_format() {
        assert_eq!(
            Cooldown::message(Duration::from_millis(2500)),
            "This command is on cooldown. Try again in 2.50 seconds."
        );
    }
}
