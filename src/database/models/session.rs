use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One timed attempt of a user at a test block. `token` is the opaque identifier
/// handed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestSession {
    pub token: Uuid,
    pub user_id: Uuid,
    pub test_block_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub is_finished: bool,
    pub summary_score: f64,
}

impl TestSession {
    pub fn start(user_id: Uuid, test_block_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            token: Uuid::new_v4(),
            user_id,
            test_block_id,
            started_at: now,
            finished_at: None,
            is_finished: false,
            summary_score: 0.0,
        }
    }

    /// Saturates at the latest representable instant instead of overflowing
    pub fn deadline(&self, limit: Duration) -> DateTime<Utc> {
        self.started_at.checked_add_signed(limit).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Remaining time at `now`; zero once finished, never negative
    pub fn time_left(&self, limit: Duration, now: DateTime<Utc>) -> Duration {
        if self.is_finished {
            return Duration::zero();
        }
        let deadline = self.deadline(limit);
        if deadline <= now {
            return Duration::zero();
        }
        deadline.signed_duration_since(now)
    }

    pub fn is_expired(&self, limit: Duration, now: DateTime<Utc>) -> bool {
        !self.is_finished && self.deadline(limit) <= now
    }
}

/// Selection recorded for one question of one session
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestUserAnswer {
    pub id: Uuid,
    pub session_token: Uuid,
    pub question_id: Uuid,
    pub selected_answers: Vec<Uuid>,
    pub score: f64,
    pub answered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_left_is_clamped_at_zero() {
        let now = Utc::now();
        let session = TestSession::start(Uuid::new_v4(), Uuid::new_v4(), now - Duration::minutes(30));
        assert_eq!(session.time_left(Duration::minutes(10), now), Duration::zero());
        assert!(session.is_expired(Duration::minutes(10), now));
    }

    #[test]
    fn time_left_counts_down_from_start() {
        let now = Utc::now();
        let session = TestSession::start(Uuid::new_v4(), Uuid::new_v4(), now - Duration::minutes(4));
        assert_eq!(session.time_left(Duration::minutes(10), now), Duration::minutes(6));
    }

    #[test]
    fn finished_session_has_no_time_left() {
        let now = Utc::now();
        let mut session = TestSession::start(Uuid::new_v4(), Uuid::new_v4(), now);
        session.is_finished = true;
        session.finished_at = Some(now);
        assert_eq!(session.time_left(Duration::hours(1), now), Duration::zero());
        assert!(!session.is_expired(Duration::hours(1), now + Duration::hours(2)));
    }

    #[test]
    fn huge_limits_never_overflow() {
        let now = Utc::now();
        let session = TestSession::start(Uuid::new_v4(), Uuid::new_v4(), now);
        let forever = Duration::days(1_000_000_000);
        assert_eq!(session.deadline(forever), DateTime::<Utc>::MAX_UTC);
        assert!(!session.is_expired(forever, now));
        assert!(session.time_left(forever, now) > Duration::days(365));
    }
}
