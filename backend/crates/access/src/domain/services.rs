//! Domain Services
//!
//! Pure access decisions, no I/O.

/// Decide whether a session grant covers a video's requirement.
///
/// A requirement of zero or less is open to every session.
#[inline]
pub fn can_access(session_duration_minutes: i32, required_minutes: i32) -> bool {
    required_minutes <= 0 || session_duration_minutes >= required_minutes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_videos_always_allowed() {
        assert!(can_access(0, 0));
        assert!(can_access(-5, 0));
        assert!(can_access(0, -1));
    }

    #[test]
    fn test_duration_monotonicity() {
        for required in 1..=240 {
            for session in 0..=300 {
                assert_eq!(
                    can_access(session, required),
                    session >= required,
                    "session={} required={}",
                    session,
                    required
                );
            }
        }
    }

    #[test]
    fn test_boundaries() {
        assert!(!can_access(30, 60));
        assert!(can_access(60, 60));
        assert!(can_access(i32::MAX, 60));
        assert!(!can_access(i32::MIN, 1));
    }
}
