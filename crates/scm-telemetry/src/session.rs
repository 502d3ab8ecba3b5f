//! Process-wide telemetry session id
//!
//! Every sample logged by one process carries the same random session id so
//! events from a single run can be correlated. The id lives only in memory and
//! a restarted process draws a new one.

use std::fmt;
use std::sync::OnceLock;

static PROCESS_SESSION: OnceLock<SessionId> = OnceLock::new();

/// Random 32-bit identifier shared by all samples from one process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u32);

impl SessionId {
    /// The session id of the current process, drawn on first use.
    ///
    /// Concurrent first calls may each draw a candidate, but only one is
    /// stored and every caller observes that one.
    pub fn current() -> Self {
        *PROCESS_SESSION.get_or_init(Self::generate)
    }

    /// Draw a fresh id uniformly from the full `u32` range
    pub fn generate() -> Self {
        Self(rand::random())
    }

    pub fn from_raw(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_current_is_stable() {
        let first = SessionId::current();
        let second = SessionId::current();
        assert_eq!(first, second);
    }

    #[test]
    fn test_current_agrees_across_threads() {
        let ids: Vec<SessionId> = (0..8)
            .map(|_| thread::spawn(SessionId::current))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        assert!(ids.iter().all(|id| *id == SessionId::current()));
    }

    #[test]
    fn test_raw_round_trip() {
        let id = SessionId::from_raw(u32::MAX);
        assert_eq!(id.get(), u32::MAX);
        assert_eq!(id.to_string(), "4294967295");
    }
}
