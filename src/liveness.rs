//! Liveness Tracker — per-participant heartbeat presence
//!
//! Heartbeats are lock-free, eventually-consistent updates that only
//! annotate UI/admin status; they never gate auction progress. Each
//! engine constructs (or is handed) its own tracker — there is no
//! process-wide singleton.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::LivenessConfig;

/// Derived presence status for one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Presence {
    Online,
    Offline,
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Presence::Online => write!(f, "online"),
            Presence::Offline => write!(f, "offline"),
        }
    }
}

/// Heartbeat store keyed by (league, member).
///
/// The offline threshold is 1.5x the client heartbeat interval, derived
/// from configuration rather than fixed to any specific interval value.
pub struct LivenessTracker {
    heartbeats: DashMap<(String, String), DateTime<Utc>>,
    offline_after: Duration,
    evict_after: Duration,
}

impl LivenessTracker {
    pub fn new(config: &LivenessConfig) -> Self {
        Self {
            heartbeats: DashMap::new(),
            offline_after: Duration::milliseconds(config.offline_after_ms() as i64),
            evict_after: Duration::seconds(config.eviction_after_secs() as i64),
        }
    }

    /// Record a heartbeat for a member. Lock-free; safe from any task.
    pub fn beat(&self, league_id: &str, member_id: &str) {
        self.heartbeats.insert(
            (league_id.to_string(), member_id.to_string()),
            Utc::now(),
        );
    }

    /// Derive the member's presence at `now`.
    pub fn status_at(&self, league_id: &str, member_id: &str, now: DateTime<Utc>) -> Presence {
        match self
            .heartbeats
            .get(&(league_id.to_string(), member_id.to_string()))
        {
            Some(last) if now.signed_duration_since(*last) <= self.offline_after => {
                Presence::Online
            }
            _ => Presence::Offline,
        }
    }

    pub fn status(&self, league_id: &str, member_id: &str) -> Presence {
        self.status_at(league_id, member_id, Utc::now())
    }

    /// Evict entries older than the TTL window. Called periodically by the
    /// engine loop; eviction is bookkeeping only and changes no statuses
    /// (an evicted entry was already far past the offline threshold).
    pub fn prune(&self) -> usize {
        let cutoff = Utc::now() - self.evict_after;
        let before = self.heartbeats.len();
        self.heartbeats.retain(|_, last| *last >= cutoff);
        let evicted = before - self.heartbeats.len();
        if evicted > 0 {
            debug!(evicted, "pruned stale heartbeat entries");
        }
        evicted
    }

    /// Presence of every tracked member in one league.
    pub fn league_snapshot(&self, league_id: &str) -> Vec<(String, Presence)> {
        let now = Utc::now();
        self.heartbeats
            .iter()
            .filter(|entry| entry.key().0 == league_id)
            .map(|entry| {
                let presence = if now.signed_duration_since(*entry.value()) <= self.offline_after {
                    Presence::Online
                } else {
                    Presence::Offline
                };
                (entry.key().1.clone(), presence)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(interval_secs: u64) -> LivenessTracker {
        LivenessTracker::new(&LivenessConfig {
            heartbeat_interval_secs: interval_secs,
            eviction_intervals: 30,
        })
    }

    #[test]
    fn test_online_within_window() {
        let t = tracker(10);
        t.beat("lg", "alice");
        assert_eq!(t.status("lg", "alice"), Presence::Online);
    }

    #[test]
    fn test_offline_without_heartbeat() {
        let t = tracker(10);
        assert_eq!(t.status("lg", "ghost"), Presence::Offline);
    }

    #[test]
    fn test_window_is_one_and_a_half_intervals() {
        let t = tracker(10);
        t.beat("lg", "alice");
        let now = Utc::now();

        // 14s since beat: still inside the 15s window.
        assert_eq!(
            t.status_at("lg", "alice", now + Duration::seconds(14)),
            Presence::Online
        );
        // 16s since beat: past it.
        assert_eq!(
            t.status_at("lg", "alice", now + Duration::seconds(16)),
            Presence::Offline
        );
    }

    #[test]
    fn test_beat_refreshes_window() {
        let t = tracker(10);
        t.beat("lg", "alice");
        t.beat("lg", "alice");
        assert_eq!(t.status("lg", "alice"), Presence::Online);
    }

    #[test]
    fn test_league_snapshot_scoped() {
        let t = tracker(10);
        t.beat("lg-1", "alice");
        t.beat("lg-2", "bob");
        let snapshot = t.league_snapshot("lg-1");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, "alice");
    }

    #[test]
    fn test_prune_keeps_fresh_entries() {
        let t = tracker(10);
        t.beat("lg", "alice");
        assert_eq!(t.prune(), 0);
        assert_eq!(t.status("lg", "alice"), Presence::Online);
    }
}
