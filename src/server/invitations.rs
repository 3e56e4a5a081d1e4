use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;

/// Pending invitations, kept per target: `incoming[target][source]` is the
/// moment `source` invited `target`. Mutual agreement removes both edges
/// and queues the pair for the dispatcher to start a match.
pub struct InvitationManager {
    incoming: HashMap<String, HashMap<String, Instant>>,
    agreed: Vec<(String, String)>,
    ttl: Duration,
    sweep_every: Duration,
    next_sweep: Instant,
}

impl InvitationManager {
    pub fn new(ttl: Duration, sweep_every: Duration, now: Instant) -> InvitationManager {
        InvitationManager {
            incoming: HashMap::new(),
            agreed: Vec::new(),
            ttl,
            sweep_every,
            next_sweep: now + sweep_every,
        }
    }

    /// Records that `source` invites `target`. Inviting yourself does
    /// nothing and repeating an invitation keeps its first timestamp. A
    /// counter-invitation from someone you already invited seals agreement.
    pub fn invite(&mut self, source: &str, target: &str, now: Instant) {
        if source == target {
            return;
        }
        self.incoming
            .entry(target.to_string())
            .or_default()
            .entry(source.to_string())
            .or_insert(now);
        debug!("{} invited {}", source, target);
        if self.is_invited(target, source) {
            self.users_agreed(source, target);
        }
    }

    /// Withdraws an invitation `source` sent to `target`, if any.
    pub fn cancel(&mut self, source: &str, target: &str) {
        self.remove_edge(source, target);
        debug!("{} cancelled the invitation of {}", source, target);
    }

    /// Accepts the invitation `source` sent to `target`. A stale accept,
    /// for one that expired or was cancelled, does nothing.
    pub fn accept(&mut self, source: &str, target: &str) {
        if self.is_invited(source, target) {
            self.users_agreed(source, target);
        }
    }

    /// Declines the invitation `source` sent to `target`.
    pub fn reject(&mut self, source: &str, target: &str) {
        self.remove_edge(source, target);
        debug!("{} rejected the invitation from {}", target, source);
    }

    /// Whether `source` currently invites `target`.
    pub fn is_invited(&self, source: &str, target: &str) -> bool {
        self.incoming
            .get(target)
            .map(|sources| sources.contains_key(source))
            .unwrap_or(false)
    }

    /// Names of everyone currently inviting `target`, sorted for a stable
    /// listing.
    pub fn inviters_of(&self, target: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .incoming
            .get(target)
            .map(|sources| sources.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Pairs whose invitations matched since the last drain, in the order
    /// agreement was reached.
    pub fn drain_agreed(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.agreed)
    }

    /// Drops invitations older than the TTL. Rate-limits itself; calling
    /// more often than the sweep interval is fine.
    pub fn sweep(&mut self, now: Instant) {
        if now < self.next_sweep {
            return;
        }
        self.next_sweep = now + self.sweep_every;
        let ttl = self.ttl;
        let mut dropped = 0usize;
        self.incoming.retain(|_, sources| {
            sources.retain(|_, created| {
                let keep = now.saturating_duration_since(*created) < ttl;
                if !keep {
                    dropped += 1;
                }
                keep
            });
            !sources.is_empty()
        });
        if dropped > 0 {
            debug!("Dropped {} expired invitations", dropped);
        }
    }

    fn users_agreed(&mut self, source: &str, target: &str) {
        self.remove_edge(source, target);
        self.remove_edge(target, source);
        debug!("{} and {} agreed to play", source, target);
        self.agreed.push((source.to_string(), target.to_string()));
    }

    fn remove_edge(&mut self, source: &str, target: &str) {
        if let Some(sources) = self.incoming.get_mut(target) {
            sources.remove(source);
            if sources.is_empty() {
                self.incoming.remove(target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(now: Instant) -> InvitationManager {
        InvitationManager::new(Duration::from_secs(600), Duration::from_secs(180), now)
    }

    #[test]
    fn mutual_invitations_agree_once() {
        let now = Instant::now();
        let mut invitations = manager(now);
        invitations.invite("alice", "bob", now);
        assert!(invitations.is_invited("alice", "bob"));
        assert!(invitations.drain_agreed().is_empty());

        invitations.invite("bob", "alice", now);
        assert_eq!(
            invitations.drain_agreed(),
            vec![("bob".to_string(), "alice".to_string())]
        );
        // Both edges are consumed by the agreement.
        assert!(!invitations.is_invited("alice", "bob"));
        assert!(!invitations.is_invited("bob", "alice"));
        assert!(invitations.drain_agreed().is_empty());
    }

    #[test]
    fn accepting_a_pending_invitation_agrees() {
        let now = Instant::now();
        let mut invitations = manager(now);
        invitations.invite("alice", "bob", now);
        invitations.accept("alice", "bob");
        assert_eq!(
            invitations.drain_agreed(),
            vec![("alice".to_string(), "bob".to_string())]
        );
        assert!(!invitations.is_invited("alice", "bob"));
    }

    #[test]
    fn stale_accepts_and_rejects_do_nothing() {
        let now = Instant::now();
        let mut invitations = manager(now);
        invitations.accept("alice", "bob");
        assert!(invitations.drain_agreed().is_empty());

        invitations.invite("alice", "bob", now);
        invitations.reject("alice", "bob");
        assert!(!invitations.is_invited("alice", "bob"));
        invitations.accept("alice", "bob");
        assert!(invitations.drain_agreed().is_empty());
    }

    #[test]
    fn cancelling_withdraws_only_that_edge() {
        let now = Instant::now();
        let mut invitations = manager(now);
        invitations.invite("alice", "bob", now);
        invitations.invite("carol", "bob", now);
        invitations.cancel("alice", "bob");
        assert!(!invitations.is_invited("alice", "bob"));
        assert!(invitations.is_invited("carol", "bob"));
        assert_eq!(invitations.inviters_of("bob"), vec!["carol".to_string()]);
    }

    #[test]
    fn self_invitations_are_ignored() {
        let now = Instant::now();
        let mut invitations = manager(now);
        invitations.invite("alice", "alice", now);
        assert!(!invitations.is_invited("alice", "alice"));
        assert!(invitations.inviters_of("alice").is_empty());
    }

    #[test]
    fn inviters_are_listed_sorted() {
        let now = Instant::now();
        let mut invitations = manager(now);
        invitations.invite("carol", "bob", now);
        invitations.invite("alice", "bob", now);
        assert_eq!(
            invitations.inviters_of("bob"),
            vec!["alice".to_string(), "carol".to_string()]
        );
    }

    #[test]
    fn sweep_expires_old_invitations() {
        let now = Instant::now();
        let mut invitations = manager(now);
        invitations.invite("alice", "bob", now);
        invitations.invite("carol", "bob", now + Duration::from_secs(500));

        // Before the sweep interval nothing happens, even past the TTL.
        invitations.sweep(now + Duration::from_secs(60));
        assert!(invitations.is_invited("alice", "bob"));

        invitations.sweep(now + Duration::from_secs(700));
        assert!(!invitations.is_invited("alice", "bob"));
        assert!(invitations.is_invited("carol", "bob"));
    }

    #[test]
    fn repeated_invitations_keep_the_first_timestamp() {
        let now = Instant::now();
        let mut invitations = manager(now);
        invitations.invite("alice", "bob", now);
        invitations.invite("alice", "bob", now + Duration::from_secs(550));
        invitations.sweep(now + Duration::from_secs(650));
        assert!(!invitations.is_invited("alice", "bob"));
    }
}
