//! Online-user tracking.

use std::collections::BTreeSet;

use parley_proto::{
    UserId,
    payloads::{PresenceStatus, PresenceUpdate},
};

/// Set of users currently online, fed by the presence topic.
///
/// The tracker is the only writer of the set. Readers get a copy via
/// [`PresenceTracker::snapshot`] or point queries via
/// [`PresenceTracker::is_online`]. The set survives reconnects; the presence
/// topic corrects it as new transitions arrive.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    online: BTreeSet<UserId>,
}

impl PresenceTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one presence transition. Returns true if the set changed.
    ///
    /// ONLINE for a user already online and OFFLINE for a user not in the set
    /// are no-ops.
    pub fn on_event(&mut self, update: PresenceUpdate) -> bool {
        let changed = match update.status {
            PresenceStatus::Online => self.online.insert(update.user_id),
            PresenceStatus::Offline => self.online.remove(&update.user_id),
        };

        if changed {
            tracing::debug!(user_id = update.user_id, status = ?update.status, "presence changed");
        }
        changed
    }

    /// Whether `user_id` is currently online.
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.online.contains(&user_id)
    }

    /// Copy of the online set.
    pub fn snapshot(&self) -> BTreeSet<UserId> {
        self.online.clone()
    }

    /// Number of users online.
    pub fn len(&self) -> usize {
        self.online.len()
    }

    /// Whether nobody is online.
    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn online_then_offline() {
        let mut tracker = PresenceTracker::new();

        assert!(tracker.on_event(PresenceUpdate::online(7)));
        assert!(tracker.is_online(7));

        assert!(tracker.on_event(PresenceUpdate::offline(7)));
        assert!(!tracker.is_online(7));
    }

    #[test]
    fn duplicate_online_keeps_one_entry() {
        let mut tracker = PresenceTracker::new();
        tracker.on_event(PresenceUpdate::online(7));
        assert!(!tracker.on_event(PresenceUpdate::online(7)));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn offline_for_absent_user_is_noop() {
        let mut tracker = PresenceTracker::new();
        tracker.on_event(PresenceUpdate::online(1));

        assert!(!tracker.on_event(PresenceUpdate::offline(99)));
        assert_eq!(tracker.snapshot(), BTreeSet::from([1]));
    }

    #[test]
    fn snapshot_is_detached() {
        let mut tracker = PresenceTracker::new();
        tracker.on_event(PresenceUpdate::online(1));

        let snapshot = tracker.snapshot();
        tracker.on_event(PresenceUpdate::offline(1));

        assert!(snapshot.contains(&1));
        assert!(tracker.is_empty());
    }

    fn update_strategy() -> impl Strategy<Value = PresenceUpdate> {
        (0u64..8, any::<bool>()).prop_map(|(user_id, online)| {
            if online { PresenceUpdate::online(user_id) } else { PresenceUpdate::offline(user_id) }
        })
    }

    proptest! {
        #[test]
        fn last_event_per_user_wins(updates in prop::collection::vec(update_strategy(), 0..64)) {
            let mut tracker = PresenceTracker::new();
            let mut last = HashMap::new();

            for update in &updates {
                tracker.on_event(*update);
                last.insert(update.user_id, update.status);
            }

            for (user_id, status) in last {
                prop_assert_eq!(tracker.is_online(user_id), status == PresenceStatus::Online);
            }
        }
    }
}
