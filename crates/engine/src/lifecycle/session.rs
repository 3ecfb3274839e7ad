use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::world::{Category, CategoryCounts};

use super::collaborators::MapId;

static DIAGNOSTICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_diagnostics_lock_poison_once(operation: &'static str) {
    if DIAGNOSTICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "diagnostics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPhase {
    Idle,
    Snapshotting,
    ResettingPersistent,
    Clearing,
    Reloading,
    Finalized,
    Aborted,
}

impl ResetPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ResetPhase::Finalized | ResetPhase::Aborted)
    }

    fn can_advance_to(self, next: ResetPhase) -> bool {
        matches!(
            (self, next),
            (ResetPhase::Idle, ResetPhase::Snapshotting)
                | (ResetPhase::Snapshotting, ResetPhase::ResettingPersistent)
                | (ResetPhase::Snapshotting, ResetPhase::Aborted)
                | (ResetPhase::ResettingPersistent, ResetPhase::Clearing)
                | (ResetPhase::Clearing, ResetPhase::Reloading)
                | (ResetPhase::Reloading, ResetPhase::Finalized)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    UnknownType,
    CategoryMismatch { actual: Category },
    DuplicateId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSpawn {
    pub category: Category,
    pub entry_index: usize,
    pub entity_type: String,
    pub reason: SkipReason,
}

/// The parts of a session that must match across repeated resets to the
/// same map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetCounts {
    pub before: CategoryCounts,
    pub after: CategoryCounts,
    pub repositioned: usize,
    pub cleared: usize,
    pub created: usize,
    pub skipped: usize,
    pub excluded: usize,
    pub teardown_failures: usize,
}

/// Diagnostics for one reset pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetSession {
    pub map: MapId,
    pub sequence: u64,
    pub phase: ResetPhase,
    pub before: CategoryCounts,
    pub after: CategoryCounts,
    pub repositioned: usize,
    pub cleared: usize,
    pub created: usize,
    pub excluded: usize,
    pub teardown_failures: usize,
    pub skipped: Vec<SkippedSpawn>,
    pub empty_sections: Vec<Category>,
    pub missing_persistent: Vec<Category>,
}

impl ResetSession {
    pub(crate) fn begin(map: MapId, sequence: u64) -> Self {
        Self {
            map,
            sequence,
            phase: ResetPhase::Idle,
            before: CategoryCounts::default(),
            after: CategoryCounts::default(),
            repositioned: 0,
            cleared: 0,
            created: 0,
            excluded: 0,
            teardown_failures: 0,
            skipped: Vec::new(),
            empty_sections: Vec::new(),
            missing_persistent: Vec::new(),
        }
    }

    pub(crate) fn enter(&mut self, next: ResetPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal reset phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        debug!(
            map = %self.map,
            sequence = self.sequence,
            from = ?self.phase,
            to = ?next,
            "reset_phase"
        );
        self.phase = next;
    }

    pub fn counts(&self) -> ResetCounts {
        ResetCounts {
            before: self.before.clone(),
            after: self.after.clone(),
            repositioned: self.repositioned,
            cleared: self.cleared,
            created: self.created,
            skipped: self.skipped.len(),
            excluded: self.excluded,
            teardown_failures: self.teardown_failures,
        }
    }
}

/// Read-only view of the most recent reset, shareable with telemetry.
#[derive(Clone, Debug)]
pub struct DiagnosticsHandle {
    last: Arc<RwLock<Option<ResetSession>>>,
}

impl Default for DiagnosticsHandle {
    fn default() -> Self {
        Self {
            last: Arc::new(RwLock::new(None)),
        }
    }
}

impl DiagnosticsHandle {
    pub fn snapshot(&self) -> Option<ResetSession> {
        match self.last.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                warn_diagnostics_lock_poison_once("read");
                poisoned.into_inner().clone()
            }
        }
    }

    pub(crate) fn publish(&self, session: ResetSession) {
        match self.last.write() {
            Ok(mut guard) => *guard = Some(session),
            Err(poisoned) => {
                warn_diagnostics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = Some(session);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use super::*;

    #[test]
    fn phases_only_advance_in_declared_order() {
        assert!(ResetPhase::Idle.can_advance_to(ResetPhase::Snapshotting));
        assert!(ResetPhase::Snapshotting.can_advance_to(ResetPhase::Aborted));
        assert!(!ResetPhase::Clearing.can_advance_to(ResetPhase::Aborted));
        assert!(!ResetPhase::Idle.can_advance_to(ResetPhase::Clearing));
        assert!(!ResetPhase::Reloading.can_advance_to(ResetPhase::ResettingPersistent));
        assert!(ResetPhase::Finalized.is_terminal());
        assert!(!ResetPhase::Reloading.is_terminal());
    }

    #[test]
    fn counts_ignore_sequence_and_map() {
        let mut first = ResetSession::begin(MapId(1), 0);
        first.created = 4;
        let mut second = ResetSession::begin(MapId(1), 9);
        second.created = 4;
        assert_ne!(first, second);
        assert_eq!(first.counts(), second.counts());
    }

    #[test]
    fn handle_publishes_latest_session_to_clones() {
        let handle = DiagnosticsHandle::default();
        let reader = handle.clone();
        assert!(reader.snapshot().is_none());

        handle.publish(ResetSession::begin(MapId(2), 3));
        let seen = reader.snapshot().expect("published");
        assert_eq!(seen.map, MapId(2));
        assert_eq!(seen.sequence, 3);
    }

    #[test]
    fn handle_recovers_from_poisoned_lock() {
        let handle = DiagnosticsHandle {
            last: Arc::new(RwLock::new(None)),
        };
        let poisoner = handle.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.last.write().expect("lock");
            panic!("poison diagnostics lock");
        })
        .join();

        handle.publish(ResetSession::begin(MapId(5), 1));
        assert_eq!(handle.snapshot().map(|session| session.map), Some(MapId(5)));
    }
}
