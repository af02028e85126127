use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::notify::NotificationBus;
use super::scheduler::BatchScheduler;
use super::Callback;
use crate::atlas::AtlasGeneration;
use crate::sprite::PendingItem;

/// Generational reference into the atlas arena.
///
/// The epoch changes whenever a slot is released, so an id taken before a
/// release never matches the state created after it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtlasId {
    index: usize,
    epoch: u64,
}

impl fmt::Debug for AtlasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtlasId({}@{})", self.index, self.epoch)
    }
}

/// Identifies one build pass of one atlas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildTicket(pub(crate) u64);

/// Everything the manager tracks for one atlas name
pub(crate) struct AtlasState {
    pub name: String,
    pub generation: Option<Arc<AtlasGeneration>>,
    /// Version of `generation`; 0 while nothing is published
    pub version: u64,
    /// Last version of a released atlas of the same name. The first
    /// publish continues above it.
    pub version_floor: u64,
    pub building: Option<BuildTicket>,
    /// Names in the running build pass, in insertion order
    pub in_flight: Vec<String>,
    /// Next batch, in insertion order
    pub pending: Vec<PendingItem>,
    pub callbacks: HashMap<String, Vec<Callback>>,
    pub scheduler: BatchScheduler,
    pub bus: NotificationBus,
}

impl AtlasState {
    pub fn new(name: &str, version_floor: u64) -> Self {
        Self {
            name: name.to_string(),
            generation: None,
            version: 0,
            version_floor,
            building: None,
            in_flight: Vec::new(),
            pending: Vec::new(),
            callbacks: HashMap::new(),
            scheduler: BatchScheduler::default(),
            bus: NotificationBus::default(),
        }
    }

    /// Bump the version for a new published generation
    pub fn next_version(&mut self) -> u64 {
        self.version = self.version.max(self.version_floor) + 1;
        self.version
    }

    /// Highest version this name has reached, published or remembered
    pub fn last_version(&self) -> u64 {
        self.version.max(self.version_floor)
    }

    pub fn is_building(&self) -> bool {
        self.building.is_some()
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.iter().any(|item| item.name == name)
    }

    pub fn is_in_flight(&self, name: &str) -> bool {
        self.in_flight.iter().any(|n| n == name)
    }

    /// Ready to start a build at `now`
    pub fn is_due(&self, now: Duration) -> bool {
        !self.is_building() && !self.pending.is_empty() && self.scheduler.is_due(now)
    }

    /// No pending items and no build running
    pub fn is_idle(&self) -> bool {
        !self.is_building() && self.pending.is_empty()
    }

    pub fn queue_callback(&mut self, name: &str, callback: Callback) {
        self.callbacks
            .entry(name.to_string())
            .or_default()
            .push(callback);
    }
}

struct Slot {
    epoch: u64,
    state: Option<AtlasState>,
}

/// Slot arena of atlas states with a name lookup table
#[derive(Default)]
pub(crate) struct AtlasArena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    by_name: HashMap<String, AtlasId>,
}

impl AtlasArena {
    pub fn lookup(&self, name: &str) -> Option<AtlasId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: AtlasId) -> Option<&AtlasState> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.epoch == id.epoch)
            .and_then(|slot| slot.state.as_ref())
    }

    pub fn get_mut(&mut self, id: AtlasId) -> Option<&mut AtlasState> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.epoch == id.epoch)
            .and_then(|slot| slot.state.as_mut())
    }

    pub fn by_name(&self, name: &str) -> Option<&AtlasState> {
        self.lookup(name).and_then(|id| self.get(id))
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut AtlasState> {
        let id = self.lookup(name)?;
        self.get_mut(id)
    }

    /// State registered under `name`, created with `create` if absent
    pub fn get_or_insert_with(
        &mut self,
        name: &str,
        create: impl FnOnce() -> AtlasState,
    ) -> &mut AtlasState {
        let id = match self.lookup(name) {
            Some(id) => id,
            None => self.reserve(name),
        };
        self.slots[id.index].state.get_or_insert_with(create)
    }

    /// Claim an empty slot for `name`
    fn reserve(&mut self, name: &str) -> AtlasId {
        let id = match self.free.pop() {
            Some(index) => AtlasId {
                index,
                epoch: self.slots[index].epoch,
            },
            None => {
                self.slots.push(Slot {
                    epoch: 0,
                    state: None,
                });
                AtlasId {
                    index: self.slots.len() - 1,
                    epoch: 0,
                }
            }
        };
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn remove(&mut self, name: &str) -> Option<AtlasState> {
        let id = self.by_name.remove(name)?;
        let slot = self.slots.get_mut(id.index)?;
        if slot.epoch != id.epoch {
            return None;
        }
        let state = slot.state.take();
        slot.epoch = slot.epoch.wrapping_add(1);
        self.free.push(id.index);
        state
    }

    pub fn ids(&self) -> Vec<AtlasId> {
        self.by_name.values().copied().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.by_name.keys().cloned().collect()
    }

    pub fn states(&self) -> impl Iterator<Item = &AtlasState> {
        self.slots.iter().filter_map(|slot| slot.state.as_ref())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_released_id_never_matches_reused_slot() {
        let mut arena = AtlasArena::default();
        arena.get_or_insert_with("ui", || AtlasState::new("ui", 0));
        let first = arena.lookup("ui").unwrap();
        assert!(arena.get(first).is_some());

        assert!(arena.remove("ui").is_some());
        assert!(arena.get(first).is_none());

        arena.get_or_insert_with("ui", || AtlasState::new("ui", 0));
        let second = arena.lookup("ui").unwrap();
        assert_eq!(second.index, first.index);
        assert_ne!(second, first);
        assert!(arena.get(first).is_none());
        assert!(arena.get_mut(first).is_none());
        assert_eq!(arena.by_name("ui").map(|s| s.name.as_str()), Some("ui"));
    }

    #[test]
    fn test_get_or_insert_with_creates_once() {
        let mut arena = AtlasArena::default();
        assert_eq!(
            arena
                .get_or_insert_with("ui", || AtlasState::new("ui", 4))
                .next_version(),
            5
        );
        let state = arena.get_or_insert_with("ui", || AtlasState::new("ui", 0));
        assert_eq!(state.version, 5);
        assert_eq!(state.version_floor, 4);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_floor_is_not_a_published_version() {
        let mut state = AtlasState::new("ui", 7);
        assert_eq!(state.version, 0);
        assert_eq!(state.last_version(), 7);

        assert_eq!(state.next_version(), 8);
        assert_eq!(state.next_version(), 9);
        assert_eq!(state.last_version(), 9);
    }

    #[test]
    fn test_remove_unknown_is_none() {
        let mut arena = AtlasArena::default();
        assert!(arena.remove("nope").is_none());
        assert_eq!(arena.len(), 0);
    }
}
