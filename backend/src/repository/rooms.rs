use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use socketioxide::socket::Sid;

use types::domain::RoomSummary;

/// Room membership. A room exists only while it has at least one member.
///
/// `memberships` is the reverse index used by [`RoomRepository::leave_all`], so a
/// disconnect only touches the rooms that socket was actually in. The two maps are
/// never locked at the same time.
#[derive(Clone, Default)]
pub struct RoomRepository {
    rooms: Arc<DashMap<String, HashMap<Sid, String>>>,
    memberships: Arc<DashMap<Sid, HashSet<String>>>,
}

impl RoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `sid` to `room`. Returns false if it was already a member, in which case
    /// only its display name is refreshed.
    pub fn join(&self, room: &str, sid: Sid, display_name: &str) -> bool {
        let joined = self
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(sid, display_name.to_string())
            .is_none();
        self.memberships
            .entry(sid)
            .or_default()
            .insert(room.to_string());
        joined
    }

    pub fn leave(&self, room: &str, sid: Sid) -> bool {
        let removed = self.detach(room, sid);
        if let Entry::Occupied(mut entry) = self.memberships.entry(sid) {
            entry.get_mut().remove(room);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
        removed
    }

    pub fn leave_all(&self, sid: Sid) -> Vec<String> {
        let Some((_, rooms)) = self.memberships.remove(&sid) else {
            return Vec::new();
        };
        for room in rooms.iter() {
            self.detach(room, sid);
        }
        rooms.into_iter().collect()
    }

    fn detach(&self, room: &str, sid: Sid) -> bool {
        match self.rooms.entry(room.to_string()) {
            Entry::Occupied(mut entry) => {
                let removed = entry.get_mut().remove(&sid).is_some();
                if entry.get().is_empty() {
                    entry.remove();
                }
                removed
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Calls `deliver` for every member of `room` and returns the members it failed for.
    ///
    /// The room is locked exclusively for the whole fan-out, which makes this the
    /// sequencing point for the room: two broadcasts never interleave per member.
    /// `deliver` must not call back into this repository.
    pub fn broadcast<F>(&self, room: &str, mut deliver: F) -> Vec<Sid>
    where
        F: FnMut(Sid) -> bool,
    {
        let Some(members) = self.rooms.get_mut(room) else {
            return Vec::new();
        };
        members
            .keys()
            .copied()
            .filter(|sid| !deliver(*sid))
            .collect()
    }

    pub fn is_member(&self, room: &str, sid: Sid) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains_key(&sid))
    }

    #[cfg(test)]
    pub fn members(&self, room: &str) -> Vec<(Sid, String)> {
        self.rooms
            .get(room)
            .map(|members| {
                members
                    .iter()
                    .map(|(sid, name)| (*sid, name.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn rooms_of(&self, sid: Sid) -> Vec<String> {
        self.memberships
            .get(&sid)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn summaries(&self) -> Vec<RoomSummary> {
        let mut summaries: Vec<RoomSummary> = self
            .rooms
            .iter()
            .map(|entry| RoomSummary {
                room: entry.key().clone(),
                members: entry.value().values().cloned().collect(),
            })
            .collect();
        summaries.sort_by(|a, b| a.room.cmp(&b.room));
        summaries
    }

    #[cfg(test)]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
