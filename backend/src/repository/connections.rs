use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use socketioxide::socket::Sid;
use uuid::Uuid;

/// Live connection per user. At most one socket is mapped to a user at a time.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    by_user: Arc<DashMap<Uuid, Sid>>,
    by_sid: Arc<DashMap<Sid, Uuid>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: Uuid, sid: Sid) -> Option<Sid> {
        // by_user is always locked before by_sid
        match self.by_user.entry(user_id) {
            Entry::Occupied(mut entry) => {
                let previous = entry.insert(sid);
                self.by_sid.insert(sid, user_id);
                if previous == sid {
                    return None;
                }
                self.by_sid.remove(&previous);
                Some(previous)
            }
            Entry::Vacant(entry) => {
                entry.insert(sid);
                self.by_sid.insert(sid, user_id);
                None
            }
        }
    }

    /// Forgets `sid`. The user's mapping is only removed while it still points at `sid`,
    /// so a late disconnect of a superseded socket leaves the newer one in place.
    ///
    /// Returns the user whose mapping was removed.
    pub fn unregister(&self, sid: Sid) -> Option<Uuid> {
        let user_id = self.by_sid.get(&sid).map(|entry| *entry)?;
        let removed = self
            .by_user
            .remove_if(&user_id, |_, current| *current == sid)
            .is_some();
        self.by_sid.remove(&sid);
        removed.then_some(user_id)
    }

    pub fn lookup(&self, user_id: Uuid) -> Option<Sid> {
        self.by_user.get(&user_id).map(|entry| *entry)
    }

    #[cfg(test)]
    pub fn user_of(&self, sid: Sid) -> Option<Uuid> {
        self.by_sid.get(&sid).map(|entry| *entry)
    }

    pub fn is_current(&self, user_id: Uuid, sid: Sid) -> bool {
        self.lookup(user_id) == Some(sid)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}
