//! Client sessions and their player entities.

use std::collections::BTreeMap;
use std::fmt;

use hearth_ecs::entity::EntityId;
use serde::{Deserialize, Serialize};

/// Transport-assigned client session identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One-to-one `SessionId <-> EntityId` mapping.
///
/// Both directions are updated together, so a lookup either way always
/// agrees with the other.
#[derive(Debug, Clone, Default)]
pub struct SessionMap {
    by_session: BTreeMap<SessionId, EntityId>,
    by_entity: BTreeMap<EntityId, SessionId>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `session` to `entity`. Returns `false` and changes nothing if
    /// either side is already bound.
    pub fn bind(&mut self, session: SessionId, entity: EntityId) -> bool {
        if self.by_session.contains_key(&session) || self.by_entity.contains_key(&entity) {
            return false;
        }
        self.by_entity.insert(entity, session.clone());
        self.by_session.insert(session, entity);
        true
    }

    /// Remove the binding for `session`, returning its entity.
    pub fn unbind(&mut self, session: &SessionId) -> Option<EntityId> {
        let entity = self.by_session.remove(session)?;
        self.by_entity.remove(&entity);
        Some(entity)
    }

    pub fn entity(&self, session: &SessionId) -> Option<EntityId> {
        self.by_session.get(session).copied()
    }

    pub fn session(&self, entity: EntityId) -> Option<&SessionId> {
        self.by_entity.get(&entity)
    }

    pub fn contains(&self, session: &SessionId) -> bool {
        self.by_session.contains_key(session)
    }

    /// Sessions in ascending id order.
    pub fn sessions(&self) -> impl Iterator<Item = &SessionId> {
        self.by_session.keys()
    }

    pub fn len(&self) -> usize {
        self.by_session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_session.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_and_lookup_both_ways() {
        let mut map = SessionMap::new();
        let e = EntityId::new(3, 1);
        assert!(map.bind("alice".into(), e));
        assert_eq!(map.entity(&"alice".into()), Some(e));
        assert_eq!(map.session(e).map(SessionId::as_str), Some("alice"));
    }

    #[test]
    fn double_bind_is_refused() {
        let mut map = SessionMap::new();
        let e1 = EntityId::new(0, 0);
        let e2 = EntityId::new(1, 0);
        assert!(map.bind("a".into(), e1));
        assert!(!map.bind("a".into(), e2), "session already bound");
        assert!(!map.bind("b".into(), e1), "entity already bound");
        assert_eq!(map.len(), 1);
        assert_eq!(map.session(e2), None);
    }

    #[test]
    fn unbind_clears_both_sides() {
        let mut map = SessionMap::new();
        let e = EntityId::new(0, 0);
        map.bind("a".into(), e);
        assert_eq!(map.unbind(&"a".into()), Some(e));
        assert_eq!(map.session(e), None);
        assert!(map.is_empty());
        assert_eq!(map.unbind(&"a".into()), None);
    }

    #[test]
    fn session_id_serializes_as_plain_string() {
        let id = SessionId::new("xyz");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"xyz\"");
        assert_eq!(id.to_string(), "xyz");
    }
}
