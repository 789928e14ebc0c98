//! Entity Identity Registry
//!
//! Maps server-issued entity ids to local records. The registry owns every
//! record; proxies are value snapshots that refer to their parent by id only.
//! Ids removed from the registry are tombstoned and never come back.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use rg_proto::{EntityId, EntityInfo, EntityKind};
use tracing::{debug, trace};

use crate::error::{SessionError, SessionResult};

/// Type tag the server reports for surface bodies
pub const SURFACE_TAG: &str = "Surface";

/// Local handle to a server-side entity
///
/// Two proxies are equal when they refer to the same entity id, whatever
/// their attribute snapshots say.
#[derive(Debug, Clone)]
pub struct Proxy {
    id: EntityId,
    kind: EntityKind,
    parent: Option<EntityId>,
    design: EntityId,
    name: String,
    type_tag: Option<String>,
}

impl Proxy {
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Id of the owning entity (None for designs)
    pub fn parent(&self) -> Option<&EntityId> {
        self.parent.as_ref()
    }

    /// Id of the root design
    pub fn design(&self) -> &EntityId {
        &self.design
    }

    /// Name at the time the snapshot was taken
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read-only geometric type tag (surface/curve type)
    pub fn type_tag(&self) -> Option<&str> {
        self.type_tag.as_deref()
    }

    /// Whether this is a surface body rather than a solid
    pub fn is_surface(&self) -> bool {
        self.kind == EntityKind::Body && self.type_tag() == Some(SURFACE_TAG)
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Proxy {}

impl Hash for Proxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Registry entry for one live entity
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub kind: EntityKind,
    /// Weak back-reference; lookup only
    pub parent: Option<EntityId>,
    pub design: EntityId,
    pub children: Vec<EntityId>,
    pub name: String,
    pub type_tag: Option<String>,
}

/// Whether an entity of kind `child` may hang below one of kind `parent`
fn parent_allowed(child: EntityKind, parent: EntityKind) -> bool {
    match child {
        EntityKind::Design => false,
        EntityKind::Component | EntityKind::Body => parent.is_container(),
        EntityKind::Face | EntityKind::Edge | EntityKind::Vertex => !parent.is_container(),
    }
}

/// Identity map from entity ids to records
#[derive(Debug, Default)]
pub struct Registry {
    records: HashMap<EntityId, EntityRecord>,
    dead: HashSet<EntityId>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity reported by the server
    ///
    /// Registering a known id returns the existing proxy (with its name and
    /// type tag refreshed) instead of creating a second record.
    pub fn register(&mut self, info: &EntityInfo) -> SessionResult<Proxy> {
        if self.dead.contains(&info.id) {
            return Err(SessionError::ProtocolError(format!(
                "server reported deleted entity {} as live",
                info.id
            )));
        }

        if let Some(record) = self.records.get_mut(&info.id) {
            if record.kind != info.kind {
                return Err(SessionError::ProtocolError(format!(
                    "entity {} registered as {} but reported as {}",
                    info.id, record.kind, info.kind
                )));
            }
            record.name = info.name.clone();
            if info.type_tag.is_some() {
                record.type_tag = info.type_tag.clone();
            }
            return Ok(Self::proxy_of(&info.id, record));
        }

        let design = match (&info.parent, info.kind) {
            (None, EntityKind::Design) => info.id.clone(),
            (None, kind) => {
                return Err(SessionError::ProtocolError(format!(
                    "{kind} {} has no parent",
                    info.id
                )));
            }
            (Some(parent_id), kind) => {
                let parent = self.records.get_mut(parent_id).ok_or_else(|| {
                    SessionError::ProtocolError(format!(
                        "{kind} {} has unknown parent {parent_id}",
                        info.id
                    ))
                })?;
                if !parent_allowed(kind, parent.kind) {
                    return Err(SessionError::ProtocolError(format!(
                        "{kind} {} cannot belong to {} {parent_id}",
                        info.id, parent.kind
                    )));
                }
                parent.children.push(info.id.clone());
                parent.design.clone()
            }
        };

        let record = EntityRecord {
            kind: info.kind,
            parent: info.parent.clone(),
            design,
            children: Vec::new(),
            name: info.name.clone(),
            type_tag: info.type_tag.clone(),
        };
        trace!("Registered {} {}", info.kind, info.id);
        let proxy = Self::proxy_of(&info.id, &record);
        self.records.insert(info.id.clone(), record);
        Ok(proxy)
    }

    /// Check a batch of server-reported entities before any of it is applied
    ///
    /// Every parent must be live or appear earlier in the batch, and no id may
    /// be tombstoned or clash with a live entity of another kind.
    pub fn validate_batch(&self, batch: &[EntityInfo]) -> SessionResult<()> {
        let mut pending: HashMap<&EntityId, EntityKind> = HashMap::new();

        for info in batch {
            if self.dead.contains(&info.id) {
                return Err(SessionError::ProtocolError(format!(
                    "server reported deleted entity {} as created",
                    info.id
                )));
            }
            if let Some(record) = self.records.get(&info.id) {
                if record.kind != info.kind {
                    return Err(SessionError::ProtocolError(format!(
                        "entity {} reported as {} but known as {}",
                        info.id, info.kind, record.kind
                    )));
                }
            }

            match &info.parent {
                None if info.kind == EntityKind::Design => {}
                None => {
                    return Err(SessionError::ProtocolError(format!(
                        "{} {} has no parent",
                        info.kind, info.id
                    )));
                }
                Some(parent) => {
                    let parent_kind = pending
                        .get(parent)
                        .copied()
                        .or_else(|| self.records.get(parent).map(|r| r.kind))
                        .ok_or_else(|| {
                            SessionError::ProtocolError(format!(
                                "{} {} has unknown parent {parent}",
                                info.kind, info.id
                            ))
                        })?;
                    if !parent_allowed(info.kind, parent_kind) {
                        return Err(SessionError::ProtocolError(format!(
                            "{} {} cannot belong to {parent_kind} {parent}",
                            info.kind, info.id
                        )));
                    }
                }
            }
            pending.insert(&info.id, info.kind);
        }
        Ok(())
    }

    /// Look up a live entity; dead and unknown ids are "not found"
    pub fn resolve(&self, id: &EntityId) -> Option<Proxy> {
        self.records.get(id).map(|record| Self::proxy_of(id, record))
    }

    pub fn record(&self, id: &EntityId) -> Option<&EntityRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.records.contains_key(id)
    }

    /// Whether the id was live once and has been invalidated
    pub fn is_dead(&self, id: &EntityId) -> bool {
        self.dead.contains(id)
    }

    /// Mark an entity dead
    ///
    /// An entity with live children takes its whole subtree with it.
    /// Returns false if the id was not live.
    pub fn invalidate(&mut self, id: &EntityId) -> bool {
        let has_children = match self.records.get(id) {
            Some(record) => !record.children.is_empty(),
            None => return false,
        };
        if has_children {
            return !self.invalidate_subtree(id).is_empty();
        }
        let Some(record) = self.records.remove(id) else {
            return false;
        };
        self.detach(id, record.parent.as_ref());
        self.dead.insert(id.clone());
        debug!("Invalidated {} {}", record.kind, id);
        true
    }

    /// Mark an entity and all of its descendants dead
    ///
    /// Returns every removed id, depth-first with the root first.
    pub fn invalidate_subtree(&mut self, id: &EntityId) -> Vec<EntityId> {
        if !self.records.contains_key(id) {
            return Vec::new();
        }
        let mut removed = Vec::new();
        self.collect_depth_first(id, &mut removed);

        let parent = self.records.get(id).and_then(|r| r.parent.clone());
        self.detach(id, parent.as_ref());
        for dead in &removed {
            self.records.remove(dead);
            self.dead.insert(dead.clone());
        }
        debug!("Invalidated subtree of {} ({} entities)", id, removed.len());
        removed
    }

    /// Live children of an entity, in registration order
    pub fn children(&self, id: &EntityId) -> Vec<Proxy> {
        self.records
            .get(id)
            .map(|record| {
                record
                    .children
                    .iter()
                    .filter_map(|child| self.resolve(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ids of all live descendants (not including `id`)
    pub fn descendants(&self, id: &EntityId) -> Vec<EntityId> {
        let mut result = Vec::new();
        self.collect_depth_first(id, &mut result);
        if !result.is_empty() {
            result.remove(0);
        }
        result
    }

    /// Root design of a live entity
    pub fn design_of(&self, id: &EntityId) -> Option<EntityId> {
        self.records.get(id).map(|r| r.design.clone())
    }

    /// Update the name snapshot of a live entity
    pub fn rename(&mut self, id: &EntityId, name: impl Into<String>) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                record.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Number of live entities
    pub fn live_count(&self) -> usize {
        self.records.len()
    }

    /// Ids of all live designs
    pub fn designs(&self) -> Vec<EntityId> {
        let mut designs: Vec<EntityId> = self
            .records
            .iter()
            .filter(|(_, r)| r.kind == EntityKind::Design)
            .map(|(id, _)| id.clone())
            .collect();
        designs.sort();
        designs
    }

    fn collect_depth_first(&self, id: &EntityId, result: &mut Vec<EntityId>) {
        let Some(record) = self.records.get(id) else {
            return;
        };
        result.push(id.clone());
        for child in &record.children {
            self.collect_depth_first(child, result);
        }
    }

    fn detach(&mut self, id: &EntityId, parent: Option<&EntityId>) {
        if let Some(parent) = parent.and_then(|p| self.records.get_mut(p)) {
            parent.children.retain(|child| child != id);
        }
    }

    fn proxy_of(id: &EntityId, record: &EntityRecord) -> Proxy {
        Proxy {
            id: id.clone(),
            kind: record.kind,
            parent: record.parent.clone(),
            design: record.design.clone(),
            name: record.name.clone(),
            type_tag: record.type_tag.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str, kind: EntityKind, parent: Option<&str>) -> EntityInfo {
        EntityInfo::new(id, kind, parent.map(EntityId::from), id.to_uppercase())
    }

    fn sample() -> Registry {
        let mut registry = Registry::new();
        for entity in [
            info("d1", EntityKind::Design, None),
            info("c1", EntityKind::Component, Some("d1")),
            info("b1", EntityKind::Body, Some("c1")),
            info("f1", EntityKind::Face, Some("b1")),
            info("e1", EntityKind::Edge, Some("b1")),
            info("v1", EntityKind::Vertex, Some("b1")),
            info("b2", EntityKind::Body, Some("d1")),
        ] {
            registry.register(&entity).unwrap();
        }
        registry
    }

    #[test]
    fn test_resolve_returns_queried_id() {
        let registry = sample();
        for id in ["d1", "c1", "b1", "f1", "e1", "v1", "b2"] {
            let proxy = registry.resolve(&id.into()).unwrap();
            assert_eq!(proxy.id().as_str(), id);
            assert_eq!(proxy.design().as_str(), "d1");
        }
        assert!(registry.resolve(&"nope".into()).is_none());
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = sample();
        let mut renamed = info("b1", EntityKind::Body, Some("c1"));
        renamed.name = "Bracket".into();

        let proxy = registry.register(&renamed).unwrap();
        assert_eq!(proxy.name(), "Bracket");
        assert_eq!(registry.live_count(), 7);
        assert_eq!(registry.children(&"c1".into()).len(), 1);
    }

    #[test]
    fn test_register_kind_mismatch() {
        let mut registry = sample();
        let clash = info("b1", EntityKind::Component, Some("d1"));
        assert!(matches!(
            registry.register(&clash),
            Err(SessionError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_register_requires_parent() {
        let mut registry = Registry::new();
        let orphan = info("b9", EntityKind::Body, Some("missing"));
        assert!(registry.register(&orphan).is_err());

        let face_on_design = info("f9", EntityKind::Face, Some("d1"));
        registry.register(&info("d1", EntityKind::Design, None)).unwrap();
        assert!(registry.register(&face_on_design).is_err());
    }

    #[test]
    fn test_invalidate_subtree_cascades() {
        let mut registry = sample();
        let removed = registry.invalidate_subtree(&"c1".into());
        assert_eq!(removed.len(), 5);
        assert_eq!(removed[0].as_str(), "c1");

        for id in ["c1", "b1", "f1", "e1", "v1"] {
            assert!(registry.resolve(&id.into()).is_none());
            assert!(registry.is_dead(&id.into()));
        }
        assert!(registry.resolve(&"b2".into()).is_some());
        let remaining: Vec<_> = registry.children(&"d1".into());
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id().as_str(), "b2");
    }

    #[test]
    fn test_dead_ids_are_never_reused() {
        let mut registry = sample();
        assert!(registry.invalidate(&"b2".into()));
        assert!(!registry.invalidate(&"b2".into()));
        let again = info("b2", EntityKind::Body, Some("d1"));
        assert!(registry.register(&again).is_err());
    }

    #[test]
    fn test_invalidate_parent_takes_children() {
        let mut registry = sample();
        assert!(registry.invalidate(&"b1".into()));
        for id in ["b1", "f1", "e1", "v1"] {
            assert!(registry.resolve(&id.into()).is_none());
            assert!(registry.is_dead(&id.into()));
        }
        assert!(registry.children(&"c1".into()).is_empty());
        assert_eq!(registry.live_count(), 3);
    }

    #[test]
    fn test_validate_batch() {
        let registry = sample();
        let ok = vec![
            info("c2", EntityKind::Component, Some("d1")),
            info("b3", EntityKind::Body, Some("c2")),
        ];
        assert!(registry.validate_batch(&ok).is_ok());

        let out_of_order = vec![
            info("b3", EntityKind::Body, Some("c2")),
            info("c2", EntityKind::Component, Some("d1")),
        ];
        assert!(registry.validate_batch(&out_of_order).is_err());
    }

    #[test]
    fn test_proxy_equality_by_id() {
        let registry = sample();
        let a = registry.resolve(&"b1".into()).unwrap();
        let mut other = sample();
        other.rename(&"b1".into(), "Renamed");
        let b = other.resolve(&"b1".into()).unwrap();
        assert_ne!(a.name(), b.name());
        assert_eq!(a, b);
    }

    #[test]
    fn test_descendants() {
        let registry = sample();
        let ids = registry.descendants(&"d1".into());
        assert_eq!(ids.len(), 6);
        assert!(!ids.contains(&"d1".into()));
    }
}
