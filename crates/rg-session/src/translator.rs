//! Command Translator
//!
//! Turns typed operations and queries into wire requests and folds the
//! server's answers back into the local mirror: the identity registry, the
//! derived-data cache, the per-design revision counters and the journal.
//!
//! Mutations hold a session-wide write lock from send until the response has
//! been applied, so revisions advance in the order the server acknowledged
//! them. The mirror itself sits behind a short-lived lock that is never held
//! across a call.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use rg_proto::{EntityId, EntityInfo, EntityKind, MutationResult, Request, Response};
use rg_units::{Dimension, Distance, Quantity, UnitSystem};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, DerivedCache};
use crate::channel::Channel;
use crate::derived::{
    BoundingBox, DerivedKind, DerivedValue, MassProperties, Mesh, MidSurface, Point3D,
};
use crate::error::{SessionError, SessionResult};
use crate::journal::{Journal, JournalEntry};
use crate::operation::{Gap, Operation, Query};
use crate::registry::{Proxy, Registry, SURFACE_TAG};

/// Local effect of an acknowledged mutating operation
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub operation: &'static str,
    pub design: EntityId,
    /// Design revision after the operation
    pub revision: u64,
    pub created: Vec<Proxy>,
    pub modified: Vec<EntityId>,
    /// Every id invalidated locally, descendants of deleted entities included
    pub removed: Vec<EntityId>,
}

impl MutationOutcome {
    /// First created entity of a kind
    pub fn first_created(&self, kind: EntityKind) -> Option<&Proxy> {
        self.created.iter().find(|proxy| proxy.kind() == kind)
    }
}

/// Answer to a query
#[derive(Debug, Clone)]
pub enum QueryOutput {
    Derived(DerivedValue),
    Entities(Vec<Proxy>),
    Entity(Option<Proxy>),
    Gap(Gap),
}

#[derive(Debug, Default)]
struct Mirror {
    registry: Registry,
    cache: DerivedCache,
    revisions: HashMap<EntityId, u64>,
    journal: Journal,
    /// Entities whose server-side state is unknown after an interrupted call
    pending: BTreeSet<EntityId>,
    /// Bumped when server state becomes uncertain or is re-read; a query
    /// answer is only cached if no bump happened while it was in flight
    epoch: u64,
}

impl Mirror {
    /// Whether the entity or one of its owners awaits resynchronization
    fn needs_resync(&self, id: &EntityId) -> bool {
        let mut current = Some(id.clone());
        while let Some(id) = current {
            if self.pending.contains(&id) {
                return true;
            }
            current = self.registry.record(&id).and_then(|r| r.parent.clone());
        }
        false
    }

    fn revision_of(&self, id: &EntityId) -> SessionResult<u64> {
        let design = self
            .registry
            .design_of(id)
            .ok_or_else(|| SessionError::StaleReference(id.clone()))?;
        Ok(self.revisions.get(&design).copied().unwrap_or(0))
    }

    fn kind_of(&self, id: &EntityId) -> SessionResult<EntityKind> {
        self.registry
            .record(id)
            .map(|r| r.kind)
            .ok_or_else(|| SessionError::StaleReference(id.clone()))
    }

    /// The entity, its descendants and its owners
    fn affected_by(&self, id: &EntityId) -> Vec<EntityId> {
        let mut stale = self.registry.descendants(id);
        stale.push(id.clone());
        let mut owner = self.registry.record(id).and_then(|r| r.parent.clone());
        while let Some(current) = owner {
            owner = self.registry.record(&current).and_then(|r| r.parent.clone());
            stale.push(current);
        }
        stale
    }
}

/// Map a non-success response to the caller-facing error
fn failure(operation: &'static str, response: Response) -> SessionError {
    match response {
        Response::Rejected { diagnostic } => {
            warn!("{} rejected: {}", operation, diagnostic);
            SessionError::OperationRejected {
                operation,
                diagnostic,
            }
        }
        Response::Error { code, message } => {
            warn!("{} failed on the server: [{}] {}", operation, code, message);
            SessionError::OperationRejected {
                operation,
                diagnostic: format!("[{code}] {message}"),
            }
        }
        other => SessionError::ProtocolError(format!(
            "{operation} answered with {}",
            other.name()
        )),
    }
}

fn expect_kind(
    operation: &str,
    id: &EntityId,
    kind: EntityKind,
    allowed: &[EntityKind],
) -> SessionResult<()> {
    if allowed.contains(&kind) {
        Ok(())
    } else {
        Err(SessionError::InvalidParameter(format!(
            "{operation} cannot take {kind} {id}"
        )))
    }
}

const CONTAINERS: &[EntityKind] = &[EntityKind::Design, EntityKind::Component];
const BODY: &[EntityKind] = &[EntityKind::Body];
const PLACED: &[EntityKind] = &[EntityKind::Component, EntityKind::Body];

/// Translates typed operations into requests and applies their results
pub struct Translator {
    primary: Channel,
    queries: Option<Channel>,
    units: UnitSystem,
    tessellation_tolerance: Quantity,
    write_lock: tokio::sync::Mutex<()>,
    mirror: Mutex<Mirror>,
}

impl Translator {
    pub fn new(
        primary: Channel,
        queries: Option<Channel>,
        units: UnitSystem,
        tessellation_tolerance: Quantity,
    ) -> Self {
        Self {
            primary,
            queries,
            units,
            tessellation_tolerance,
            write_lock: tokio::sync::Mutex::new(()),
            mirror: Mutex::new(Mirror::default()),
        }
    }

    pub fn primary(&self) -> &Channel {
        &self.primary
    }

    /// Channel used for queries (the primary one unless a dedicated channel exists)
    pub fn query_channel(&self) -> &Channel {
        self.queries.as_ref().unwrap_or(&self.primary)
    }

    pub fn dedicated_query_channel(&self) -> Option<&Channel> {
        self.queries.as_ref()
    }

    pub fn units(&self) -> &UnitSystem {
        &self.units
    }

    pub fn resolve(&self, id: &EntityId) -> Option<Proxy> {
        self.mirror.lock().registry.resolve(id)
    }

    /// Live children known locally
    pub fn children(&self, id: &EntityId) -> Vec<Proxy> {
        self.mirror.lock().registry.children(id)
    }

    pub fn revision(&self, design: &EntityId) -> Option<u64> {
        self.mirror.lock().revisions.get(design).copied()
    }

    pub fn live_count(&self) -> usize {
        self.mirror.lock().registry.live_count()
    }

    pub fn designs(&self) -> Vec<EntityId> {
        self.mirror.lock().registry.designs()
    }

    pub fn journal(&self) -> Journal {
        self.mirror.lock().journal.clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.mirror.lock().cache.stats()
    }

    /// Whether a cached value exists for the entity, whatever its revision
    pub fn is_cached(&self, id: &EntityId, kind: DerivedKind) -> bool {
        self.mirror.lock().cache.contains(id, kind)
    }

    pub fn is_pending(&self, id: &EntityId) -> bool {
        self.mirror.lock().needs_resync(id)
    }

    // ============== Designs ==============

    /// Send `NewDesign` or `OpenFile` and register the returned tree
    pub async fn open_design(&self, request: Request) -> SessionResult<Proxy> {
        let operation = request.name();
        let _guard = self.write_lock.lock().await;

        let response = self.primary.call(request, None).await?;
        let (design, entities) = match response {
            Response::Opened { design, entities } => (design, entities),
            other => return Err(failure(operation, other)),
        };
        if design.kind != EntityKind::Design || design.parent.is_some() {
            return Err(SessionError::ProtocolError(format!(
                "{operation} returned {} {} as a design",
                design.kind, design.id
            )));
        }

        let mut mirror = self.mirror.lock();
        let reopened = mirror.registry.contains(&design.id);
        let mut batch = Vec::with_capacity(entities.len() + 1);
        batch.push(design);
        batch.extend(entities);
        mirror.registry.validate_batch(&batch)?;

        let mut proxies = batch
            .iter()
            .map(|info| mirror.registry.register(info))
            .collect::<SessionResult<Vec<_>>>()?;
        let proxy = proxies.swap_remove(0);
        if reopened {
            // Revision keeps counting; what was cached came from the earlier open
            let mut stale = mirror.registry.descendants(proxy.id());
            stale.push(proxy.id().clone());
            mirror.cache.invalidate_all(&stale);
            mirror.epoch += 1;
            debug!("Design {} was already open", proxy.id());
        }
        mirror.revisions.entry(proxy.id().clone()).or_insert(0);
        info!(
            "Design {} ({}) ready with {} entities",
            proxy.name(),
            proxy.id(),
            batch.len() - 1
        );
        Ok(proxy)
    }

    /// Close a design on the server and drop its whole subtree locally
    pub async fn close_design(&self, design: &EntityId) -> SessionResult<usize> {
        let _guard = self.write_lock.lock().await;
        {
            let mirror = self.mirror.lock();
            let kind = mirror.kind_of(design)?;
            expect_kind("CloseDesign", design, kind, &[EntityKind::Design])?;
        }

        let request = Request::CloseDesign {
            design: design.clone(),
        };
        match self.primary.call(request, None).await {
            Ok(Response::Ack) => {}
            Ok(other) => return Err(failure("CloseDesign", other)),
            Err(e) => {
                if e.outcome_unknown() {
                    self.mirror.lock().pending.insert(design.clone());
                }
                return Err(e);
            }
        }

        let mut mirror = self.mirror.lock();
        let Mirror {
            registry,
            cache,
            revisions,
            pending,
            ..
        } = &mut *mirror;
        let removed = registry.invalidate_subtree(design);
        cache.evict_design(&removed);
        revisions.remove(design);
        let removed_set: HashSet<&EntityId> = removed.iter().collect();
        pending.retain(|id| !removed_set.contains(id));
        info!("Closed design {} ({} entities)", design, removed.len());
        Ok(removed.len())
    }

    // ============== Mutations ==============

    /// Execute a mutating operation
    ///
    /// Either every local effect of the operation is applied, or none is.
    pub async fn execute(
        &self,
        op: &Operation,
        cancel: Option<&CancellationToken>,
    ) -> SessionResult<MutationOutcome> {
        let operation = op.type_name();
        let request = op.to_request(&self.units)?;

        let _guard = self.write_lock.lock().await;
        self.resync_locked().await?;
        let design = self.check_operation(op)?;

        debug!("Executing {} on design {}", operation, design);
        let response = match self.primary.call(request, cancel).await {
            Ok(response) => response,
            Err(e) => {
                if e.outcome_unknown() {
                    self.mark_pending(op);
                }
                return Err(e);
            }
        };

        match response {
            Response::Mutation(result) => self.apply(op, design, result),
            other => Err(failure(operation, other)),
        }
    }

    /// Check operands against the registry; returns the design they live in
    fn check_operation(&self, op: &Operation) -> SessionResult<EntityId> {
        let operation = op.type_name();
        let mirror = self.mirror.lock();

        let mut design: Option<EntityId> = None;
        for id in op.operands() {
            let owner = mirror
                .registry
                .design_of(id)
                .ok_or_else(|| SessionError::StaleReference(id.clone()))?;
            match &design {
                Some(d) if *d != owner => {
                    return Err(SessionError::InvalidParameter(format!(
                        "{operation} spans designs {d} and {owner}"
                    )));
                }
                Some(_) => {}
                None => design = Some(owner),
            }
        }

        let kind = |id: &EntityId| mirror.kind_of(id);
        match op {
            Operation::CreateComponent { parent, .. }
            | Operation::ExtrudeSketch { parent, .. }
            | Operation::RevolveSketch { parent, .. }
            | Operation::CreateSurface { parent, .. } => {
                expect_kind(operation, parent, kind(parent)?, CONTAINERS)?;
            }
            Operation::Boolean { target, tools, .. } => {
                for id in std::iter::once(target).chain(tools) {
                    expect_kind(operation, id, kind(id)?, BODY)?;
                }
            }
            Operation::Translate { ids, .. } | Operation::Rotate { ids, .. } => {
                for id in ids {
                    expect_kind(operation, id, kind(id)?, PLACED)?;
                }
            }
            Operation::Fillet { body, edges, .. } | Operation::Chamfer { body, edges, .. } => {
                expect_kind(operation, body, kind(body)?, BODY)?;
                for edge in edges {
                    expect_kind(operation, edge, kind(edge)?, &[EntityKind::Edge])?;
                }
            }
            Operation::CopyBody { body, parent, .. } => {
                expect_kind(operation, body, kind(body)?, BODY)?;
                expect_kind(operation, parent, kind(parent)?, CONTAINERS)?;
            }
            Operation::Delete { id } => {
                if kind(id)? == EntityKind::Design {
                    return Err(SessionError::InvalidParameter(format!(
                        "design {id} must be closed, not deleted"
                    )));
                }
            }
            Operation::Rename { .. } => {}
            Operation::AssignMaterial { body, .. } | Operation::ProjectCurves { body, .. } => {
                expect_kind(operation, body, kind(body)?, BODY)?;
            }
            Operation::ImprintCurves { body, faces, .. } => {
                expect_kind(operation, body, kind(body)?, BODY)?;
                for face in faces {
                    expect_kind(operation, face, kind(face)?, &[EntityKind::Face])?;
                    let parent = mirror.registry.record(face).and_then(|r| r.parent.as_ref());
                    if parent != Some(body) {
                        return Err(SessionError::InvalidParameter(format!(
                            "face {face} does not belong to body {body}"
                        )));
                    }
                }
            }
            Operation::AssignMidSurfaceThickness { bodies, .. }
            | Operation::AssignMidSurfaceOffset { bodies, .. } => {
                for body in bodies {
                    expect_kind(operation, body, kind(body)?, BODY)?;
                    let tag = mirror.registry.record(body).and_then(|r| r.type_tag.as_deref());
                    if tag != Some(SURFACE_TAG) {
                        return Err(SessionError::InvalidParameter(format!(
                            "{operation} needs a surface body, {body} is not one"
                        )));
                    }
                }
            }
        }

        design.ok_or_else(|| {
            SessionError::InvalidParameter(format!("{operation} has no operands"))
        })
    }

    /// Fold an acknowledged mutation into the mirror
    fn apply(
        &self,
        op: &Operation,
        design: EntityId,
        result: MutationResult,
    ) -> SessionResult<MutationOutcome> {
        let operation = op.type_name();
        let mut mirror = self.mirror.lock();
        let Mirror {
            registry,
            cache,
            revisions,
            journal,
            pending,
            ..
        } = &mut *mirror;

        registry.validate_batch(&result.created)?;

        let created = result
            .created
            .iter()
            .map(|info| registry.register(info))
            .collect::<SessionResult<Vec<_>>>()?;

        if let Operation::Rename { id, name } = op {
            registry.rename(id, name.clone());
        }

        for id in &result.modified {
            cache.invalidate(id);
            cache.invalidate_all(&registry.descendants(id));
        }

        let mut removed = Vec::new();
        for id in &result.deleted {
            let gone = registry.invalidate_subtree(id);
            cache.invalidate_all(&gone);
            for dead in &gone {
                pending.remove(dead);
            }
            removed.extend(gone);
        }

        let revision = revisions.entry(design.clone()).or_insert(0);
        *revision += 1;
        let revision = *revision;

        journal.record(JournalEntry::new(operation, design.clone(), revision, &result));
        info!(
            "{} acknowledged: design {} at revision {} (+{} ~{} -{})",
            operation,
            design,
            revision,
            created.len(),
            result.modified.len(),
            removed.len()
        );

        Ok(MutationOutcome {
            operation,
            design,
            revision,
            created,
            modified: result.modified,
            removed,
        })
    }

    /// Record that an operation's outcome is unknown
    ///
    /// The operands and their owners are resynchronized before they are used
    /// again; cached data of the operands, their descendants and their owners
    /// is dropped now.
    fn mark_pending(&self, op: &Operation) {
        let mut mirror = self.mirror.lock();
        mirror.epoch += 1;

        for id in op.operands() {
            let stale = mirror.affected_by(id);
            mirror.cache.invalidate_all(&stale);

            let parent = mirror.registry.record(id).and_then(|r| r.parent.clone());
            mirror.pending.insert(id.clone());
            if let Some(parent) = parent {
                mirror.pending.insert(parent);
            }
        }
        warn!(
            "{} outcome unknown; {} entities await resynchronization",
            op.type_name(),
            mirror.pending.len()
        );
    }

    // ============== Resynchronization ==============

    /// Resynchronize every pending entity; returns the number of local changes
    pub async fn resynchronize(&self) -> SessionResult<usize> {
        let _guard = self.write_lock.lock().await;
        self.resync_locked().await
    }

    /// Caller must hold the write lock
    async fn resync_locked(&self) -> SessionResult<usize> {
        let pending: Vec<EntityId> = std::mem::take(&mut self.mirror.lock().pending)
            .into_iter()
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        info!("Resynchronizing {} entities", pending.len());
        let mut changes = 0;
        for (i, id) in pending.iter().enumerate() {
            match self.resync_one(id).await {
                Ok(n) => changes += n,
                Err(e) => {
                    warn!("Resynchronization of {} failed: {}", id, e);
                    self.mirror.lock().pending.extend(pending[i..].iter().cloned());
                    return Err(e);
                }
            }
        }
        debug!("Resynchronization changed {} entities", changes);
        Ok(changes)
    }

    async fn resync_one(&self, id: &EntityId) -> SessionResult<usize> {
        {
            let mut mirror = self.mirror.lock();
            if !mirror.registry.contains(id) {
                return Ok(0);
            }
            // Whatever was cached for it may predate the interrupted call
            let stale = mirror.affected_by(id);
            mirror.cache.invalidate_all(&stale);
            mirror.epoch += 1;
        }

        let request = Request::Describe { id: id.clone() };
        let info = match self.primary.call(request, None).await? {
            Response::Entity(Some(info)) => info,
            Response::Entity(None) => {
                let mut mirror = self.mirror.lock();
                let removed = mirror.registry.invalidate_subtree(id);
                mirror.cache.invalidate_all(&removed);
                info!("{} is gone on the server ({} entities dropped)", id, removed.len());
                return Ok(removed.len());
            }
            other => return Err(failure("Describe", other)),
        };
        self.mirror.lock().registry.register(&info)?;

        if info.kind.is_container() || info.kind == EntityKind::Body {
            let request = Request::GetChildren { id: id.clone() };
            match self.primary.call(request, None).await? {
                Response::Entities(children) => self.reconcile_children(id, &children),
                other => Err(failure("GetChildren", other)),
            }
        } else {
            Ok(0)
        }
    }

    /// Make the local children of `id` match the server's list
    fn reconcile_children(&self, id: &EntityId, children: &[EntityInfo]) -> SessionResult<usize> {
        let mut mirror = self.mirror.lock();
        let Mirror {
            registry, cache, ..
        } = &mut *mirror;
        registry.validate_batch(children)?;

        let reported: HashSet<&EntityId> = children.iter().map(|info| &info.id).collect();
        let mut changes = 0;
        for child in registry.children(id) {
            if !reported.contains(child.id()) {
                let gone = registry.invalidate_subtree(child.id());
                cache.invalidate_all(&gone);
                changes += gone.len();
            }
        }
        for info in children {
            if !registry.contains(&info.id) {
                debug!("Confirmed new {} {}", info.kind, info.id);
                changes += 1;
            }
            registry.register(info)?;
        }
        Ok(changes)
    }

    async fn resync_if_pending(&self, ids: &[&EntityId]) -> SessionResult<()> {
        let pending = {
            let mirror = self.mirror.lock();
            ids.iter().any(|id| mirror.needs_resync(id))
        };
        if pending {
            let _guard = self.write_lock.lock().await;
            self.resync_locked().await?;
        }
        Ok(())
    }

    // ============== Queries ==============

    /// Derived data for an entity, served from the cache while its design
    /// revision is unchanged
    pub async fn derived(
        &self,
        id: &EntityId,
        kind: DerivedKind,
        cancel: Option<&CancellationToken>,
    ) -> SessionResult<DerivedValue> {
        self.resync_if_pending(&[id]).await?;

        let (revision, epoch) = {
            let mut mirror = self.mirror.lock();
            let revision = mirror.revision_of(id)?;
            check_derived_kind(id, mirror.kind_of(id)?, kind)?;
            if let Some(value) = mirror.cache.lookup(id, kind, revision) {
                return Ok(value);
            }
            (revision, mirror.epoch)
        };

        let request =
            Query::for_kind(id, kind).to_request(&self.units, self.tessellation_tolerance)?;
        let response = self.query_channel().call(request, cancel).await?;
        let value = self.decode_derived(kind, response)?;

        let mut mirror = self.mirror.lock();
        if mirror.epoch != epoch {
            debug!("Not caching {} of {}: state changed while in flight", kind, id);
        } else if mirror.registry.contains(id) {
            mirror.cache.store(id, kind, revision, value.clone());
        }
        Ok(value)
    }

    /// Run a query
    ///
    /// Cacheable queries go through [`Translator::derived`]; entity listings
    /// register what they return without touching any revision.
    pub async fn query(
        &self,
        query: &Query,
        cancel: Option<&CancellationToken>,
    ) -> SessionResult<QueryOutput> {
        let operands = query.operands();
        self.resync_if_pending(&operands).await?;
        self.check_query(query)?;

        if let Some(kind) = query.derived_kind() {
            let id = operands[0];
            return Ok(QueryOutput::Derived(self.derived(id, kind, cancel).await?));
        }

        let operation = query.type_name();
        let request = query.to_request(&self.units, self.tessellation_tolerance)?;
        let response = self.query_channel().call(request, cancel).await?;

        match (query, response) {
            (Query::Tessellate { .. }, response) => Ok(QueryOutput::Derived(
                self.decode_derived(DerivedKind::Mesh, response)?,
            )),
            (
                Query::Faces { body: owner }
                | Query::Edges { id: owner }
                | Query::Vertices { id: owner }
                | Query::Children { id: owner },
                Response::Entities(infos),
            ) => Ok(QueryOutput::Entities(self.register_observed(owner, &infos)?)),
            (Query::Describe { id }, Response::Entity(Some(info))) => {
                if info.id != *id {
                    return Err(SessionError::ProtocolError(format!(
                        "Describe {id} answered for {}",
                        info.id
                    )));
                }
                let proxy = self.mirror.lock().registry.register(&info)?;
                Ok(QueryOutput::Entity(Some(proxy)))
            }
            (Query::Describe { id }, Response::Entity(None)) => {
                let mut mirror = self.mirror.lock();
                let removed = mirror.registry.invalidate_subtree(id);
                mirror.cache.invalidate_all(&removed);
                Ok(QueryOutput::Entity(None))
            }
            (Query::MinDistance { .. }, Response::Scalar(value)) => {
                if !value.is_finite() || value < 0.0 {
                    return Err(SessionError::ProtocolError(format!(
                        "invalid distance {value}"
                    )));
                }
                let distance = Distance::new(self.units.tag(value, Dimension::Length))?;
                Ok(QueryOutput::Gap(Gap { distance }))
            }
            (_, other) => Err(failure(operation, other)),
        }
    }

    fn check_query(&self, query: &Query) -> SessionResult<()> {
        let operation = query.type_name();
        let mirror = self.mirror.lock();
        for id in query.operands() {
            let kind = mirror.kind_of(id)?;
            match query {
                Query::Faces { .. } => expect_kind(operation, id, kind, BODY)?,
                Query::Edges { .. } | Query::Vertices { .. } => expect_kind(
                    operation,
                    id,
                    kind,
                    &[EntityKind::Body, EntityKind::Face, EntityKind::Edge],
                )?,
                _ => {}
            }
            if let Some(derived) = query.derived_kind() {
                check_derived_kind(id, kind, derived)?;
            }
        }
        Ok(())
    }

    /// Register entities first observed through a query
    fn register_observed(&self, owner: &EntityId, infos: &[EntityInfo]) -> SessionResult<Vec<Proxy>> {
        let mut mirror = self.mirror.lock();
        if !mirror.registry.contains(owner) {
            return Err(SessionError::StaleReference(owner.clone()));
        }
        mirror.registry.validate_batch(infos)?;
        infos
            .iter()
            .map(|info| mirror.registry.register(info))
            .collect()
    }

    fn decode_derived(&self, kind: DerivedKind, response: Response) -> SessionResult<DerivedValue> {
        let units = &self.units;
        let scalar = |value: f64, dimension: Dimension| {
            if value.is_finite() && value >= 0.0 {
                Ok(DerivedValue::Scalar(units.tag(value, dimension)))
            } else {
                Err(SessionError::ProtocolError(format!(
                    "invalid {kind} value {value}"
                )))
            }
        };

        match (kind, response) {
            (DerivedKind::Mesh, Response::Mesh(data)) => {
                if !data.indices_in_bounds() {
                    return Err(SessionError::ProtocolError(
                        "mesh indices out of bounds".into(),
                    ));
                }
                Ok(DerivedValue::Mesh(Arc::new(Mesh::from_wire(data, units))))
            }
            (DerivedKind::BoundingBox, Response::BoundingBox(data)) => {
                if !data.is_valid() {
                    return Err(SessionError::ProtocolError(format!(
                        "invalid bounding box {:?}..{:?}",
                        data.min, data.max
                    )));
                }
                Ok(DerivedValue::BoundingBox(BoundingBox::from_wire(data, units)))
            }
            (DerivedKind::MassProperties, Response::MassProperties(data)) => {
                if !data.is_valid() {
                    return Err(SessionError::ProtocolError(format!(
                        "invalid mass properties {data:?}"
                    )));
                }
                Ok(DerivedValue::MassProperties(MassProperties::from_wire(data, units)))
            }
            (DerivedKind::Volume, Response::Scalar(value)) => scalar(value, Dimension::Volume),
            (DerivedKind::Area, Response::Scalar(value)) => scalar(value, Dimension::Area),
            (DerivedKind::Length, Response::Scalar(value)) => scalar(value, Dimension::Length),
            (DerivedKind::Position, Response::Point(point)) => {
                Ok(DerivedValue::Position(Point3D::new(point, units.length)))
            }
            (DerivedKind::MidSurface, Response::MidSurface(data)) => {
                if data.thickness.is_some_and(|t| !t.is_finite() || t <= 0.0) {
                    return Err(SessionError::ProtocolError(format!(
                        "invalid mid-surface thickness {:?}",
                        data.thickness
                    )));
                }
                Ok(DerivedValue::MidSurface(MidSurface::from_wire(data, units)?))
            }
            (kind, other) => Err(failure(kind.name(), other)),
        }
    }
}

/// Which entity kinds carry a kind of derived data
fn check_derived_kind(id: &EntityId, entity: EntityKind, kind: DerivedKind) -> SessionResult<()> {
    let allowed = match kind {
        DerivedKind::BoundingBox => true,
        DerivedKind::Mesh => !matches!(entity, EntityKind::Edge | EntityKind::Vertex),
        DerivedKind::MassProperties | DerivedKind::Volume => entity == EntityKind::Body,
        DerivedKind::Area => entity == EntityKind::Face,
        DerivedKind::Length => entity == EntityKind::Edge,
        DerivedKind::Position => entity == EntityKind::Vertex,
        DerivedKind::MidSurface => entity == EntityKind::Body,
    };
    if allowed {
        Ok(())
    } else {
        Err(SessionError::InvalidParameter(format!(
            "{entity} {id} has no {kind}"
        )))
    }
}
