//! In-process geometry server for tests
//!
//! `MockGeometryServer` speaks the wire protocol over a box-only geometry
//! model: every body is an axis-aligned box with six faces, twelve edges and
//! eight vertices. Ids are issued deterministically. Requests are counted by
//! name, and faults (refused connects, hung or dropped calls, rejections) can
//! be injected per request name.
//!
//! `LoopbackConnector` talks to the server in-process, passing every frame
//! through the real codec; `serve_tcp` exposes it on a local port with the
//! production framing.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use glam::{DQuat, DVec2, DVec3};
use parking_lot::Mutex;
use rg_proto::{
    AxisData, BooleanType, BoxData, Codec, EntityId, EntityInfo, EntityKind, ExtrudeDirection,
    MassData, MeshData, MidSurfaceData, MutationResult, PROTOCOL_VERSION, Request, RequestFrame,
    Response, ResponseFrame, SketchProfile,
};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_util::codec::Framed;

use crate::channel::{Connector, Transport, TransportError, frame_codec};

/// Install a test subscriber once; `RUST_LOG` controls the filter
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// What the server does with one request
pub enum Reply {
    Respond(Response),
    /// Never answer
    Hang,
    /// Answer computed now, delivered once the gate opens
    Held(Response, Arc<Notify>),
    /// Close the connection without answering
    Drop,
}

#[derive(Debug, Default)]
struct Faults {
    offline: bool,
    refuse_connects: u32,
    hang_on: HashSet<String>,
    hold_on: HashMap<String, Arc<Notify>>,
    drop_on: HashSet<String>,
    drop_once_on: HashSet<String>,
    reject_on: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Container,
    Solid { min: DVec3, max: DVec3 },
    Face { axis: usize, side: usize },
    Edge { a: usize, b: usize },
    Vertex { corner: usize },
}

#[derive(Debug, Clone)]
struct Node {
    kind: EntityKind,
    parent: Option<String>,
    name: String,
    children: Vec<String>,
    shape: Shape,
    /// Set for surface bodies
    surface: Option<MidSurfaceData>,
}

/// Corner `c` of a box: bit i selects max on axis i
fn corner(min: DVec3, max: DVec3, c: usize) -> DVec3 {
    DVec3::new(
        if c & 1 != 0 { max.x } else { min.x },
        if c & 2 != 0 { max.y } else { min.y },
        if c & 4 != 0 { max.z } else { min.z },
    )
}

/// Corner pairs differing on exactly one axis
fn box_edges() -> Vec<(usize, usize)> {
    let mut edges = Vec::with_capacity(12);
    for c in 0..8 {
        for axis in 0..3 {
            if c & (1 << axis) == 0 {
                edges.push((c, c | (1 << axis)));
            }
        }
    }
    edges
}

/// Corners of face (axis, side) in winding order
fn face_corners(axis: usize, side: usize) -> [usize; 4] {
    let u = 1 << ((axis + 1) % 3);
    let v = 1 << ((axis + 2) % 3);
    let base = side << axis;
    [base, base | u, base | u | v, base | v]
}

fn on_face(c: usize, axis: usize, side: usize) -> bool {
    (c >> axis) & 1 == side
}

fn box_mesh(min: DVec3, max: DVec3, mesh: &mut MeshData) {
    let center = (min + max) * 0.5;
    let offset = mesh.vertices.len() as u32;
    for c in 0..8 {
        let p = corner(min, max, c);
        mesh.vertices.push(p.to_array());
        mesh.normals
            .push((p - center).normalize_or_zero().to_array());
    }
    for axis in 0..3 {
        for side in 0..2 {
            let [a, b, c, d] = face_corners(axis, side).map(|i| i as u32 + offset);
            mesh.indices.extend([a, b, c, a, c, d]);
        }
    }
}

fn not_found(id: &str) -> Response {
    Response::Error {
        code: "NotFound".into(),
        message: format!("no entity {id}"),
    }
}

fn wrong_kind(id: &str, kind: EntityKind) -> Response {
    Response::Error {
        code: "WrongKind".into(),
        message: format!("{id} is a {kind}"),
    }
}

fn rejected(diagnostic: impl Into<String>) -> Response {
    Response::Rejected {
        diagnostic: diagnostic.into(),
    }
}

fn mutation(created: Vec<EntityInfo>, modified: Vec<EntityId>, deleted: Vec<EntityId>) -> Response {
    Response::Mutation(MutationResult {
        created,
        modified,
        deleted,
    })
}

/// Box-only geometry model
#[derive(Debug, Default)]
struct Model {
    nodes: HashMap<String, Node>,
    next_id: u64,
    design_names: Vec<String>,
}

type Outcome = Result<Response, Response>;

impl Model {
    fn issue(&mut self, kind: EntityKind) -> String {
        self.next_id += 1;
        format!("{}-{}", kind.type_name().to_lowercase(), self.next_id)
    }

    fn insert(&mut self, kind: EntityKind, parent: Option<&str>, name: &str, shape: Shape) -> String {
        let id = self.issue(kind);
        if let Some(parent) = parent {
            if let Some(node) = self.nodes.get_mut(parent) {
                node.children.push(id.clone());
            }
        }
        self.nodes.insert(
            id.clone(),
            Node {
                kind,
                parent: parent.map(str::to_string),
                name: name.to_string(),
                children: Vec::new(),
                shape,
                surface: None,
            },
        );
        id
    }

    fn create_body(&mut self, parent: &str, name: &str, min: DVec3, max: DVec3) -> String {
        let body = self.insert(EntityKind::Body, Some(parent), name, Shape::Solid { min, max });
        for axis in 0..3 {
            for side in 0..2 {
                let name = format!("Face{}", axis * 2 + side);
                self.insert(EntityKind::Face, Some(&body), &name, Shape::Face { axis, side });
            }
        }
        for (i, (a, b)) in box_edges().into_iter().enumerate() {
            self.insert(EntityKind::Edge, Some(&body), &format!("Edge{i}"), Shape::Edge { a, b });
        }
        for corner in 0..8 {
            let name = format!("Vertex{corner}");
            self.insert(EntityKind::Vertex, Some(&body), &name, Shape::Vertex { corner });
        }
        body
    }

    fn info(&self, id: &str) -> Option<EntityInfo> {
        let node = self.nodes.get(id)?;
        let info = EntityInfo::new(
            id,
            node.kind,
            node.parent.as_deref().map(EntityId::from),
            node.name.clone(),
        );
        Some(match node.kind {
            EntityKind::Body if node.surface.is_some() => info.with_type_tag("Surface"),
            EntityKind::Body => info.with_type_tag("Solid"),
            EntityKind::Face => info.with_type_tag("Plane"),
            EntityKind::Edge => info.with_type_tag("Line"),
            _ => info,
        })
    }

    fn infos(&self, ids: &[String]) -> Vec<EntityInfo> {
        ids.iter().filter_map(|id| self.info(id)).collect()
    }

    fn node(&self, id: &EntityId) -> Result<&Node, Response> {
        self.nodes.get(id.as_str()).ok_or_else(|| not_found(id.as_str()))
    }

    fn of_kind(&self, id: &EntityId, kinds: &[EntityKind]) -> Result<&Node, Response> {
        let node = self.node(id)?;
        if kinds.contains(&node.kind) {
            Ok(node)
        } else {
            Err(wrong_kind(id.as_str(), node.kind))
        }
    }

    fn solid(&self, id: &str) -> Option<(DVec3, DVec3)> {
        match self.nodes.get(id)?.shape {
            Shape::Solid { min, max } => Some((min, max)),
            _ => None,
        }
    }

    /// Box of the body owning a topology node, or of the body itself
    fn owner_box(&self, id: &str) -> Option<(DVec3, DVec3)> {
        let node = self.nodes.get(id)?;
        match node.kind {
            EntityKind::Body => self.solid(id),
            EntityKind::Face | EntityKind::Edge | EntityKind::Vertex => {
                self.solid(node.parent.as_deref()?)
            }
            _ => None,
        }
    }

    fn bodies_under(&self, id: &str) -> Vec<String> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        if node.kind == EntityKind::Body {
            return vec![id.to_string()];
        }
        node.children
            .iter()
            .flat_map(|child| self.bodies_under(child))
            .collect()
    }

    fn children_of_kind(&self, id: &str, kind: EntityKind) -> Vec<String> {
        self.nodes
            .get(id)
            .map(|node| {
                node.children
                    .iter()
                    .filter(|child| self.nodes.get(*child).is_some_and(|n| n.kind == kind))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn bbox(&self, id: &str) -> Option<BoxData> {
        let node = self.nodes.get(id)?;
        match node.shape {
            Shape::Container => self
                .bodies_under(id)
                .iter()
                .filter_map(|body| self.solid(body))
                .map(|(min, max)| BoxData::new(min, max))
                .reduce(|a, b| a.union(&b)),
            Shape::Solid { min, max } => Some(BoxData::new(min, max)),
            Shape::Face { axis, side } => {
                let (min, max) = self.owner_box(id)?;
                let corners = face_corners(axis, side).map(|c| corner(min, max, c));
                let lo = corners.iter().copied().reduce(DVec3::min)?;
                let hi = corners.iter().copied().reduce(DVec3::max)?;
                Some(BoxData::new(lo, hi))
            }
            Shape::Edge { a, b } => {
                let (min, max) = self.owner_box(id)?;
                let (pa, pb) = (corner(min, max, a), corner(min, max, b));
                Some(BoxData::new(pa.min(pb), pa.max(pb)))
            }
            Shape::Vertex { corner: c } => {
                let (min, max) = self.owner_box(id)?;
                let p = corner(min, max, c);
                Some(BoxData::new(p, p))
            }
        }
    }

    fn remove(&mut self, id: &str) {
        let parent = self.nodes.get(id).and_then(|node| node.parent.clone());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|child| child != id);
        }
        self.drop_tree(id);
    }

    fn drop_tree(&mut self, id: &str) {
        if let Some(node) = self.nodes.remove(id) {
            for child in node.children {
                self.drop_tree(&child);
            }
        }
    }

    fn set_box(&mut self, body: &str, min: DVec3, max: DVec3) {
        if let Some(node) = self.nodes.get_mut(body) {
            node.shape = Shape::Solid { min, max };
        }
    }

    fn handle(&mut self, request: Request) -> Response {
        match self.try_handle(request) {
            Ok(response) | Err(response) => response,
        }
    }

    fn try_handle(&mut self, request: Request) -> Outcome {
        use EntityKind::*;

        match request {
            Request::HealthCheck { .. } => Err(rejected("health checks are answered by the server")),

            Request::NewDesign { name } => {
                let id = self.insert(Design, None, &name, Shape::Container);
                self.design_names.push(name);
                Ok(Response::Opened {
                    design: self.info(&id).ok_or_else(|| not_found(&id))?,
                    entities: Vec::new(),
                })
            }
            Request::OpenFile { path } => {
                if !path.ends_with(".step") {
                    return Err(Response::Error {
                        code: "NotFound".into(),
                        message: format!("cannot open {path}"),
                    });
                }
                let name = path.trim_end_matches(".step").to_string();
                let design = self.insert(Design, None, &name, Shape::Container);
                let part = self.insert(Component, Some(&design), "Part", Shape::Container);
                let body = self.create_body(&part, "Block", DVec3::ZERO, DVec3::splat(0.01));
                Ok(Response::Opened {
                    design: self.info(&design).ok_or_else(|| not_found(&design))?,
                    entities: self.infos(&[part, body]),
                })
            }
            Request::CloseDesign { design } => {
                self.of_kind(&design, &[Design])?;
                self.remove(design.as_str());
                Ok(Response::Ack)
            }

            Request::CreateComponent { parent, name } => {
                self.of_kind(&parent, &[Design, Component])?;
                let id = self.insert(Component, Some(parent.as_str()), &name, Shape::Container);
                Ok(mutation(self.infos(&[id]), vec![], vec![]))
            }
            Request::ExtrudeSketch {
                parent,
                name,
                profile,
                distance,
                direction,
            } => {
                self.of_kind(&parent, &[Design, Component])?;
                let (min, max) = extrude_box(&profile, distance, direction)?;
                let id = self.create_body(parent.as_str(), &name, min, max);
                Ok(mutation(self.infos(&[id]), vec![], vec![]))
            }
            Request::RevolveSketch {
                parent,
                name,
                profile,
                axis,
                angle,
            } => {
                self.of_kind(&parent, &[Design, Component])?;
                let (min, max) = revolve_box(&profile, &axis, angle)?;
                let id = self.create_body(parent.as_str(), &name, min, max);
                Ok(mutation(self.infos(&[id]), vec![], vec![]))
            }
            Request::CreateSurface {
                parent,
                name,
                profile,
            } => {
                self.of_kind(&parent, &[Design, Component])?;
                let (min, max) = surface_box(&profile)?;
                let id = self.create_body(parent.as_str(), &name, min, max);
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.surface = Some(MidSurfaceData::default());
                }
                Ok(mutation(self.infos(&[id]), vec![], vec![]))
            }
            Request::Boolean {
                target,
                tools,
                op,
                keep_tools,
            } => {
                let node = self.of_kind(&target, &[Body])?.clone();
                let (t_min, t_max) = self.solid(target.as_str()).ok_or_else(|| not_found(target.as_str()))?;
                let mut result = BoxData::new(t_min, t_max);
                for tool in &tools {
                    self.of_kind(tool, &[Body])?;
                    let (min, max) = self.solid(tool.as_str()).ok_or_else(|| not_found(tool.as_str()))?;
                    let tool_box = BoxData::new(min, max);
                    result = match op {
                        BooleanType::Union => result.union(&tool_box),
                        BooleanType::Subtract => result,
                        BooleanType::Intersect => result
                            .intersection(&tool_box)
                            .ok_or_else(|| rejected("bodies do not intersect"))?,
                    };
                }

                let parent = node.parent.clone().unwrap_or_default();
                let id = self.create_body(&parent, &node.name, result.min, result.max);
                let mut deleted = vec![target.clone()];
                if !keep_tools {
                    deleted.extend(tools.iter().cloned());
                }
                for gone in &deleted {
                    self.remove(gone.as_str());
                }
                Ok(mutation(self.infos(&[id]), vec![], deleted))
            }
            Request::Translate {
                ids,
                direction,
                distance,
            } => {
                let offset = direction * distance;
                self.transform(&ids, |p| p + offset)
            }
            Request::Rotate { ids, axis, angle } => {
                let rotation = DQuat::from_axis_angle(axis.direction, angle);
                self.transform(&ids, |p| axis.origin + rotation * (p - axis.origin))
            }
            Request::Fillet {
                body,
                edges,
                radius,
            }
            | Request::Chamfer {
                body,
                edges,
                distance: radius,
            } => {
                self.of_kind(&body, &[Body])?;
                for edge in &edges {
                    let node = self.of_kind(edge, &[Edge])?;
                    if node.parent.as_deref() != Some(body.as_str()) {
                        return Err(rejected(format!("edge {edge} is not on body {body}")));
                    }
                }
                let (min, max) = self.solid(body.as_str()).ok_or_else(|| not_found(body.as_str()))?;
                let smallest = (max - min).min_element();
                if radius <= 0.0 || radius * 2.0 >= smallest {
                    return Err(rejected(format!(
                        "radius {radius} does not fit a body {smallest} thick"
                    )));
                }
                Ok(mutation(vec![], vec![body], vec![]))
            }
            Request::CopyBody { body, parent, name } => {
                self.of_kind(&body, &[Body])?;
                self.of_kind(&parent, &[Design, Component])?;
                let (min, max) = self.solid(body.as_str()).ok_or_else(|| not_found(body.as_str()))?;
                let id = self.create_body(parent.as_str(), &name, min, max);
                Ok(mutation(self.infos(&[id]), vec![], vec![]))
            }
            Request::Delete { id } => {
                let node = self.node(&id)?;
                if node.kind == Design {
                    return Err(wrong_kind(id.as_str(), Design));
                }
                self.remove(id.as_str());
                Ok(mutation(vec![], vec![], vec![id]))
            }
            Request::Rename { id, name } => {
                self.node(&id)?;
                if let Some(node) = self.nodes.get_mut(id.as_str()) {
                    node.name = name;
                }
                Ok(mutation(vec![], vec![id], vec![]))
            }
            Request::AssignMaterial { body, .. } | Request::ProjectCurves { body, .. } => {
                self.of_kind(&body, &[Body])?;
                Ok(mutation(vec![], vec![body], vec![]))
            }
            Request::AssignMidSurfaceThickness { bodies, thickness } => {
                if thickness.is_nan() || thickness <= 0.0 {
                    return Err(rejected("thickness must be positive"));
                }
                self.assign_mid_surface(&bodies, |data| data.thickness = Some(thickness))
            }
            Request::AssignMidSurfaceOffset { bodies, offset } => {
                self.assign_mid_surface(&bodies, |data| data.offset = Some(offset))
            }
            Request::ImprintCurves { body, faces, .. } => {
                self.of_kind(&body, &[Body])?;
                for face in &faces {
                    self.of_kind(face, &[Face])?;
                }
                let mut modified = vec![body];
                modified.extend(faces);
                Ok(mutation(vec![], modified, vec![]))
            }

            Request::Describe { id } => Ok(Response::Entity(self.info(id.as_str()))),
            Request::GetChildren { id } => {
                let children = self.node(&id)?.children.clone();
                Ok(Response::Entities(self.infos(&children)))
            }
            Request::GetFaces { body } => {
                self.of_kind(&body, &[Body])?;
                let faces = self.children_of_kind(body.as_str(), Face);
                Ok(Response::Entities(self.infos(&faces)))
            }
            Request::GetEdges { id } => {
                let node = self.of_kind(&id, &[Body, Face, Edge])?.clone();
                let edges = match node.shape {
                    Shape::Solid { .. } => self.children_of_kind(id.as_str(), Edge),
                    Shape::Face { axis, side } => self.topology_where(&node, Edge, |shape| {
                        matches!(shape, Shape::Edge { a, b } if on_face(a, axis, side) && on_face(b, axis, side))
                    }),
                    _ => vec![id.as_str().to_string()],
                };
                Ok(Response::Entities(self.infos(&edges)))
            }
            Request::GetVertices { id } => {
                let node = self.of_kind(&id, &[Body, Face, Edge])?.clone();
                let vertices = match node.shape {
                    Shape::Solid { .. } => self.children_of_kind(id.as_str(), Vertex),
                    Shape::Face { axis, side } => self.topology_where(&node, Vertex, |shape| {
                        matches!(shape, Shape::Vertex { corner } if on_face(corner, axis, side))
                    }),
                    Shape::Edge { a, b } => self.topology_where(&node, Vertex, |shape| {
                        matches!(shape, Shape::Vertex { corner } if corner == a || corner == b)
                    }),
                    _ => Vec::new(),
                };
                Ok(Response::Entities(self.infos(&vertices)))
            }
            Request::GetTessellation { id, tolerance } => {
                if tolerance <= 0.0 {
                    return Err(rejected("tolerance must be positive"));
                }
                let node = self.of_kind(&id, &[Design, Component, Body, Face])?.clone();
                let mut mesh = MeshData::default();
                match node.shape {
                    Shape::Face { axis, side } => {
                        let (min, max) = self.owner_box(id.as_str()).ok_or_else(|| not_found(id.as_str()))?;
                        for c in face_corners(axis, side) {
                            mesh.vertices.push(corner(min, max, c).to_array());
                            let mut normal = [0.0; 3];
                            normal[axis] = if side == 1 { 1.0 } else { -1.0 };
                            mesh.normals.push(normal);
                        }
                        mesh.indices.extend([0, 1, 2, 0, 2, 3]);
                    }
                    _ => {
                        for body in self.bodies_under(id.as_str()) {
                            if let Some((min, max)) = self.solid(&body) {
                                box_mesh(min, max, &mut mesh);
                            }
                        }
                    }
                }
                Ok(Response::Mesh(mesh))
            }
            Request::GetBoundingBox { id } => {
                self.node(&id)?;
                self.bbox(id.as_str())
                    .map(Response::BoundingBox)
                    .ok_or_else(|| rejected(format!("{id} has no geometry")))
            }
            Request::GetMassProperties { body } => {
                self.of_kind(&body, &[Body])?;
                let (min, max) = self.solid(body.as_str()).ok_or_else(|| not_found(body.as_str()))?;
                let size = max - min;
                Ok(Response::MassProperties(MassData {
                    volume: size.x * size.y * size.z,
                    surface_area: 2.0 * (size.x * size.y + size.y * size.z + size.z * size.x),
                    centroid: (min + max) * 0.5,
                }))
            }
            Request::GetMidSurface { body } => {
                let node = self.of_kind(&body, &[Body])?;
                Ok(Response::MidSurface(node.surface.unwrap_or_default()))
            }
            Request::GetVolume { body } => {
                self.of_kind(&body, &[Body])?;
                let (min, max) = self.solid(body.as_str()).ok_or_else(|| not_found(body.as_str()))?;
                let size = max - min;
                Ok(Response::Scalar(size.x * size.y * size.z))
            }
            Request::GetArea { face } => {
                let node = self.of_kind(&face, &[Face])?;
                let Shape::Face { axis, .. } = node.shape else {
                    return Err(wrong_kind(face.as_str(), node.kind));
                };
                let (min, max) = self.owner_box(face.as_str()).ok_or_else(|| not_found(face.as_str()))?;
                let size = (max - min).to_array();
                Ok(Response::Scalar(size[(axis + 1) % 3] * size[(axis + 2) % 3]))
            }
            Request::GetLength { edge } => {
                self.of_kind(&edge, &[Edge])?;
                let bbox = self.bbox(edge.as_str()).ok_or_else(|| not_found(edge.as_str()))?;
                Ok(Response::Scalar(bbox.max.distance(bbox.min)))
            }
            Request::GetPosition { vertex } => {
                self.of_kind(&vertex, &[Vertex])?;
                let bbox = self.bbox(vertex.as_str()).ok_or_else(|| not_found(vertex.as_str()))?;
                Ok(Response::Point(bbox.min))
            }
            Request::MinDistance { a, b } => {
                self.node(&a)?;
                self.node(&b)?;
                let box_a = self.bbox(a.as_str()).ok_or_else(|| rejected(format!("{a} has no geometry")))?;
                let box_b = self.bbox(b.as_str()).ok_or_else(|| rejected(format!("{b} has no geometry")))?;
                let gap = (box_b.min - box_a.max).max(box_a.min - box_b.max).max(DVec3::ZERO);
                Ok(Response::Scalar(gap.length()))
            }
        }
    }

    fn assign_mid_surface(&mut self, bodies: &[EntityId], assign: impl Fn(&mut MidSurfaceData)) -> Outcome {
        for body in bodies {
            if self.of_kind(body, &[EntityKind::Body])?.surface.is_none() {
                return Err(rejected(format!("{body} is not a surface body")));
            }
        }
        for body in bodies {
            if let Some(data) = self.nodes.get_mut(body.as_str()).and_then(|node| node.surface.as_mut()) {
                assign(data);
            }
        }
        Ok(mutation(vec![], bodies.to_vec(), vec![]))
    }

    /// Topology siblings of `node` (children of its body) matching a predicate
    fn topology_where(&self, node: &Node, kind: EntityKind, keep: impl Fn(Shape) -> bool) -> Vec<String> {
        let Some(body) = node.parent.as_deref() else {
            return Vec::new();
        };
        self.children_of_kind(body, kind)
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(|n| keep(n.shape)))
            .collect()
    }

    /// Move every body under `ids` by mapping its corners
    fn transform(&mut self, ids: &[EntityId], map: impl Fn(DVec3) -> DVec3) -> Outcome {
        let mut modified: Vec<EntityId> = Vec::new();
        for id in ids {
            self.of_kind(id, &[EntityKind::Component, EntityKind::Body])?;
            modified.push(id.clone());
            for body in self.bodies_under(id.as_str()) {
                let Some((min, max)) = self.solid(&body) else {
                    continue;
                };
                let moved: Vec<DVec3> = (0..8).map(|c| map(corner(min, max, c))).collect();
                let lo = moved.iter().copied().fold(DVec3::INFINITY, DVec3::min);
                let hi = moved.iter().copied().fold(DVec3::NEG_INFINITY, DVec3::max);
                self.set_box(&body, lo, hi);
                let body = EntityId::from(body);
                if !modified.contains(&body) {
                    modified.push(body);
                }
            }
        }
        Ok(mutation(vec![], modified, vec![]))
    }
}

fn profile_bounds(profile: &SketchProfile) -> Result<(DVec2, DVec2), Response> {
    profile
        .bounds()
        .ok_or_else(|| rejected("profile has no curves"))
}

fn extrude_box(profile: &SketchProfile, distance: f64, direction: ExtrudeDirection) -> Result<(DVec3, DVec3), Response> {
    if distance <= 0.0 {
        return Err(rejected("extrude distance must be positive"));
    }
    let (lo, hi) = profile_bounds(profile)?;
    let normal = profile.plane.normal();
    let (near, far) = match direction {
        ExtrudeDirection::Positive => (0.0, distance),
        ExtrudeDirection::Negative => (-distance, 0.0),
        ExtrudeDirection::Symmetric => (-distance / 2.0, distance / 2.0),
    };

    let mut min = DVec3::INFINITY;
    let mut max = DVec3::NEG_INFINITY;
    for p in [lo, DVec2::new(hi.x, lo.y), DVec2::new(lo.x, hi.y), hi] {
        for offset in [near, far] {
            let world = profile.plane.to_world(p) + normal * offset;
            min = min.min(world);
            max = max.max(world);
        }
    }
    Ok((min, max))
}

/// Flat box spanned by the profile on its plane
fn surface_box(profile: &SketchProfile) -> Result<(DVec3, DVec3), Response> {
    let (lo, hi) = profile_bounds(profile)?;
    let corners = [lo, DVec2::new(hi.x, lo.y), DVec2::new(lo.x, hi.y), hi].map(|p| profile.plane.to_world(p));
    let min = corners.iter().copied().fold(DVec3::INFINITY, DVec3::min);
    let max = corners.iter().copied().fold(DVec3::NEG_INFINITY, DVec3::max);
    Ok((min, max))
}

fn revolve_box(profile: &SketchProfile, axis: &AxisData, angle: f64) -> Result<(DVec3, DVec3), Response> {
    if angle == 0.0 {
        return Err(rejected("revolve angle must not be zero"));
    }
    let (lo, hi) = profile_bounds(profile)?;
    let corners = [lo, DVec2::new(hi.x, lo.y), DVec2::new(lo.x, hi.y), hi].map(|p| profile.plane.to_world(p));

    let radius = corners
        .iter()
        .map(|p| {
            let rel = *p - axis.origin;
            (rel - axis.direction * rel.dot(axis.direction)).length()
        })
        .fold(0.0, f64::max);
    if radius == 0.0 {
        return Err(rejected("profile lies on the revolve axis"));
    }

    let mut min = axis.origin - DVec3::splat(radius);
    let mut max = axis.origin + DVec3::splat(radius);
    for p in corners {
        min = min.min(p);
        max = max.max(p);
    }
    Ok((min, max))
}

#[derive(Debug)]
struct ServerState {
    model: Model,
    faults: Faults,
    protocol: u32,
    connects: u32,
    counts: HashMap<String, usize>,
}

/// In-process geometry server
#[derive(Debug)]
pub struct MockGeometryServer {
    state: Mutex<ServerState>,
}

impl MockGeometryServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ServerState {
                model: Model::default(),
                faults: Faults::default(),
                protocol: PROTOCOL_VERSION,
                connects: 0,
                counts: HashMap::new(),
            }),
        })
    }

    /// Accept or refuse a new connection
    pub fn accept(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.connects += 1;
        if state.faults.offline {
            return Err(TransportError::Connect("server offline".into()));
        }
        if state.faults.refuse_connects > 0 {
            state.faults.refuse_connects -= 1;
            return Err(TransportError::Connect("connection refused".into()));
        }
        Ok(())
    }

    /// Process one request
    pub fn handle(&self, request: Request) -> Reply {
        let name = request.name();
        let mut state = self.state.lock();
        *state.counts.entry(name.to_string()).or_default() += 1;

        let faults = &mut state.faults;
        if faults.hang_on.contains(name) {
            return Reply::Hang;
        }
        if faults.drop_once_on.remove(name) || faults.drop_on.contains(name) {
            return Reply::Drop;
        }
        if let Some(diagnostic) = faults.reject_on.get(name) {
            return Reply::Respond(rejected(diagnostic.clone()));
        }
        let gate = faults.hold_on.get(name).cloned();

        let response = match request {
            Request::HealthCheck { .. } => Response::Health {
                server: "mock-geometry".into(),
                protocol: state.protocol,
            },
            request => state.model.handle(request),
        };
        match gate {
            Some(gate) => Reply::Held(response, gate),
            None => Reply::Respond(response),
        }
    }

    // ============== Fault injection ==============

    pub fn go_offline(&self) {
        self.state.lock().faults.offline = true;
    }

    pub fn refuse_connects(&self, count: u32) {
        self.state.lock().faults.refuse_connects = count;
    }

    pub fn set_protocol_version(&self, version: u32) {
        self.state.lock().protocol = version;
    }

    /// Never answer requests with this name
    pub fn hang_on(&self, request: &str) {
        self.state.lock().faults.hang_on.insert(request.to_string());
    }

    /// Answer requests with this name from the state they arrive in, but
    /// only deliver each answer after `notify_one` on the returned gate
    pub fn hold_on(&self, request: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state
            .lock()
            .faults
            .hold_on
            .insert(request.to_string(), gate.clone());
        gate
    }

    /// Drop the connection on every request with this name
    pub fn drop_on(&self, request: &str) {
        self.state.lock().faults.drop_on.insert(request.to_string());
    }

    /// Drop the connection on the next request with this name
    pub fn drop_once_on(&self, request: &str) {
        self.state.lock().faults.drop_once_on.insert(request.to_string());
    }

    /// Reject requests with this name
    pub fn reject_on(&self, request: &str, diagnostic: &str) {
        self.state
            .lock()
            .faults
            .reject_on
            .insert(request.to_string(), diagnostic.to_string());
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults = Faults::default();
    }

    // ============== Inspection ==============

    pub fn request_count(&self, request: &str) -> usize {
        self.state.lock().counts.get(request).copied().unwrap_or(0)
    }

    pub fn connect_count(&self) -> u32 {
        self.state.lock().connects
    }

    /// Names of the designs created, in creation order
    pub fn design_names(&self) -> Vec<String> {
        self.state.lock().model.design_names.clone()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.state.lock().model.nodes.contains_key(id.as_str())
    }

    /// Box of a body
    pub fn body_box(&self, id: &EntityId) -> Option<(DVec3, DVec3)> {
        self.state.lock().model.solid(id.as_str())
    }

    /// Apply a request directly, bypassing counters and faults
    pub fn apply(&self, request: Request) -> Response {
        self.state.lock().model.handle(request)
    }
}

/// Connector to an in-process server
pub struct LoopbackConnector {
    server: Arc<MockGeometryServer>,
    codec: Codec,
}

impl LoopbackConnector {
    pub fn new(server: Arc<MockGeometryServer>) -> Self {
        Self {
            server,
            codec: Codec::Bincode,
        }
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        self.server.accept()?;
        Ok(Box::new(LoopbackTransport {
            server: self.server.clone(),
            codec: self.codec,
            closed: false,
        }))
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

struct LoopbackTransport {
    server: Arc<MockGeometryServer>,
    codec: Codec,
    closed: bool,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn call(&mut self, frame: RequestFrame) -> Result<ResponseFrame, TransportError> {
        if self.closed {
            return Err(TransportError::PeerClosed);
        }
        let bytes = self.codec.encode(&frame)?;
        let frame: RequestFrame = self.codec.decode(&bytes)?;

        let response = match self.server.handle(frame.request) {
            Reply::Respond(response) => response,
            Reply::Held(response, gate) => {
                gate.notified().await;
                response
            }
            Reply::Hang => std::future::pending().await,
            Reply::Drop => {
                self.closed = true;
                return Err(TransportError::PeerClosed);
            }
        };
        let bytes = self.codec.encode(&ResponseFrame {
            seq: frame.seq,
            response,
        })?;
        Ok(self.codec.decode(&bytes)?)
    }

    async fn shutdown(&mut self) {
        self.closed = true;
    }

    fn peer(&self) -> String {
        "loopback".into()
    }
}

/// Serve the mock on an ephemeral local TCP port
pub async fn serve_tcp(server: Arc<MockGeometryServer>, codec: Codec) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if server.accept().is_err() {
                continue;
            }
            let server = server.clone();
            tokio::spawn(async move {
                let mut framed = Framed::new(stream, frame_codec());
                while let Some(Ok(bytes)) = framed.next().await {
                    let Ok(frame) = codec.decode::<RequestFrame>(&bytes) else {
                        break;
                    };
                    let response = match server.handle(frame.request) {
                        Reply::Respond(response) => response,
                        Reply::Held(response, gate) => {
                            gate.notified().await;
                            response
                        }
                        Reply::Hang => continue,
                        Reply::Drop => break,
                    };
                    let Ok(payload) = codec.encode(&ResponseFrame {
                        seq: frame.seq,
                        response,
                    }) else {
                        break;
                    };
                    if framed.send(payload).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    Ok(address)
}
