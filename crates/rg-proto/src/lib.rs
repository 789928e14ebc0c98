//! Remote Geometry Service Protocol
//!
//! This crate provides:
//! - Opaque server-issued entity identifiers
//! - Wire geometry in the server's canonical unit system
//! - Request/response messages with sequence-numbered frames
//! - Payload codecs (bincode, JSON)

mod codec;
mod geometry;
mod id;
mod messages;

pub use codec::{Codec, CodecError};
pub use geometry::{
    AxisData, BooleanType, BoxData, CurveGeometry, ExtrudeDirection, FrameData, MassData,
    MeshData, MidSurfaceData, MidSurfaceOffsetType, SketchProfile,
};
pub use id::{EntityId, EntityKind};
pub use messages::{
    EntityInfo, MutationResult, PROTOCOL_VERSION, Request, RequestFrame, Response, ResponseFrame,
};
