//! Design handle

use async_trait::async_trait;

use super::{Container, Handle, Measurable, Named, Tessellable, handle};
use crate::error::SessionResult;

handle!(
    /// Root of a design tree, mirroring one server-side document
    Design
);

impl Design {
    /// Current revision; None once the design is closed
    pub fn revision(&self) -> Option<u64> {
        self.session.revision(self.id())
    }

    /// Close the design on the server; every handle into it goes stale
    pub async fn close(&self) -> SessionResult<usize> {
        self.session.close_design(self.id()).await
    }
}

#[async_trait]
impl Named for Design {}

#[async_trait]
impl Measurable for Design {}

#[async_trait]
impl Tessellable for Design {}

#[async_trait]
impl Container for Design {}
