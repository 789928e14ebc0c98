//! Component handle

use async_trait::async_trait;

use super::{Container, Handle, Measurable, Named, Tessellable, Transformable, handle};
use crate::error::SessionResult;
use crate::operation::Operation;
use crate::translator::MutationOutcome;

handle!(
    /// A sub-assembly owning bodies and further components
    Component
);

impl Component {
    /// Delete the component and everything below it
    pub async fn delete(&self) -> SessionResult<MutationOutcome> {
        self.session.execute(&Operation::delete(self.id())).await
    }
}

#[async_trait]
impl Named for Component {}

#[async_trait]
impl Transformable for Component {}

#[async_trait]
impl Measurable for Component {}

#[async_trait]
impl Tessellable for Component {}

#[async_trait]
impl Container for Component {}
