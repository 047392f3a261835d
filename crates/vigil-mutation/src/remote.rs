//! Remote API boundary
//!
//! The coordinator never talks to a transport directly; it hands the request to
//! a [`RemoteApi`] implementation and waits for authoritative fields or an
//! error.

use crate::error::RemoteError;
use crate::request::MutationRequest;
use async_trait::async_trait;
use std::sync::Arc;
use vigil_cache::FieldMap;

/// Remote mutation endpoint
#[async_trait]
pub trait RemoteApi: Send + Sync + std::fmt::Debug {
    /// Execute the mutation on the server
    ///
    /// Returns the authoritative fields of the target after the mutation.
    async fn execute(&self, request: &MutationRequest) -> Result<FieldMap, RemoteError>;
}

#[async_trait]
impl<T: RemoteApi + ?Sized> RemoteApi for Arc<T> {
    async fn execute(&self, request: &MutationRequest) -> Result<FieldMap, RemoteError> {
        (**self).execute(request).await
    }
}
