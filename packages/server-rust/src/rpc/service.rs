//! The RPC service trait and the dependencies services are bound to.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use streamgate_core::{Command, CoreReply, Operation, Principal, RequestContext, StreamId};

use super::descriptor::ServiceDescriptor;
use super::status::RpcError;
use crate::dispatch::DispatchBridge;
use crate::security::{Authorized, Authorizer};

/// One decoded RPC invocation.
#[derive(Debug, Clone)]
pub struct RpcCall {
    pub context: RequestContext,
    pub method: String,
    pub payload: Bytes,
}

impl RpcCall {
    /// # Errors
    ///
    /// Returns `RpcError::Unauthenticated` if authentication never ran.
    pub fn principal(&self) -> Result<&Principal, RpcError> {
        self.context.principal.as_ref().ok_or(RpcError::Unauthenticated)
    }

    /// Decode the JSON request body. An empty body decodes as `{}`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::InvalidArgument` when the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, RpcError> {
        let body: &[u8] = if self.payload.is_empty() {
            b"{}"
        } else {
            &self.payload
        };
        serde_json::from_slice(body)
            .map_err(|e| RpcError::invalid(format!("invalid {} request: {e}", self.method)))
    }

    pub(crate) fn unimplemented(&self, service: &str) -> RpcError {
        RpcError::Unimplemented {
            service: service.to_string(),
            method: self.method.clone(),
        }
    }
}

/// A named structured-RPC service.
///
/// Implementations decode and validate the payload, build the [`Operation`]
/// and the core [`Command`], and hand both to [`ServiceDeps`], which
/// authorizes before anything is published.
#[async_trait]
pub trait RpcService: Send + Sync + 'static {
    fn descriptor(&self) -> &ServiceDescriptor;

    async fn call(&self, call: RpcCall) -> Result<CoreReply, RpcError>;
}

/// The bridge and authorizer every service is constructed with.
pub struct ServiceDeps<S: StreamId> {
    pub bridge: Arc<DispatchBridge<S>>,
    pub authorizer: Arc<Authorizer>,
}

impl<S: StreamId> Clone for ServiceDeps<S> {
    fn clone(&self) -> Self {
        Self {
            bridge: Arc::clone(&self.bridge),
            authorizer: Arc::clone(&self.authorizer),
        }
    }
}

impl<S: StreamId> ServiceDeps<S> {
    #[must_use]
    pub fn new(bridge: Arc<DispatchBridge<S>>, authorizer: Arc<Authorizer>) -> Self {
        Self { bridge, authorizer }
    }

    /// # Errors
    ///
    /// `Unauthenticated` without a principal, `PermissionDenied` on denial.
    pub async fn authorize(
        &self,
        call: &RpcCall,
        operation: Operation,
    ) -> Result<Authorized, RpcError> {
        let principal = call.principal()?;
        Ok(self.authorizer.authorize(principal, operation).await?)
    }

    /// Authorize, dispatch and await the core's reply.
    ///
    /// # Errors
    ///
    /// Authorization errors, or `Unavailable` when the dispatch fails.
    pub async fn execute(
        &self,
        call: &RpcCall,
        operation: Operation,
        command: Command<S>,
    ) -> Result<CoreReply, RpcError> {
        let grant = self.authorize(call, operation).await?;
        Ok(self.bridge.dispatch(grant, command).await?)
    }

    /// Authorize and publish without awaiting a reply.
    ///
    /// # Errors
    ///
    /// Authorization errors, or `Unavailable` when the bus refuses the message.
    pub async fn publish(
        &self,
        call: &RpcCall,
        operation: Operation,
        command: Command<S>,
    ) -> Result<CoreReply, RpcError> {
        let grant = self.authorize(call, operation).await?;
        self.bridge.publish(grant, command).await?;
        Ok(CoreReply::empty())
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use streamgate_core::{TransportChannel, TransportKind};

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Req {
        #[serde(default)]
        count: u32,
    }

    fn call(payload: &'static [u8]) -> RpcCall {
        RpcCall {
            context: RequestContext::new("r1", TransportKind::Rpc, TransportChannel::Public, "/rpc/x/Y"),
            method: "Y".to_string(),
            payload: Bytes::from_static(payload),
        }
    }

    #[test]
    fn empty_payload_decodes_as_empty_object() {
        assert_eq!(call(b"").decode::<Req>().unwrap(), Req { count: 0 });
    }

    #[test]
    fn malformed_payload_is_invalid_argument() {
        let err = call(b"{\"count\":\"x\"}").decode::<Req>().unwrap_err();
        assert_eq!(err.status_name(), "invalid-argument");
    }

    #[test]
    fn missing_principal_is_unauthenticated() {
        assert_eq!(call(b"").principal().unwrap_err(), RpcError::Unauthenticated);
    }
}
