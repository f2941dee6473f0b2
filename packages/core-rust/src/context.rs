use crate::types::Principal;

/// Which protocol surface a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Structured-RPC service call.
    Rpc,
    /// Legacy controller-style HTTP request.
    Legacy,
    /// Operational health probe.
    HealthProbe,
}

/// Which listener a request arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportChannel {
    /// The general network listener.
    Public,
    /// A local-machine-only channel (Unix domain socket).
    Local,
}

impl TransportChannel {
    #[must_use]
    pub fn is_local(self) -> bool {
        matches!(self, Self::Local)
    }
}

/// Per-request context created at the edge and dropped once the response is
/// written. Carries the caller identity after authentication succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Correlates logs for this request (`x-request-id`).
    pub request_id: String,
    /// Protocol surface the request arrived on.
    pub transport: TransportKind,
    /// Listener the request arrived through.
    pub channel: TransportChannel,
    /// Raw route as received (`/streams/orders`, `/streams/Append`).
    pub route: String,
    /// Authenticated principal, if authentication has run.
    pub principal: Option<Principal>,
}

impl RequestContext {
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        transport: TransportKind,
        channel: TransportChannel,
        route: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            transport,
            channel,
            route: route.into(),
            principal: None,
        }
    }

    /// Attaches the authenticated identity.
    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }
}
