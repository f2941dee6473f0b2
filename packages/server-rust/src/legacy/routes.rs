//! Legacy route table and resolution.
//!
//! Resolution is a pure function of method, URI and negotiation headers: it
//! either produces an [`InternalContext`] or fails terminally with a
//! [`ResolveError`]. It never authorizes and never publishes.

use std::collections::HashMap;

use axum::extract::Query;
use axum::http::{header, HeaderMap, Method, Uri};
use streamgate_core::messages::{
    ExpectedRevision, GossipCommand, MonitoringCommand, OperationsCommand, ReadDirection,
    StreamCommand, StreamPosition, SubscriptionCommand, UserCommand,
};
use streamgate_core::operation::{STREAM_ID, USER_LOGIN};
use streamgate_core::operations::{node, streams, subscriptions, users};
use streamgate_core::{Command, Operation, OperationDefinition, StreamId};

use super::codec::Codec;
use super::error::ResolveError;

pub const EXPECTED_VERSION_HEADER: &str = "es-expectedversion";
pub const HARD_DELETE_HEADER: &str = "es-harddelete";
pub const RESOLVE_LINKS_HEADER: &str = "es-resolvelinktos";

const DEFAULT_PAGE: u64 = 20;
const MAX_PAGE: u64 = 4_096;

/// What a legacy route does once authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    ReadStream,
    AppendStream,
    DeleteStream,
    ReadEvent,
    ListUsers,
    CreateUser,
    UserDetails,
    DeleteUser,
    Shutdown,
    Scavenge,
    MergeIndexes,
    ClientGossip,
    Stats,
    ListSubscriptions,
    SubscriptionInfo,
    Metrics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub method: Method,
    pub template: &'static str,
    pub kind: RouteKind,
    pub operation: OperationDefinition,
    /// Response codecs, the first being the default.
    pub codecs: &'static [Codec],
    pub accepts_body: bool,
}

impl RouteSpec {
    fn new(
        method: Method,
        template: &'static str,
        kind: RouteKind,
        operation: OperationDefinition,
    ) -> Self {
        Self {
            method,
            template,
            kind,
            operation,
            codecs: Codec::DATA,
            accepts_body: false,
        }
    }

    fn with_body(mut self) -> Self {
        self.accepts_body = true;
        self
    }

    fn text(mut self) -> Self {
        self.codecs = Codec::TEXT;
        self
    }
}

/// The resolved action, carried from resolution to the dispatch stage.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyAction<S: StreamId> {
    /// Fully determined by the route.
    Command(Command<S>),
    /// Append; events come from the request body.
    Append { stream: S, expected: ExpectedRevision },
    /// Create a user; details come from the request body.
    CreateUser,
    /// Render the Prometheus scrape locally.
    Metrics,
}

/// Output of successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalContext<S: StreamId> {
    pub template: &'static str,
    pub operation: Operation,
    pub action: LegacyAction<S>,
    /// Codec of the request body, for routes that take one.
    pub request_codec: Option<Codec>,
    pub response_codec: Codec,
}

/// Templates matched with `matchit`; several methods may share a template.
pub struct RouteTable {
    matcher: matchit::Router<usize>,
    routes: Vec<Vec<RouteSpec>>,
}

impl RouteTable {
    /// # Errors
    ///
    /// Returns `matchit::InsertError` when two templates conflict.
    pub fn new(specs: impl IntoIterator<Item = RouteSpec>) -> Result<Self, matchit::InsertError> {
        let mut matcher = matchit::Router::new();
        let mut routes: Vec<Vec<RouteSpec>> = Vec::new();
        let mut index: HashMap<&'static str, usize> = HashMap::new();
        for spec in specs {
            if let Some(&i) = index.get(spec.template) {
                routes[i].push(spec);
                continue;
            }
            matcher.insert(spec.template, routes.len())?;
            index.insert(spec.template, routes.len());
            routes.push(vec![spec]);
        }
        Ok(Self { matcher, routes })
    }

    /// The node's control-plane routes.
    ///
    /// # Errors
    ///
    /// Only fails if the table itself is inconsistent.
    pub fn standard() -> Result<Self, matchit::InsertError> {
        use RouteKind as K;
        Self::new([
            RouteSpec::new(Method::GET, "/streams/{stream}", K::ReadStream, streams::READ),
            RouteSpec::new(Method::POST, "/streams/{stream}", K::AppendStream, streams::WRITE).with_body(),
            RouteSpec::new(Method::DELETE, "/streams/{stream}", K::DeleteStream, streams::DELETE),
            RouteSpec::new(Method::GET, "/streams/{stream}/{event}", K::ReadEvent, streams::READ),
            RouteSpec::new(Method::GET, "/users", K::ListUsers, users::LIST),
            RouteSpec::new(Method::POST, "/users", K::CreateUser, users::CREATE).with_body(),
            RouteSpec::new(Method::GET, "/users/{login}", K::UserDetails, users::READ),
            RouteSpec::new(Method::DELETE, "/users/{login}", K::DeleteUser, users::DELETE),
            RouteSpec::new(Method::POST, "/admin/shutdown", K::Shutdown, node::SHUTDOWN),
            RouteSpec::new(Method::POST, "/admin/scavenge", K::Scavenge, node::SCAVENGE_START),
            RouteSpec::new(Method::POST, "/admin/mergeindexes", K::MergeIndexes, node::MERGE_INDEXES),
            RouteSpec::new(Method::GET, "/gossip", K::ClientGossip, node::GOSSIP_CLIENT_READ),
            RouteSpec::new(Method::GET, "/stats", K::Stats, node::STATISTICS_READ),
            RouteSpec::new(Method::GET, "/subscriptions", K::ListSubscriptions, subscriptions::STATISTICS),
            RouteSpec::new(
                Method::GET,
                "/subscriptions/{stream}/{group}",
                K::SubscriptionInfo,
                subscriptions::STATISTICS,
            ),
            RouteSpec::new(Method::GET, "/metrics", K::Metrics, node::STATISTICS_READ).text(),
        ])
    }

    /// Resolve a request against the table.
    ///
    /// # Errors
    ///
    /// `NotFound`, `MethodNotAllowed`, `BadParameter`, `UnsupportedMediaType`
    /// or `NotAcceptable`, checked in that order.
    pub fn resolve<S: StreamId>(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Result<InternalContext<S>, ResolveError> {
        let path = uri.path();
        let matched = self.matcher.at(path).map_err(|_| ResolveError::NotFound {
            path: path.to_string(),
        })?;
        let candidates = &self.routes[*matched.value];

        // HEAD is served by GET routes.
        let effective = if *method == Method::HEAD {
            Method::GET
        } else {
            method.clone()
        };
        let Some(spec) = candidates.iter().find(|s| s.method == effective) else {
            return Err(ResolveError::MethodNotAllowed {
                allowed: candidates.iter().map(|s| s.method.clone()).collect(),
            });
        };

        let params: HashMap<&str, &str> = matched.params.iter().collect();
        let query = Query::<HashMap<String, String>>::try_from_uri(uri)
            .map(|Query(q)| q)
            .map_err(|e| ResolveError::bad("query", e.body_text()))?;
        let input = RouteInput {
            params: &params,
            query: &query,
            headers,
        };
        let (operation, action) = build::<S>(spec, &input)?;

        let request_codec = if spec.accepts_body {
            Some(match header_str(headers, header::CONTENT_TYPE) {
                None => Codec::Json,
                Some(ct) => Codec::from_media_type(ct)
                    .filter(|c| Codec::DATA.contains(c))
                    .ok_or_else(|| ResolveError::UnsupportedMediaType(ct.to_string()))?,
            })
        } else {
            None
        };
        let accept = header_str(headers, header::ACCEPT);
        let response_codec = Codec::negotiate(accept, spec.codecs)
            .ok_or_else(|| ResolveError::NotAcceptable(accept.unwrap_or_default().to_string()))?;

        Ok(InternalContext {
            template: spec.template,
            operation,
            action,
            request_codec,
            response_codec,
        })
    }
}

struct RouteInput<'a> {
    params: &'a HashMap<&'a str, &'a str>,
    query: &'a HashMap<String, String>,
    headers: &'a HeaderMap,
}

impl RouteInput<'_> {
    fn param(&self, name: &'static str) -> Result<&str, ResolveError> {
        self.params
            .get(name)
            .copied()
            .ok_or_else(|| ResolveError::bad(name, "missing"))
    }

    fn stream<S: StreamId>(&self, name: &'static str) -> Result<S, ResolveError> {
        self.param(name)?
            .parse()
            .map_err(|_| ResolveError::bad(name, "not a valid stream id"))
    }

    fn query_u64(&self, name: &'static str) -> Result<Option<u64>, ResolveError> {
        self.query
            .get(name)
            .map(|v| v.parse().map_err(|_| ResolveError::bad(name, format!("'{v}' is not a number"))))
            .transpose()
    }

    fn header_bool(&self, name: &'static str) -> Result<bool, ResolveError> {
        match header_str(self.headers, name).map(str::to_ascii_lowercase).as_deref() {
            None | Some("false") => Ok(false),
            Some("true") => Ok(true),
            Some(other) => Err(ResolveError::bad(name, format!("'{other}' is not a boolean"))),
        }
    }
}

fn header_str<K: header::AsHeaderName>(headers: &HeaderMap, name: K) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn build<S: StreamId>(
    spec: &RouteSpec,
    input: &RouteInput<'_>,
) -> Result<(Operation, LegacyAction<S>), ResolveError> {
    let op = Operation::new(spec.operation);
    let stream_op = |stream: &S| Operation::new(spec.operation).with_parameter(STREAM_ID, stream);

    let (op, command) = match spec.kind {
        RouteKind::ReadStream => {
            let stream: S = input.stream("stream")?;
            let direction = match input.query.get("direction").map(String::as_str) {
                None | Some("forward" | "forwards") => ReadDirection::Forwards,
                Some("backward" | "backwards") => ReadDirection::Backwards,
                Some(other) => return Err(ResolveError::bad("direction", format!("'{other}' is not a direction"))),
            };
            let from = match (input.query.get("from").map(String::as_str), direction) {
                (Some("start"), _) | (None, ReadDirection::Forwards) => StreamPosition::Start,
                (Some("end" | "head"), _) | (None, ReadDirection::Backwards) => StreamPosition::End,
                (Some(_), _) => StreamPosition::Revision(input.query_u64("from")?.unwrap_or_default()),
            };
            let max_count = input.query_u64("count")?.unwrap_or(DEFAULT_PAGE);
            if max_count == 0 || max_count > MAX_PAGE {
                return Err(ResolveError::bad("count", format!("must be between 1 and {MAX_PAGE}")));
            }
            let command = StreamCommand::Read {
                stream: stream.clone(),
                from,
                direction,
                max_count,
                resolve_links: input.header_bool(RESOLVE_LINKS_HEADER)?,
            };
            (stream_op(&stream), Command::Streams(command))
        }
        RouteKind::ReadEvent => {
            let stream: S = input.stream("stream")?;
            let event = input.param("event")?;
            let resolve_links = input.header_bool(RESOLVE_LINKS_HEADER)?;
            let command = if event == "head" {
                StreamCommand::Read {
                    stream: stream.clone(),
                    from: StreamPosition::End,
                    direction: ReadDirection::Backwards,
                    max_count: 1,
                    resolve_links,
                }
            } else {
                let event_number = event
                    .parse()
                    .map_err(|_| ResolveError::bad("event", format!("'{event}' is not an event number")))?;
                StreamCommand::ReadEvent {
                    stream: stream.clone(),
                    event_number,
                    resolve_links,
                }
            };
            (stream_op(&stream), Command::Streams(command))
        }
        RouteKind::AppendStream => {
            let stream: S = input.stream("stream")?;
            let expected = expected_revision(input)?;
            return Ok((stream_op(&stream), LegacyAction::Append { stream, expected }));
        }
        RouteKind::DeleteStream => {
            let stream: S = input.stream("stream")?;
            let command = StreamCommand::Delete {
                stream: stream.clone(),
                expected: expected_revision(input)?,
                hard: input.header_bool(HARD_DELETE_HEADER)?,
            };
            (stream_op(&stream), Command::Streams(command))
        }
        RouteKind::ListUsers => (op, Command::Users(UserCommand::Details { login: None })),
        RouteKind::CreateUser => return Ok((op, LegacyAction::CreateUser)),
        RouteKind::UserDetails | RouteKind::DeleteUser => {
            let login = input.param("login")?.to_string();
            let op = op.with_parameter(USER_LOGIN, &login);
            let command = if spec.kind == RouteKind::UserDetails {
                UserCommand::Details { login: Some(login) }
            } else {
                UserCommand::Delete { login }
            };
            (op, Command::Users(command))
        }
        RouteKind::Shutdown => (op, Command::Operations(OperationsCommand::Shutdown)),
        RouteKind::Scavenge => {
            let threads = input.query_u64("threads")?.unwrap_or(1);
            let start_from_chunk = input.query_u64("startFromChunk")?.unwrap_or(0);
            let threads = u32::try_from(threads)
                .ok()
                .filter(|t| *t > 0)
                .ok_or_else(|| ResolveError::bad("threads", "must be a positive 32-bit number"))?;
            let start_from_chunk = u32::try_from(start_from_chunk)
                .map_err(|_| ResolveError::bad("startFromChunk", "out of range"))?;
            let command = OperationsCommand::StartScavenge {
                threads,
                start_from_chunk,
            };
            (op, Command::Operations(command))
        }
        RouteKind::MergeIndexes => (op, Command::Operations(OperationsCommand::MergeIndexes)),
        RouteKind::ClientGossip => (op, Command::Gossip(GossipCommand::ClientRead)),
        RouteKind::Stats => {
            let use_metadata = input.query.get("metadata").is_some_and(|v| v == "true");
            (op, Command::Monitoring(MonitoringCommand::Stats { use_metadata }))
        }
        RouteKind::ListSubscriptions => (op, Command::Subscriptions(SubscriptionCommand::List { stream: None })),
        RouteKind::SubscriptionInfo => {
            let stream: S = input.stream("stream")?;
            let group = input.param("group")?.to_string();
            let command = SubscriptionCommand::GetInfo {
                stream: stream.clone(),
                group,
            };
            (stream_op(&stream), Command::Subscriptions(command))
        }
        RouteKind::Metrics => return Ok((op, LegacyAction::Metrics)),
    };
    Ok((op, LegacyAction::Command(command)))
}

fn expected_revision(input: &RouteInput<'_>) -> Result<ExpectedRevision, ResolveError> {
    let Some(raw) = header_str(input.headers, EXPECTED_VERSION_HEADER) else {
        return Ok(ExpectedRevision::Any);
    };
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(ExpectedRevision::from_legacy)
        .ok_or_else(|| ResolveError::bad(EXPECTED_VERSION_HEADER, format!("'{raw}' is not a valid expected version")))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use proptest::prelude::*;
    use streamgate_core::StreamName;

    use super::*;

    fn resolve(method: Method, uri: &str, headers: &[(&'static str, &'static str)]) -> Result<InternalContext<StreamName>, ResolveError> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_static(value));
        }
        let uri: Uri = uri.parse().unwrap();
        RouteTable::standard().unwrap().resolve(&method, &uri, &map)
    }

    #[test]
    fn standard_table_builds() {
        assert!(RouteTable::standard().is_ok());
    }

    #[test]
    fn read_stream_carries_stream_parameter() {
        let ctx = resolve(Method::GET, "/streams/orders?direction=backward&count=5", &[]).unwrap();
        assert_eq!(ctx.operation.parameter(STREAM_ID), Some("orders"));
        assert_eq!(ctx.response_codec, Codec::Json);
        match ctx.action {
            LegacyAction::Command(Command::Streams(StreamCommand::Read { from, direction, max_count, .. })) => {
                assert_eq!(from, StreamPosition::End);
                assert_eq!(direction, ReadDirection::Backwards);
                assert_eq!(max_count, 5);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn unknown_path_is_not_found() {
        assert_eq!(
            resolve(Method::GET, "/nope", &[]).unwrap_err(),
            ResolveError::NotFound { path: "/nope".into() }
        );
    }

    #[test]
    fn wrong_method_lists_allowed_methods() {
        let err = resolve(Method::PUT, "/streams/orders", &[]).unwrap_err();
        assert_eq!(
            err,
            ResolveError::MethodNotAllowed {
                allowed: vec![Method::GET, Method::POST, Method::DELETE]
            }
        );
    }

    #[test]
    fn malformed_parameters_are_bad_requests() {
        let err = resolve(Method::GET, "/streams/orders?count=abc", &[]).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        let err = resolve(Method::POST, "/streams/orders", &[("es-expectedversion", "-3")]).unwrap_err();
        assert!(matches!(err, ResolveError::BadParameter { name: EXPECTED_VERSION_HEADER, .. }));

        let err = resolve(Method::GET, "/streams/orders/x1", &[]).unwrap_err();
        assert!(matches!(err, ResolveError::BadParameter { name: "event", .. }));
    }

    #[test]
    fn append_reads_expected_version_and_codec() {
        let ctx = resolve(
            Method::POST,
            "/streams/orders",
            &[("es-expectedversion", "-1"), ("content-type", "application/msgpack")],
        )
        .unwrap();
        assert_eq!(ctx.request_codec, Some(Codec::MsgPack));
        assert_eq!(
            ctx.action,
            LegacyAction::Append {
                stream: "orders".parse().unwrap(),
                expected: ExpectedRevision::NoStream
            }
        );
    }

    #[test]
    fn unsupported_request_codec_is_415() {
        let err = resolve(Method::POST, "/users", &[("content-type", "text/xml")]).unwrap_err();
        assert_eq!(err, ResolveError::UnsupportedMediaType("text/xml".into()));
    }

    #[test]
    fn unacceptable_response_codec_is_406() {
        let err = resolve(Method::GET, "/metrics", &[("accept", "application/json")]).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_ACCEPTABLE);

        let ctx = resolve(Method::GET, "/metrics", &[]).unwrap();
        assert_eq!(ctx.action, LegacyAction::Metrics);
        assert_eq!(ctx.operation, Operation::new(node::STATISTICS_READ));
    }

    #[test]
    fn hard_delete_header() {
        let ctx = resolve(Method::DELETE, "/streams/orders", &[("es-harddelete", "True")]).unwrap();
        assert!(matches!(
            ctx.action,
            LegacyAction::Command(Command::Streams(StreamCommand::Delete { hard: true, .. }))
        ));
    }

    #[test]
    fn head_is_served_by_get_routes() {
        assert!(resolve(Method::HEAD, "/gossip", &[]).is_ok());
    }

    #[test]
    fn user_routes_carry_login() {
        let ctx = resolve(Method::DELETE, "/users/ouro", &[]).unwrap();
        assert_eq!(ctx.operation.parameter(USER_LOGIN), Some("ouro"));
    }

    fn method() -> impl Strategy<Value = Method> {
        prop::sample::select(vec![Method::GET, Method::POST, Method::DELETE, Method::PUT, Method::HEAD])
    }

    fn path() -> impl Strategy<Value = String> {
        let segment = prop::sample::select(vec![
            "streams", "users", "admin", "gossip", "stats", "subscriptions", "metrics", "orders", "$all",
            "head", "7", "scavenge", "x",
        ]);
        let query = prop::sample::select(vec!["", "?count=3", "?count=zero", "?direction=backward", "?from=end"]);
        (prop::collection::vec(segment, 1..4), query)
            .prop_map(|(segments, query)| format!("/{}{}", segments.join("/"), query))
    }

    proptest! {
        #[test]
        fn resolution_is_deterministic(method in method(), path in path()) {
            let table = RouteTable::standard().unwrap();
            let uri: Uri = path.parse().unwrap();
            let headers = HeaderMap::new();
            let first = table.resolve::<StreamName>(&method, &uri, &headers);
            let second = table.resolve::<StreamName>(&method, &uri, &headers);
            prop_assert_eq!(first, second);
        }
    }
}
