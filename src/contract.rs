//! Contract-checked routes
//!
//! A [`RouteSpec`] declares which HTTP methods a route accepts and the schemas its request and
//! response bodies must satisfy. [`ContractRoute`] wraps a piece of [`RouteLogic`] in that
//! declaration, so the logic only ever sees a validated, typed request and nothing leaves the
//! server without passing the response schema.
//!
//! Per request, in order:
//!
//! 1. the method is checked against the allowed set (405 otherwise)
//! 2. the body is parsed as JSON (400 otherwise)
//! 3. the parsed body is validated against the request schema (422 with violations otherwise)
//! 4. route logic runs with the typed body and a [`RequestContext`]
//! 5. the value it returns is validated against the response schema (500 otherwise)
//! 6. the validated value is sent as `application/json`
//!
//! # Usage
//!
//! ```ignore
//! use anthropic_mock::contract::{ContractRoute, RouteSpec, route_fn};
//! use axum::http::Method;
//!
//! let spec = RouteSpec::for_shapes::<EchoRequest, EchoResponse>(vec![Method::POST])?;
//! let route = ContractRoute::new(spec, route_fn(|req: EchoRequest, ctx| async move {
//!     ctx.json(EchoResponse { text: req.text })
//! }));
//! let router = axum::Router::new().route("/echo", route.into_method_router());
//! ```
use crate::errors::ContractError;
use crate::ids;
use crate::schema::{Schema, Shape};
use async_trait::async_trait;
use axum::Json;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, any};
use bon::bon;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Response header carrying the id of the request/response cycle.
pub const REQUEST_ID_HEADER: &str = "request-id";

/// Default cap on request body size.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// The declared contract of one route. Built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    methods: Vec<Method>,
    request_schema: Schema,
    response_schema: Schema,
    body_limit: usize,
}

#[bon]
impl RouteSpec {
    /// Fails if `methods` is empty. Duplicate methods are collapsed.
    ///
    /// Response objects never strip undeclared keys: any object in `response_schema` left on the
    /// default policy rejects them, so a response is sent exactly as the logic produced it.
    #[builder]
    pub fn new(
        methods: Vec<Method>,
        request_schema: Schema,
        response_schema: Schema,
        #[builder(default = DEFAULT_BODY_LIMIT)] body_limit: usize,
    ) -> Result<Self, ContractError> {
        let mut unique: Vec<Method> = Vec::with_capacity(methods.len());
        for method in methods {
            if !unique.contains(&method) {
                unique.push(method);
            }
        }
        if unique.is_empty() {
            return Err(ContractError::InvalidRouteSpec(
                "a route must allow at least one method".into(),
            ));
        }
        Ok(Self {
            methods: unique,
            request_schema,
            response_schema: response_schema.rejecting_unknown_keys(),
            body_limit,
        })
    }
}

impl RouteSpec {
    /// A spec whose schemas come from the request and response types themselves.
    pub fn for_shapes<Req: Shape, Res: Shape>(
        methods: Vec<Method>,
    ) -> Result<Self, ContractError> {
        Self::builder()
            .methods(methods)
            .request_schema(Req::schema())
            .response_schema(Res::schema())
            .build()
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    pub fn request_schema(&self) -> &Schema {
        &self.request_schema
    }

    pub fn response_schema(&self) -> &Schema {
        &self.response_schema
    }

    pub fn body_limit(&self) -> usize {
        self.body_limit
    }
}

/// What route logic gets to know about the request besides its body.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    request_id: String,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
            request_id: ids::request_id(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Also returned to the client in the `request-id` header.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Emit `body` as the JSON response for this request.
    pub fn json<T>(&self, body: T) -> Reply<T> {
        Reply { body }
    }
}

/// A response body produced by route logic, not yet checked against the response schema.
#[derive(Debug)]
pub struct Reply<T> {
    body: T,
}

impl<T> Reply<T> {
    pub fn into_inner(self) -> T {
        self.body
    }
}

/// The user-supplied part of a route: typed request in, typed response out.
#[async_trait]
pub trait RouteLogic: Send + Sync + 'static {
    type Request: DeserializeOwned + Send + 'static;
    type Response: Serialize + Send + 'static;

    async fn handle(&self, request: Self::Request, ctx: RequestContext) -> Reply<Self::Response>;
}

/// Route logic backed by an async closure. See [`route_fn`].
pub struct FnRoute<F, Req, Res> {
    f: F,
    _types: PhantomData<fn(Req) -> Res>,
}

/// Adapt an async closure into [`RouteLogic`].
pub fn route_fn<F, Fut, Req, Res>(f: F) -> FnRoute<F, Req, Res>
where
    F: Fn(Req, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Reply<Res>> + Send + 'static,
    Req: DeserializeOwned + Send + 'static,
    Res: Serialize + Send + 'static,
{
    FnRoute {
        f,
        _types: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, Req, Res> RouteLogic for FnRoute<F, Req, Res>
where
    F: Fn(Req, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Reply<Res>> + Send + 'static,
    Req: DeserializeOwned + Send + 'static,
    Res: Serialize + Send + 'static,
{
    type Request = Req;
    type Response = Res;

    async fn handle(&self, request: Req, ctx: RequestContext) -> Reply<Res> {
        (self.f)(request, ctx).await
    }
}

/// Route logic wrapped in its contract.
pub struct ContractRoute<L> {
    spec: Arc<RouteSpec>,
    logic: Arc<L>,
}

impl<L> Clone for ContractRoute<L> {
    fn clone(&self) -> Self {
        Self {
            spec: Arc::clone(&self.spec),
            logic: Arc::clone(&self.logic),
        }
    }
}

impl<L: RouteLogic> ContractRoute<L> {
    pub fn new(spec: RouteSpec, logic: L) -> Self {
        Self {
            spec: Arc::new(spec),
            logic: Arc::new(logic),
        }
    }

    pub fn spec(&self) -> &RouteSpec {
        &self.spec
    }

    /// Mount on an axum route. Every method reaches the wrapper, which enforces the allowed set
    /// itself.
    pub fn into_method_router<S>(self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        any(move |req: Request| async move { self.handle(req).await })
    }

    /// Run the whole contract for one HTTP request.
    ///
    /// The response is only assembled after route logic has returned, so a request dropped
    /// mid-flight has emitted nothing.
    pub async fn handle(&self, req: Request) -> Response {
        let (parts, body) = req.into_parts();
        let ctx = RequestContext::new(parts.method, parts.uri, parts.headers);
        let request_id = ctx.request_id().to_string();

        let mut response = match self.read_and_process(ctx, body).await {
            Ok(value) => Json(value).into_response(),
            Err(err) => {
                log_failure(&request_id, &err);
                err.into_response()
            }
        };

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }

    /// Run the contract over an already-read body, returning the validated response value.
    pub async fn invoke(&self, ctx: RequestContext, body: &[u8]) -> Result<Value, ContractError> {
        self.check_method(ctx.method())?;
        self.process(ctx, body).await
    }

    async fn read_and_process(&self, ctx: RequestContext, body: Body) -> Result<Value, ContractError> {
        // Rejected methods never have their body read.
        self.check_method(ctx.method())?;

        let bytes = axum::body::to_bytes(body, self.spec.body_limit)
            .await
            .map_err(|e| ContractError::MalformedBody(format!("failed to read body: {}", e)))?;

        self.process(ctx, &bytes).await
    }

    fn check_method(&self, method: &Method) -> Result<(), ContractError> {
        if self.spec.allows(method) {
            Ok(())
        } else {
            Err(ContractError::MethodNotAllowed {
                method: method.clone(),
                allowed: self.spec.methods.clone(),
            })
        }
    }

    async fn process(&self, ctx: RequestContext, body: &[u8]) -> Result<Value, ContractError> {
        let raw: Value = serde_json::from_slice(body)
            .map_err(|e| ContractError::MalformedBody(e.to_string()))?;

        let request: L::Request = self
            .spec
            .request_schema
            .parse(&raw)
            .map_err(ContractError::RequestValidationFailed)?;

        debug!(
            request_id = %ctx.request_id(),
            uri = %ctx.uri(),
            "Request body validated"
        );

        let reply = self.logic.handle(request, ctx).await;
        let produced = serde_json::to_value(reply.into_inner())?;

        self.spec
            .response_schema
            .validate(&produced)
            .map_err(ContractError::ResponseContractViolation)
    }
}

fn log_failure(request_id: &str, err: &ContractError) {
    if err.is_client_error() {
        warn!(request_id = %request_id, code = err.code(), error = %err, "Rejected request");
    } else {
        error!(request_id = %request_id, code = err.code(), error = %err, "Route broke its response contract");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ObjectSchema;
    use axum::Router;
    use axum::http::{HeaderName, StatusCode};
    use axum_test::TestServer;
    use rstest::rstest;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    #[derive(Debug, Deserialize)]
    struct Greeting {
        name: String,
    }

    #[derive(Debug, Serialize)]
    struct Salutation {
        text: String,
    }

    impl Shape for Greeting {
        fn schema() -> Schema {
            ObjectSchema::new().required("name", Schema::String).into()
        }
    }

    impl Shape for Salutation {
        fn schema() -> Schema {
            ObjectSchema::new()
                .required("text", Schema::String)
                .strict()
                .into()
        }
    }

    /// Counts how often the logic actually runs.
    #[derive(Default)]
    struct CountingGreeter {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RouteLogic for CountingGreeter {
        type Request = Greeting;
        type Response = Salutation;

        async fn handle(&self, request: Greeting, ctx: RequestContext) -> Reply<Salutation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ctx.json(Salutation {
                text: format!("Hello {}", request.name),
            })
        }
    }

    fn greeter_router() -> (Router, Arc<AtomicUsize>) {
        let logic = CountingGreeter::default();
        let calls = Arc::clone(&logic.calls);
        let spec = RouteSpec::for_shapes::<Greeting, Salutation>(vec![Method::POST]).unwrap();
        let route = ContractRoute::new(spec, logic);
        (Router::new().route("/greet", route.into_method_router()), calls)
    }

    #[test]
    fn test_spec_requires_a_method() {
        let result = RouteSpec::builder()
            .methods(vec![])
            .request_schema(Schema::Any)
            .response_schema(Schema::Any)
            .build();
        assert!(matches!(result, Err(ContractError::InvalidRouteSpec(_))));
    }

    #[test]
    fn test_spec_collapses_duplicate_methods() {
        let spec = RouteSpec::builder()
            .methods(vec![Method::POST, Method::PUT, Method::POST])
            .request_schema(Schema::Any)
            .response_schema(Schema::Any)
            .build()
            .unwrap();
        assert_eq!(spec.methods(), &[Method::POST, Method::PUT]);
        assert_eq!(spec.body_limit(), DEFAULT_BODY_LIMIT);
    }

    #[tokio::test]
    async fn test_valid_request_round_trip() {
        let (router, calls) = greeter_router();
        let server = TestServer::new(router).unwrap();

        let response = server.post("/greet").json(&json!({"name": "Ada"})).await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Value>(), json!({"text": "Hello Ada"}));
        assert!(response.header(REQUEST_ID_HEADER).to_str().unwrap().starts_with("req_01"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[case(Method::GET)]
    #[case(Method::PUT)]
    #[case(Method::DELETE)]
    #[case(Method::PATCH)]
    #[tokio::test]
    async fn test_disallowed_methods_never_reach_logic(#[case] method: Method) {
        let (router, calls) = greeter_router();

        let request = axum::http::Request::builder()
            .method(method)
            .uri("/greet")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name": "Ada"}"#))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[rstest]
    #[case::empty("")]
    #[case::truncated(r#"{"name": "#)]
    #[case::not_json("name=Ada")]
    #[tokio::test]
    async fn test_malformed_body_is_bad_request(#[case] body: &'static str) {
        let (router, calls) = greeter_router();

        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/greet")
            .body(Body::from(body))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[rstest]
    #[case::missing(json!({}))]
    #[case::wrong_type(json!({"name": 42}))]
    #[case::not_an_object(json!(["Ada"]))]
    #[tokio::test]
    async fn test_invalid_body_is_unprocessable(#[case] body: Value) {
        let (router, calls) = greeter_router();
        let server = TestServer::new(router).unwrap();

        let response = server.post("/greet").json(&body).expect_failure().await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let error = response.json::<Value>();
        assert_eq!(error["error"]["code"], "request_validation_failed");
        assert!(error.get("text").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_body_over_limit_is_rejected() {
        let spec = RouteSpec::builder()
            .methods(vec![Method::POST])
            .request_schema(Greeting::schema())
            .response_schema(Salutation::schema())
            .body_limit(16)
            .build()
            .unwrap();
        let route = ContractRoute::new(spec, CountingGreeter::default());

        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/greet")
            .body(Body::from(format!(r#"{{"name": "{}"}}"#, "a".repeat(64))))
            .unwrap();
        let response = route.handle(request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_response_contract_violation_is_server_error() {
        // The logic emits a key the response schema does not declare.
        let spec = RouteSpec::for_shapes::<Greeting, Salutation>(vec![Method::POST]).unwrap();
        let route = ContractRoute::new(
            spec,
            route_fn(|request: Greeting, ctx: RequestContext| async move {
                ctx.json(json!({"text": request.name, "debug": true}))
            }),
        );
        let server = TestServer::new(Router::new().route("/greet", route.into_method_router()))
            .unwrap();

        let response = server
            .post("/greet")
            .json(&json!({"name": "Ada"}))
            .expect_failure()
            .await;

        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let error = response.json::<Value>();
        assert_eq!(error["error"]["code"], "response_contract_violation");
        assert_eq!(error["error"]["violations"][0]["path"], json!(["debug"]));
        assert!(error.get("text").is_none());
    }

    #[tokio::test]
    async fn test_response_extra_keys_rejected_without_strict_schema() {
        let spec = RouteSpec::builder()
            .methods(vec![Method::POST])
            .request_schema(Greeting::schema())
            .response_schema(ObjectSchema::new().required("text", Schema::String).into())
            .build()
            .unwrap();
        let route = ContractRoute::new(
            spec,
            route_fn(|request: Greeting, ctx: RequestContext| async move {
                ctx.json(json!({"text": request.name, "debug": {"trace": 1}}))
            }),
        );

        let ctx = RequestContext::new(Method::POST, Uri::from_static("/greet"), HeaderMap::new());
        let err = route.invoke(ctx, br#"{"name": "Ada"}"#).await.unwrap_err();
        match err {
            ContractError::ResponseContractViolation(violations) => {
                assert_eq!(violations.paths(), vec!["debug"]);
            }
            other => panic!("expected contract violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_without_http() {
        let spec = RouteSpec::for_shapes::<Greeting, Salutation>(vec![Method::POST]).unwrap();
        let route = ContractRoute::new(spec, CountingGreeter::default());

        let ctx = RequestContext::new(Method::POST, Uri::from_static("/greet"), HeaderMap::new());
        let value = route.invoke(ctx, br#"{"name": "Bob"}"#).await.unwrap();
        assert_eq!(value, json!({"text": "Hello Bob"}));

        let ctx = RequestContext::new(Method::GET, Uri::from_static("/greet"), HeaderMap::new());
        let err = route.invoke(ctx, br#"{"name": "Bob"}"#).await.unwrap_err();
        assert!(matches!(err, ContractError::MethodNotAllowed { .. }));
    }

    #[tokio::test]
    async fn test_context_exposes_request_metadata() {
        let spec = RouteSpec::builder()
            .methods(vec![Method::POST])
            .request_schema(Greeting::schema())
            .response_schema(Schema::Any)
            .build()
            .unwrap();
        let route = ContractRoute::new(
            spec,
            route_fn(|_: Greeting, ctx: RequestContext| async move {
                let version = ctx
                    .headers()
                    .get("anthropic-version")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                let path = ctx.uri().path().to_owned();
                let request_id = ctx.request_id().to_owned();
                ctx.json(json!({"version": version, "path": path, "request_id": request_id}))
            }),
        );
        let server = TestServer::new(Router::new().route("/greet", route.into_method_router()))
            .unwrap();

        let response = server
            .post("/greet")
            .add_header(
                HeaderName::from_static("anthropic-version"),
                HeaderValue::from_static("2023-06-01"),
            )
            .json(&json!({"name": "Ada"}))
            .await;

        let body = response.json::<Value>();
        assert_eq!(body["version"], "2023-06-01");
        assert_eq!(body["path"], "/greet");
        assert_eq!(
            body["request_id"],
            response.header(REQUEST_ID_HEADER).to_str().unwrap()
        );
    }
}
