//! Errors surfaced by the contract layer and how they render over HTTP
//!
//! Client-input failures (`MethodNotAllowed`, `MalformedBody`, `RequestValidationFailed`) become
//! 4xx responses. A `ResponseContractViolation` means route logic broke its own declared
//! contract; it becomes a 500 and is logged at error level with every violation.
use crate::schema::Violations;
use axum::Json;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("Method {method} is not allowed, expected one of: {}", format_methods(.allowed))]
    MethodNotAllowed { method: Method, allowed: Vec<Method> },

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Request body failed validation: {0}")]
    RequestValidationFailed(Violations),

    #[error("Handler response does not satisfy its declared schema: {0}")]
    ResponseContractViolation(Violations),

    #[error("Handler response could not be serialized: {0}")]
    ResponseSerialization(#[from] serde_json::Error),

    #[error("Invalid route specification: {0}")]
    InvalidRouteSpec(String),
}

impl ContractError {
    pub fn status(&self) -> StatusCode {
        match self {
            ContractError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ContractError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ContractError::RequestValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ContractError::ResponseContractViolation(_)
            | ContractError::ResponseSerialization(_)
            | ContractError::InvalidRouteSpec(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable name of the failure.
    pub fn code(&self) -> &'static str {
        match self {
            ContractError::MethodNotAllowed { .. } => "method_not_allowed",
            ContractError::MalformedBody(_) => "malformed_body",
            ContractError::RequestValidationFailed(_) => "request_validation_failed",
            ContractError::ResponseContractViolation(_) | ContractError::ResponseSerialization(_) => {
                "response_contract_violation"
            }
            ContractError::InvalidRouteSpec(_) => "invalid_route_spec",
        }
    }

    /// The error category used by the upstream API's error envelope.
    fn error_type(&self) -> &'static str {
        if self.status().is_client_error() {
            "invalid_request_error"
        } else {
            "api_error"
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl IntoResponse for ContractError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut error = json!({
            "type": self.error_type(),
            "code": self.code(),
            "message": self.to_string(),
        });

        match &self {
            ContractError::RequestValidationFailed(violations)
            | ContractError::ResponseContractViolation(violations) => {
                error["violations"] = json!(violations);
            }
            ContractError::MethodNotAllowed { allowed, .. } => {
                error["allowed_methods"] = json!(
                    allowed.iter().map(Method::as_str).collect::<Vec<_>>()
                );
            }
            _ => {}
        }

        let mut response = (status, Json(json!({ "type": "error", "error": error }))).into_response();

        if let ContractError::MethodNotAllowed { allowed, .. } = &self {
            if let Ok(value) = HeaderValue::from_str(&format_methods(allowed)) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }

        response
    }
}

/// Error body for paths no route is registered for.
pub fn not_found_response() -> Response {
    error_response(StatusCode::NOT_FOUND, "not_found_error", "Not found")
}

pub fn error_response(status: StatusCode, error_type: &str, message: &str) -> Response {
    let body = json!({
        "type": "error",
        "error": {
            "type": error_type,
            "message": message
        }
    });

    (status, Json(body)).into_response()
}

fn format_methods(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
