//! HTTP routes for the lookup server

use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use keylookup_core::{Error as LookupError, Formatted, Lookup, SearchingLookup};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::error::{Result, ServerError};
use crate::metrics;
use crate::state::{SharedState, StoreStats};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub stores: StoreStats,
}

/// Query string of `/pks/lookup`
#[derive(Debug, Default, Deserialize)]
pub struct LookupParams {
    pub op: Option<String>,
    pub search: Option<String>,
    /// Comma separated option flags
    pub options: Option<String>,
    pub exact: Option<String>,
}

impl From<LookupParams> for Lookup {
    fn from(params: LookupParams) -> Self {
        Lookup {
            operation: params.op.unwrap_or_default(),
            search: params.search,
            options: params
                .options
                .map(|o| {
                    o.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            exact: params.exact.as_deref().map(parse_flag).unwrap_or(false),
        }
    }
}

fn parse_flag(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "on" | "true" | "1" | "yes")
}

/// Operations served by `/pks/lookup`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Index,
    Get,
    GetExact,
}

impl Operation {
    pub fn metric_label(&self) -> &'static str {
        match self {
            Operation::Index => metrics::OP_INDEX,
            Operation::Get => metrics::OP_GET,
            Operation::GetExact => metrics::OP_GET_EXACT,
        }
    }
}

/// Pick the operation for a lookup
fn parse_operation(lookup: &Lookup) -> Result<Operation> {
    match lookup.operation.to_lowercase().as_str() {
        "index" | "vindex" => Ok(Operation::Index),
        "get" if lookup.exact => Ok(Operation::GetExact),
        "get" => Ok(Operation::Get),
        other => Err(LookupError::UnknownOperation(other.to_string()).into()),
    }
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ready".to_string(),
        stores: state.stats,
    })
}

/// Prometheus text exposition
async fn metrics_text(State(state): State<SharedState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// HKP lookup endpoint
async fn lookup(State(state): State<SharedState>, Query(params): Query<LookupParams>) -> Result<Response> {
    let lookup = Lookup::from(params);
    let operation = parse_operation(&lookup)?;
    let searching = SearchingLookup::try_from(lookup)?;

    let label = operation.metric_label();
    let started = Instant::now();
    metrics::record_lookup_start(label);

    let service = &state.service;
    let result = match operation {
        Operation::Index => service.best_guess_index(&searching).await,
        Operation::Get => service.best_guess_retrieval(&searching).await,
        Operation::GetExact => service.fingerprint_retrieval(&searching).await,
    };

    metrics::record_lookup_end(label);
    let outcome = match &result {
        Ok(formatted) if formatted.records == 0 => metrics::OUTCOME_NO_MATCH,
        Ok(_) => metrics::OUTCOME_OK,
        Err(e) if e.is_client_error() => metrics::OUTCOME_CLIENT_ERROR,
        Err(_) => metrics::OUTCOME_SERVER_ERROR,
    };
    metrics::record_lookup(label, outcome, started.elapsed());

    let formatted = result?;
    tracing::info!(
        op = label,
        records = formatted.records,
        bytes = formatted.body.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Lookup served"
    );

    if formatted.records == 0 {
        return Err(ServerError::NoMatch(searching.search));
    }
    Ok(respond(formatted))
}

fn respond(formatted: Formatted) -> Response {
    (
        [(header::CONTENT_TYPE, formatted.content_type.as_str())],
        formatted.body,
    )
        .into_response()
}

/// Create the router with all routes
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route("/pks/lookup", get(lookup))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(op: &str, exact: Option<&str>) -> LookupParams {
        LookupParams {
            op: Some(op.to_string()),
            search: Some("alice".to_string()),
            options: Some("mr, json,,".to_string()),
            exact: exact.map(str::to_string),
        }
    }

    #[test]
    fn test_lookup_from_params() {
        let lookup = Lookup::from(params("index", Some("on")));
        assert_eq!(lookup.operation, "index");
        assert_eq!(lookup.search.as_deref(), Some("alice"));
        assert_eq!(lookup.options, vec!["mr", "json"]);
        assert!(lookup.exact);

        assert!(!Lookup::from(params("index", Some("off"))).exact);
        assert!(!Lookup::from(LookupParams::default()).exact);
    }

    #[test]
    fn test_parse_operation() {
        assert_eq!(parse_operation(&params("index", None).into()).unwrap(), Operation::Index);
        assert_eq!(parse_operation(&params("VINDEX", None).into()).unwrap(), Operation::Index);
        assert_eq!(parse_operation(&params("get", None).into()).unwrap(), Operation::Get);
        assert_eq!(parse_operation(&params("get", Some("on")).into()).unwrap(), Operation::GetExact);

        let unknown = parse_operation(&params("delete", None).into());
        assert!(matches!(
            unknown,
            Err(ServerError::Lookup(LookupError::UnknownOperation(ref op))) if op == "delete"
        ));
    }
}
