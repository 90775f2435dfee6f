//! HTTP routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use divemap_domain::{
    DomainError, GeoPath, GeographicNode, LegacyId, LegacyRow, LegacyRowPatch, NodeId,
    STATS_SEGMENT,
};

use crate::app::App;
use crate::use_cases::geography::{
    CreateNodeInput, GeographyError, ListingQuery, LocLookup, NodeDetails, NodeStats,
    UpdateNodeInput,
};

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/loc/{*path}", get(get_location).patch(patch_legacy_row))
        .route("/api/nodes", post(create_node))
        .route("/api/nodes/{id}", get(get_node).patch(update_node))
}

async fn health() -> &'static str {
    "OK"
}

/// Raw `/loc` query string. Values are parsed by hand so a bad value is
/// reported with the parameter name.
#[derive(Debug, Default, Deserialize)]
pub struct LocParams {
    #[serde(rename = "type")]
    pub types: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl LocParams {
    fn into_query(self) -> Result<ListingQuery, ApiError> {
        let mut query = ListingQuery::default();
        if let Some(types) = self.types {
            query.types = types.parse()?;
        }
        if let Some(sort) = self.sort {
            query.sort = sort.parse()?;
        }
        if let Some(limit) = self.limit {
            query.limit = Some(parse_number("limit", &limit)?);
        }
        if let Some(offset) = self.offset {
            query.offset = parse_number("offset", &offset)?;
        }
        Ok(query)
    }
}

fn parse_number(param: &str, raw: &str) -> Result<u32, ApiError> {
    raw.trim().parse::<u32>().map_err(|_| {
        ApiError::BadRequest(format!(
            "'{}' must be a non-negative integer, got '{}'",
            param, raw
        ))
    })
}

/// Either a listing/spot lookup or, for `.../stats`, the node's counts.
#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
pub enum LocResponse {
    Lookup(LocLookup),
    Stats(NodeStats),
}

async fn get_location(
    State(app): State<Arc<App>>,
    Path(raw): Path<String>,
    Query(params): Query<LocParams>,
) -> Result<Json<LocResponse>, ApiError> {
    let path = GeoPath::parse(&raw)?;

    // No node can be named `stats`, so the suffix never shadows a child.
    if path.len() > 1 && path.last() == STATS_SEGMENT {
        let Some(node_path) = path.parent() else {
            return Err(ApiError::NotFound(format!("No location at '{}'", raw)));
        };
        let stats = app.use_cases.geography.stats.execute(&node_path).await?;
        return Ok(Json(LocResponse::Stats(stats)));
    }

    let query = params.into_query()?;
    let lookup = app.use_cases.geography.listing.execute(&path, query).await?;
    Ok(Json(LocResponse::Lookup(lookup)))
}

#[derive(Debug, Deserialize)]
pub struct LegacyPatchBody {
    pub id: LegacyId,
    #[serde(flatten)]
    pub patch: LegacyRowPatch,
}

async fn patch_legacy_row(
    State(app): State<Arc<App>>,
    Path(raw): Path<String>,
    Json(body): Json<LegacyPatchBody>,
) -> Result<Json<LegacyRow>, ApiError> {
    let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
    let [table, "patch"] = segments.as_slice() else {
        return Err(ApiError::NotFound(format!("No patch endpoint at '/loc/{}'", raw)));
    };

    let row = app
        .use_cases
        .geography
        .patch_legacy
        .execute(table, body.id, body.patch)
        .await?;
    tracing::info!(table = %table, legacy_id = %row.id, "Patched legacy row");
    Ok(Json(row))
}

async fn create_node(
    State(app): State<Arc<App>>,
    Json(input): Json<CreateNodeInput>,
) -> Result<(StatusCode, Json<GeographicNode>), ApiError> {
    let node = app.use_cases.geography.nodes.create(input).await?;
    Ok((StatusCode::CREATED, Json(node)))
}

async fn get_node(
    State(app): State<Arc<App>>,
    Path(id): Path<i64>,
) -> Result<Json<NodeDetails>, ApiError> {
    let details = app.use_cases.geography.nodes.get(NodeId::new(id)).await?;
    Ok(Json(details))
}

async fn update_node(
    State(app): State<Arc<App>>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateNodeInput>,
) -> Result<Json<GeographicNode>, ApiError> {
    let node = app
        .use_cases
        .geography
        .nodes
        .update(NodeId::new(id), input)
        .await?;
    Ok(Json(node))
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<GeographyError> for ApiError {
    fn from(e: GeographyError) -> Self {
        match e {
            GeographyError::NotFound(msg) => ApiError::NotFound(msg),
            GeographyError::InvalidInput(msg) => ApiError::BadRequest(msg),
            GeographyError::Conflict(msg) => ApiError::Conflict(msg),
            GeographyError::Repo(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        GeographyError::from(e).into()
    }
}
