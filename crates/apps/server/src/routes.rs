use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use discovery::{
    DiscoveryError, DiscoveryService, FilterInput, InvalidFilterError, PageRequest,
    SpatialFilterSet, TagsInput, ValidationPolicy,
};
use foundation::BoundingBox;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DiscoveryService>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/places", get(list_places))
        .route("/places/map", get(map_places))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Query string shared by the list and map endpoints.
///
/// Numbers arrive as text and are parsed here, so a malformed value goes
/// through the same correct-or-reject policy as an out-of-range one.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlacesQuery {
    mode: Option<String>,
    lat: Option<String>,
    lng: Option<String>,
    radius: Option<String>,
    /// Comma-joined ids or slugs.
    tags: Option<String>,
    address: Option<String>,
    cursor: Option<String>,
    north: Option<String>,
    south: Option<String>,
    east: Option<String>,
    west: Option<String>,
    page_size: Option<String>,
    locale: Option<String>,
    /// Reject bad values instead of correcting them.
    strict: Option<bool>,
}

/// `Ok(None)` when absent or blank, `Err(raw)` when present but not a `T`.
fn parse_raw<T: FromStr>(raw: Option<&str>) -> Result<Option<T>, String> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(r) => r.parse().map(Some).map_err(|_| r.to_string()),
    }
}

impl PlacesQuery {
    fn policy(&self) -> ValidationPolicy {
        if self.strict.unwrap_or(false) {
            ValidationPolicy::Throw
        } else {
            ValidationPolicy::CorrectSilently
        }
    }

    fn strict(&self) -> bool {
        self.policy() == ValidationPolicy::Throw
    }

    /// Parse one numeric field; lenient mode turns garbage into "absent".
    fn number<T: FromStr>(
        &self,
        field: &'static str,
        raw: Option<&str>,
    ) -> Result<Option<T>, InvalidFilterError> {
        match parse_raw(raw) {
            Ok(v) => Ok(v),
            Err(value) if self.strict() => Err(InvalidFilterError::Unparseable { field, value }),
            Err(value) => {
                debug!(field, value = %value, "unparseable query value ignored");
                Ok(None)
            }
        }
    }

    fn filter_input(&self) -> Result<FilterInput, InvalidFilterError> {
        // The pair is kept or dropped as a unit, as in validation.
        let (latitude, longitude) = match (
            parse_raw::<f64>(self.lat.as_deref()),
            parse_raw::<f64>(self.lng.as_deref()),
        ) {
            (Ok(lat), Ok(lng)) => (lat, lng),
            (Err(value), _) if self.strict() => {
                return Err(InvalidFilterError::Unparseable { field: "lat", value });
            }
            (_, Err(value)) if self.strict() => {
                return Err(InvalidFilterError::Unparseable { field: "lng", value });
            }
            (lat, lng) => {
                debug!(?lat, ?lng, "unparseable coordinates, clearing both");
                (None, None)
            }
        };

        Ok(FilterInput {
            mode: self.mode.clone(),
            latitude,
            longitude,
            radius: self.number::<i64>("radius", self.radius.as_deref())?,
            tags: self.tags.clone().map(TagsInput::Joined),
            address: self.address.clone(),
            cursor: self.cursor.clone(),
        })
    }

    fn bbox(&self) -> Result<Option<BoundingBox>, InvalidFilterError> {
        Ok(BoundingBox::from_edges(
            self.number("north", self.north.as_deref())?,
            self.number("south", self.south.as_deref())?,
            self.number("east", self.east.as_deref())?,
            self.number("west", self.west.as_deref())?,
        ))
    }

    fn page_size(&self) -> Result<Option<usize>, InvalidFilterError> {
        self.number("page_size", self.page_size.as_deref())
    }

    fn filters(&self, service: &DiscoveryService) -> Result<SpatialFilterSet, DiscoveryError> {
        Ok(SpatialFilterSet::validate(
            self.filter_input()?,
            self.policy(),
            &service.config().limits,
        )?)
    }
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

async fn list_places(
    State(state): State<AppState>,
    query: Result<Query<PlacesQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return rejection_error(rejection),
    };
    let service = &state.service;
    let prepared = query.filters(service).and_then(|filters| {
        let bbox = query.bbox()?;
        let page = PageRequest {
            size: query.page_size()?,
            cursor: None,
            locale: query.locale.clone(),
        };
        Ok((filters, bbox, page))
    });
    let (filters, bbox, page) = match prepared {
        Ok(p) => p,
        Err(err) => return api_error(err),
    };
    match service.list_page(&filters, bbox.as_ref(), page) {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => api_error(err),
    }
}

async fn map_places(
    State(state): State<AppState>,
    query: Result<Query<PlacesQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return rejection_error(rejection),
    };
    let service = &state.service;
    let prepared = query
        .filters(service)
        .and_then(|filters| Ok((filters, query.bbox()?)));
    let (filters, bbox) = match prepared {
        Ok(p) => p,
        Err(err) => return api_error(err),
    };
    match service.map_points(&filters, bbox.as_ref()) {
        Ok(points) => (StatusCode::OK, Json(points)).into_response(),
        Err(err) => api_error(err),
    }
}

fn api_error(err: DiscoveryError) -> Response {
    let status = match &err {
        DiscoveryError::InvalidFilter(_) => {
            debug!("rejected request: {err}");
            StatusCode::BAD_REQUEST
        }
        DiscoveryError::Upstream(_) => {
            error!("place store failed: {err}");
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    error_body(status, err.to_string())
}

fn rejection_error(rejection: QueryRejection) -> Response {
    debug!("rejected query string: {rejection}");
    error_body(rejection.status(), rejection.body_text())
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
