#![forbid(unsafe_code)]

//! HTTP surface of the travel service.
//!
//! Every API request passes the identity middleware first: no credential header means an
//! anonymous claim, a credential that fails verification ends the request with 400.
//! Handlers run the synchronous service layer on the blocking pool.

pub mod config;

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use travel_engines::hotels::{HotelSearch, HttpHotelSearch};
use travel_engines::identity::{verify_optional, HsTokenVerifier, IdentityVerifier};
use travel_engines::keywords::{KeywordExtractor, OpenAiKeywordExtractor};
use travel_engines::provider::ProviderCallError;
use travel_kernel_contracts::history::{HistoryRecord, VisitRequest};
use travel_kernel_contracts::hotel::HotelSearchCriteria;
use travel_kernel_contracts::identity::{RecordId, VerifiedClaim};
use travel_kernel_contracts::profile::ProfileRecord;
use travel_kernel_contracts::schema::{HistoryDeltaSchema, ProfileSchema};
use travel_kernel_contracts::{ContractViolation, Validate};
use travel_os::{HistoryAggregator, ProfileService, TravelError};
use travel_storage::DocumentStore;

use crate::config::AdapterConfig;

/// Request header carrying the bearer credential. A `Bearer ` prefix is optional.
pub const IDENTITY_HEADER: &str = "authtoken";

/// Shared, explicitly constructed capabilities behind the routes.
#[derive(Clone)]
pub struct AppState {
    verifier: Arc<dyn IdentityVerifier>,
    profiles: Arc<ProfileService>,
    histories: Arc<HistoryAggregator>,
    keywords: Option<Arc<dyn KeywordExtractor>>,
    hotels: Option<Arc<dyn HotelSearch>>,
}

impl AppState {
    pub fn new(
        verifier: Arc<dyn IdentityVerifier>,
        profiles: ProfileService,
        histories: HistoryAggregator,
    ) -> Self {
        Self {
            verifier,
            profiles: Arc::new(profiles),
            histories: Arc::new(histories),
            keywords: None,
            hotels: None,
        }
    }

    /// Profile and history services over one shared document store.
    pub fn over_store(verifier: Arc<dyn IdentityVerifier>, store: Arc<DocumentStore>) -> Self {
        Self::new(
            verifier,
            ProfileService::new(store.clone(), ProfileSchema::default()),
            HistoryAggregator::new(store, HistoryDeltaSchema::default()),
        )
    }

    pub fn with_keyword_extractor(mut self, extractor: Arc<dyn KeywordExtractor>) -> Self {
        self.keywords = Some(extractor);
        self
    }

    pub fn with_hotel_search(mut self, search: Arc<dyn HotelSearch>) -> Self {
        self.hotels = Some(search);
        self
    }

    pub fn from_config(config: &AdapterConfig) -> Result<Self, String> {
        let store = DocumentStore::open(&config.store).map_err(|e| e.to_string())?;
        let mut verifier = HsTokenVerifier::new(config.identity_secret.as_bytes());
        if let Some(issuer) = &config.identity_issuer {
            verifier = verifier.with_issuer(issuer);
        }
        let mut state = Self::over_store(Arc::new(verifier), Arc::new(store));
        if let Some(keywords) = &config.keywords {
            state = state.with_keyword_extractor(Arc::new(OpenAiKeywordExtractor::new(
                keywords.clone(),
            )?));
        }
        if let Some(hotels) = &config.hotels {
            state = state.with_hotel_search(Arc::new(HttpHotelSearch::new(hotels.clone())?));
        }
        Ok(state)
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessMarker {
    pub success: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    pub success: &'static str,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct FailureEnvelope {
    pub success: &'static str,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeywordRequest {
    pub prompt: String,
}

/// Failure reply: status plus `{"success":"false","error":...}`.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    error: String,
}

impl ApiFailure {
    fn new(status: StatusCode, error: impl ToString) -> Self {
        Self {
            status,
            error: error.to_string(),
        }
    }

    fn bad_request(error: impl ToString) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    // Store detail can name journal paths, so it goes to the log only.
    fn from_travel(err: TravelError) -> Self {
        match err {
            TravelError::StoreUnavailable(detail) => {
                tracing::error!(%detail, "store unavailable");
                Self::bad_request("store unavailable")
            }
            other => Self::bad_request(other),
        }
    }

    // By-id reads answer 404 for a missing record; every other failure is 400.
    fn from_read(err: TravelError) -> Self {
        match err {
            TravelError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, err),
            other => Self::from_travel(other),
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(FailureEnvelope {
                success: "false",
                error: self.error,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<T>), ApiFailure>;

fn ok<T>(body: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(body)))
}

fn marker() -> SuccessMarker {
    SuccessMarker { success: "true" }
}

fn data<T>(data: T) -> DataEnvelope<T> {
    DataEnvelope {
        success: "true",
        data,
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, ApiFailure>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        tracing::error!(error = %err, "blocking task failed");
        ApiFailure::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    })
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiFailure> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiFailure::bad_request(rejection.body_text()))
}

fn typed_body<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ApiFailure> {
    serde_json::from_value(value)
        .map_err(|e| ApiFailure::bad_request(format!("validation failed: {e}")))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/createProfile", post(create_profile))
        .route("/getUserProfile/:id", get(get_user_profile))
        .route("/addUserHistory/:id", post(add_user_history))
        .route("/getUserHistory/:id", get(get_user_history))
        .route("/api/getProfileID/:external_id", get(get_profile_id))
        .route("/api/getHistoryID/:external_id", get(get_history_id))
        .route("/extract-keywords", post(extract_keywords))
        .route("/api/searchHotels", post(search_hotels))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(api)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let credential = match request.headers().get(IDENTITY_HEADER).map(|v| v.to_str()) {
        None => None,
        Some(Ok(raw)) => Some(raw.to_string()),
        Some(Err(_)) => {
            return ApiFailure::bad_request("invalid credential: malformed").into_response()
        }
    };
    match verify_optional(state.verifier.as_ref(), credential.as_deref()) {
        Ok(claim) => {
            request.extensions_mut().insert(claim);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(reason = err.reason, path = %request.uri().path(), "credential rejected");
            ApiFailure::bad_request(err).into_response()
        }
    }
}

async fn healthz() -> (StatusCode, Json<HealthResponse>) {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

async fn create_profile(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<SuccessMarker> {
    let body = json_body(body)?;
    let profiles = state.profiles.clone();
    run_blocking(move || profiles.create_profile(&body))
        .await?
        .map_err(ApiFailure::from_travel)?;
    ok(marker())
}

async fn get_user_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ProfileRecord> {
    let profiles = state.profiles.clone();
    let record = run_blocking(move || profiles.get_profile(&id))
        .await?
        .map_err(ApiFailure::from_read)?;
    ok(record)
}

async fn add_user_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<SuccessMarker> {
    let id = RecordId::new(id).map_err(|e| ApiFailure::bad_request(TravelError::from(e)))?;
    let (identity_key, visit) = typed_body::<VisitRequest>(json_body(body)?)?.into_parts();
    let histories = state.histories.clone();
    run_blocking(move || histories.append_visit(&id, identity_key.as_ref(), &visit))
        .await?
        .map_err(ApiFailure::from_travel)?;
    ok(marker())
}

async fn get_user_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<HistoryRecord> {
    let histories = state.histories.clone();
    let record = run_blocking(move || histories.get_history(&id))
        .await?
        .map_err(ApiFailure::from_read)?;
    ok(record)
}

async fn get_profile_id(
    State(state): State<AppState>,
    Extension(claim): Extension<VerifiedClaim>,
    Path(external_id): Path<String>,
) -> ApiResult<DataEnvelope<RecordId>> {
    let profiles = state.profiles.clone();
    let id = run_blocking(move || profiles.resolve_profile_id(&claim, &external_id))
        .await?
        .map_err(log_lookup_failure)?;
    ok(data(id))
}

async fn get_history_id(
    State(state): State<AppState>,
    Extension(claim): Extension<VerifiedClaim>,
    Path(external_id): Path<String>,
) -> ApiResult<DataEnvelope<RecordId>> {
    let histories = state.histories.clone();
    let id = run_blocking(move || histories.resolve_history_id(&claim, &external_id))
        .await?
        .map_err(log_lookup_failure)?;
    ok(data(id))
}

fn log_lookup_failure(err: TravelError) -> ApiFailure {
    if matches!(err, TravelError::Auth(_)) {
        tracing::warn!(error = %err, "identity lookup denied");
    }
    ApiFailure::from_travel(err)
}

async fn extract_keywords(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<DataEnvelope<String>> {
    let request: KeywordRequest = typed_body(json_body(body)?)?;
    if request.prompt.trim().is_empty() {
        return Err(ApiFailure::bad_request(TravelError::from(
            ContractViolation::InvalidValue {
                field: "prompt",
                reason: "must not be empty",
            },
        )));
    }
    let extractor = state
        .keywords
        .clone()
        .ok_or_else(|| ApiFailure::bad_request("keyword extraction is not configured"))?;
    let keywords = run_blocking(move || extractor.extract_keywords(&request.prompt))
        .await?
        .map_err(upstream_failure)?;
    ok(data(keywords))
}

async fn search_hotels(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<DataEnvelope<Vec<Value>>> {
    let criteria: HotelSearchCriteria = typed_body(json_body(body)?)?;
    criteria
        .validate()
        .map_err(|e| ApiFailure::bad_request(TravelError::from(e)))?;
    let search = state
        .hotels
        .clone()
        .ok_or_else(|| ApiFailure::bad_request("hotel search is not configured"))?;
    let results = run_blocking(move || search.search_hotels(&criteria))
        .await?
        .map_err(upstream_failure)?;
    ok(data(results))
}

fn upstream_failure(err: ProviderCallError) -> ApiFailure {
    tracing::warn!(provider = err.provider, error_kind = err.error_kind, status = ?err.http_status, "upstream call failed");
    ApiFailure::bad_request(TravelError::Upstream(err.safe_detail()))
}
