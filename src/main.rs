use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use carenet_core::patient::{AppointmentRequest, NewPatient, Patient};
use carenet_core::schemes::SchemeRecommendation;
use carenet_core::transfer::HistoryEntryView;
use carenet_core::{
    Actor, CareError, CoreConfig, JsonFileStore, PatientFilter, PatientService, PatientUpdate,
    RiskLevel, SchemeCatalogue, TracingAuditSink, config,
};

/// Application state shared across REST API handlers.
#[derive(Clone)]
struct AppState {
    service: Arc<PatientService>,
}

#[derive(Serialize, utoipa::ToSchema)]
struct HealthRes {
    status: &'static str,
}

#[derive(OpenApi)]
#[openapi(paths(health), components(schemas(HealthRes)))]
struct ApiDoc;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// Maps core errors onto the REST status-code surface.
fn into_api_error(err: CareError) -> ApiError {
    let status = match &err {
        CareError::NotFound(_) => StatusCode::NOT_FOUND,
        CareError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CareError::Conflict(_) => StatusCode::CONFLICT,
        _ => {
            tracing::error!("internal error: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

/// Main entry point for the CareNet engine.
///
/// # Environment Variables
/// - `CARENET_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `PATIENT_DATA_DIR`: Directory for patient record storage (default: "/patient_data")
/// - `CARENET_RISK_POLICY`: Optional path to a YAML risk-policy override
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("carenet=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CARENET_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let data_dir = std::env::var("PATIENT_DATA_DIR").unwrap_or_else(|_| "/patient_data".into());

    let risk_policy = match std::env::var("CARENET_RISK_POLICY") {
        Ok(path) => config::load_risk_policy_file(&PathBuf::from(path))?,
        Err(_) => carenet_core::RiskPolicy::default(),
    };
    let core_config = CoreConfig::new(risk_policy, SchemeCatalogue::default(), false)?;

    let store = Arc::new(JsonFileStore::open(&data_dir)?);
    let service = Arc::new(PatientService::new(
        store,
        Arc::new(TracingAuditSink),
        core_config,
    ));

    tracing::info!("++ Starting CareNet REST on {}", rest_addr);
    tracing::info!("++ Patient data directory: {}", data_dir);

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/patients", get(list_patients).post(create_patient))
        .route("/api/patients/high-risk", get(high_risk_patients))
        .route(
            "/api/patients/:id",
            get(get_patient)
                .put(update_patient)
                .delete(deactivate_patient),
        )
        .route("/api/patients/:id/assess", post(assess_patient))
        .route("/api/patients/:id/appointment", post(add_appointment))
        .route("/api/schemes/recommend/:id", get(recommend_schemes))
        .route("/api/schemes/enroll/:id", post(enroll_scheme))
        .route("/api/transfer/:id", post(transfer_patient))
        .route("/api/transfer/:id/history", get(transfer_history))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(AppState { service });

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
async fn health() -> Json<HealthRes> {
    Json(HealthRes { status: "ok" })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    risk_level: Option<String>,
    disease: Option<String>,
    hospital: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> Result<PatientFilter, ApiError> {
        let risk_level = self
            .risk_level
            .map(|level| level.parse::<RiskLevel>())
            .transpose()
            .map_err(into_api_error)?;
        Ok(PatientFilter {
            risk_level,
            disease: self.disease,
            hospital: self.hospital,
        })
    }
}

/// Active patients matching the query, highest cached risk first.
async fn list_patients(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let filter = query.into_filter()?;
    let patients = state.service.list(&filter).map_err(into_api_error)?;
    Ok(Json(patients))
}

async fn high_risk_patients(
    State(state): State<AppState>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let patients = state.service.high_risk().map_err(into_api_error)?;
    Ok(Json(patients))
}

/// Registers a patient; the first risk assessment runs before the record
/// is returned.
async fn create_patient(
    State(state): State<AppState>,
    Json(new): Json<NewPatient>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let patient = state
        .service
        .register(new, &Actor::system())
        .map_err(into_api_error)?;
    Ok((StatusCode::CREATED, Json(patient)))
}

async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let patient = state.service.get(&id).map_err(into_api_error)?;
    Ok(Json(patient))
}

async fn update_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<PatientUpdate>,
) -> Result<Json<Patient>, ApiError> {
    let patient = state.service.update(&id, update).map_err(into_api_error)?;
    Ok(Json(patient))
}

#[derive(Serialize)]
struct DeactivateRes {
    message: &'static str,
}

async fn deactivate_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeactivateRes>, ApiError> {
    state.service.deactivate(&id).map_err(into_api_error)?;
    Ok(Json(DeactivateRes {
        message: "Patient deactivated",
    }))
}

async fn assess_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let patient = state
        .service
        .reassess(&id, &Actor::system())
        .map_err(into_api_error)?;
    Ok(Json(patient))
}

async fn add_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AppointmentRequest>,
) -> Result<Json<Patient>, ApiError> {
    let patient = state
        .service
        .add_appointment(&id, request)
        .map_err(into_api_error)?;
    Ok(Json(patient))
}

async fn recommend_schemes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<SchemeRecommendation>>, ApiError> {
    let recommendations = state.service.recommend(&id).map_err(into_api_error)?;
    Ok(Json(recommendations))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrollReq {
    #[serde(default)]
    scheme_name: String,
}

async fn enroll_scheme(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EnrollReq>,
) -> Result<Json<Patient>, ApiError> {
    let patient = state
        .service
        .enroll(&id, &req.scheme_name)
        .map_err(into_api_error)?;
    Ok(Json(patient))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferReq {
    #[serde(default)]
    new_hospital: String,
    #[serde(default)]
    transfer_reason: Option<String>,
    #[serde(default)]
    receiving_doctor: Option<String>,
}

async fn transfer_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TransferReq>,
) -> Result<Json<Patient>, ApiError> {
    let patient = state
        .service
        .transfer(
            &id,
            &req.new_hospital,
            req.transfer_reason.as_deref(),
            req.receiving_doctor.as_deref(),
            &Actor::system(),
        )
        .map_err(into_api_error)?;
    Ok(Json(patient))
}

async fn transfer_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEntryView>>, ApiError> {
    let history = state.service.history(&id).map_err(into_api_error)?;
    Ok(Json(history))
}
