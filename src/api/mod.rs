use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Local, NaiveDate};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{
    DateAmountRow, GrowthPoint, Projection, ProjectionParameters, Rollover, ScheduleSummary,
    TrackBook, ValueBasis, compare_tracks, date_amount_rows, depleted_on, parse_principal,
    project, schedule_summary,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const MAX_HORIZON_YEARS: u32 = 1_000;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Args(#[from] clap::Error),
    #[error("{flag} must be a finite number")]
    NonFinite { flag: &'static str },
    #[error("{flag} must be >= 0")]
    Negative { flag: &'static str },
    #[error("{flag} must be between {min} and {max}")]
    OutOfRange {
        flag: &'static str,
        min: f64,
        max: f64,
    },
    #[error("--reference-date must be YYYY-MM-DD, got {value:?}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliValueBasis {
    Nominal,
    InflationAdjusted,
}

impl From<CliValueBasis> for ValueBasis {
    fn from(value: CliValueBasis) -> Self {
        match value {
            CliValueBasis::Nominal => ValueBasis::Nominal,
            CliValueBasis::InflationAdjusted => ValueBasis::InflationAdjusted,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiValueBasis {
    Nominal,
    #[serde(alias = "inflationAdjusted", alias = "inflation_adjusted", alias = "inflation")]
    InflationAdjusted,
}

impl From<ApiValueBasis> for CliValueBasis {
    fn from(value: ApiValueBasis) -> Self {
        match value {
            ApiValueBasis::Nominal => CliValueBasis::Nominal,
            ApiValueBasis::InflationAdjusted => CliValueBasis::InflationAdjusted,
        }
    }
}

/// Principal as typed into a form field or sent as a JSON number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum AmountField {
    Text(String),
    Number(f64),
}

impl AmountField {
    fn into_text(self) -> String {
        match self {
            AmountField::Text(text) => text,
            AmountField::Number(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    track_id: Option<String>,
    principal: Option<AmountField>,
    growth_rate: Option<f64>,
    horizon_years: Option<u32>,
    advanced: Option<bool>,
    monthly_contribution: Option<f64>,
    monthly_withdrawal: Option<f64>,
    contribution_stop_year: Option<u32>,
    withdrawal_start_year: Option<u32>,
    rollover: Option<bool>,
    rollover_amount: Option<f64>,
    rollover_year: Option<u32>,
    inflation_rate: Option<f64>,
    display: Option<ApiValueBasis>,
    show_inflation: Option<bool>,
    reference_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ComparePayload {
    a: ProjectPayload,
    b: ProjectPayload,
    advanced: Option<bool>,
    rollover: Option<bool>,
    display: Option<ApiValueBasis>,
    show_inflation: Option<bool>,
    reference_date: Option<String>,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "growth",
    about = "Deterministic investment growth projection (contributions, withdrawals, rollover, inflation)"
)]
struct Cli {
    #[arg(long, default_value = "A")]
    track_id: String,
    #[arg(long, help = "Starting amount; leading digits are used, e.g. 10000")]
    principal: Option<String>,
    #[arg(long, help = "Expected annual growth in percent, e.g. 10")]
    growth_rate: Option<f64>,
    #[arg(long, help = "Years to project; year 0 is the rest of the current year")]
    horizon_years: Option<u32>,
    #[arg(
        long,
        help = "Enable contribution stop, withdrawal and rollover schedules"
    )]
    advanced: bool,
    #[arg(long, default_value_t = 0.0)]
    monthly_contribution: f64,
    #[arg(long, default_value_t = 0.0)]
    monthly_withdrawal: f64,
    #[arg(long, help = "Year contributions stop, cut off at the current month")]
    contribution_stop_year: Option<u32>,
    #[arg(long, help = "Year withdrawals begin; 0 starts this month")]
    withdrawal_start_year: Option<u32>,
    #[arg(long, help = "Apply a one-time rollover")]
    rollover: bool,
    #[arg(long, default_value_t = 0.0)]
    rollover_amount: f64,
    #[arg(long, help = "Year whose end receives the rollover amount")]
    rollover_year: Option<u32>,
    #[arg(long, help = "Annual inflation in percent applied to the adjusted series")]
    inflation_rate: Option<f64>,
    #[arg(long, value_enum, default_value_t = CliValueBasis::Nominal)]
    display: CliValueBasis,
    #[arg(long, help = "Projection start date (YYYY-MM-DD); defaults to today")]
    reference_date: Option<String>,
}

#[derive(Debug, Clone)]
struct ProjectRequest {
    params: ProjectionParameters,
    reference_date: NaiveDate,
    display: ValueBasis,
}

#[derive(Debug)]
struct CompareRequest {
    a: ProjectRequest,
    b: ProjectRequest,
    roll_a_into_b: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    track_id: String,
    display: ValueBasis,
    final_value_display: String,
    points: Vec<GrowthPoint>,
    rows: Vec<DateAmountRow>,
    summary: ScheduleSummary,
    depleted_on: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    a: ProjectResponse,
    b: ProjectResponse,
    rolled_amount: Option<f64>,
    rollover_year: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SeriesResponse {
    track_id: String,
    points: Vec<GrowthPoint>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: Cli) -> Result<ProjectRequest, ApiError> {
    if let Some(rate) = cli.growth_rate {
        if !rate.is_finite() {
            return Err(ApiError::NonFinite {
                flag: "--growth-rate",
            });
        }
    }

    if let Some(years) = cli.horizon_years {
        if years > MAX_HORIZON_YEARS {
            return Err(ApiError::OutOfRange {
                flag: "--horizon-years",
                min: 0.0,
                max: f64::from(MAX_HORIZON_YEARS),
            });
        }
    }

    for (flag, amount) in [
        ("--monthly-contribution", cli.monthly_contribution),
        ("--monthly-withdrawal", cli.monthly_withdrawal),
    ] {
        if !amount.is_finite() {
            return Err(ApiError::NonFinite { flag });
        }
        if amount < 0.0 {
            return Err(ApiError::Negative { flag });
        }
    }

    if !cli.rollover_amount.is_finite() {
        return Err(ApiError::NonFinite {
            flag: "--rollover-amount",
        });
    }

    if let Some(rate) = cli.inflation_rate {
        if !(0.0..=100.0).contains(&rate) {
            return Err(ApiError::OutOfRange {
                flag: "--inflation-rate",
                min: 0.0,
                max: 100.0,
            });
        }
    }

    let reference_date = match cli.reference_date.as_deref() {
        Some(text) => NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|source| {
            ApiError::InvalidDate {
                value: text.to_string(),
                source,
            }
        })?,
        None => Local::now().date_naive(),
    };

    let params = ProjectionParameters {
        track_id: cli.track_id,
        principal: cli.principal.as_deref().and_then(parse_principal),
        annual_growth_rate_percent: cli.growth_rate,
        horizon_years: cli.horizon_years,
        advanced_mode: cli.advanced,
        monthly_contribution: cli.monthly_contribution,
        monthly_withdrawal: cli.monthly_withdrawal,
        contribution_stop_year: cli.contribution_stop_year,
        withdrawal_start_year: cli.withdrawal_start_year,
        rollover: Rollover {
            enabled: cli.rollover,
            amount: cli.rollover_amount,
            trigger_year: cli.rollover_year,
        },
        depreciation_rate_percent: cli.inflation_rate,
    };

    Ok(ProjectRequest {
        params,
        reference_date,
        display: cli.display.into(),
    })
}

/// Parses `project` flags, runs one projection and renders it as JSON.
pub fn run_project_cli<I, T>(args: I) -> Result<String, ApiError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    let request = build_inputs(cli)?;
    let response = build_project_response(&request);
    Ok(serde_json::to_string_pretty(&response)?)
}

/// Last projection served per track id, shared by every request.
#[derive(Clone, Default)]
struct AppState {
    book: Arc<Mutex<TrackBook>>,
}

impl AppState {
    fn record(&self, projection: &Projection) {
        match self.book.lock() {
            Ok(mut book) => {
                book.record(projection.clone());
            }
            Err(_) => warn!(
                "track book lock poisoned; {:?} not recorded",
                projection.track_id
            ),
        }
    }

    fn series(&self, track_id: &str) -> Option<Vec<GrowthPoint>> {
        let book = self.book.lock().ok()?;
        book.series(track_id).map(<[GrowthPoint]>::to_vec)
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route("/api/compare", post(compare_handler))
        .route("/api/series/:track_id", get(series_handler))
        .fallback(not_found_handler)
        .with_state(AppState::default());

    let listener = TcpListener::bind(addr).await?;
    info!("growth HTTP API listening on http://{addr}");
    info!("local access: http://127.0.0.1:{port}/api/project");

    axum::serve(listener, app).await
}

async fn health_handler() -> impl IntoResponse {
    with_cache_control("ok")
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<ProjectPayload>,
) -> Response {
    project_handler_impl(state, payload).await
}

async fn project_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<ProjectPayload>,
) -> Response {
    project_handler_impl(state, payload).await
}

async fn project_handler_impl(state: AppState, payload: ProjectPayload) -> Response {
    let base = default_cli_for_api("A");
    match api_request_from_payload(payload, base) {
        Ok(request) => json_response(StatusCode::OK, serve_projection(&state, &request)),
        Err(err) => {
            warn!("rejected projection request: {err}");
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
    }
}

async fn compare_handler(
    State(state): State<AppState>,
    Json(payload): Json<ComparePayload>,
) -> Response {
    match compare_request_from_payload(payload) {
        Ok(request) => json_response(StatusCode::OK, build_compare_response(&state, &request)),
        Err(err) => {
            warn!("rejected comparison request: {err}");
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
    }
}

async fn series_handler(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
) -> Response {
    match state.series(&track_id) {
        Some(points) => json_response(StatusCode::OK, SeriesResponse { track_id, points }),
        None => error_response(
            StatusCode::NOT_FOUND,
            &format!("no projection recorded for track {track_id:?}"),
        ),
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ProjectRequest, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload, default_cli_for_api("A")).map_err(|e| e.to_string())
}

fn api_request_from_payload(payload: ProjectPayload, base: Cli) -> Result<ProjectRequest, ApiError> {
    let mut cli = base;

    if let Some(v) = payload.track_id {
        cli.track_id = v;
    }
    if let Some(v) = payload.principal {
        cli.principal = Some(v.into_text());
    }
    if let Some(v) = payload.growth_rate {
        cli.growth_rate = Some(v);
    }
    if let Some(v) = payload.horizon_years {
        cli.horizon_years = Some(v);
    }
    if let Some(v) = payload.advanced {
        cli.advanced = v;
    }
    if let Some(v) = payload.monthly_contribution {
        cli.monthly_contribution = v;
    }
    if let Some(v) = payload.monthly_withdrawal {
        cli.monthly_withdrawal = v;
    }
    if let Some(v) = payload.contribution_stop_year {
        cli.contribution_stop_year = Some(v);
    }
    if let Some(v) = payload.withdrawal_start_year {
        cli.withdrawal_start_year = Some(v);
    }
    if let Some(v) = payload.rollover {
        cli.rollover = v;
    }
    if let Some(v) = payload.rollover_amount {
        cli.rollover_amount = v;
    }
    if let Some(v) = payload.rollover_year {
        cli.rollover_year = Some(v);
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = Some(v);
    }
    if let Some(v) = payload.show_inflation {
        cli.display = if v {
            CliValueBasis::InflationAdjusted
        } else {
            CliValueBasis::Nominal
        };
    }
    if let Some(v) = payload.display {
        cli.display = v.into();
    }
    if let Some(v) = payload.reference_date {
        cli.reference_date = Some(v);
    }

    build_inputs(cli)
}

fn compare_request_from_payload(payload: ComparePayload) -> Result<CompareRequest, ApiError> {
    let ComparePayload {
        mut a,
        mut b,
        advanced,
        rollover,
        display,
        show_inflation,
        reference_date,
    } = payload;

    // Both tracks share one mode toggle, date axis and display basis.
    for track in [&mut a, &mut b] {
        if advanced.is_some() {
            track.advanced = advanced;
        }
        if display.is_some() {
            track.display = display;
        }
        if show_inflation.is_some() {
            track.show_inflation = show_inflation;
        }
        if reference_date.is_some() {
            track.reference_date = reference_date.clone();
        }
    }

    let a = api_request_from_payload(a, default_cli_for_api("A"))?;
    let mut b = api_request_from_payload(b, default_cli_for_api("B"))?;
    b.reference_date = a.reference_date;
    b.display = a.display;

    Ok(CompareRequest {
        a,
        b,
        roll_a_into_b: rollover.unwrap_or(false),
    })
}

fn default_cli_for_api(track_id: &str) -> Cli {
    Cli {
        track_id: track_id.to_string(),
        principal: Some("10000".to_string()),
        growth_rate: Some(10.0),
        horizon_years: Some(30),
        advanced: false,
        monthly_contribution: 0.0,
        monthly_withdrawal: 0.0,
        contribution_stop_year: None,
        withdrawal_start_year: None,
        rollover: false,
        rollover_amount: 0.0,
        rollover_year: None,
        inflation_rate: Some(2.5),
        display: CliValueBasis::Nominal,
        reference_date: None,
    }
}

fn build_project_response(request: &ProjectRequest) -> ProjectResponse {
    let projection = project(&request.params, request.reference_date, request.display);
    project_response(projection, &request.params, request.reference_date)
}

fn serve_projection(state: &AppState, request: &ProjectRequest) -> ProjectResponse {
    let projection = project(&request.params, request.reference_date, request.display);
    state.record(&projection);
    project_response(projection, &request.params, request.reference_date)
}

fn project_response(
    projection: Projection,
    params: &ProjectionParameters,
    reference_date: NaiveDate,
) -> ProjectResponse {
    let rows = date_amount_rows(&projection, params, reference_date);
    let depleted = depleted_on(&projection);
    ProjectResponse {
        summary: schedule_summary(params, reference_date),
        rows,
        depleted_on: depleted,
        track_id: projection.track_id,
        display: projection.display,
        final_value_display: projection.final_value_display,
        points: projection.points,
    }
}

fn build_compare_response(state: &AppState, request: &CompareRequest) -> CompareResponse {
    let comparison = compare_tracks(
        &request.a.params,
        &request.b.params,
        request.roll_a_into_b,
        request.a.reference_date,
        request.a.display,
    );
    state.record(&comparison.a);
    state.record(&comparison.b);

    let mut b_params = request.b.params.clone();
    b_params.rollover = comparison.b_rollover;

    CompareResponse {
        rolled_amount: comparison.rolled_amount,
        rollover_year: comparison.rollover_year,
        a: project_response(comparison.a, &request.a.params, request.a.reference_date),
        b: project_response(comparison.b, &b_params, request.b.reference_date),
    }
}
