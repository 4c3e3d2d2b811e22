use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use cut_planner::aggregate::LineItem;
use cut_planner::catalog::{Material, RawMaterial, WeightTable};
use cut_planner::config::OptimizerConfig;
use cut_planner::error::{OptimizeError, PlanError, WidthError};
use cut_planner::store::{InMemoryStore, PlanSnapshot};
use cut_planner::types::{CuttingPlan, RequiredCut, StandardStockOption, StockBatch};
use cut_planner::units::{StandardConverter, Unit, UnitConverter};
use cut_planner::width::{WidthPlan, WidthSolver};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Clone)]
struct AppState {
    store: Arc<InMemoryStore>,
    default_kerf: f64,
}

/// Kerf and display overrides shared by the planning requests.
#[derive(Deserialize, Serialize, Default)]
struct Tuning {
    #[serde(default)]
    kerf: Option<Decimal>,
    #[serde(default)]
    kerf_unit: Unit,
    #[serde(default)]
    display_unit: Unit,
}

impl Tuning {
    fn config(&self, default_kerf: f64) -> Result<OptimizerConfig, (StatusCode, String)> {
        let config = OptimizerConfig {
            kerf: default_kerf,
            ..OptimizerConfig::default()
        }
        .with_display_unit(self.display_unit);
        match self.kerf {
            Some(kerf) => {
                let value = kerf
                    .to_f64()
                    .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("invalid kerf {kerf}")))?;
                config
                    .with_kerf(value, self.kerf_unit)
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
            }
            None => config
                .validate()
                .map(|_| config)
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string())),
        }
    }
}

#[derive(Deserialize, Serialize)]
struct LinearRequest {
    #[serde(default = "default_material_id")]
    material_id: String,
    #[serde(default)]
    standard_lengths: Vec<StandardStockOption>,
    stock: Vec<StockBatch>,
    #[serde(default)]
    gauge: Option<String>,
    cuts: Vec<CutRequest>,
    #[serde(flatten)]
    tuning: Tuning,
}

#[derive(Deserialize, Serialize)]
struct CutRequest {
    length: Decimal,
    #[serde(default)]
    unit: Unit,
    #[serde(default = "default_qty")]
    qty: u32,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Deserialize, Serialize)]
struct WidthRequest {
    #[serde(default)]
    standard_widths: Vec<StandardStockOption>,
    width: Decimal,
    length: Decimal,
    #[serde(default)]
    unit: Unit,
}

#[derive(Deserialize, Serialize)]
struct PlanRequest {
    items: Vec<LineItem>,
    #[serde(flatten)]
    tuning: Tuning,
}

fn default_material_id() -> String {
    "adhoc".to_string()
}

fn default_qty() -> u32 {
    1
}

fn optimize_status(e: &OptimizeError) -> StatusCode {
    match e {
        OptimizeError::Shortfall { .. } => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn plan_status(e: &PlanError) -> StatusCode {
    match e {
        PlanError::MaterialNotFound(_) | PlanError::PlanNotFound(_) => StatusCode::NOT_FOUND,
        PlanError::PlanFinalized(_) | PlanError::StockChanged { .. } => StatusCode::CONFLICT,
        PlanError::Optimize { source, .. } => optimize_status(source),
        PlanError::Lock(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PlanError::Conversion(_) => StatusCode::BAD_REQUEST,
    }
}

fn plan_error(e: PlanError) -> (StatusCode, String) {
    (plan_status(&e), e.to_string())
}

async fn optimize_linear(
    State(state): State<AppState>,
    Json(req): Json<LinearRequest>,
) -> Result<Json<CuttingPlan>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize/linear"
    );

    let config = req.tuning.config(state.default_kerf)?;
    let mut material = Material::new(req.material_id, &req.stock);
    material.stock_options = req.standard_lengths;
    material.gauge = req.gauge;

    let mut cuts = Vec::new();
    for cut in &req.cuts {
        let length = StandardConverter
            .to_inches(cut.length, cut.unit)
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        let name = cut
            .label
            .clone()
            .unwrap_or_else(|| format!("{} {}", cut.length.normalize(), cut.unit));
        cuts.extend((1..=cut.qty).map(|n| RequiredCut::new(length, format!("{name} #{n}"))));
    }

    let solver = state.store.solver(config);
    let plan = solver
        .catalog(&material)
        .and_then(|catalog| solver.solve(&catalog, &cuts))
        .map_err(|e| (optimize_status(&e), e.to_string()))?;
    Ok(Json(plan))
}

async fn optimize_width(
    Json(req): Json<WidthRequest>,
) -> Result<Json<WidthPlan>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize/width"
    );

    WidthSolver::new()
        .solve(&req.standard_widths, req.width, req.length, req.unit)
        .map(Json)
        .map_err(|e| {
            let status = match e {
                WidthError::NoFeasibleWidth { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_REQUEST,
            };
            (status, e.to_string())
        })
}

async fn put_material(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(raw): Json<RawMaterial>,
) -> Result<Json<Material>, (StatusCode, String)> {
    let mut material = Material::from(raw);
    material.id = id;
    state
        .store
        .upsert_material(material.clone())
        .map_err(plan_error)?;
    Ok(Json(material))
}

async fn plan_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<PlanSnapshot>, (StatusCode, String)> {
    tracing::info!(order = %order_id, items = req.items.len(), "POST /orders/plan");
    let config = req.tuning.config(state.default_kerf)?;
    state
        .store
        .plan_order(&order_id, &req.items, config)
        .map(Json)
        .map_err(plan_error)
}

async fn get_plan(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<PlanSnapshot>, (StatusCode, String)> {
    state
        .store
        .order_plan(&order_id)
        .map_err(plan_error)?
        .map(Json)
        .ok_or_else(|| plan_error(PlanError::PlanNotFound(order_id)))
}

async fn commit_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<PlanSnapshot>, (StatusCode, String)> {
    tracing::info!(order = %order_id, "POST /orders/commit");
    state
        .store
        .commit_order(&order_id)
        .map(Json)
        .map_err(plan_error)
}

/// Reads a JSON weight table: `{"unit": "ft", "rates": {"14ga": "1.25"}}`.
fn load_weights(path: &str) -> Result<WeightTable, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&text).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let log_path = std::env::var("LOG_FILE").unwrap_or_else(|_| "development.log".to_string());
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .unwrap_or_else(|e| panic!("failed to open {log_path}: {e}"));

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let default_kerf = std::env::var("DEFAULT_KERF_IN")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(OptimizerConfig::DEFAULT_KERF_IN);

    let mut store = InMemoryStore::new();
    if let Ok(path) = std::env::var("WEIGHT_TABLE") {
        let weights = load_weights(&path).unwrap_or_else(|e| panic!("failed to load {path}: {e}"));
        tracing::info!(path = %path, gauges = weights.rates.len(), "loaded weight table");
        store = store.with_weights(weights);
    }

    let state = AppState {
        store: Arc::new(store),
        default_kerf,
    };

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/optimize/linear", post(optimize_linear))
        .route("/optimize/width", post(optimize_width))
        .route("/materials/{id}", put(put_material))
        .route("/orders/{id}/plan", post(plan_order).get(get_plan))
        .route("/orders/{id}/commit", post(commit_order))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}
