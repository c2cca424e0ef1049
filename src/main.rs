use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Duration, NaiveDate};
use clap::{Args, Parser, Subcommand};
use licenseflow::audit::TracingAuditSink;
use licenseflow::clock::{Clock, SystemClock};
use licenseflow::config::AppConfig;
use licenseflow::error::AppError;
use licenseflow::infra::MemoryStore;
use licenseflow::payments::{PaymentLedger, PaymentMethod};
use licenseflow::procedures::{
    HolderId, HolderRecord, LicenseClass, ProcedureError, ProcedureId, ProcedureKind,
    ProcedureService, ProcedureSnapshot,
};
use licenseflow::scheduling::{
    AppointmentKind, AppointmentScheduler, ResourceId, ResourceKind, ResourceRecord,
};
use licenseflow::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

type Engine = ProcedureService<MemoryStore, TracingAuditSink, SystemClock>;
type Ledger = PaymentLedger<MemoryStore, TracingAuditSink, SystemClock>;
type Scheduler = AppointmentScheduler<MemoryStore, TracingAuditSink, SystemClock>;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
    store: MemoryStore,
    engine: Arc<Engine>,
    ledger: Arc<Ledger>,
    holder_sequence: Arc<AtomicU64>,
}

#[derive(Parser, Debug)]
#[command(
    name = "Licenseflow",
    about = "Run the driver's-license procedure engine from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a first-issue procedure end to end against in-memory stores
    Demo,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured bind host
    #[arg(long)]
    host: Option<String>,
    /// Override the configured bind port
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct RegisterHolderRequest {
    national_id: String,
    full_name: String,
    birth_date: NaiveDate,
    email: Option<String>,
}

#[derive(Debug, Serialize)]
struct RegisterHolderResponse {
    holder_id: HolderId,
}

#[derive(Debug, Deserialize)]
struct StartProcedureRequest {
    holder_id: String,
    kind: ProcedureKind,
    license_class: LicenseClass,
}

#[derive(Debug, Deserialize)]
struct CreatePaymentOrderRequest {
    amount_cents: i64,
    method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
struct AccreditPaymentRequest {
    #[serde(default)]
    receipt_ref: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo => run_demo(),
    }
}

fn build_state(
    store: MemoryStore,
    metrics: PrometheusHandle,
    payment_expiry: Duration,
) -> AppState {
    let audit = Arc::new(TracingAuditSink);
    let shared = Arc::new(store.clone());
    let engine = Arc::new(ProcedureService::new(
        shared.clone(),
        audit.clone(),
        SystemClock,
    ));
    let ledger = Arc::new(
        PaymentLedger::new(shared, audit, SystemClock).with_expiry(payment_expiry),
    );
    AppState {
        readiness: Arc::new(AtomicBool::new(false)),
        metrics,
        store,
        engine,
        ledger,
        holder_sequence: Arc::new(AtomicU64::new(1)),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let state = build_state(
        MemoryStore::default(),
        prometheus_handle,
        Duration::hours(config.engine.payment_expiry_hours),
    );
    let readiness_flag = state.readiness.clone();

    let app = router(state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "procedure engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/holders", post(register_holder_endpoint))
        .route("/api/v1/procedures", post(start_procedure_endpoint))
        .route("/api/v1/procedures/:id", get(procedure_snapshot_endpoint))
        .route(
            "/api/v1/procedures/:id/payment-orders",
            post(create_payment_order_endpoint),
        )
        .route(
            "/api/v1/payment-orders/:id/accredit",
            post(accredit_payment_order_endpoint),
        )
        .with_state(state)
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn register_holder_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<RegisterHolderRequest>,
) -> Result<Json<RegisterHolderResponse>, AppError> {
    let id = state.holder_sequence.fetch_add(1, Ordering::Relaxed);
    let holder = state
        .store
        .insert_holder(HolderRecord {
            id: HolderId(format!("hld-{id:06}")),
            national_id: payload.national_id,
            full_name: payload.full_name,
            birth_date: payload.birth_date,
            email: payload.email,
        })
        .map_err(ProcedureError::Store)?;
    Ok(Json(RegisterHolderResponse {
        holder_id: holder.id,
    }))
}

async fn start_procedure_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<StartProcedureRequest>,
) -> Result<Json<ProcedureSnapshot>, AppError> {
    let record = state.engine.start(
        &HolderId(payload.holder_id),
        payload.kind,
        payload.license_class,
    )?;
    let snapshot = state.engine.snapshot(&record.id)?;
    Ok(Json(snapshot))
}

async fn procedure_snapshot_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProcedureSnapshot>, AppError> {
    let snapshot = state.engine.snapshot(&ProcedureId(id))?;
    Ok(Json(snapshot))
}

async fn create_payment_order_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CreatePaymentOrderRequest>,
) -> Result<Json<licenseflow::payments::PaymentOrderRecord>, AppError> {
    let order = state
        .ledger
        .create_order(&ProcedureId(id), payload.amount_cents, payload.method)?;
    Ok(Json(order))
}

async fn accredit_payment_order_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AccreditPaymentRequest>,
) -> Result<Json<licenseflow::payments::PaymentOrderRecord>, AppError> {
    let order = state
        .ledger
        .accredit(&licenseflow::payments::PaymentOrderId(id), payload.receipt_ref)?;
    Ok(Json(order))
}

/// Seed in-memory stores and walk a first-issue procedure through every
/// checkpoint, printing the snapshot after each milestone.
fn run_demo() -> Result<(), AppError> {
    let store = Arc::new(MemoryStore::default());
    let audit = Arc::new(TracingAuditSink);
    let engine: Engine = ProcedureService::new(store.clone(), audit.clone(), SystemClock);
    let ledger: Ledger = PaymentLedger::new(store.clone(), audit.clone(), SystemClock);
    let scheduler: Scheduler = AppointmentScheduler::new(store.clone(), audit, SystemClock);

    let holder = store
        .insert_holder(HolderRecord {
            id: HolderId("hld-demo".to_string()),
            national_id: "30123456".to_string(),
            full_name: "Ana Demo".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1992, 3, 15).unwrap_or_default(),
            email: None,
        })
        .map_err(ProcedureError::Store)?;

    for (id, kind) in [
        ("res-exam", ResourceKind::ExamRoom),
        ("res-med", ResourceKind::MedicalOffice),
        ("res-track", ResourceKind::PracticeTrack),
    ] {
        store
            .insert_resource(ResourceRecord {
                id: ResourceId(id.to_string()),
                name: id.to_string(),
                kind,
                active: true,
                opens_at: chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
                closes_at: chrono::NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
                slot_minutes: 30,
                capacity: 1,
            })
            .map_err(ProcedureError::Store)?;
    }

    let procedure = engine.start(&holder.id, ProcedureKind::Issue, LicenseClass::Car)?;
    print_snapshot(&engine, &procedure.id)?;

    engine.register_documentation(&procedure.id, true, None)?;

    let slot_start = (SystemClock.today() + Duration::days(1))
        .and_hms_opt(9, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|| SystemClock.now());
    for (kind, resource) in [
        (AppointmentKind::MedicalCheck, "res-med"),
        (AppointmentKind::TheoryExam, "res-exam"),
        (AppointmentKind::PracticalExam, "res-track"),
    ] {
        let appointment = scheduler.book(
            &holder.id,
            kind,
            slot_start,
            slot_start + Duration::minutes(30),
            &ResourceId(resource.to_string()),
            Some(procedure.id.clone()),
        )?;
        scheduler.confirm(&appointment.id)?;
    }

    engine.register_medical(&procedure.id, true, None)?;
    engine.register_theory(&procedure.id, 85)?;
    engine.register_practical(&procedure.id, 0, 2)?;
    print_snapshot(&engine, &procedure.id)?;

    let order = ledger.create_order(&procedure.id, 150_000, PaymentMethod::Card)?;
    ledger.accredit(&order.id, Some("receipt-001".to_string()))?;
    engine.register_payment(&procedure.id)?;

    let license = engine.issue_license(&procedure.id)?;
    println!(
        "issued license {} ({}), valid until {}",
        license.number,
        license.class.label(),
        license.expires_on
    );
    print_snapshot(&engine, &procedure.id)?;
    Ok(())
}

fn print_snapshot(engine: &Engine, id: &ProcedureId) -> Result<(), AppError> {
    let snapshot = engine.snapshot(id)?;
    match serde_json::to_string_pretty(&snapshot) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => eprintln!("failed to render snapshot: {err}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    // `PrometheusMetricLayer::pair` installs a process-global recorder,
    // so every test shares one handle.
    fn metrics_handle() -> PrometheusHandle {
        static HANDLE: std::sync::OnceLock<PrometheusHandle> = std::sync::OnceLock::new();
        HANDLE
            .get_or_init(|| PrometheusMetricLayer::pair().1)
            .clone()
    }

    fn test_state() -> AppState {
        build_state(MemoryStore::default(), metrics_handle(), Duration::hours(48))
    }

    #[test]
    fn state_builds_repeatedly_without_reinstalling_the_recorder() {
        let _first = test_state();
        let _second = test_state();
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn holder_then_procedure_flow() {
        let app = router(test_state());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/holders")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({
                            "national_id": "28999111",
                            "full_name": "Test Holder",
                            "birth_date": "1990-05-01"
                        })
                        .to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        let holder_id = payload["holder_id"]
            .as_str()
            .expect("holder id")
            .to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/procedures")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({
                            "holder_id": holder_id,
                            "kind": "issue",
                            "license_class": "car"
                        })
                        .to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 8192)
            .await
            .expect("body");
        let snapshot: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(snapshot["status"], "initiated");
        assert_eq!(snapshot["may_issue"], false);
    }
}
