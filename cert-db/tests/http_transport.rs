//! HTTP transport tests
//!
//! Serves the ledger simulator over axum on an ephemeral port and drives the
//! certificate service through `HttpTransport`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use cert_core::{Caller, ErrorKind, FieldMap, HistoryAction, LedgerError, LedgerResult};
use cert_db::transport::{functions, TransportRequest};
use cert_db::{CertificateService, HttpTransport, LedgerStore, MockTransport, Transport};
use std::sync::Arc;
use std::time::Duration;

fn status_for(err: &LedgerError) -> StatusCode {
    match err.kind() {
        ErrorKind::AccessDenied => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Connectivity => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Serialization => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(result: LedgerResult<Vec<u8>>) -> Response {
    match result {
        Ok(bytes) => (StatusCode::OK, bytes).into_response(),
        Err(e) => (status_for(&e), e.to_string()).into_response(),
    }
}

async fn submit(
    State(ledger): State<Arc<MockTransport>>,
    Json(req): Json<TransportRequest>,
) -> Response {
    respond(ledger.submit(&req.function, &req.args).await)
}

async fn evaluate(
    State(ledger): State<Arc<MockTransport>>,
    Json(req): Json<TransportRequest>,
) -> Response {
    respond(ledger.evaluate(&req.function, &req.args).await)
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Start an HTTP ledger gateway backed by the simulator
async fn serve_ledger(ledger: Arc<MockTransport>) -> String {
    let app = Router::new()
        .route("/submit", post(submit))
        .route("/evaluate", post(evaluate))
        .with_state(ledger);
    serve(app).await
}

fn service_at(base_url: &str) -> CertificateService {
    let transport = HttpTransport::new(base_url, Duration::from_secs(5)).unwrap();
    let store = LedgerStore::new(Arc::new(transport), Duration::from_secs(5));
    CertificateService::new(Arc::new(store))
}

fn fields(pairs: &[(&str, &str)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn certificate(id: &str) -> FieldMap {
    fields(&[
        ("id", id),
        ("studentId", "STU001"),
        ("studentName", "Alice Johnson"),
        ("course", "Blockchain Development"),
        ("grade", "A"),
        ("issuedAt", "2025-01-15"),
    ])
}

#[tokio::test]
async fn test_full_lifecycle_over_http() {
    let ledger = Arc::new(MockTransport::new());
    let url = serve_ledger(ledger.clone()).await;
    let svc = service_at(&url);
    let univ = Caller::university("UNIV1");

    let created = svc.create_certificate(&certificate("CERT1"), &univ).await.unwrap();
    assert_eq!(created.issued_by, "UNIV1");

    let updated = svc
        .update_certificate("CERT1", &fields(&[("grade", "B")]), &univ)
        .await
        .unwrap();
    assert_eq!(updated.grade, "B");
    assert_eq!(updated.issued_by, "UNIV1");

    let result = svc
        .verify_certificate("CERT1", &fields(&[("grade", "A")]), &Caller::verifier("VER1"))
        .await
        .unwrap();
    assert!(!result.valid);
    assert_eq!(result.reason.as_deref(), Some("grade"));

    svc.delete_certificate("CERT1", &univ).await.unwrap();
    assert!(svc.get_all_certificates(&univ).await.unwrap().is_empty());

    let history = svc.get_certificate_history("CERT1", &univ).await.unwrap();
    let actions: Vec<HistoryAction> = history.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![HistoryAction::Create, HistoryAction::Update, HistoryAction::Delete]
    );
    assert!(history.iter().all(|e| e.tx_id.starts_with("ledger-")));

    // one submit per mutation reached the ledger
    assert_eq!(ledger.submit_count(), 3);
    assert!(svc.health().await.unwrap().available);
}

#[tokio::test]
async fn test_status_codes_keep_error_kind() {
    let ledger = Arc::new(MockTransport::new());
    let url = serve_ledger(ledger).await;
    let svc = service_at(&url);
    let univ = Caller::university("UNIV1");

    let err = svc.get_certificate("MISSING", &univ).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    svc.create_certificate(&certificate("CERT1"), &univ).await.unwrap();
    let err = svc
        .create_certificate(&certificate("CERT1"), &univ)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_gateway_denial_is_access_denied() {
    let app = Router::new().fallback(|| async { (StatusCode::FORBIDDEN, "identity not enrolled") });
    let url = serve(app).await;
    let transport = HttpTransport::new(&url, Duration::from_secs(5)).unwrap();

    let err = transport.evaluate(functions::PING, &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    assert!(err.to_string().contains("identity not enrolled"));
}

#[tokio::test]
async fn test_server_error_is_connectivity_failure() {
    let app = Router::new().fallback(|| async { StatusCode::BAD_GATEWAY });
    let url = serve(app).await;
    let transport = HttpTransport::new(&url, Duration::from_secs(5)).unwrap();

    let err = transport
        .submit(functions::DELETE_CERTIFICATE, &["CERT1".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connectivity);
}

#[tokio::test]
async fn test_unreachable_gateway() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let svc = service_at(&format!("http://{}", addr));
    let err = svc
        .get_all_certificates(&Caller::admin("ADMIN1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connectivity);

    let health = svc.health().await.unwrap();
    assert!(!health.available);
}

#[tokio::test]
async fn test_slow_gateway_times_out() {
    let app = Router::new().fallback(|| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        StatusCode::OK
    });
    let url = serve(app).await;
    let transport = HttpTransport::new(&url, Duration::from_millis(100)).unwrap();

    let err = transport.evaluate(functions::PING, &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connectivity);
}
