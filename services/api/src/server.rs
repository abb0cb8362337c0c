use crate::cli::ServeArgs;
use crate::infra::{AppState, BroadcastNotifier, InMemoryAlertStore, InMemoryCheckinRepository};
use crate::routes::with_checkin_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use gatepass::config::AppConfig;
use gatepass::error::AppError;
use gatepass::telemetry;
use gatepass::workflows::checkins::CheckinService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let notifier = BroadcastNotifier::new();
    spawn_live_feed_logger(&notifier);

    let checkin_service = Arc::new(
        CheckinService::new(
            Arc::new(InMemoryCheckinRepository::default()),
            Arc::new(InMemoryAlertStore::default()),
            config.detection.clone(),
        )
        .with_notifier(Arc::new(notifier)),
    );

    let app = with_checkin_routes(checkin_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        max_trip_km = config.detection.max_trip_km,
        max_speed_kmh = config.detection.max_average_speed_kmh,
        "gate-pass check-in service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Mirror the live verdict feed into the service log until the notifier is dropped.
fn spawn_live_feed_logger(notifier: &BroadcastNotifier) {
    let mut receiver = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => info!(
                    checkin_id = %event.checkin_id.0,
                    store = %event.store_code,
                    vehicle = %event.vehicle_number,
                    fraud_score = event.fraud_score,
                    is_fraudulent = event.is_fraudulent,
                    alerts_raised = event.alerts_raised,
                    "live verdict published"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "live verdict feed lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
