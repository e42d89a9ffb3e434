use axum::{routing::get, Router};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Bind a `TcpListener` on the provided bind address to serve a `Router` on it.
pub async fn serve(router: Router, bind: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, router).await?;

    Ok(())
}

/// Add the prometheus `/metrics` endpoint to a router. Installs the global recorder, so it
/// must only be called once per process.
pub fn setup_metrics_routes(router: Router) -> Result<Router, BuildError> {
    let recorder_handle = setup_metrics_recorder()?;

    Ok(router.route(
        "/metrics",
        get(move || std::future::ready(recorder_handle.render())),
    ))
}

pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    // Message processing is expected to be short, most buckets are sub-second.
    const PROCESSING_SECONDS: &[f64] = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(PROCESSING_SECONDS)?
        .install_recorder()
}
