use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Prometheus metrics scrape endpoint.
/// Returns job and image counters in Prometheus text exposition format.
pub async fn prometheus_metrics(
    axum::extract::State(handle): axum::extract::State<Arc<PrometheusHandle>>,
) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for the metrics emitted by the generation handler.
pub fn describe() {
    ::metrics::describe_counter!("image_jobs_total", "Total generation jobs started");
    ::metrics::describe_counter!(
        "image_jobs_completed",
        "Generation jobs that saved every image and their metadata"
    );
    ::metrics::describe_counter!(
        "image_jobs_failed",
        "Generation jobs that ended with an error"
    );
    ::metrics::describe_counter!("images_generated_total", "Images saved to disk");
    ::metrics::describe_histogram!(
        "image_job_duration_seconds",
        "Wall time from first upstream call to metadata write"
    );
}
