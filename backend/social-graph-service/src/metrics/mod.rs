/// Prometheus metrics for social-graph-service
use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    /// Graph mutations (labels: operation=follow|unfollow|remove_follower, result=ok|<error code>)
    pub static ref GRAPH_MUTATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "social_graph_mutations_total",
        "Follow graph mutations by operation and result",
        &["operation", "result"]
    )
    .expect("register social_graph_mutations_total");

    /// Optimistic edge commits that lost a race and were retried
    pub static ref GRAPH_COMMIT_RETRIES_TOTAL: IntCounter = register_int_counter!(
        "social_graph_commit_retries_total",
        "Edge commits retried after a version conflict"
    )
    .expect("register social_graph_commit_retries_total");

    /// Feed composition latency (labels: source=home|user|hashtag)
    pub static ref FEED_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "feed_request_duration_seconds",
        "Time spent composing a feed page",
        &["source"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("register feed_request_duration_seconds");

    /// Story view attempts (labels: outcome=recorded|already_viewed|rejected)
    pub static ref STORY_VIEW_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "story_view_events_total",
        "Story view recording attempts by outcome",
        &["outcome"]
    )
    .expect("register story_view_events_total");

    /// Hashtag counter increments
    pub static ref HASHTAG_INCREMENTS_TOTAL: IntCounter = register_int_counter!(
        "hashtag_increments_total",
        "Hashtag trend counter increments"
    )
    .expect("register hashtag_increments_total");
}

pub fn record_mutation(operation: &str, result: &str) {
    GRAPH_MUTATIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
}

/// Serve Prometheus metrics in text format
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(buffer),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}
