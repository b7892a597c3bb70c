use crate::constants::ENV_PUSHGATEWAY_URL;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, warn};

const JOB_NAME: &str = "json_batch_etl";

fn push_url(base: &str, instance: &str) -> String {
    format!(
        "{}/metrics/job/{}/instance/{}",
        base.trim_end_matches('/'),
        JOB_NAME,
        instance.trim_matches('/').replace('/', "_")
    )
}

/// Push everything the recorder has collected to a Prometheus Pushgateway when
/// `ETL_PUSHGATEWAY_URL` is set. Failures are logged and never fail the run.
pub async fn push_metrics(instance: &str, handle: &PrometheusHandle) {
    let base = match std::env::var(ENV_PUSHGATEWAY_URL) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => return,
    };
    let push_url = push_url(&base, instance);
    let body = handle.render();

    let client = reqwest::Client::new();
    let push_res = client
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await;

    match push_res {
        Ok(r) if r.status().is_success() => {
            info!("Pushed run metrics to Pushgateway for instance={}", instance);
        }
        Ok(r) => {
            warn!("Pushgateway push responded with status {} for instance={}", r.status().as_u16(), instance);
        }
        Err(e) => {
            warn!("Failed to push metrics to Pushgateway for instance={}: {}", instance, e);
        }
    }
}
