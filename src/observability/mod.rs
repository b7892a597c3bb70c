// Observability: logging and run metrics

pub mod logging;
pub mod metrics;
pub mod metrics_push;

pub use logging::init_logging;
pub use metrics_push::push_metrics;
