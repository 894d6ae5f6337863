//! Observability infrastructure.
//!
//! Structured logging setup. Cache metrics are emitted through the `metrics`
//! facade by the domain crate and described by
//! [`register_cache_metrics`](warden_domain::register_cache_metrics).

mod logging;

pub use logging::{create_json_layer, init_logging, LoggingConfig};
