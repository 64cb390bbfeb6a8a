use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
    Router,
};
use slog::{o, Drain, Logger};
use slog_async::Async;
use slog_term::{FullFormat, PlainDecorator, TermDecorator};
use std::sync::Arc;
use std::time::Instant;

use crate::handlers::common::STORE_HEADER;

/// Configuration for the HTTP access logger
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub async_buffer_size: usize,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            async_buffer_size: 1024,
            use_color: true,
        }
    }
}

/// Builds the async slog drain used for access logging
pub fn setup_logger(config: LoggerConfig) -> Logger {
    let drain = if config.use_color {
        let decorator = TermDecorator::new().force_color().build();
        Async::new(FullFormat::new(decorator).build().fuse())
            .chan_size(config.async_buffer_size)
            .build()
            .fuse()
    } else {
        let decorator = PlainDecorator::new(std::io::stdout());
        Async::new(FullFormat::new(decorator).build().fuse())
            .chan_size(config.async_buffer_size)
            .build()
            .fuse()
    };

    Logger::root(
        drain,
        o!("service" => "storekeep-api", "version" => env!("CARGO_PKG_VERSION")),
    )
}

#[derive(Clone)]
pub struct LoggingState {
    logger: Logger,
}

impl LoggingState {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

/// One access-log line per request, tagged with the store it was made for
pub async fn logging_middleware(
    State(state): State<Arc<LoggingState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let start_time = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let store = req
        .headers()
        .get(STORE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let response = next.run(req).await;
    let status = response.status().as_u16();
    let duration_ms: u128 = start_time.elapsed().as_millis();

    if status >= 500 {
        slog::error!(
            &state.logger,
            "HTTP request failed";
            "method" => method,
            "path" => path,
            "store" => store,
            "status" => status,
            "duration_ms" => duration_ms,
        );
    } else {
        slog::info!(
            &state.logger,
            "HTTP request handled";
            "method" => method,
            "path" => path,
            "store" => store,
            "status" => status,
            "duration_ms" => duration_ms,
        );
    }

    Ok(response)
}

/// Layers the access log onto an already-built router
pub fn with_access_log(router: Router, logger: Logger) -> Router {
    let logging_state = Arc::new(LoggingState::new(logger));
    router.layer(axum::middleware::from_fn_with_state(
        logging_state,
        logging_middleware,
    ))
}
