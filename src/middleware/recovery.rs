// src/middleware/recovery.rs

use crate::error::{error_response, GENERIC_SERVER_MESSAGE};
use axum::{http::StatusCode, response::Response};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    }
}

/// Turns a handler panic into a 500 envelope.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let backtrace = std::backtrace::Backtrace::force_capture();
    error!(
        panic = panic_message(panic.as_ref()),
        backtrace = %backtrace,
        "Handler panicked"
    );
    error_response(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_SERVER_MESSAGE)
}

pub fn recovery_layer() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response> {
    CatchPanicLayer::custom(handle_panic as fn(Box<dyn Any + Send + 'static>) -> Response)
}
