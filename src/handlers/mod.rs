// src/handlers/mod.rs

//! Route handlers. Each validates its input, calls the upstream client
//! attached to the request and wraps the result in the `{"data": ...}` envelope.

pub mod auth;
pub mod config;
pub mod distribution;
pub mod files;
pub mod health;
pub mod models;
pub mod namespaces;
pub mod openapi;
pub mod responses;
pub mod s3;
pub mod secrets;
pub mod user;
pub mod vectorstores;

use crate::validation::{FieldError, FieldErrors};
use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// Success envelope.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { data })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, ok(data))
}

pub const ORDERS: [&str; 2] = ["asc", "desc"];

/// Parses an optional integer query value, recording a field error when it is
/// not a number or falls outside `min..=max`.
pub(crate) fn parse_bounded(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
    min: i64,
    max: i64,
) -> Option<i64> {
    let raw = raw?.trim();
    match raw.parse::<i64>() {
        Ok(value) if (min..=max).contains(&value) => Some(value),
        Ok(_) => {
            errors.push(FieldError::invalid(
                field,
                format!("must be between {min} and {max}"),
            ));
            None
        }
        Err(_) => {
            errors.push(FieldError::invalid(field, format!("{raw:?} is not an integer")));
            None
        }
    }
}

/// Validates an optional `asc`/`desc` sort order.
pub(crate) fn parse_order(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim().to_ascii_lowercase();
    if ORDERS.contains(&raw.as_str()) {
        Some(raw)
    } else {
        errors.push(FieldError::not_supported(field, &raw, &ORDERS));
        None
    }
}
