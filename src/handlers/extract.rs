//! Extractors whose rejections use the standard failure envelope.
//!
//! axum's own `Json`, `Path` and `Query` reject with plain-text bodies and
//! 415/422 statuses. These wrappers turn every rejection into a
//! `ServiceError::ValidationError`, so malformed input is a 400 with
//! `errors: ["validation_error"]` like any other bad request.

use axum::extract::{FromRequest, FromRequestParts};

use crate::errors::ServiceError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub struct AppJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ServiceError))]
pub struct AppPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServiceError))]
pub struct AppQuery<T>(pub T);
