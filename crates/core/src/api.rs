//! Backend endpoints consumed by the gate

use crate::config::ApiConfig;
use crate::error::GateError;
use crate::interceptor::request_path;
use crate::model::StatusResponse;
use crate::transport::{HttpRequest, HttpResponse};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CheckoutVerifyRequest<'a> {
    pub session_id: &'a str,
}

/// `GET status`
pub fn status_request(api: &ApiConfig) -> HttpRequest {
    HttpRequest::get(api.url_for(&api.status_path))
}

/// `POST expire-now`, idempotent on the server.
pub fn expire_now_request(api: &ApiConfig) -> HttpRequest {
    HttpRequest::post(api.url_for(&api.expire_now_path), None)
}

/// `POST checkout-verify` for the session a payment redirect returned with.
pub fn checkout_verify_request(api: &ApiConfig, session_id: &str) -> HttpRequest {
    let body = serde_json::to_value(CheckoutVerifyRequest { session_id }).ok();
    HttpRequest::post(api.url_for(&api.checkout_verify_path), body)
}

/// Decodes a status response, rejecting non-2xx and locally synthesized ones.
pub fn parse_status(request: &HttpRequest, response: &HttpResponse) -> Result<StatusResponse, GateError> {
    ensure_success(request, response)?;
    Ok(response.json()?)
}

pub fn ensure_success(request: &HttpRequest, response: &HttpResponse) -> Result<(), GateError> {
    if response.is_success() && !response.synthesized {
        return Ok(());
    }
    Err(GateError::Http {
        status: response.status,
        path: request_path(&request.url),
    })
}
