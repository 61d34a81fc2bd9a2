//! In-memory collaborators for exercising the engine without a network or UI

use crate::error::TransportError;
use crate::interceptor::request_path;
use crate::state::Navigator;
use crate::transport::{HttpRequest, HttpResponse, Transport};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;

/// Transport answering from a per-path script and recording every call.
///
/// Unscripted paths answer `404`.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    routes: RefCell<HashMap<String, Result<HttpResponse, String>>>,
    calls: RefCell<Vec<HttpRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, response: HttpResponse) {
        self.routes
            .borrow_mut()
            .insert(request_path(path), Ok(response));
    }

    pub fn respond_json(&self, path: &str, status: u16, body: Value) {
        self.respond(path, HttpResponse::new(status, body.to_string()));
    }

    /// Makes requests to `path` fail at the network level.
    pub fn fail(&self, path: &str, message: &str) {
        self.routes
            .borrow_mut()
            .insert(request_path(path), Err(message.to_string()));
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        let path = request_path(path);
        self.calls
            .borrow()
            .iter()
            .filter(|r| request_path(&r.url) == path)
            .count()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.borrow_mut().push(request.clone());
        match self.routes.borrow().get(&request_path(&request.url)) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(TransportError::Network(message.clone())),
            None => Ok(HttpResponse::new(404, "")),
        }
    }
}

/// Navigator that keeps a history instead of routing anywhere.
#[derive(Debug, Clone)]
pub struct RecordingNavigator {
    current: String,
    history: Vec<String>,
}

impl RecordingNavigator {
    pub fn new(start: &str) -> Self {
        Self {
            current: start.to_string(),
            history: Vec::new(),
        }
    }

    /// Simulates the user navigating on their own.
    pub fn visit(&mut self, surface: &str) {
        self.current = surface.to_string();
    }

    /// Surfaces the gate navigated to, in order.
    pub fn history(&self) -> &[String] {
        &self.history
    }
}

impl Navigator for RecordingNavigator {
    fn current_surface(&self) -> String {
        self.current.clone()
    }

    fn navigate_to(&mut self, surface: &str) {
        self.current = surface.to_string();
        self.history.push(surface.to_string());
    }
}
