//! Scripted transport for unit tests.

use std::{collections::VecDeque, sync::Mutex};

use serde_json::Value;

use crate::{
    error::{Error, Result},
    http::{ApiRequest, Transport},
};

/// Replays queued responses in order and records every request.
///
/// An exhausted script answers with `NotFound`.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<Value>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new(responses: impl IntoIterator<Item = Result<Value>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::default(),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    async fn get_json(&self, request: ApiRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::not_found("script exhausted")))
    }
}

pub fn timeout() -> Result<Value> {
    Err(Error::deadline_exceeded("operation timed out"))
}
