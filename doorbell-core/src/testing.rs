//! Test doubles for the transport and clock seams.
//!
//! Lets tests drive the login and polling flows without a router on the
//! network or real time passing.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::transport::{HttpResponse, RouterTransport, TransportError};

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Starts at 2001-09-09T01:46:40Z (unix time 1_000_000_000).
    pub fn at_epoch_billion() -> Self {
        Self::new(DateTime::from_timestamp(1_000_000_000, 0).unwrap_or_default())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("lock poisoned");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("lock poisoned")
    }
}

/// HTTP method of a recorded request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request seen by [`ScriptedTransport`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub form: Vec<(String, String)>,
}

impl RecordedRequest {
    /// Value of a submitted form field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A transport that replays queued responses in order and records every request.
///
/// Once the queue is exhausted every request fails with a connection error.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response with the given status and body.
    pub fn respond(&self, status: u16, body: impl Into<String>) -> &Self {
        self.responses
            .lock()
            .expect("lock poisoned")
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    /// Queues a transport-level failure.
    pub fn fail(&self, reason: &str) -> &Self {
        self.responses
            .lock()
            .expect("lock poisoned")
            .push_back(Err(reason.to_string()));
        self
    }

    /// Every request made so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("lock poisoned").len()
    }

    fn next(&self, request: RecordedRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().expect("lock poisoned").push(request);
        match self.responses.lock().expect("lock poisoned").pop_front() {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(reason)) => Err(TransportError::Connection(reason)),
            None => Err(TransportError::Connection("no scripted response left".to_string())),
        }
    }
}

#[async_trait]
impl RouterTransport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.next(RecordedRequest {
            method: Method::Get,
            url: url.to_string(),
            form: Vec::new(),
        })
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        self.next(RecordedRequest {
            method: Method::Post,
            url: url.to_string(),
            form: form
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }
}
