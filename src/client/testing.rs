//! Test doubles for the HTTP seam

use super::{HttpResponse, Transport, TransportError};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replays scripted responses; repeats the last one once the script runs out
pub struct ScriptedTransport {
    script: Mutex<VecDeque<HttpResponse>>,
    last: Mutex<Option<HttpResponse>>,
    pub calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(script: Vec<HttpResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(response: HttpResponse) -> Self {
        Self::new(vec![response])
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(
        &self,
        _endpoint: &str,
        _headers: &HeaderMap,
        _verify: bool,
    ) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(response) = next {
            *last = Some(response);
        }
        Ok(last.clone().expect("script must not be empty"))
    }
}
