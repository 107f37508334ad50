// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use market_data_collector::ingest::fetcher::{RawResponse, Transport, TransportError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const AV_DAILY: &str = include_str!("../fixtures/alpha_vantage_daily.json");
pub const BCB_SELIC: &str = include_str!("../fixtures/bcb_sgs_selic.json");
pub const NEWS_PAGE: &str = include_str!("../fixtures/news_page.html");

type Reply = Result<RawResponse, TransportError>;

#[derive(Default)]
struct Inner {
    scripts: HashMap<String, VecDeque<Reply>>,
    calls: Vec<String>,
}

/// In-memory transport: replies are queued per URL and consumed in order.
/// Unscripted requests answer 404.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, status: u16, body: &str) -> Self {
        self.push(
            url,
            Ok(RawResponse {
                status,
                body: body.to_string(),
            }),
        )
    }

    pub fn fail(self, url: &str, msg: &str) -> Self {
        self.push(url, Err(TransportError(msg.to_string())))
    }

    fn push(self, url: &str, reply: Reply) -> Self {
        self.inner
            .lock()
            .unwrap()
            .scripts
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == url)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(url.to_string());
        inner
            .scripts
            .get_mut(url)
            .and_then(|q| q.pop_front())
            .unwrap_or(Ok(RawResponse {
                status: 404,
                body: String::new(),
            }))
    }
}

pub fn stat_body(points: &[(&str, &str)]) -> String {
    let items: Vec<String> = points
        .iter()
        .map(|(d, v)| format!(r#"{{"data":"{d}","valor":"{v}"}}"#))
        .collect();
    format!("[{}]", items.join(","))
}
