//! Scripted page used to drive the collector and runner in tests.

use crate::scrapers::traits::{InterceptedResponse, PageAutomation, ResponseHandler, SessionLauncher};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SEARCH_URL: &str = "https://yandex.ru/maps/api/search?text=computer+club";

/// Search API response carrying `items`
pub fn search_response(items: Value) -> InterceptedResponse {
    InterceptedResponse {
        url: SEARCH_URL.to_string(),
        method: "GET".to_string(),
        body: json!({ "data": { "items": items } }).to_string(),
    }
}

/// Item with a title, address and `[lon, lat]` coordinates
pub fn club(title: &str, lon: f64, lat: f64) -> Value {
    json!({ "title": title, "address": format!("{} street", title), "coordinates": [lon, lat] })
}

#[derive(Default)]
pub struct ScriptedPage {
    pub handler: Mutex<Option<ResponseHandler>>,
    pub on_navigate: Mutex<Vec<InterceptedResponse>>,
    /// One batch is delivered per scroll, from a separate thread
    pub on_scroll: Mutex<VecDeque<Vec<InterceptedResponse>>>,
    /// One batch is delivered per wheel gesture
    pub on_wheel: Mutex<VecDeque<Vec<InterceptedResponse>>>,
    pub end_marker_visible: AtomicBool,
    pub fail_navigation: bool,
    pub panel_html: String,
    pub scrolls: AtomicUsize,
    pub wheels: AtomicUsize,
    pub hovers: AtomicUsize,
    pub closed: Arc<AtomicBool>,
    /// Raised after this many scrolls, if set
    pub cancel_after: Option<(usize, Arc<AtomicBool>)>,
    /// When set, a scroll's batch lands during the n-th `wait` after that scroll
    pub scroll_lag_waits: Option<usize>,
    pub pending: Mutex<Vec<(usize, Vec<InterceptedResponse>)>>,
    pub waits: AtomicUsize,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scrolls(batches: Vec<Vec<InterceptedResponse>>) -> Self {
        Self {
            on_scroll: Mutex::new(batches.into()),
            ..Self::default()
        }
    }

    fn deliver(&self, batch: Vec<InterceptedResponse>) {
        let guard = self.handler.lock().unwrap();
        if let Some(handler) = guard.as_ref() {
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for response in batch {
                        handler(response);
                    }
                });
            });
        }
    }
}

#[async_trait]
impl PageAutomation for ScriptedPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        if self.fail_navigation {
            bail!("Navigation timeout for {}", url);
        }
        let batch = std::mem::take(&mut *self.on_navigate.lock().unwrap());
        self.deliver(batch);
        Ok(())
    }

    async fn scroll_container_to_end(&self, _selector: &str) -> Result<()> {
        let done = self.scrolls.fetch_add(1, Ordering::SeqCst) + 1;
        let batch = self.on_scroll.lock().unwrap().pop_front();
        match (batch, self.scroll_lag_waits) {
            (Some(batch), Some(lag)) => self.pending.lock().unwrap().push((lag.max(1), batch)),
            (Some(batch), None) => self.deliver(batch),
            (None, _) => {}
        }
        if let Some((after, flag)) = &self.cancel_after {
            if done >= *after {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn on_response(&self, handler: ResponseHandler) -> Result<()> {
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    async fn evaluate_in_page(&self, script: &str) -> Result<Option<Value>> {
        if script.contains("getBoundingClientRect") && script.contains("innerHeight") {
            return Ok(Some(Value::Bool(self.end_marker_visible.load(Ordering::SeqCst))));
        }
        if script.contains("outerHTML") {
            return Ok(Some(Value::String(self.panel_html.clone())));
        }
        Ok(None)
    }

    async fn wheel_over_element(&self, _selector: &str, _delta_y: f64) -> Result<()> {
        self.wheels.fetch_add(1, Ordering::SeqCst);
        let batch = self.on_wheel.lock().unwrap().pop_front();
        if let Some(batch) = batch {
            self.deliver(batch);
        }
        Ok(())
    }

    async fn hover_element(&self, _selector: &str) -> Result<()> {
        self.hovers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait(&self, _duration: Duration) {
        self.waits.fetch_add(1, Ordering::SeqCst);
        let due: Vec<_> = {
            let mut pending = self.pending.lock().unwrap();
            for entry in pending.iter_mut() {
                entry.0 -= 1;
            }
            let (due, later): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|(left, _)| *left == 0);
            *pending = later;
            due
        };
        for (_, batch) in due {
            self.deliver(batch);
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out prepared pages in order; fails once they run out
pub struct ScriptedLauncher {
    pub pages: Mutex<VecDeque<ScriptedPage>>,
    pub launches: AtomicUsize,
}

impl ScriptedLauncher {
    pub fn new(pages: Vec<ScriptedPage>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            launches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    type Session = ScriptedPage;

    async fn launch(&self) -> Result<ScriptedPage> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        match self.pages.lock().unwrap().pop_front() {
            Some(page) => Ok(page),
            None => bail!("Failed to launch browser"),
        }
    }

    fn driver_name(&self) -> &'static str {
        "scripted"
    }
}

/// Formatted log output captured from the current thread
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Route this thread's events here until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
