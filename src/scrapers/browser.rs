use crate::scrapers::dom;
use crate::scrapers::traits::{InterceptedResponse, PageAutomation, ResponseHandler, SessionLauncher};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Input;
use headless_chrome::protocol::cdp::Network::events::ResponseReceivedEventParams;
use headless_chrome::protocol::cdp::Network::GetResponseBodyReturnObject;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long the network must stay silent before a page counts as loaded
const NETWORK_QUIET: Duration = Duration::from_millis(500);
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Launch settings for headless Chrome sessions
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    pub headless: bool,
    pub navigation_timeout: Duration,
    pub accept_language: String,
}

impl Default for ChromeLauncher {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout: Duration::from_secs(30),
            accept_language: "ru-RU,ru;q=0.9".to_string(),
        }
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Session = ChromeSession;

    async fn launch(&self) -> Result<ChromeSession> {
        let launcher = self.clone();
        tokio::task::spawn_blocking(move || ChromeSession::new(&launcher))
            .await
            .context("Browser launch task failed")?
    }

    fn driver_name(&self) -> &'static str {
        "headless_chrome"
    }
}

/// Request bookkeeping fed from CDP network events
#[derive(Debug)]
struct NetworkTracker {
    /// Request method by CDP request id, until its response is handled
    methods: HashMap<String, String>,
    in_flight: HashSet<String>,
    last_activity: Instant,
}

impl NetworkTracker {
    fn new() -> Self {
        Self {
            methods: HashMap::new(),
            in_flight: HashSet::new(),
            last_activity: Instant::now(),
        }
    }

    fn started(&mut self, request_id: &str, method: &str) {
        self.methods.insert(request_id.to_string(), method.to_string());
        self.in_flight.insert(request_id.to_string());
        self.last_activity = Instant::now();
    }

    fn finished(&mut self, request_id: &str) {
        self.in_flight.remove(request_id);
        self.last_activity = Instant::now();
    }

    /// Failed and cancelled requests never reach the response handler
    fn failed(&mut self, request_id: &str) {
        self.methods.remove(request_id);
        self.finished(request_id);
    }

    fn take_method(&mut self, request_id: &str) -> String {
        self.methods
            .remove(request_id)
            .unwrap_or_else(|| "GET".to_string())
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn is_idle(&self, quiet: Duration, now: Instant) -> bool {
        self.in_flight.is_empty() && now.saturating_duration_since(self.last_activity) >= quiet
    }
}

/// One Chrome process with a single tab driving the map page.
///
/// CDP calls block, so every page operation runs on the blocking pool.
pub struct ChromeSession {
    // Dropping the browser kills the Chrome process
    _browser: Browser,
    tab: Arc<Tab>,
    network: Arc<Mutex<NetworkTracker>>,
    navigation_timeout: Duration,
}

impl ChromeSession {
    /// Launch Chrome and prepare a tab for interception
    pub fn new(launcher: &ChromeLauncher) -> Result<Self> {
        info!("Launching Chrome (headless: {})...", launcher.headless);

        let options = LaunchOptions::default_builder()
            .headless(launcher.headless)
            .window_size(Some((1920, 1080)))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open tab")?;
        tab.set_default_timeout(launcher.navigation_timeout);

        let mut headers = HashMap::new();
        headers.insert("Accept-Language", launcher.accept_language.as_str());
        tab.set_extra_http_headers(headers)
            .context("Failed to set request headers")?;

        let network = Arc::new(Mutex::new(NetworkTracker::new()));
        let sink = Arc::clone(&network);
        tab.add_event_listener(Arc::new(move |event: &Event| match event {
            Event::NetworkRequestWillBeSent(sent) => {
                track(&sink).started(&sent.params.request_id, &sent.params.request.method)
            }
            Event::NetworkLoadingFinished(done) => track(&sink).finished(&done.params.request_id),
            Event::NetworkLoadingFailed(failed) => track(&sink).failed(&failed.params.request_id),
            _ => {}
        }))
        .context("Failed to listen for network requests")?;

        Ok(Self {
            _browser: browser,
            tab,
            network,
            navigation_timeout: launcher.navigation_timeout,
        })
    }

    /// Run a blocking CDP call off the async workers
    async fn on_tab<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || call(&*tab))
            .await
            .context("Browser task failed")?
    }

    async fn evaluate(&self, script: String) -> Result<Option<serde_json::Value>> {
        self.on_tab(move |tab| {
            let result = tab
                .evaluate(&script, false)
                .with_context(|| format!("Script failed: {}", truncate(&script, 80)))?;
            Ok(result.value)
        })
        .await
    }

    /// Wait until no request has been in flight for `NETWORK_QUIET`
    async fn wait_for_network_idle(&self) {
        let deadline = Instant::now() + self.navigation_timeout;
        loop {
            let now = Instant::now();
            let (idle, in_flight) = {
                let tracker = track(&self.network);
                (tracker.is_idle(NETWORK_QUIET, now), tracker.in_flight.len())
            };
            if idle {
                return;
            }
            if now >= deadline {
                warn!(
                    "Network still busy after {:?} ({} requests in flight), continuing",
                    self.navigation_timeout, in_flight
                );
                return;
            }
            tokio::time::sleep(IDLE_POLL).await;
        }
    }
}

#[async_trait]
impl PageAutomation for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        track(&self.network).touch();
        let url = url.to_string();
        self.on_tab(move |tab| {
            tab.navigate_to(&url)?;
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await?;
        self.wait_for_network_idle().await;
        Ok(())
    }

    async fn scroll_container_to_end(&self, selector: &str) -> Result<()> {
        let found = self.evaluate(dom::scroll_to_end_script(selector)).await?;
        if found != Some(serde_json::Value::Bool(true)) {
            warn!("Results container {} not found", selector);
        }
        Ok(())
    }

    fn on_response(&self, handler: ResponseHandler) -> Result<()> {
        let network = Arc::clone(&self.network);
        self.tab
            .register_response_handling(
                "club-scout",
                Box::new(
                    move |params: ResponseReceivedEventParams,
                          fetch_body: &dyn Fn() -> Result<GetResponseBodyReturnObject>| {
                        let method = track(&network).take_method(&params.request_id);
                        let url = params.response.url.clone();

                        let body = match fetch_body() {
                            Ok(body) if !body.base_64_encoded => body.body,
                            Ok(_) => {
                                debug!("Skipping binary response {}", url);
                                return;
                            }
                            Err(e) => {
                                debug!("No body for {}: {}", url, e);
                                return;
                            }
                        };

                        handler(InterceptedResponse { url, method, body });
                    },
                ),
            )
            .context("Failed to register response handler")?;
        Ok(())
    }

    async fn evaluate_in_page(&self, script: &str) -> Result<Option<serde_json::Value>> {
        self.evaluate(script.to_string()).await
    }

    async fn wheel_over_element(&self, selector: &str, delta_y: f64) -> Result<()> {
        let selector = selector.to_string();
        self.on_tab(move |tab| {
            let (x, y) = pointer_to(tab, &selector)?;
            tab.call_method(wheel_event(x, y, delta_y))
                .with_context(|| format!("Wheel gesture over {} failed", selector))?;
            Ok(())
        })
        .await
    }

    async fn hover_element(&self, selector: &str) -> Result<()> {
        let selector = selector.to_string();
        self.on_tab(move |tab| pointer_to(tab, &selector).map(|_| ()))
            .await
    }

    async fn close(&self) -> Result<()> {
        self.on_tab(|tab| {
            tab.close(true).context("Failed to close tab")?;
            Ok(())
        })
        .await
    }
}

/// Move the mouse to the centre of `selector` and return that point
fn pointer_to(tab: &Tab, selector: &str) -> Result<(f64, f64)> {
    let element = tab
        .find_element(selector)
        .with_context(|| format!("Element {} not found", selector))?;
    let point = element.get_midpoint()?;
    let (x, y) = (point.x, point.y);
    tab.move_mouse_to_point(point)?;
    Ok((x, y))
}

/// A native mouse wheel event at `(x, y)`
fn wheel_event(x: f64, y: f64, delta_y: f64) -> Input::DispatchMouseEvent {
    Input::DispatchMouseEvent {
        Type: Input::DispatchMouseEventTypeOption::MouseWheel,
        x,
        y,
        modifiers: None,
        timestamp: None,
        button: None,
        buttons: None,
        click_count: None,
        force: None,
        tangential_pressure: None,
        tilt_x: None,
        tilt_y: None,
        twist: None,
        delta_x: Some(0.0),
        delta_y: Some(delta_y),
        pointer_Type: None,
    }
}

fn track(network: &Mutex<NetworkTracker>) -> MutexGuard<'_, NetworkTracker> {
    network.lock().unwrap_or_else(PoisonError::into_inner)
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
