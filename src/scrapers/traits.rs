use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A network response captured by the automation layer
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
    pub url: String,
    pub method: String,
    pub body: String,
}

/// Callback invoked for every captured response, possibly from another thread
pub type ResponseHandler = Box<dyn Fn(InterceptedResponse) + Send + Sync>;

/// Browser page operations the collector relies on.
/// Any driver that can navigate, scroll and report responses fits here.
#[async_trait]
pub trait PageAutomation: Send + Sync {
    /// Open `url` and wait until the page settles
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Scroll the element matching `selector` to its bottom
    async fn scroll_container_to_end(&self, selector: &str) -> Result<()>;

    /// Install the response listener; replaces any previous one
    fn on_response(&self, handler: ResponseHandler) -> Result<()>;

    /// Run a script in the page and return its JSON value, if any
    async fn evaluate_in_page(&self, script: &str) -> Result<Option<serde_json::Value>>;

    /// Emit a mouse wheel gesture over the element matching `selector`
    async fn wheel_over_element(&self, selector: &str, delta_y: f64) -> Result<()>;

    /// Move the pointer over the element matching `selector`
    async fn hover_element(&self, selector: &str) -> Result<()>;

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Release the page and its browser
    async fn close(&self) -> Result<()>;
}

/// Opens a fresh automation session, one per region
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: PageAutomation;

    async fn launch(&self) -> Result<Self::Session>;

    /// Get the name of the driver behind the sessions
    fn driver_name(&self) -> &'static str;
}
