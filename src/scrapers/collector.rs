use crate::models::{ListingRecord, RegionTarget, StopReason};
use crate::scrapers::dedup::CollectionState;
use crate::scrapers::dom;
use crate::scrapers::parser::ResponseParser;
use crate::scrapers::traits::{InterceptedResponse, PageAutomation, ResponseHandler};
use crate::scrapers::types::{CollectSettings, SiteProfile};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a single region's scroll loop produced
#[derive(Debug, Clone)]
pub struct CollectOutcome {
    pub records: Vec<ListingRecord>,
    pub request_count: usize,
    pub iterations: usize,
    pub stop_reason: StopReason,
    /// Result cards rendered in the panel when the loop ended
    pub rendered_snippets: Option<usize>,
}

/// Scrolls the results panel and gathers listings from intercepted search responses.
///
/// The site loads results lazily while the panel scrolls, through requests the
/// collector never issues itself. Progress is therefore judged only by growth of
/// the collected set between passes.
pub struct ScrollCollector {
    parser: Arc<ResponseParser>,
    profile: SiteProfile,
    settings: CollectSettings,
}

impl ScrollCollector {
    pub fn new(parser: ResponseParser, profile: SiteProfile, settings: CollectSettings) -> Self {
        Self {
            parser: Arc::new(parser),
            profile,
            settings,
        }
    }

    /// Collect every unique listing for `target` using an open page
    pub async fn collect<A>(
        &self,
        target: &RegionTarget,
        automation: &A,
        cancel: &AtomicBool,
    ) -> Result<CollectOutcome>
    where
        A: PageAutomation + ?Sized,
    {
        let state = Arc::new(Mutex::new(CollectionState::new()));
        automation
            .on_response(self.response_handler(Arc::clone(&state)))
            .context("Failed to install response listener")?;

        info!("Opening {} (ID: {})...", target.name, target.id);
        automation
            .navigate(&target.url)
            .await
            .with_context(|| format!("Failed to open region page {}", target.url))?;

        info!("Waiting for first results...");
        automation.wait(self.settings.initial_settle).await;

        let max_iterations = self.settings.max_iterations;
        let stall_threshold = self.settings.stall_threshold.max(1);
        let mut last_count = 0;
        let mut stalls = 0;
        let mut nudged = false;
        let mut iterations = 0;
        let mut stop_reason = StopReason::BudgetExhausted;

        for pass in 0..max_iterations {
            if cancel.load(Ordering::SeqCst) {
                info!("Cancellation requested, stopping scroll");
                stop_reason = StopReason::Cancelled;
                break;
            }
            iterations = pass + 1;

            let count = lock(&state).record_count();
            if count == last_count {
                stalls += 1;
                info!("No new clubs ({}/{}), total: {}", stalls, stall_threshold, count);

                if stalls >= stall_threshold {
                    if !self.settings.recovery_enabled {
                        info!("Club count unchanged for {} passes, finishing", stalls);
                        stop_reason = StopReason::Converged;
                        break;
                    }
                    if nudged {
                        info!("Club count unchanged after recovery, finishing");
                        stop_reason = StopReason::Converged;
                        break;
                    }
                    nudged = true;
                    if !self.nudge_map(automation).await {
                        stop_reason = StopReason::Converged;
                        break;
                    }
                }
            } else {
                info!("Progress: +{} clubs (total: {})", count - last_count, count);
                stalls = 0;
                nudged = false;
            }
            last_count = count;

            if !nudged && self.end_of_list_shown(automation).await {
                info!("End of list reached, moving the map");
                nudged = true;
                if !self.nudge_map(automation).await {
                    stop_reason = StopReason::Converged;
                    break;
                }
                automation.wait(self.settings.settle_delay).await;
                continue;
            }

            automation
                .scroll_container_to_end(&self.profile.results_container)
                .await
                .context("Failed to scroll results list")?;

            info!(
                "Scroll {}/{}, clubs collected: {}",
                pass + 1,
                max_iterations,
                lock(&state).record_count()
            );
            automation.wait(self.settings.settle_delay).await;
        }

        if stop_reason != StopReason::Cancelled {
            automation.wait(self.settings.final_drain).await;
        }

        let rendered_snippets = self.rendered_snippets(automation).await;

        let (records, request_count) = {
            let mut state = lock(&state);
            let request_count = state.request_count();
            (state.seal(), request_count)
        };

        info!(
            "Scrolling finished ({:?}) after {} passes: {} clubs from {} responses",
            stop_reason,
            iterations,
            records.len(),
            request_count
        );
        if let Some(rendered) = rendered_snippets {
            debug!("Results panel shows {} cards", rendered);
        }

        Ok(CollectOutcome {
            records,
            request_count,
            iterations,
            stop_reason,
            rendered_snippets,
        })
    }

    fn response_handler(&self, state: Arc<Mutex<CollectionState>>) -> ResponseHandler {
        let parser = Arc::clone(&self.parser);
        let debug_dir = self.settings.debug_dir.clone();

        Box::new(move |response: InterceptedResponse| {
            if !parser.is_relevant(&response.url, &response.method) {
                return;
            }
            debug!("Intercepted {} {}", response.method, response.url);

            let records = parser.parse_body(&response.body);
            let parsed = records.len();

            let (request_number, report, total) = {
                let mut state = lock(&state);
                if state.is_sealed() {
                    debug!("Response arrived after collection ended, ignoring");
                    return;
                }
                let request_number = state.record_request();
                let report = state.extend(records);
                (request_number, report, state.record_count())
            };

            if report.accepted > 0 {
                info!(
                    "Extracted {} new clubs from response ({} in payload, total: {})",
                    report.accepted, parsed, total
                );
            } else if parsed > 0 {
                debug!("All {} clubs in response were already known", parsed);
            }
            if report.without_coordinates > 0 {
                warn!("Skipped {} clubs without coordinates", report.without_coordinates);
            }

            if let Some(dir) = &debug_dir {
                dump_payload(dir, request_number, &response.body);
            }
        })
    }

    /// Pan the map so the site starts issuing search requests again
    async fn nudge_map<A>(&self, automation: &A) -> bool
    where
        A: PageAutomation + ?Sized,
    {
        info!("Moving the map to trigger new results...");
        let map = &self.profile.map_container;
        for _ in 0..2 {
            if let Err(e) = automation
                .wheel_over_element(map, self.settings.nudge_delta_y)
                .await
            {
                warn!("Map nudge failed: {:#}", e);
                return false;
            }
            automation.wait(self.settings.nudge_pause).await;
        }

        if let Err(e) = automation.hover_element(&self.profile.results_container).await {
            warn!("Could not return focus to results list: {:#}", e);
        }
        true
    }

    async fn end_of_list_shown<A>(&self, automation: &A) -> bool
    where
        A: PageAutomation + ?Sized,
    {
        let Some(marker) = &self.profile.end_marker else {
            return false;
        };
        let script = dom::visibility_script(marker);

        if !is_true(automation.evaluate_in_page(&script).await) {
            return false;
        }
        automation.wait(Duration::from_secs(1)).await;
        is_true(automation.evaluate_in_page(&script).await)
    }

    async fn rendered_snippets<A>(&self, automation: &A) -> Option<usize>
    where
        A: PageAutomation + ?Sized,
    {
        let script = dom::outer_html_script(&self.profile.results_container);
        match automation.evaluate_in_page(&script).await {
            Ok(Some(serde_json::Value::String(html))) if !html.is_empty() => {
                Some(dom::count_snippets(&html, &self.profile.snippet_title))
            }
            Ok(_) => None,
            Err(e) => {
                debug!("Could not read results panel: {:#}", e);
                None
            }
        }
    }
}

fn lock(state: &Mutex<CollectionState>) -> MutexGuard<'_, CollectionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_true(value: Result<Option<serde_json::Value>>) -> bool {
    matches!(value, Ok(Some(serde_json::Value::Bool(true))))
}

fn dump_payload(dir: &Path, request_number: usize, body: &str) {
    let path = dir.join(format!("network-{}.json", request_number));
    let result = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, body));
    if let Err(e) = result {
        warn!("Failed to save raw payload to {}: {}", path.display(), e);
    }
}
