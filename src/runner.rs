use crate::models::{RegionOutcome, RegionStatus, RegionTarget};
use crate::scrapers::collector::ScrollCollector;
use crate::scrapers::traits::{PageAutomation, SessionLauncher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Collects regions one after another, each in a fresh browser session
pub struct RegionRunner<L: SessionLauncher> {
    launcher: L,
    collector: ScrollCollector,
    cancel: Arc<AtomicBool>,
    region_pause: Duration,
}

impl<L: SessionLauncher> RegionRunner<L> {
    pub fn new(launcher: L, collector: ScrollCollector, cancel: Arc<AtomicBool>) -> Self {
        Self {
            launcher,
            collector,
            cancel,
            region_pause: Duration::from_secs(2),
        }
    }

    pub fn with_region_pause(mut self, pause: Duration) -> Self {
        self.region_pause = pause;
        self
    }

    /// Run every region in order. Failures are recorded, never fatal.
    pub async fn run_all(&self, regions: &[RegionTarget]) -> Vec<RegionOutcome> {
        let mut outcomes = Vec::with_capacity(regions.len());

        for (index, target) in regions.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(
                    "Cancelled, skipping {} remaining regions",
                    regions.len() - index
                );
                break;
            }

            info!(
                "🗺️  [{}/{}] {} (ID: {})",
                index + 1,
                regions.len(),
                target.name,
                target.id
            );
            outcomes.push(self.run_region(target).await);

            if index + 1 < regions.len() && !self.cancel.load(Ordering::SeqCst) {
                tokio::time::sleep(self.region_pause).await;
            }
        }

        outcomes
    }

    /// Collect one region; the session is closed whatever happens
    pub async fn run_region(&self, target: &RegionTarget) -> RegionOutcome {
        let session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => {
                error!(
                    "❌ Could not start {} for {}: {:#}",
                    self.launcher.driver_name(),
                    target.name,
                    e
                );
                return RegionOutcome::failed(target, format!("{:#}", e));
            }
        };

        let result = self.collector.collect(target, &session, &self.cancel).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session for {}: {:#}", target.name, e);
        }

        match result {
            Ok(outcome) => {
                let mut clubs = outcome.records;
                for club in &mut clubs {
                    club.attach_region(target);
                }
                info!(
                    "✅ {}: {} clubs from {} responses",
                    target.name,
                    clubs.len(),
                    outcome.request_count
                );
                if let Some(cards) = outcome.rendered_snippets {
                    if cards > clubs.len() {
                        warn!(
                            "{} shows {} cards but only {} clubs were intercepted",
                            target.name,
                            cards,
                            clubs.len()
                        );
                    }
                }
                RegionOutcome {
                    region_id: target.id,
                    region: target.name.clone(),
                    status: RegionStatus::Success,
                    error: None,
                    clubs_sum: clubs.len(),
                    network_requests: outcome.request_count,
                    stop_reason: Some(outcome.stop_reason),
                    scroll_passes: outcome.iterations,
                    rendered_cards: outcome.rendered_snippets,
                    clubs,
                }
            }
            Err(e) => {
                error!("❌ Region {} failed: {:#}", target.name, e);
                RegionOutcome::failed(target, format!("{:#}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StopReason;
    use crate::scrapers::parser::ResponseParser;
    use crate::scrapers::testing::{club, search_response, ScriptedLauncher, ScriptedPage};
    use crate::scrapers::types::{CollectSettings, ParseOptions, SiteProfile};
    use serde_json::json;

    fn collector() -> ScrollCollector {
        let profile = SiteProfile::default();
        ScrollCollector::new(
            ResponseParser::new(profile.clone(), ParseOptions::default()),
            profile,
            CollectSettings {
                settle_delay: Duration::ZERO,
                initial_settle: Duration::ZERO,
                final_drain: Duration::ZERO,
                nudge_pause: Duration::ZERO,
                ..CollectSettings::default()
            },
        )
    }

    fn runner(pages: Vec<ScriptedPage>, cancel: Arc<AtomicBool>) -> RegionRunner<ScriptedLauncher> {
        RegionRunner::new(ScriptedLauncher::new(pages), collector(), cancel)
            .with_region_pause(Duration::ZERO)
    }

    fn region(id: u32, name: &str) -> RegionTarget {
        RegionTarget {
            id,
            name: name.to_string(),
            url: format!("https://yandex.ru/maps/{}/{}/category/computer_club/", id, name),
        }
    }

    fn page_with(items: serde_json::Value) -> ScriptedPage {
        let page = ScriptedPage::new();
        *page.on_navigate.lock().unwrap() = vec![search_response(items)];
        page
    }

    #[tokio::test]
    async fn attaches_region_to_every_club() {
        let runner = runner(
            vec![page_with(json!([club("a", 60.1, 56.1), club("b", 60.2, 56.2)]))],
            Arc::new(AtomicBool::new(false)),
        );

        let outcome = runner.run_region(&region(54, "yekaterinburg")).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.clubs_sum, 2);
        assert_eq!(outcome.network_requests, 1);
        assert_eq!(outcome.stop_reason, Some(StopReason::Converged));
        assert!(outcome.scroll_passes > 0);
        assert_eq!(outcome.rendered_cards, None);
        for club in &outcome.clubs {
            assert_eq!(club.region_id, Some(54));
            assert_eq!(club.region_name.as_deref(), Some("yekaterinburg"));
            assert!(club.source_region_url.as_deref().unwrap().contains("/54/"));
        }
    }

    #[tokio::test]
    async fn loop_diagnostics_reach_the_outcome() {
        let page = ScriptedPage {
            panel_html: r#"<div>
                <div class="search-business-snippet-view__title">a</div>
                <div class="search-business-snippet-view__title">b</div>
            </div>"#
                .to_string(),
            ..page_with(json!([club("a", 60.1, 56.1)]))
        };
        let runner = runner(vec![page], Arc::new(AtomicBool::new(false)));

        let outcome = runner.run_region(&region(54, "yekaterinburg")).await;

        assert_eq!(outcome.clubs_sum, 1);
        assert_eq!(outcome.rendered_cards, Some(2));
        assert_eq!(outcome.scroll_passes, 4);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["renderedCards"], 2);
        assert_eq!(json["scrollPasses"], 4);
    }

    #[tokio::test]
    async fn failed_region_does_not_stop_the_run() {
        let broken = ScriptedPage {
            fail_navigation: true,
            ..ScriptedPage::new()
        };
        let broken_closed = Arc::clone(&broken.closed);
        let healthy = page_with(json!([club("a", 30.3, 59.9)]));
        let healthy_closed = Arc::clone(&healthy.closed);
        let runner = runner(vec![broken, healthy], Arc::new(AtomicBool::new(false)));

        let outcomes = runner
            .run_all(&[region(1, "moscow"), region(2, "saint-petersburg")])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].status, RegionStatus::Failed);
        assert!(outcomes[0].error.as_deref().unwrap().contains("Navigation timeout"));
        assert_eq!(outcomes[0].clubs_sum, 0);
        assert!(outcomes[1].is_success());
        assert_eq!(outcomes[1].clubs_sum, 1);
        assert!(broken_closed.load(Ordering::SeqCst));
        assert!(healthy_closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn launch_failure_is_recorded() {
        let runner = runner(Vec::new(), Arc::new(AtomicBool::new(false)));

        let outcome = runner.run_region(&region(1, "moscow")).await;

        assert_eq!(outcome.status, RegionStatus::Failed);
        assert!(outcome.error.unwrap().contains("Failed to launch browser"));
    }

    #[tokio::test]
    async fn empty_region_still_succeeds() {
        let runner = runner(vec![ScriptedPage::new()], Arc::new(AtomicBool::new(false)));

        let outcome = runner.run_region(&region(99, "nowhere")).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.clubs_sum, 0);
        assert!(outcome.clubs.is_empty());
    }

    #[tokio::test]
    async fn cancellation_skips_remaining_regions() {
        let cancel = Arc::new(AtomicBool::new(false));
        let first = ScriptedPage {
            cancel_after: Some((1, Arc::clone(&cancel))),
            ..ScriptedPage::with_scrolls(vec![vec![search_response(json!([club("a", 1.0, 2.0)]))]])
        };
        let runner = runner(vec![first, ScriptedPage::new()], Arc::clone(&cancel));

        let outcomes = runner
            .run_all(&[region(1, "moscow"), region(2, "saint-petersburg")])
            .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].stop_reason, Some(StopReason::Cancelled));
        assert_eq!(outcomes[0].clubs_sum, 1);
        assert_eq!(runner.launcher.launches.load(Ordering::SeqCst), 1);
    }
}
