use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Site-specific endpoints and selectors for the map application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    /// URL prefix of the internal search API whose responses carry listings
    pub search_api_prefix: String,
    /// Base for public organisation cards (`<base>/<seoname>/<id>`)
    pub org_url_base: String,
    /// Scrollable results panel
    pub results_container: String,
    /// Map surface used for the recovery nudge
    pub map_container: String,
    /// One result card in the panel
    pub snippet_title: String,
    /// Element shown once the panel has no more results to load
    pub end_marker: Option<String>,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            search_api_prefix: "https://yandex.ru/maps/api/search".to_string(),
            org_url_base: "https://yandex.ru/maps/org".to_string(),
            results_container: ".scroll__container".to_string(),
            map_container: ".map-container".to_string(),
            snippet_title: ".search-business-snippet-view__title".to_string(),
            end_marker: Some(".add-business-view".to_string()),
        }
    }
}

/// Labels used when rendering a weekly schedule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HoursLocale {
    #[default]
    En,
    Ru,
}

impl HoursLocale {
    pub fn day_labels(self) -> [&'static str; 7] {
        match self {
            Self::En => ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"],
            Self::Ru => ["Пн", "Вт", "Ср", "Чт", "Пт", "Сб", "Вс"],
        }
    }

    pub fn all_day_label(self) -> &'static str {
        match self {
            Self::En => "24 hours",
            Self::Ru => "круглосуточно",
        }
    }
}

/// Knobs for the response parser
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub hours_locale: HoursLocale,
    /// Keep the raw item JSON on each record
    pub keep_raw: bool,
}

/// Tunables for the scroll-collect loop
#[derive(Debug, Clone)]
pub struct CollectSettings {
    pub max_iterations: usize,
    /// Pause after each scroll so intercepted responses can land
    pub settle_delay: Duration,
    /// Pause after navigation for the first wave of requests
    pub initial_settle: Duration,
    /// Pause after the last scroll before the result is sealed
    pub final_drain: Duration,
    /// Consecutive no-growth passes before the loop counts as stalled
    pub stall_threshold: usize,
    pub recovery_enabled: bool,
    pub nudge_delta_y: f64,
    pub nudge_pause: Duration,
    /// Where relevant payloads are dumped, if anywhere
    pub debug_dir: Option<PathBuf>,
}

impl Default for CollectSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            settle_delay: Duration::from_millis(1500),
            initial_settle: Duration::from_millis(3000),
            final_drain: Duration::from_millis(2000),
            stall_threshold: 2,
            recovery_enabled: true,
            nudge_delta_y: 500.0,
            nudge_pause: Duration::from_millis(500),
            debug_dir: None,
        }
    }
}
