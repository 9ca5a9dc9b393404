use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic position of a listing, already in (lat, lon) order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Social network profile attached to a listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocialLink {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// One place discovered on the map
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub websites: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_hours: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub social_links: Vec<SocialLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_region_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
}

impl ListingRecord {
    /// Stamp the region this record was collected from
    pub fn attach_region(&mut self, target: &RegionTarget) {
        self.region_id = Some(target.id);
        self.region_name = Some(target.name.clone());
        self.source_region_url = Some(target.url.clone());
    }
}

/// Region entry from the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionTarget {
    pub id: u32,
    pub name: String,
    pub url: String,
}

/// Why the scroll loop stopped
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Ran every configured iteration
    BudgetExhausted,
    /// No growth after the stall threshold and the recovery nudge
    Converged,
    /// Interrupted by the operator
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegionStatus {
    Success,
    Failed,
}

/// Result of collecting a single region
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionOutcome {
    pub region_id: u32,
    pub region: String,
    pub status: RegionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub clubs_sum: usize,
    pub network_requests: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    /// Passes the scroll loop ran before stopping
    #[serde(default)]
    pub scroll_passes: usize,
    /// Result cards the panel showed when collection ended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered_cards: Option<usize>,
    #[serde(skip)]
    pub clubs: Vec<ListingRecord>,
}

impl RegionOutcome {
    pub fn failed(target: &RegionTarget, error: String) -> Self {
        Self {
            region_id: target.id,
            region: target.name.clone(),
            status: RegionStatus::Failed,
            error: Some(error),
            clubs_sum: 0,
            network_requests: 0,
            stop_reason: None,
            scroll_passes: 0,
            rendered_cards: None,
            clubs: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RegionStatus::Success
    }
}

/// Totals for a whole run, written next to the exported records
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub total_regions: usize,
    pub successful_regions: usize,
    pub failed_regions: usize,
    pub total_clubs: usize,
    pub network_requests: usize,
    pub regions: Vec<RegionOutcome>,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[RegionOutcome]) -> Self {
        let successful_regions = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            timestamp: Utc::now(),
            total_regions: outcomes.len(),
            successful_regions,
            failed_regions: outcomes.len() - successful_regions,
            total_clubs: outcomes.iter().map(|o| o.clubs_sum).sum(),
            network_requests: outcomes.iter().map(|o| o.network_requests).sum(),
            regions: outcomes.to_vec(),
        }
    }

    /// Successful regions with at least one club, largest first
    pub fn top_regions(&self, limit: usize) -> Vec<&RegionOutcome> {
        let mut ranked: Vec<_> = self
            .regions
            .iter()
            .filter(|o| o.is_success() && o.clubs_sum > 0)
            .collect();
        ranked.sort_by(|a, b| b.clubs_sum.cmp(&a.clubs_sum));
        ranked.truncate(limit);
        ranked
    }
}
