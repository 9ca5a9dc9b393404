use crate::error::CatalogError;
use crate::models::RegionTarget;
use std::path::Path;
use tracing::{debug, info};

/// Selector meaning every region in the catalog
pub const GLOBAL: &str = "global";

/// Ordered list of regions to collect, loaded from JSON
#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    regions: Vec<RegionTarget>,
}

impl RegionCatalog {
    /// Load from a file path or an `http(s)` URL
    pub async fn load(source: &str) -> Result<Self, CatalogError> {
        let catalog = if source.starts_with("http://") || source.starts_with("https://") {
            Self::fetch(source).await?
        } else {
            Self::read(Path::new(source)).await?
        };
        info!("Loaded {} regions from {}", catalog.len(), source);
        Ok(catalog)
    }

    async fn read(path: &Path) -> Result<Self, CatalogError> {
        let display = path.display().to_string();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CatalogError::NotFound { path: display.clone() }
            } else {
                CatalogError::Read { path: display.clone(), source: e }
            }
        })?;
        Self::from_json(&text, &display)
    }

    async fn fetch(url: &str) -> Result<Self, CatalogError> {
        debug!("Fetching region catalog from {}", url);
        let fetch_err = |source| CatalogError::Fetch { url: url.to_string(), source };
        let text = reqwest::get(url)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(fetch_err)?
            .text()
            .await
            .map_err(fetch_err)?;
        Self::from_json(&text, url)
    }

    pub fn from_json(text: &str, source_name: &str) -> Result<Self, CatalogError> {
        let regions = serde_json::from_str(text).map_err(|source| CatalogError::Json {
            source_name: source_name.to_string(),
            source,
        })?;
        Ok(Self { regions })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[RegionTarget] {
        &self.regions
    }

    /// Case-insensitive substring search over region names
    pub fn search(&self, term: &str) -> Vec<&RegionTarget> {
        let term = term.trim().to_lowercase();
        self.regions
            .iter()
            .filter(|region| region.name.to_lowercase().contains(&term))
            .collect()
    }

    /// Resolve a CLI selector: `global`/`all`, a numeric ID, or a region name
    pub fn resolve(&self, selector: &str) -> Result<Vec<RegionTarget>, CatalogError> {
        let selector = selector.trim();
        if selector.eq_ignore_ascii_case(GLOBAL) || selector.eq_ignore_ascii_case("all") {
            return Ok(self.regions.clone());
        }

        if let Ok(id) = selector.parse::<u32>() {
            return self
                .regions
                .iter()
                .find(|region| region.id == id)
                .map(|region| vec![region.clone()])
                .ok_or(CatalogError::UnknownId(id));
        }

        if let Some(exact) = self
            .regions
            .iter()
            .find(|region| region.name.eq_ignore_ascii_case(selector))
        {
            return Ok(vec![exact.clone()]);
        }

        match self.search(selector).as_slice() {
            [] => Err(CatalogError::UnknownName(selector.to_string())),
            [only] => Ok(vec![(*only).clone()]),
            many => Err(CatalogError::Ambiguous {
                query: selector.to_string(),
                candidates: many
                    .iter()
                    .take(10)
                    .map(|region| format!("[{}] {}", region.id, region.name))
                    .collect(),
            }),
        }
    }
}
