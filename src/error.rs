use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("region catalog not found: {path}")]
    NotFound { path: String },

    #[error("failed to read region catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch region catalog {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid region catalog {source_name}: {source}")]
    Json {
        source_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no region with ID {0}")]
    UnknownId(u32),

    #[error("no region matching \"{0}\"")]
    UnknownName(String),

    #[error("\"{query}\" matches several regions: {}", .candidates.join(", "))]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
    },
}
