pub mod browser;
pub mod collector;
pub mod dedup;
pub mod dom;
pub mod parser;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use collector::ScrollCollector;
pub use parser::ResponseParser;
pub use types::SiteProfile;
