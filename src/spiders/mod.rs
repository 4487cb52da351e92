pub mod equasis;
pub mod maritime_connector;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Item;

/// Receives what a crawl produces, as it is produced. Sinks are expected
/// to write durably on every call so an interrupted crawl keeps
/// everything already extracted.
pub trait ItemSink: Send {
    fn emit(&mut self, item: Item) -> Result<()>;

    /// A raw row the extractor gave up on, kept for human review.
    fn missing(&mut self, raw: &str);
}

/// Common interface for data-source crawlers. A spider owns its network
/// session and whatever per-run state it needs; the sink owns validation
/// and output.
#[async_trait]
pub trait Spider: Send + Sync {
    /// Short machine name, also the persisted-state file stem.
    fn name(&self) -> &'static str;

    /// Human-readable name of the upstream data provider.
    fn provider(&self) -> &'static str;

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    /// Run the crawl to completion, streaming everything extracted into
    /// `sink` along the way.
    async fn crawl(&mut self, sink: &mut dyn ItemSink) -> Result<()>;
}

/// Spiders that can be launched by name from `run --spiders`.
pub const REGISTERED_SPIDERS: &[&str] = &["equasis", "maritime_connector"];
