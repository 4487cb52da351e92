pub mod jsonl_out;
pub mod rate_limiter;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::models::{Item, ItemMeta, Record};
use crate::spiders::{ItemSink, Spider};

/// How a failing item is handled: strict drops it, lenient lets it
/// through with a warning. Registry data is strict; looser sources with
/// known-incomplete rows run lenient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    #[default]
    Strict,
    Lenient,
}

/// Result of a complete pipeline run for one spider.
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub spider_name: String,
    pub total_items: usize,
    pub emitted_items: usize,
    /// Items that failed schema validation and were dropped.
    pub invalid_items: usize,
    /// Field errors gathered during validation, one entry per failing item.
    pub errors: Vec<String>,
    /// Raw rows the spider could not make sense of, kept for human review.
    pub missing_rows: Vec<String>,
    pub output_dir: String,
}

/// Validates and writes items the moment a spider emits them. Everything
/// written before a crawl failure stays on disk.
struct RecordSink {
    output_dir: PathBuf,
    mode: ValidationMode,
    provider: String,
    spider_name: String,
    job_time: DateTime<Utc>,
    total: usize,
    emitted: usize,
    invalid: usize,
    errors: Vec<String>,
    missing_rows: Vec<String>,
}

impl ItemSink for RecordSink {
    fn emit(&mut self, item: Item) -> Result<()> {
        self.total += 1;
        if let Err(errors) = item.validate() {
            self.errors.push(format!("{}: {}", item.kind(), errors));
            match self.mode {
                ValidationMode::Strict => {
                    warn!(kind = item.kind(), %errors, "item validation failed, dropping");
                    self.invalid += 1;
                    return Ok(());
                }
                ValidationMode::Lenient => {
                    warn!(kind = item.kind(), %errors, "item validation failed, emitting anyway");
                }
            }
        }
        let record = Record {
            meta: ItemMeta::new(&self.provider, &self.spider_name, self.job_time),
            item,
        };
        jsonl_out::append_rotating(&self.output_dir, &record)?;
        self.emitted += 1;
        Ok(())
    }

    fn missing(&mut self, raw: &str) {
        warn!(row = raw, "row could not be extracted, keeping it for human review");
        self.missing_rows.push(raw.to_string());
    }
}

/// Runs a spider and feeds everything it extracts through validation into
/// the shared JSON-lines sink.
pub struct Pipeline {
    output_dir: PathBuf,
    mode: ValidationMode,
}

impl Pipeline {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            mode: ValidationMode::Strict,
        }
    }

    pub fn with_mode(output_dir: impl Into<PathBuf>, mode: ValidationMode) -> Self {
        Self {
            output_dir: output_dir.into(),
            mode,
        }
    }

    #[instrument(skip(self, spider), fields(spider = %spider.name()))]
    pub async fn run(&self, spider: &mut dyn Spider) -> Result<PipelineResult> {
        let spider_name = spider.name().to_string();
        info!(provider = spider.provider(), version = spider.version(), "starting pipeline");
        counter!("pipeline_runs_total", "spider" => spider_name.clone()).increment(1);
        let started = std::time::Instant::now();

        let mut sink = RecordSink {
            output_dir: self.output_dir.clone(),
            mode: self.mode,
            provider: spider.provider().to_string(),
            spider_name: spider_name.clone(),
            job_time: Utc::now(),
            total: 0,
            emitted: 0,
            invalid: 0,
            errors: Vec::new(),
            missing_rows: Vec::new(),
        };

        let crawl = spider.crawl(&mut sink).await;

        counter!("items_emitted_total", "spider" => spider_name.clone())
            .increment(sink.emitted as u64);
        counter!("items_invalid_total", "spider" => spider_name.clone())
            .increment(sink.invalid as u64);
        histogram!("raw_items_per_run", "spider" => spider_name.clone())
            .record(sink.total as f64);
        histogram!("pipeline_duration_seconds", "spider" => spider_name.clone())
            .record(started.elapsed().as_secs_f64());

        if !sink.missing_rows.is_empty() {
            warn!(
                count = sink.missing_rows.len(),
                "rows could not be extracted and need human review"
            );
        }

        // items emitted before the failure are already on disk
        if let Err(e) = crawl {
            warn!(error = %e, emitted = sink.emitted, "crawl aborted, keeping what was written");
            return Err(e);
        }

        info!(
            total = sink.total,
            emitted = sink.emitted,
            invalid = sink.invalid,
            missing_rows = sink.missing_rows.len(),
            "pipeline finished"
        );

        Ok(PipelineResult {
            spider_name,
            total_items: sink.total,
            emitted_items: sink.emitted,
            invalid_items: sink.invalid,
            errors: sink.errors,
            missing_rows: sink.missing_rows,
            output_dir: self.output_dir.to_string_lossy().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScraperError;
    use crate::models::{Item, Vessel};
    use async_trait::async_trait;

    struct FixtureSpider {
        items: Vec<Item>,
    }

    #[async_trait]
    impl Spider for FixtureSpider {
        fn name(&self) -> &'static str {
            "fixture"
        }

        fn provider(&self) -> &'static str {
            "Fixture"
        }

        async fn crawl(&mut self, sink: &mut dyn ItemSink) -> Result<()> {
            for item in self.items.clone() {
                sink.emit(item)?;
            }
            sink.missing("garbled row");
            Ok(())
        }
    }

    #[tokio::test]
    async fn pipeline_drops_invalid_items_and_keeps_missing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(dir.path());

        let mut spider = FixtureSpider {
            items: vec![
                Item::Vessel(Vessel {
                    name: Some("BERRIZ".to_string()),
                    ..Default::default()
                }),
                // no name, no imo: fails validation
                Item::Vessel(Vessel::default()),
            ],
        };

        let result = pipeline.run(&mut spider).await.unwrap();
        assert_eq!(result.total_items, 2);
        assert_eq!(result.emitted_items, 1);
        assert_eq!(result.invalid_items, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("vessel"));
        assert_eq!(result.missing_rows, vec!["garbled row".to_string()]);

        let link = dir.path().join("items.jsonl");
        let content = std::fs::read_to_string(link).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn lenient_mode_emits_failing_items_with_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::with_mode(dir.path(), ValidationMode::Lenient);

        let mut spider = FixtureSpider {
            items: vec![Item::Vessel(Vessel::default())],
        };

        let result = pipeline.run(&mut spider).await.unwrap();
        assert_eq!(result.emitted_items, 1);
        assert_eq!(result.invalid_items, 0);
        assert_eq!(result.errors.len(), 1);
    }

    struct AbortingSpider;

    #[async_trait]
    impl Spider for AbortingSpider {
        fn name(&self) -> &'static str {
            "aborting"
        }

        fn provider(&self) -> &'static str {
            "Aborting"
        }

        async fn crawl(&mut self, sink: &mut dyn ItemSink) -> Result<()> {
            sink.emit(Item::Vessel(Vessel {
                name: Some("BERRIZ".to_string()),
                ..Default::default()
            }))?;
            Err(ScraperError::NoCredentialsLeft)
        }
    }

    #[tokio::test]
    async fn failed_crawl_keeps_records_already_written() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(dir.path());

        let err = pipeline.run(&mut AbortingSpider).await.unwrap_err();
        assert!(matches!(err, ScraperError::NoCredentialsLeft));

        let link = dir.path().join("items.jsonl");
        let content = std::fs::read_to_string(link).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("BERRIZ"));
    }
}
