use clap::{Parser, Subcommand};
use std::path::Path;
use tracing::{error, info, warn};

use maritime_scraper::config::Config;
use maritime_scraper::error::Result;
use maritime_scraper::logging;
use maritime_scraper::pipeline::Pipeline;
use maritime_scraper::spiders::equasis::{EquasisArgs, EquasisSpider};
use maritime_scraper::spiders::maritime_connector::MaritimeConnectorSpider;
use maritime_scraper::spiders::{Spider, REGISTERED_SPIDERS};

#[derive(Parser)]
#[command(name = "maritime_scraper")]
#[command(about = "Maritime shipping data scraper")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run registered spiders with their default arguments
    Run {
        /// Specific spiders to run (comma-separated). Available: equasis, maritime_connector
        #[arg(long)]
        spiders: Option<String>,
    },
    /// Run the Equasis registry crawler
    Equasis {
        /// Comma-delimited list of IMOs to get data for, skipping the search
        #[arg(long)]
        imos: Option<String>,
        /// Min build year of vessel
        #[arg(long)]
        min_year: Option<u32>,
        /// Max build year of vessel
        #[arg(long)]
        max_year: Option<u32>,
        /// Min page of search results
        #[arg(long)]
        min_page: Option<u32>,
        /// Max page of search results
        #[arg(long)]
        max_page: Option<u32>,
        /// Vessel category code (5: bulk, 6: oil/chemical, 7: gas)
        #[arg(long)]
        category: Option<String>,
        /// Ad-hoc search filters as comma-delimited key:value pairs
        #[arg(long)]
        filters: Option<String>,
        /// Comma-delimited fields whitelisted in the final item
        #[arg(long)]
        whitelist: Option<String>,
        /// Comma-delimited fields blacklisted in the final item
        #[arg(long)]
        blacklist: Option<String>,
        /// Test run, using the dev login inventory
        #[arg(long)]
        test: bool,
        /// Drop the persisted state before running
        #[arg(long)]
        reset_state: bool,
    },
}

fn create_spider(name: &str, config: &Config) -> Result<Option<Box<dyn Spider>>> {
    let spider: Box<dyn Spider> = match name {
        "equasis" => Box::new(EquasisSpider::new(
            config.equasis.clone(),
            Path::new(&config.state_dir),
            EquasisArgs::default(),
        )?),
        "maritime_connector" => Box::new(MaritimeConnectorSpider::new()?),
        _ => return Ok(None),
    };
    Ok(Some(spider))
}

async fn run_spider(mut spider: Box<dyn Spider>, config: &Config) {
    let pipeline = Pipeline::new(&config.output_dir);
    match pipeline.run(spider.as_mut()).await {
        Ok(result) => {
            info!("pipeline finished");
            println!("\n📊 Pipeline results for {}:", result.spider_name);
            println!("   Total items: {}", result.total_items);
            println!("   Emitted: {}", result.emitted_items);
            println!("   Invalid: {}", result.invalid_items);
            println!("   Missing rows: {}", result.missing_rows.len());
            println!("   Output dir: {}", result.output_dir);

            if !result.errors.is_empty() {
                warn!(count = result.errors.len(), "validation errors during run");
                println!("\n⚠️  Validation errors:");
                for error in &result.errors {
                    println!("   - {}", error);
                }
            }

            if !result.missing_rows.is_empty() {
                println!("\n⚠️  Rows needing human review:");
                for row in &result.missing_rows {
                    println!("   - {}", row);
                }
            }
        }
        Err(e) => {
            error!(error = %e, "pipeline failed");
            println!("❌ Pipeline failed: {}", e);
        }
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Parse ad-hoc filters given as 'key:value,foo:bar'.
fn split_pairs(raw: Option<String>) -> Vec<(String, String)> {
    split_list(raw)
        .into_iter()
        .filter_map(|pair| {
            pair.split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_from(&cli.config)?;

    match cli.command {
        Commands::Run { spiders } => {
            let names = spiders
                .map(|list| split_list(Some(list)))
                .unwrap_or_else(|| REGISTERED_SPIDERS.iter().map(|s| s.to_string()).collect());

            for name in names {
                let span = tracing::info_span!("spider", name = %name);
                let _enter = span.enter();

                match create_spider(&name, &config)? {
                    Some(spider) => run_spider(spider, &config).await,
                    None => {
                        warn!(spider = %name, "unknown spider specified");
                        println!("⚠️  Unknown spider: {}", name);
                    }
                }
            }
        }
        Commands::Equasis {
            imos,
            min_year,
            max_year,
            min_page,
            max_page,
            category,
            filters,
            whitelist,
            blacklist,
            test,
            reset_state,
        } => {
            let args = EquasisArgs {
                imos: split_list(imos),
                min_year,
                max_year,
                min_page,
                max_page,
                category,
                filters: split_pairs(filters),
                whitelist: split_list(whitelist),
                blacklist: split_list(blacklist),
                test,
                reset_state,
            };
            let spider = EquasisSpider::new(
                config.equasis.clone(),
                Path::new(&config.state_dir),
                args,
            )?;
            run_spider(Box::new(spider), &config).await;
        }
    }

    Ok(())
}
