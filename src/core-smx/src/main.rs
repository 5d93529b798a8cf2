use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use core_smx::common::logging::setup_logging;
use core_smx::routes::resolve_pages_routes;
use core_smx::sitemap::{HttpFetcher, Outcome, SitemapConfig, SitemapGenerator, write_routes_cache};

#[derive(Parser)]
#[command(name = "core-smx")]
#[command(about = "Build-time sitemap generation", long_about = None)]
struct CoreCli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate sitemap.xml (or a sitemap index with shards) into a directory
    Generate {
        /// The sitemap.json config file.
        #[arg(short, long, value_parser = validate_input_file)]
        config: PathBuf,
        /// Directory the sitemap files are written to.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Print the static routes inferred from page directories
    Routes {
        /// A pages directory. Repeat for several.
        #[arg(short, long = "pages-dir", required = true, value_parser = validate_input_dir)]
        pages_dirs: Vec<PathBuf>,
        /// Page file extension. Repeat for several.
        #[arg(short, long = "ext", default_values_t = [".vue".to_string()])]
        extensions: Vec<String>,
    },

    /// Write __sitemap__/routes.json for serving the sitemap later
    CacheRoutes {
        #[arg(short, long, value_parser = validate_input_file)]
        config: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn validate_input_file(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);

    if !path.exists() {
        return Err(format!("Input path does not exist: {}", path.display()));
    }

    if !path.is_file() {
        return Err(format!("Input path is not a file: {}", path.display()));
    }

    Ok(path)
}

fn validate_input_dir(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);

    if !path.is_dir() {
        return Err(format!("Pages directory does not exist: {}", path.display()));
    }

    Ok(path)
}

async fn run(cli: CoreCli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate { config, out } => {
            let config = SitemapConfig::load(&config).with_context(|| format!("loading {}", config.display()))?;
            let mut generator = SitemapGenerator::new(config, Arc::new(HttpFetcher::default()))?;
            match generator.generate(&out).await? {
                Outcome::Written { files } => {
                    for file in files {
                        println!("{}", file.display());
                    }
                }
                Outcome::MissingSiteUrl => bail!("no site URL configured"),
                Outcome::Disabled | Outcome::AlreadyGenerated => {}
            }
        }

        Commands::Routes { pages_dirs, extensions } => {
            let scan = resolve_pages_routes(&pages_dirs, &extensions).await?;
            for route in scan.routes {
                println!("{}", route.path);
            }
        }

        Commands::CacheRoutes { config, out } => {
            let config = SitemapConfig::load(&config).with_context(|| format!("loading {}", config.display()))?;
            let routes: Vec<String> = if config.infer_static_pages_as_routes && !config.pages_dirs.is_empty() {
                resolve_pages_routes(&config.pages_dirs, &config.extensions)
                    .await?
                    .routes
                    .into_iter()
                    .map(|r| r.path)
                    .collect()
            } else {
                Vec::new()
            };
            let path = write_routes_cache(&out, &routes, &config.urls).await?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    setup_logging("core_smx=info");

    let cli = CoreCli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}
