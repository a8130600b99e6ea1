use anyhow::{Context, Result};
use okavango::{fetch::HttpTransport, view::Extremes, Config, Pipeline};
use serde::Serialize;
use std::{env, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const EXTREMES: usize = 5;

#[derive(Serialize)]
struct MetricSummary {
    name: String,
    coverage: usize,
    extremes: Extremes,
}

#[derive(Serialize)]
struct Summary {
    rows: usize,
    key_attribute: String,
    metrics: Vec<MetricSummary>,
}

fn load_config() -> Result<Config> {
    let mut config = match env::var_os("OKAVANGO_CONFIG") {
        Some(path) => {
            let path = PathBuf::from(path);
            Config::load(&path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(dir) = env::var_os("OKAVANGO_CACHE_DIR") {
        config.cache_dir = PathBuf::from(dir);
    }
    Ok(config)
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,okavango=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    // ─── 2) configure ────────────────────────────────────────────────
    let config = load_config()?;
    let sources = config.descriptors().context("validating sources")?;
    info!(
        cache_dir = %config.cache_dir.display(),
        sources = sources.len(),
        policy = ?config.merge.collision_policy,
        "configured"
    );

    // ─── 3) run ──────────────────────────────────────────────────────
    let transport = HttpTransport::new(config.fetch.connect_timeout(), config.fetch.read_timeout())
        .context("building http client")?;
    let pipeline = Pipeline::from_config(transport, &config);
    let output = pipeline.run(&sources).context("pipeline failed")?;

    // ─── 4) summarize ────────────────────────────────────────────────
    let merged = &output.merged;
    let mut metrics = Vec::new();
    for name in output.metric_names() {
        let coverage = merged.coverage(&name)?;
        if coverage == 0 {
            warn!(metric = %name, "no country has a numeric value");
        }
        metrics.push(MetricSummary {
            extremes: merged.extremes(&name, EXTREMES)?,
            coverage,
            name,
        });
    }
    let summary = Summary {
        rows: merged.num_rows(),
        key_attribute: merged.key_attribute().to_string(),
        metrics,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    info!("all done");
    Ok(())
}
