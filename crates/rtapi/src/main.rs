// Numan Thabit 2025
use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use rtapi::{
    cli::CliArgs,
    config::{load_endpoints, load_splunk_settings},
    report::{write_json, write_pdf, write_text, Forwarder},
    HttpProber, Runner,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    let source = args.input_source()?;
    let outputs = args.outputs()?;
    let endpoints = load_endpoints(&source).context("failed to load endpoints")?;
    let splunk = outputs
        .splunk
        .as_deref()
        .map(load_splunk_settings)
        .transpose()
        .context("failed to load forwarding settings")?;

    let runner = Runner::new(HttpProber::default()).show_progress(!args.quiet);
    let endpoints = runner.run(endpoints).await?;

    if outputs.print {
        write_text(&mut io::stdout().lock(), &endpoints)?;
    }
    if let Some(path) = &outputs.pdf {
        write_pdf(path, &endpoints)?;
    }
    if outputs.json {
        write_json(&mut io::stdout().lock(), &endpoints)?;
    }
    if let Some(settings) = splunk {
        Forwarder::new(settings)?.forward_all(&endpoints).await?;
    }

    info!(endpoints = endpoints.len(), "rtapi finished");
    Ok(())
}
