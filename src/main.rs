use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use sitegen::config::{Cli, Config};
use sitegen::generator::Generator;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_cli(cli)?;
    init_tracing(config.verbose);

    if let Some(dir) = &config.site.template_dir {
        if !dir.is_dir() {
            anyhow::bail!("Template directory not found: {}", dir.display());
        }
    }
    if let Some(dir) = &config.site.static_dir {
        if !dir.is_dir() {
            anyhow::bail!("Static directory not found: {}", dir.display());
        }
    }

    let output_dir = config.site.output_dir.clone();
    let mut generator = Generator::new(config.site).context("Invalid site configuration")?;

    for page in &config.pages {
        generator
            .add(page.output.as_str(), page.template.as_str(), &page.data)
            .with_context(|| format!("Failed to register page {}", page.output))?;
    }

    // Spinner only when logs are quiet, so the two don't interleave
    let spinner = if config.verbose == 0 {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Building site...");
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let result = generator.run();

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let report = result.with_context(|| format!("Build into {} failed", output_dir.display()))?;

    println!(
        "Built {} page(s) and {} asset(s) ({} bytes, {} compressed) in {:.2}s",
        report.pages,
        report.assets,
        report.bytes,
        report.compressed,
        report.duration.as_secs_f64()
    );

    Ok(ExitCode::SUCCESS)
}
