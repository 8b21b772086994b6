use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use dashboard::config::Config;
use dashboard::output::{OutputSink, PngFileSink, Rotation};
use dashboard::pipeline::Dashboard;

/// Render the dashboard image, once or on an interval
#[derive(Parser, Debug)]
#[command(name = "dashboard", version, about)]
struct Args {
    /// Config file (defaults to ./dashboard.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render a single image and exit
    #[arg(long)]
    once: bool,

    /// Output PNG, overriding `output.path`
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("loading configuration")?;
    let path = args.output.clone().unwrap_or_else(|| config.output.path.clone());
    let mut sink = PngFileSink::new(path, Rotation::from_degrees(config.output.rotate)?);
    let dashboard = Dashboard::from_config(&config).context("building dashboard")?;
    let interval = Duration::from_secs(config.output.interval_secs.max(1));

    let result = loop {
        let run = if args.once {
            dashboard.run().await
        } else {
            let (run, _) = tokio::join!(dashboard.run(), tokio::time::sleep(interval));
            run
        };

        match run {
            Ok(bitmap) => {
                if let Err(err) = sink.deliver(&bitmap) {
                    break Err(anyhow::Error::new(err).context("writing output"));
                }
            }
            Err(err) => {
                error!("run failed: {}", err);
                break Err(anyhow::Error::new(err).context("rendering dashboard"));
            }
        }
        if args.once {
            info!("done");
            break Ok(());
        }
    };

    if let Err(err) = dashboard.shutdown().await {
        error!("shutdown: {}", err);
    }
    result
}
