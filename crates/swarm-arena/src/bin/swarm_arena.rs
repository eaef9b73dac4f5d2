//! swarm-arena: replay marker detections, track robots, serve queries.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use log::{info, warn, LevelFilter};
use swarm_arena::core::{ReplaySource, TrackerConfig};

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(name = "swarm-arena")]
#[command(about = "Track swarm robots from overhead marker detections and serve the world model")]
#[command(version)]
struct Cli {
    /// JSON tracker configuration; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON file with an array of frames, each an array of detections.
    #[arg(long, required_unless_present = "print_config")]
    replay: Option<PathBuf>,

    /// Start the replay over when it runs out.
    #[arg(long = "loop")]
    looping: bool,

    /// Delay between replayed frames, milliseconds.
    #[arg(long)]
    frame_interval_ms: Option<u64>,

    /// Listen address of the query server.
    #[arg(long)]
    host: Option<String>,

    /// Listen port of the query server.
    #[arg(long)]
    port: Option<u16>,

    /// Distance between the two arena corner markers, metres.
    #[arg(long)]
    reference_distance: Option<f64>,

    /// Default robot sensor range, metres.
    #[arg(long)]
    sensor_range: Option<f64>,

    /// Log level (off, error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Emit JSON log lines.
    #[cfg(feature = "tracing")]
    #[arg(long)]
    log_json: bool,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn tracker_config(&self) -> CliResult<TrackerConfig> {
        let mut config = match &self.config {
            Some(path) => TrackerConfig::load_json(path)?,
            None => TrackerConfig::default(),
        };
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(distance) = self.reference_distance {
            config.reference_distance_m = distance;
        }
        if let Some(range) = self.sensor_range {
            config.sensor_range_m = range;
        }
        config.validate()?;
        Ok(config)
    }

    fn replay_source(&self, path: &Path) -> CliResult<ReplaySource> {
        let mut source = ReplaySource::load_json(path)?.looping(self.looping);
        if let Some(ms) = self.frame_interval_ms {
            source = source.with_frame_interval(Duration::from_millis(ms));
        }
        info!(
            "replaying {} frames from {}{}",
            source.len(),
            path.display(),
            if self.looping { " (looping)" } else { "" }
        );
        Ok(source)
    }
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) -> CliResult<()> {
    swarm_arena::core::init_with_level(cli.log_level)?;
    Ok(())
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli) -> CliResult<()> {
    // Route `log` records into the subscriber; ignore an already installed one.
    let _ = tracing_log::LogTracer::init_with_filter(cli.log_level);
    swarm_arena::core::init_tracing(cli.log_json);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl+C ({err}); running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = cli.tracker_config()?;
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let Some(replay) = &cli.replay else {
        return Err("--replay is required".into());
    };
    let source = cli.replay_source(replay)?;
    let listener = std::net::TcpListener::bind(config.server.socket_addr()?)?;

    let frames = swarm_arena::run(&config, source, listener, shutdown_signal())?;
    info!("done, {frames} frames processed");
    Ok(())
}
