use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use grbl_tracker::{
    cnc::{
        connection::{open_and_reset_serial, stream_program},
        grbl::tracker::MachineTracker,
    },
    config::{load_config, TrackerConfig},
};

#[derive(Parser, Debug)]
#[command(version, about = "Stream a G-code program to a Grbl controller, printing simulated tool state as JSON lines.", long_about = None)]
struct Args {
    /// Serial port the controller is attached to
    #[arg(short, long)]
    port: String,
    /// JSON file of tracker settings; defaults are used if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Only follow status reports; do not interpolate motion
    #[arg(long)]
    no_simulation: bool,
    program: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();

    let mut config = match &args.config {
        Some(path) => load_config(path)
            .await
            .with_context(|| format!("loading config {:?}", path))?,
        None => TrackerConfig::default(),
    };
    if args.no_simulation {
        config.simulate_motion = false;
    }
    let program = tokio::fs::read_to_string(&args.program)
        .await
        .with_context(|| format!("reading program {:?}", args.program))?;

    info!("opening {} at {} baud", args.port, config.baud_rate);
    let (reader, writer) = open_and_reset_serial(&args.port, config.baud_rate)
        .await
        .with_context(|| format!("opening serial port {}", args.port))?;
    let mut tracker = MachineTracker::new(&config);
    let summary = stream_program(
        reader,
        writer,
        program.lines().map(String::from),
        &mut tracker,
        &config,
        |snapshot| match serde_json::to_string(snapshot) {
            Ok(json) => println!("{}", json),
            Err(error) => tracing::warn!("could not serialize snapshot: {}", error),
        },
    )
    .await?;
    info!(
        "sent {} lines, {} could not be interpreted",
        summary.lines_sent, summary.lines_rejected
    );
    Ok(())
}
