use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::thread;
use std::time::Duration;
use tfmini_lib::TFminiPlus;
use tfmini_lib::driver::{DriverConfig, validate_frame_rate};
use tfmini_lib::gate::{MeasurementSink, PublicationGate, StatusSink};
use tfmini_lib::transport::{self, DEFAULT_BAUD};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Stream measurements from a TFmini Plus connected to a serial port.
#[derive(Parser)]
struct Cli {
    /// Serial port path, e.g. /dev/ttyUSB0.
    port: String,
    /// UART baud rate.
    #[arg(short, long, default_value_t = DEFAULT_BAUD)]
    baud: u32,
    /// Measurement output rate in Hz. 0 pauses ranging.
    #[arg(short = 'r', long, default_value_t = 100)]
    frame_rate: u16,
    /// Issue a soft reset before configuring.
    #[arg(long)]
    soft_reset: bool,
    /// Persist settings to the sensor's flash after configuring.
    #[arg(long)]
    save_settings: bool,
    /// Polling interval in milliseconds.
    #[arg(short, long, default_value_t = 100)]
    interval_ms: u64,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

/// Logs each published value; stands in for a real numeric sink.
struct LogSink {
    name: &'static str,
    unit: &'static str,
}

impl MeasurementSink for LogSink {
    fn publish(&mut self, value: f32) {
        info!("{}: {:.1} {}", self.name, value, self.unit);
    }
    fn publish_unavailable(&mut self) {
        info!("{}: unavailable", self.name);
    }
}

struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn publish(&mut self, status: &str) {
        info!(status, "sensor status changed");
    }
}

fn setup_logging(verbosity: &Verbosity<InfoLevel>) {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false);
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.verbose);

    validate_frame_rate(cli.frame_rate).context("unsupported frame rate")?;

    let link = transport::open(&cli.port, cli.baud)
        .with_context(|| format!("failed to open {}", cli.port))?;
    info!(port = %cli.port, baud = cli.baud, "serial port open");

    let gate = PublicationGate::new()
        .with_distance_sink(Box::new(LogSink {
            name: "distance",
            unit: "cm",
        }))
        .with_strength_sink(Box::new(LogSink {
            name: "signal strength",
            unit: "",
        }))
        .with_temperature_sink(Box::new(LogSink {
            name: "temperature",
            unit: "°C",
        }))
        .with_status_sink(Box::new(LogStatusSink));

    let config = DriverConfig {
        frame_rate: cli.frame_rate,
        soft_reset: cli.soft_reset,
        save_settings: cli.save_settings,
        ..DriverConfig::default()
    };

    let mut driver = TFminiPlus::new(link, config, gate);
    driver.setup().context("sensor setup failed")?;

    let interval = Duration::from_millis(cli.interval_ms);
    loop {
        driver.tick();
        thread::sleep(interval);
    }
}
