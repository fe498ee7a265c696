use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use maxigauge_lib::datalog;
use maxigauge_lib::{MaxiGauge, Settings};

/// Read and log pressures from a MaxiGauge vacuum gauge controller
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// JSON settings file
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Serial port, overrides the settings file
    #[clap(long, global = true)]
    port: Option<String>,

    /// Log every byte on the serial line
    #[clap(long, global = true)]
    debug: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print contrast, pressed keys and all six readings
    Check,
    /// Get or set the display contrast (0-20)
    Contrast { value: Option<i32> },
    /// Print the pressures once per second
    Show,
    /// Poll continuously and append to the measurement log
    Store {
        /// Poll period, overrides the settings file
        #[clap(long)]
        interval_ms: Option<u64>,
    },
    /// Keep the header and every n-th line of a log file
    ThinOut {
        #[clap(short, default_value = "30")]
        n: usize,
        filename: PathBuf,
    },
    /// Average blocks of n consecutive seconds of a log file
    Average {
        #[clap(short, default_value = "30")]
        n: usize,
        filename: PathBuf,
    },
    /// Keep the first two lines and every n-th line after them
    EveryNth { n: usize, filename: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "trace" } else { "info" };
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, default_filter),
    );

    match &args.command {
        Command::ThinOut { n, filename } => {
            return datalog::thin_out(open_log(filename)?, io::stdout().lock(), *n)
                .context("Failed to thin out log");
        }
        Command::Average { n, filename } => {
            return datalog::thin_out_average(open_log(filename)?, io::stdout().lock(), *n)
                .context("Failed to average log");
        }
        Command::EveryNth { n, filename } => {
            return datalog::extract_every_nth_line(open_log(filename)?, io::stdout().lock(), *n)
                .context("Failed to extract lines");
        }
        _ => {}
    }

    let settings = load_settings(&args)?;
    let gauge = MaxiGauge::connect_with_settings(&settings)
        .with_context(|| format!("Failed to connect to {}", settings.serial_port))?;

    run_session(&gauge, &args.command, &settings).await
}

/// Run one device command, then release the port. The command's own error
/// takes precedence over a failed disconnect.
async fn run_session(gauge: &MaxiGauge, command: &Command, settings: &Settings) -> Result<()> {
    let outcome = run_device_command(gauge, command, settings).await;
    if let Err(e) = gauge.disconnect().await {
        log::warn!("Failed to disconnect cleanly: {}", e);
    }
    outcome
}

/// One line of `show` output, or `None` when this cycle failed.
async fn show_once(gauge: &MaxiGauge) -> Option<String> {
    match gauge.pressures().await {
        Ok(readings) => {
            let values: Vec<String> = readings
                .iter()
                .map(|r| r.value().map(datalog::format_pressure).unwrap_or_else(|| "-".into()))
                .collect();
            Some(values.join("  "))
        }
        Err(e) => {
            log::warn!("Failed to read pressures: {}", e);
            None
        }
    }
}

fn open_log(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(port) = &args.port {
        settings.serial_port = port.clone();
    }
    if args.debug {
        settings.trace_wire = true;
    }
    settings.validate()?;
    Ok(settings)
}

async fn run_device_command(gauge: &MaxiGauge, command: &Command, settings: &Settings) -> Result<()> {
    match command {
        Command::Check => {
            print!("{}", gauge.check_device().await?);
            for reading in gauge.pressures().await? {
                println!("{}", reading);
            }
        }
        Command::Contrast { value } => {
            let contrast = gauge.display_contrast(*value).await?;
            println!("Display contrast: {}", contrast);
        }
        Command::Show => {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = ticker.tick() => {
                        if let Some(line) = show_once(gauge).await {
                            println!("{}", line);
                        }
                    }
                }
            }
        }
        Command::Store { interval_ms } => {
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| settings.update_interval());
            gauge
                .start_continuous_updates(
                    interval,
                    settings.history_retention,
                    Some(settings.logfile_name.as_path()),
                )
                .await?;
            tokio::signal::ctrl_c().await?;
            log::info!("Interrupted, flushing log");
            gauge.flush_log().await?;
        }
        Command::ThinOut { .. } | Command::Average { .. } | Command::EveryNth { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use maxigauge_lib::serial::mock::{MockPort, Reply};
    use maxigauge_lib::serial::{SerialError, SerialInterface};
    use maxigauge_lib::DeviceError;

    fn connect(port: &MockPort) -> MaxiGauge {
        let interface = SerialInterface::from_io(Box::new(port.clone()), Duration::from_millis(20));
        MaxiGauge::from_interface(interface)
    }

    #[tokio::test]
    async fn test_show_survives_failed_cycle() {
        let port = MockPort::new();
        for sensor in 1..=6 {
            port.set_pressure(sensor, 0, "1.000E-03");
        }
        port.set_pressure(6, 5, "0.0000E+00");
        port.set_reply("PR3", Reply::Nak { system: 0, gauge: 4 });
        let gauge = connect(&port);

        assert_eq!(show_once(&gauge).await, None);

        port.set_pressure(3, 0, "1.000E-03");
        assert_eq!(
            show_once(&gauge).await.as_deref(),
            Some("1.000E-03  1.000E-03  1.000E-03  1.000E-03  1.000E-03  -")
        );
    }

    #[tokio::test]
    async fn test_session_returns_command_error_and_disconnects() {
        let port = MockPort::new();
        port.set_reply("DCC,42", Reply::Nak { system: 8192, gauge: 0 });
        let gauge = connect(&port);

        let err = run_session(&gauge, &Command::Contrast { value: Some(42) }, &Settings::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeviceError>(),
            Some(DeviceError::SerialError(SerialError::NegativeAcknowledgement(_)))
        ));
        assert!(!gauge.gauge().is_connected().await);
    }
}
