// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SOLEM BLIP command line tool

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use solem_blip::bluetooth::bluez::BluezTransport;
use solem_blip::bluetooth::ble_constants::limits;
use solem_blip::bluetooth::{Command, StatusReading};
use solem_blip::config::Config;
use solem_blip::controller::IrrigationController;
use solem_blip::diagnostics;

#[derive(Parser)]
#[command(name = "solem-blip", version)]
#[command(about = "Control SOLEM BLIP irrigation controllers over Bluetooth LE")]
struct Cli {
    /// Controller address, overrides the config file
    #[arg(short, long, global = true)]
    address: Option<String>,

    /// Config file to use instead of the default one
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for nearby controllers
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,
    },
    /// List the controller's GATT characteristics
    Characteristics,
    /// Read the controller's status
    Status,
    /// Water a single zone
    Water {
        /// Zone number (1-3)
        #[arg(short, long)]
        zone: u8,
        #[command(flatten)]
        duration: WateringDuration,
    },
    /// Water every zone
    WaterAll {
        #[command(flatten)]
        duration: WateringDuration,
    },
    /// Stop watering
    Stop,
    /// Switch the controller on
    On,
    /// Switch the controller off
    Off {
        /// Days to stay off, 0 for permanently
        #[arg(short, long, default_value = "0")]
        days: u16,
    },
    /// Run a stored program
    Program {
        /// Program number
        #[arg(short, long)]
        id: u16,
    },
    /// Print status updates until interrupted
    Watch {
        /// Log every 16-bit value in each status packet that could be a timer
        #[arg(long)]
        scan_timer: bool,

        /// Only log timer candidates within 5 seconds of this value
        #[arg(long, value_name = "SECONDS", requires = "scan_timer")]
        expect: Option<u16>,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct WateringDuration {
    /// Duration in seconds
    #[arg(short, long)]
    seconds: Option<u16>,

    /// Duration in minutes
    #[arg(short, long)]
    minutes: Option<u16>,
}

impl WateringDuration {
    fn zone_command(&self, zone: u8) -> Result<Command> {
        match (self.seconds, self.minutes) {
            (Some(duration_secs), _) => Ok(Command::WaterZone {
                zone,
                duration_secs,
            }),
            (None, Some(minutes)) => Ok(Command::water_zone_minutes(zone, minutes)?),
            (None, None) => bail!("a duration is required"),
        }
    }

    fn all_zones_command(&self) -> Result<Command> {
        match (self.seconds, self.minutes) {
            (Some(duration_secs), _) => Ok(Command::WaterAllZones { duration_secs }),
            (None, Some(minutes)) => Ok(Command::water_all_minutes(minutes)?),
            (None, None) => bail!("a duration is required"),
        }
    }
}

fn init_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("solem_blip={}", level).parse()?),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(address) = cli.address {
        config.device.address = address;
    }

    init_logging(cli.debug || config.debug)?;
    info!("SOLEM BLIP tool v{}", env!("CARGO_PKG_VERSION"));

    let transport = BluezTransport::new().await?;

    match cli.command {
        Commands::Scan { duration } => {
            scan(&transport, duration, &config.device.name, cli.json).await
        }
        command => {
            let mut controller = IrrigationController::new(transport, config.controller_settings());
            controller.connect().await?;

            let result = run(&mut controller, command, cli.json).await;
            controller.disconnect().await;
            result
        }
    }
}

async fn scan(
    transport: &BluezTransport,
    duration: u64,
    device_name: &str,
    json: bool,
) -> Result<()> {
    let devices = transport.scan(Duration::from_secs(duration), device_name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No devices found");
    }
    for device in devices {
        println!(
            "{}{} {} (RSSI: {})",
            if device.is_blip { "* " } else { "  " },
            device.address,
            device.name.as_deref().unwrap_or("<unknown>"),
            device
                .rssi
                .map_or_else(|| "n/a".to_string(), |rssi| rssi.to_string())
        );
    }
    Ok(())
}

async fn run(
    controller: &mut IrrigationController<BluezTransport>,
    command: Commands,
    json: bool,
) -> Result<()> {
    let command = match command {
        Commands::Scan { .. } => bail!("scan does not need a connection"),
        Commands::Characteristics => {
            let lines = diagnostics::describe_characteristics(&controller.characteristics().await?);
            if json {
                println!("{}", serde_json::to_string_pretty(&lines)?);
            } else {
                lines.iter().for_each(|line| println!("{}", line));
            }
            return Ok(());
        }
        Commands::Status => {
            let reading = controller.query_status().await?;
            print_reading(&reading, json)?;
            return Ok(());
        }
        Commands::Watch { scan_timer, expect } => {
            let timer_scan = scan_timer.then_some(TimerScan { expect });
            return watch(controller, json, timer_scan).await;
        }
        Commands::Water { zone, duration } => duration.zone_command(zone)?,
        Commands::WaterAll { duration } => duration.all_zones_command()?,
        Commands::Stop => Command::Stop,
        Commands::On => Command::On,
        Commands::Off { days } => Command::Off { days },
        Commands::Program { id } => Command::RunProgram { program: id },
    };

    controller.send(command).await?;
    if json {
        println!("{}", serde_json::json!({ "sent": command.to_string() }));
    } else {
        println!("Sent: {}", command);
    }
    Ok(())
}

/// Opt-in timer offset analysis for `watch`.
struct TimerScan {
    expect: Option<u16>,
}

impl TimerScan {
    const TOLERANCE_SECS: u16 = 5;

    fn log(&self, packet: &[u8]) {
        let candidates = diagnostics::scan_timer_candidates(packet, limits::MAX_WATERING_SECS);
        let candidates = match self.expect {
            Some(expected) => {
                diagnostics::matching_candidates(&candidates, expected, Self::TOLERANCE_SECS)
            }
            None => candidates,
        };

        info!("Packet {}: {} timer candidate(s)", hex::encode(packet), candidates.len());
        for c in candidates {
            info!(
                "  offset {:2} {}: {}s",
                c.offset,
                if c.big_endian { "BE" } else { "LE" },
                c.seconds
            );
        }
    }
}

async fn watch(
    controller: &mut IrrigationController<BluezTransport>,
    json: bool,
    timer_scan: Option<TimerScan>,
) -> Result<()> {
    controller.enable_notifications().await?;
    info!("Watching for status updates, press Ctrl+C to stop");

    loop {
        let reading = tokio::select! {
            reading = controller.next_status(Duration::from_secs(60)) => reading?,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                return Ok(());
            }
        };

        if reading.status().is_none() {
            continue;
        }
        print_reading(&reading, json)?;
        if let (Some(scan), Some(packet)) = (&timer_scan, controller.last_status_packet()) {
            scan.log(packet);
        }
    }
}

fn print_reading(reading: &StatusReading, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reading)?);
        return Ok(());
    }
    match reading {
        StatusReading::Reported(status) => println!("{}", status),
        StatusReading::NoResponse => println!("No status received"),
    }
    Ok(())
}
