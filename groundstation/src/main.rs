/*!
# Ground Station Console

Operator console for the radio-linked antenna steering unit. It shows the
telemetry the remote node sends and programs the remote phase shifters that
steer the array's main beam.

## Features

- Telemetry reception over a UDP packet-radio gateway
- Phase-shifter commands entered per shifter or as a main-beam angle
- Simulated remote node for bench testing
- GUI console and headless monitor/send commands

## Usage

### GUI Mode (default)
```bash
groundstation
```

### Headless telemetry monitor
```bash
groundstation monitor --json
```

### One-shot command
```bash
groundstation send --mode 0 --opcode 2 --ps 10 20 30 40
groundstation send --mode 1 --opcode 2 --angle -15
```
*/

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use tracing::{info, warn};
use shared::{CommandAssembler, CommandInputs};

mod config;
mod gui;
mod link_worker;
mod radio;
mod status;

use config::AppConfig;
use gui::ConsoleGui;
use link_worker::{LinkEvent, LinkHandle};
use radio::open_radio;
use status::ConsoleStatus;

/// How long `send` waits for the worker to get the command on the air
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "groundstation")]
#[command(about = "Operator console for the radio-linked antenna steering unit")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "groundstation.toml")]
    config: PathBuf,

    /// Run in command-line mode (no GUI)
    #[arg(long)]
    cli: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log received telemetry until Ctrl+C
    Monitor {
        /// Print each telemetry packet as a JSON line on stdout
        #[arg(long)]
        json: bool,

        /// Use the simulated radio
        #[arg(long)]
        simulate: bool,
    },

    /// Assemble one command, transmit it and exit
    Send {
        /// Mode selector: 0 = set individually, 1 = main beam angle
        #[arg(short, long, default_value = "0")]
        mode: String,

        /// Opcode: 0 = no-op, 1 = blink, 2 = set phase shifters
        #[arg(short, long, default_value = "0")]
        opcode: String,

        /// Phase shifter values in degrees
        #[arg(long, num_args = 4, value_names = ["PS1", "PS2", "PS3", "PS4"], default_values = ["0", "0", "0", "0"], allow_hyphen_values = true)]
        ps: Vec<String>,

        /// Main beam angle in the YZ plane from -Z, in degrees
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        angle: String,

        /// Use the simulated radio
        #[arg(long)]
        simulate: bool,
    },

    /// Generate configuration file
    Config {
        /// Output path for configuration file
        #[arg(short, long, default_value = "groundstation.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr to keep stdout clean for JSON output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    info!("groundstation {} (shared {})", env!("CARGO_PKG_VERSION"), shared::VERSION);

    match cli.command {
        Some(Commands::Monitor { json, simulate }) => run_monitor(&cli.config, json, simulate),

        Some(Commands::Send { mode, opcode, ps, angle, simulate }) => {
            let phase_shifters: [String; 4] = ps
                .try_into()
                .map_err(|ps: Vec<String>| format!("expected 4 phase shifter values, got {}", ps.len()))?;
            let inputs = CommandInputs {
                mode,
                opcode,
                phase_shifters,
                beam_angle: angle,
            };
            run_send(&cli.config, inputs, simulate)
        }

        Some(Commands::Config { output }) => generate_config_file(output),

        None => {
            if cli.cli {
                run_monitor(&cli.config, false, false)
            } else {
                run_gui(cli.config)
            }
        }
    }
}

/// Load the config file, falling back to defaults when it does not exist
fn load_config(config_path: &Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    if config_path.exists() {
        Ok(AppConfig::load_from_file(config_path)?)
    } else {
        warn!("⚠️ Config file {} not found, using defaults", config_path.display());
        Ok(AppConfig::new())
    }
}

fn build_assembler(config: &AppConfig) -> Result<CommandAssembler, Box<dyn std::error::Error>> {
    let geometry_ratio = config.antenna.geometry_ratio()?;
    info!("📐 Element spacing {:.3} wavelengths", geometry_ratio);
    Ok(CommandAssembler::linear_array(geometry_ratio))
}

fn start_link(config: &AppConfig) -> Result<LinkHandle, Box<dyn std::error::Error>> {
    let radio = open_radio(&config.radio)?;
    Ok(LinkHandle::spawn(radio, config.radio.destination_id, config.radio.poll_timeout())?)
}

/// Log telemetry until Ctrl+C
fn run_monitor(config_path: &Path, json: bool, simulate: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;
    config.radio.simulate |= simulate;

    println!("🚀 Starting telemetry monitor");
    let mut link = start_link(&config)?;

    // Set up Ctrl+C handler
    let running = link.get_running_flag();
    ctrlc::set_handler(move || {
        eprintln!("\n🛑 Received Ctrl+C, shutting down gracefully...");
        running.store(false, Ordering::SeqCst);
    })?;

    let mut status = ConsoleStatus::new();
    loop {
        match link.events().recv_timeout(Duration::from_millis(200)) {
            Ok(event) => {
                status.apply_event(&event);
                if let LinkEvent::Telemetry { packet, rssi_dbm, receive_count, received_at } = &event {
                    if json {
                        let line = serde_json::json!({
                            "receive_count": receive_count,
                            "rssi_dbm": rssi_dbm,
                            "received_at": received_at.to_rfc3339(),
                            "telemetry": packet,
                            "mag_magnitude_ut": packet.mag_magnitude_ut(),
                        });
                        println!("{}", line);
                    } else {
                        info!(
                            "📥 #{} lat {} lon {} mag {} ({}) | {}",
                            receive_count,
                            packet.latitude_deg,
                            packet.longitude_deg,
                            status.magnetometer_text(),
                            status.mag_magnitude_text(),
                            status.rssi_text()
                        );
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if link.is_finished() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Some(stats) = link.stop() {
        println!("✅ Monitor stopped: {} packets received, {} malformed", stats.received, stats.decode_failures);
    }
    Ok(())
}

/// Assemble one command, hand it to the worker and wait until it is on the air
fn run_send(config_path: &Path, inputs: CommandInputs, simulate: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;
    config.radio.simulate |= simulate;
    let assembler = build_assembler(&config)?;

    let mut status = ConsoleStatus::new();
    let mut link = start_link(&config)?;

    let Some(packet) = status.submit(&assembler, &inputs, link.pending()) else {
        link.stop();
        if status.error_message.is_empty() {
            println!("Nothing sent: unsupported mode {:?}", inputs.mode);
            return Ok(());
        }
        return Err(status.error_message.into());
    };

    if let (Some(ps1), Some(ps3)) = (status.calculated.ps1_deg, status.calculated.ps3_deg) {
        println!("📐 Calculated phase: PS1 {:.2} deg, PS3 {:.2} deg", ps1, ps3);
    }
    println!("📤 Sending {} ({:02X?})", packet.opcode.label(), packet.ps);

    let deadline = Instant::now() + SEND_TIMEOUT;
    let result = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match link.events().recv_timeout(remaining) {
            Ok(LinkEvent::CommandSent { frame, .. }) => {
                println!("✅ Sent frame {}", hex::encode(frame));
                break Ok(());
            }
            Ok(LinkEvent::TransmitFailed { reason, .. }) => break Err(format!("transmit failed: {}", reason)),
            Ok(event) => status.apply_event(&event),
            Err(_) => break Err("timed out waiting for the link worker".to_string()),
        }
    };

    link.stop();
    result.map_err(Into::into)
}

/// Run the GUI application
fn run_gui(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("🖥️ Starting Ground Station GUI");

    let config = AppConfig::load_from_file(&config_path).unwrap_or_else(|_| {
        eprintln!("⚠️ Failed to load config, using defaults");
        AppConfig::new()
    });
    let assembler = build_assembler(&config)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.gui.window_width, config.gui.window_height])
            .with_title("Receive System"),
        ..Default::default()
    };

    eframe::run_native(
        "Ground Station",
        options,
        Box::new(|cc| {
            Ok(Box::new(ConsoleGui::new(config, config_path, assembler, cc)))
        })
    )?;

    Ok(())
}

/// Generate a default configuration file
fn generate_config_file(output_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new();
    config.save_to_file(&output_path)?;

    println!("✅ Generated configuration file: {}", output_path.display());
    println!("📝 Edit the file to customize settings, then run:");
    println!("   groundstation --config {}", output_path.display());

    Ok(())
}
