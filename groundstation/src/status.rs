/*!
Operator-facing view of the link.

The console folds link events and assembly outcomes into a [`ConsoleStatus`]
on its own thread; the link worker never touches it.
*/

use std::fmt::Display;
use chrono::{DateTime, Local};
use tracing::warn;
use shared::{Assembly, AssemblyError, CalculatedPhases, CommandAssembler, CommandInputs, CommandPacket, TelemetryPacket};

use crate::link_worker::{LinkEvent, PendingSend};

/// Placeholder shown before any telemetry arrives
pub const NO_DATA: &str = "No data";

/// Placeholder shown for values that do not apply in the current mode
pub const NOT_APPLICABLE: &str = "N/A";

/// Everything the console displays
#[derive(Debug, Clone, Default)]
pub struct ConsoleStatus {
    pub rssi_dbm: Option<i16>,
    pub receive_count: u64,
    pub latest: Option<TelemetryPacket>,
    pub last_received_at: Option<DateTime<Local>>,
    pub decode_failures: u64,
    pub commands_sent: u64,
    pub last_command: Option<CommandPacket>,
    pub last_link_error: Option<String>,
    pub calculated: CalculatedPhases,
    pub quantized_deg: Option<[f64; 4]>,
    /// The single validation message slot; empty when the last attempt succeeded
    pub error_message: String,
}

impl ConsoleStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one link event into the view
    pub fn apply_event(&mut self, event: &LinkEvent) {
        match event {
            LinkEvent::Telemetry { packet, rssi_dbm, receive_count, received_at } => {
                self.latest = Some(*packet);
                self.rssi_dbm = *rssi_dbm;
                self.receive_count = *receive_count;
                self.last_received_at = Some(*received_at);
            }
            LinkEvent::DecodeFailed { error, .. } => {
                self.decode_failures += 1;
                self.last_link_error = Some(error.to_string());
            }
            LinkEvent::CommandSent { packet, .. } => {
                self.commands_sent += 1;
                self.last_command = Some(*packet);
                self.last_link_error = None;
            }
            LinkEvent::TransmitFailed { reason, .. } => {
                self.last_link_error = Some(reason.clone());
            }
        }
    }

    /// Record an assembly attempt and return the packet to send, if any.
    ///
    /// Success clears the error slot, a user-visible failure overwrites it and
    /// an unsupported mode leaves it alone.
    pub fn record_assembly(&mut self, result: Result<Assembly, AssemblyError>) -> Option<CommandPacket> {
        match result {
            Ok(assembly) => {
                self.error_message.clear();
                self.calculated = assembly.calculated;
                self.quantized_deg = Some(assembly.quantized_deg);
                Some(assembly.packet)
            }
            Err(e) if e.is_user_visible() => {
                self.error_message = e.to_string();
                None
            }
            Err(_) => None,
        }
    }

    /// Assemble `inputs` and queue the command for the link worker.
    ///
    /// The calculated phases are refreshed even when the command is rejected.
    pub fn submit(&mut self, assembler: &CommandAssembler, inputs: &CommandInputs, pending: &PendingSend) -> Option<CommandPacket> {
        if let Some(calculated) = assembler.calculated_phases(inputs) {
            self.calculated = calculated;
        }
        let packet = self.record_assembly(assembler.assemble(inputs))?;
        if pending.raise(packet) {
            warn!("Replaced a command that had not been sent yet");
        }
        Some(packet)
    }

    pub fn rssi_text(&self) -> String {
        display_or(self.rssi_dbm.map(|rssi| format!("{} dBm", rssi)), NO_DATA)
    }

    pub fn receive_count_text(&self) -> String {
        if self.latest.is_some() {
            self.receive_count.to_string()
        } else {
            NO_DATA.to_string()
        }
    }

    pub fn latitude_text(&self) -> String {
        display_or(self.latest.map(|p| p.latitude_deg), NO_DATA)
    }

    pub fn longitude_text(&self) -> String {
        display_or(self.latest.map(|p| p.longitude_deg), NO_DATA)
    }

    pub fn magnetometer_text(&self) -> String {
        display_or(
            self.latest.map(|p| format!("x {} / y {} / z {} uT", p.mag_x_ut, p.mag_y_ut, p.mag_z_ut)),
            NO_DATA,
        )
    }

    pub fn mag_magnitude_text(&self) -> String {
        display_or(self.latest.map(|p| format!("{:.1} uT", p.mag_magnitude_ut())), NO_DATA)
    }

    pub fn ps1_calculated_text(&self) -> String {
        display_or(self.calculated.ps1_deg.map(|d| format!("{:.2}", d)), NOT_APPLICABLE)
    }

    pub fn ps3_calculated_text(&self) -> String {
        display_or(self.calculated.ps3_deg.map(|d| format!("{:.2}", d)), NOT_APPLICABLE)
    }
}

fn display_or<T: Display>(value: Option<T>, placeholder: &str) -> String {
    value.map_or_else(|| placeholder.to_string(), |v| v.to_string())
}
