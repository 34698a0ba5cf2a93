/*!
GUI implementation for the ground station console.
*/

use crate::config::AppConfig;
use crate::link_worker::LinkHandle;
use crate::radio::open_radio;
use crate::status::ConsoleStatus;
use eframe::egui;
use shared::{CommandAssembler, CommandInputs, Opcode};
use std::path::PathBuf;
use tracing::{error, info};

/// Main GUI application state
pub struct ConsoleGui {
    config: AppConfig,
    config_path: PathBuf,
    assembler: CommandAssembler,
    link: Option<LinkHandle>,

    // Operator input, kept as typed
    inputs: CommandInputs,

    status: ConsoleStatus,
    status_message: String,
}

impl ConsoleGui {
    /// Create a new GUI instance and start the link worker
    pub fn new(config: AppConfig, config_path: PathBuf, assembler: CommandAssembler, cc: &eframe::CreationContext<'_>) -> Self {
        if !config.gui.dark_mode {
            cc.egui_ctx.set_visuals(egui::Visuals::light());
        }

        let mut gui = Self {
            config,
            config_path,
            assembler,
            link: None,
            inputs: CommandInputs::default(),
            status: ConsoleStatus::new(),
            status_message: "Ready".to_string(),
        };
        gui.start_link();
        gui
    }

    /// Open the radio and start the worker
    fn start_link(&mut self) {
        if self.link.is_some() {
            return;
        }

        let radio = match open_radio(&self.config.radio) {
            Ok(radio) => radio,
            Err(e) => {
                error!("Failed to open radio: {}", e);
                self.status_message = format!("Radio unavailable: {}", e);
                return;
            }
        };

        match LinkHandle::spawn(radio, self.config.radio.destination_id, self.config.radio.poll_timeout()) {
            Ok(link) => {
                info!("Link worker started");
                self.link = Some(link);
                self.status_message = "Link running".to_string();
            }
            Err(e) => {
                error!("Failed to start link worker: {}", e);
                self.status_message = format!("Link failed to start: {}", e);
            }
        }
    }

    /// Stop the worker
    fn stop_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.stop();
            self.status_message = "Link stopped".to_string();
        }
    }

    /// Pull everything the worker has published since the last frame
    fn drain_events(&mut self) {
        let Some(link) = &self.link else {
            return;
        };

        while let Ok(event) = link.events().try_recv() {
            self.status.apply_event(&event);
        }

        if link.is_finished() {
            self.link = None;
            self.status_message = "Link worker exited".to_string();
        }
    }

    /// Assemble the command from the current inputs and queue it
    fn send_command(&mut self) {
        let Some(link) = &self.link else {
            self.status_message = "Link not running".to_string();
            return;
        };

        if let Some(packet) = self.status.submit(&self.assembler, &self.inputs, link.pending()) {
            self.status_message = format!("Queued {}", packet.opcode.label());
        }
    }

    fn status_panel(&self, ui: &mut egui::Ui) {
        ui.heading("Status");

        let rows = [
            ("Radio Received Signal Strength", self.status.rssi_text()),
            ("Number of Received Packets", self.status.receive_count_text()),
            ("Latitude (Decimal Degrees)", self.status.latitude_text()),
            ("Longitude (Decimal Degrees)", self.status.longitude_text()),
            ("Magnetometer", self.status.magnetometer_text()),
            ("Magnetic Field Magnitude", self.status.mag_magnitude_text()),
            ("Calculated Phase Shifter 1 Val", self.status.ps1_calculated_text()),
            ("Calculated Phase Shifter 3 Val", self.status.ps3_calculated_text()),
        ];
        for (label, value) in rows {
            ui.label(label);
            ui.strong(value);
        }

        if let Some(at) = self.status.last_received_at {
            ui.small(format!("Last packet {}", at.format("%H:%M:%S")));
        }
        if let Some(link_error) = &self.status.last_link_error {
            ui.colored_label(egui::Color32::YELLOW, link_error);
        }
    }

    fn control_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Control");

        ui.label("Mode Select");
        ui.radio_value(&mut self.inputs.mode, "0".to_string(), "Set Individually");
        ui.radio_value(&mut self.inputs.mode, "1".to_string(), "Main Beam Angle in YZ Plane from -Z");

        ui.add_space(6.0);
        ui.label("Command to Send (Value from 0 to 2)");
        for opcode in [Opcode::NoOp, Opcode::Blink, Opcode::SetPhaseShifters] {
            ui.radio_value(&mut self.inputs.opcode, (opcode as u8).to_string(), opcode.label());
        }

        ui.colored_label(egui::Color32::RED, &self.status.error_message);

        if ui.button("Send Command").clicked() {
            self.send_command();
        }

        if self.link.as_ref().is_some_and(|link| link.pending().is_pending()) {
            ui.label("⏳ Command pending");
        }
    }

    fn values_panel(&mut self, ui: &mut egui::Ui) {
        for (i, value) in self.inputs.phase_shifters.iter_mut().enumerate() {
            ui.label(format!("Phase Shifter {} Value (Degrees)", i + 1));
            ui.text_edit_singleline(value);
        }

        ui.label("Main Beam Angle in YZ Plane from -Z");
        ui.text_edit_singleline(&mut self.inputs.beam_angle);

        if let Some(quantized) = self.status.quantized_deg {
            ui.small(format!(
                "Last sent: {:.1} / {:.1} / {:.1} / {:.1} deg",
                quantized[0], quantized[1], quantized[2], quantized[3]
            ));
        }
    }
}

impl eframe::App for ConsoleGui {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal_top(|ui| {
                ui.group(|ui| {
                    ui.vertical(|ui| self.status_panel(ui));
                });
                ui.group(|ui| {
                    ui.vertical(|ui| self.control_panel(ui));
                });
                ui.group(|ui| {
                    ui.vertical(|ui| self.values_panel(ui));
                });
            });

            ui.separator();

            ui.horizontal(|ui| {
                if self.link.is_some() {
                    ui.colored_label(egui::Color32::GREEN, "🟢 Link running");
                    if ui.button("🛑 Stop Link").clicked() {
                        self.stop_link();
                    }
                } else {
                    ui.colored_label(egui::Color32::RED, "🔴 Link stopped");
                    if ui.button("▶️ Start Link").clicked() {
                        self.start_link();
                    }
                }

                if ui.button("💾 Save Config").clicked() {
                    match self.config.save_to_file(&self.config_path) {
                        Ok(_) => {
                            self.status_message = "Configuration saved".to_string();
                        }
                        Err(e) => {
                            self.status_message = format!("Failed to save config: {}", e);
                        }
                    }
                }

                ui.label(&self.status_message);
            });
        });

        // Request repaint for real-time updates
        if self.link.is_some() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.stop_link();

        // Auto-save configuration if enabled
        if self.config.gui.auto_save_config {
            let _ = self.config.save_to_file(&self.config_path);
        }
    }
}
