/*!
Command assembly from raw operator input.

The operator console hands over exactly what was typed or selected. Assembly
validates it fail-fast (mode, beam angle, opcode, then the phase-shifter batch),
runs each phase through the encoder and returns a packet ready for the link.
No partial command is ever produced.
*/

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::beam::{BeamCalculator, LinearArrayCalculator};
use crate::command::{CommandPacket, Opcode};
use crate::error::AssemblyError;
use crate::phase_shifter::{code_to_degrees, is_valid_degrees, map_to_pins, quantize};
use crate::protocol::PHASE_SHIFTER_COUNT;

/// How the phase-shifter values are supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Four phase-shifter values entered individually
    Direct,
    /// One main-beam angle in the YZ plane, measured from -Z
    BeamAngle,
}

impl Mode {
    /// Parse the console's mode selector ("0" or "1")
    pub fn from_selector(selector: &str) -> Option<Self> {
        match selector.trim() {
            "0" => Some(Self::Direct),
            "1" => Some(Self::BeamAngle),
            _ => None,
        }
    }

    pub fn selector(self) -> &'static str {
        match self {
            Self::Direct => "0",
            Self::BeamAngle => "1",
        }
    }
}

/// Raw operator input, exactly as entered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInputs {
    pub mode: String,
    pub opcode: String,
    pub phase_shifters: [String; PHASE_SHIFTER_COUNT],
    pub beam_angle: String,
}

impl Default for CommandInputs {
    fn default() -> Self {
        Self {
            mode: Mode::Direct.selector().to_string(),
            opcode: "0".to_string(),
            phase_shifters: std::array::from_fn(|_| "0".to_string()),
            beam_angle: "0".to_string(),
        }
    }
}

/// Phase values computed in beam-angle mode, for display.
///
/// `None` is shown as "N/A" (direct mode).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculatedPhases {
    pub ps1_deg: Option<f64>,
    pub ps3_deg: Option<f64>,
}

/// Result of a successful assembly
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub packet: CommandPacket,
    pub calculated: CalculatedPhases,
    /// Phase each shifter will actually produce after quantization
    pub quantized_deg: [f64; PHASE_SHIFTER_COUNT],
}

/// Validates operator input and builds command packets
#[derive(Clone)]
pub struct CommandAssembler {
    calculator: Arc<dyn BeamCalculator>,
    geometry_ratio: f64,
}

impl CommandAssembler {
    /// Create an assembler using `calculator` for beam-angle mode.
    ///
    /// `geometry_ratio` (element spacing over wavelength) is fixed for the
    /// lifetime of the assembler.
    pub fn new(calculator: Arc<dyn BeamCalculator>, geometry_ratio: f64) -> Self {
        Self {
            calculator,
            geometry_ratio,
        }
    }

    /// Assembler for a uniform linear array
    pub fn linear_array(geometry_ratio: f64) -> Self {
        Self::new(Arc::new(LinearArrayCalculator), geometry_ratio)
    }

    /// Validate `inputs` and build the command packet
    pub fn assemble(&self, inputs: &CommandInputs) -> Result<Assembly, AssemblyError> {
        let mode = Mode::from_selector(&inputs.mode)
            .ok_or_else(|| AssemblyError::UnsupportedMode(inputs.mode.clone()))?;

        let (degrees, calculated) = self.resolve_phases(mode, &inputs.beam_angle)?;

        let opcode = parse_opcode(&inputs.opcode)?;

        let degrees = match degrees {
            Some(degrees) => validate_batch(degrees)?,
            None => parse_phase_shifters(&inputs.phase_shifters)?,
        };

        let codes = degrees.map(quantize);
        let packet = CommandPacket {
            opcode,
            ps: codes.map(map_to_pins),
        };
        debug!("Assembled {:?} from {:?} degrees", packet, degrees);

        Ok(Assembly {
            packet,
            calculated,
            quantized_deg: codes.map(code_to_degrees),
        })
    }

    /// Display values for `inputs` as soon as the mode and beam angle are
    /// known, whether or not the rest of the command is valid.
    ///
    /// `None` when the mode is unsupported or the beam angle does not parse.
    pub fn calculated_phases(&self, inputs: &CommandInputs) -> Option<CalculatedPhases> {
        let mode = Mode::from_selector(&inputs.mode)?;
        self.resolve_phases(mode, &inputs.beam_angle)
            .ok()
            .map(|(_, calculated)| calculated)
    }

    /// Beam mode fixes all four phases; direct mode leaves them to the operator
    fn resolve_phases(
        &self,
        mode: Mode,
        beam_angle: &str,
    ) -> Result<(Option<[f64; PHASE_SHIFTER_COUNT]>, CalculatedPhases), AssemblyError> {
        match mode {
            Mode::Direct => Ok((None, CalculatedPhases::default())),
            Mode::BeamAngle => {
                let phase = self.beam_phase(beam_angle)?;
                let calculated = CalculatedPhases {
                    ps1_deg: Some(phase),
                    ps3_deg: Some(phase),
                };
                Ok((Some([phase, 0.0, phase, 0.0]), calculated))
            }
        }
    }

    /// Wrapped phase for a beam angle typed by the operator
    fn beam_phase(&self, angle: &str) -> Result<f64, AssemblyError> {
        let angle_deg: i32 = angle.trim().parse().map_err(|_| AssemblyError::InvalidBeamAngle)?;
        let phase = self.calculator.phase_shift_for_angle(self.geometry_ratio, angle_deg);
        Ok(self.calculator.wrap_phase(phase))
    }
}

/// Opcodes are entered as plain digits, no sign or padding
fn parse_opcode(opcode: &str) -> Result<Opcode, AssemblyError> {
    if opcode.is_empty() || !opcode.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AssemblyError::InvalidOpcode);
    }

    opcode
        .parse::<u8>()
        .ok()
        .and_then(Opcode::from_u8)
        .ok_or(AssemblyError::InvalidOpcode)
}

fn parse_phase_shifters(inputs: &[String; PHASE_SHIFTER_COUNT]) -> Result<[f64; PHASE_SHIFTER_COUNT], AssemblyError> {
    let mut degrees = [0.0; PHASE_SHIFTER_COUNT];
    for (slot, input) in degrees.iter_mut().zip(inputs) {
        *slot = input
            .trim()
            .parse::<f64>()
            .map_err(|_| AssemblyError::InvalidPhaseShifterRange)?;
    }
    validate_batch(degrees)
}

/// The whole batch is rejected if any one value is out of range
fn validate_batch(degrees: [f64; PHASE_SHIFTER_COUNT]) -> Result<[f64; PHASE_SHIFTER_COUNT], AssemblyError> {
    if degrees.iter().all(|&d| is_valid_degrees(d)) {
        Ok(degrees)
    } else {
        Err(AssemblyError::InvalidPhaseShifterRange)
    }
}
