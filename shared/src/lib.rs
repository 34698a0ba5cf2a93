/*!
# Shared Types and Utilities

This crate contains the radio protocol and command logic shared by the
beam-steering ground station components.

## Core Types

- [`TelemetryPacket`] - Telemetry decoded from the remote node
- [`CommandPacket`] - Command sent to the remote node
- [`CommandAssembler`] - Turns operator input into command packets
- [`LinkHeader`] - Packet-radio addressing header

## Modules

- [`phase_shifter`] - Degree quantization and shift register pin mapping
- [`telemetry`] / [`command`] - Fixed-layout packet codecs
- [`beam`] - Beam-angle to phase-shift calculation
- [`assembler`] - Operator input validation and command assembly
- [`link`] - Node ids and the RadioHead header
- [`error`] - Common error types
*/

pub mod phase_shifter;
pub mod telemetry;
pub mod command;
pub mod beam;
pub mod assembler;
pub mod link;
pub mod error;

// Re-export commonly used types
pub use telemetry::{TelemetryPacket, decode_telemetry, encode_telemetry};
pub use command::{CommandPacket, Opcode, decode_command, encode_command};
pub use beam::{BeamCalculator, LinearArrayCalculator};
pub use assembler::{Assembly, CalculatedPhases, CommandAssembler, CommandInputs, Mode};
pub use link::{LinkHeader, GROUND_NODE_ID, REMOTE_NODE_ID};
pub use error::{AssemblyError, DecodeError, SharedError, Result};

/// Version information for the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol constants
pub mod protocol {
    /// Size of a telemetry frame in bytes, including tail padding
    pub const TELEMETRY_FRAME_SIZE: usize = 16;

    /// Bytes of a telemetry frame that carry fields
    pub const TELEMETRY_FIELDS_SIZE: usize = 14;

    /// Size of a command frame in bytes
    pub const COMMAND_FRAME_SIZE: usize = 5;

    /// Number of phase shifters on the remote unit
    pub const PHASE_SHIFTER_COUNT: usize = 4;
}
