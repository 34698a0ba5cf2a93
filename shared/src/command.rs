/*!
Command packet sent from the ground station to the remote steering unit.

```text
struct Cmd_Packet {
    uint8_t opcode;
    uint8_t ps_1;
    uint8_t ps_2;
    uint8_t ps_3;
    uint8_t ps_4;
};
```
*/

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::protocol::{COMMAND_FRAME_SIZE, PHASE_SHIFTER_COUNT};

/// Command understood by the remote node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    NoOp = 0,
    Blink = 1,
    SetPhaseShifters = 2,
}

impl Opcode {
    /// Parse an opcode from its wire value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::NoOp),
            1 => Some(Self::Blink),
            2 => Some(Self::SetPhaseShifters),
            _ => None,
        }
    }

    /// Human readable name, as shown on the operator console
    pub fn label(self) -> &'static str {
        match self {
            Self::NoOp => "No Op",
            Self::Blink => "Blink",
            Self::SetPhaseShifters => "Set Phase Shifters",
        }
    }
}

/// A fully assembled command, phase-shifter words already encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPacket {
    pub opcode: Opcode,
    /// Control words for shifters 1 to 4
    pub ps: [u8; PHASE_SHIFTER_COUNT],
}

/// Encode a command into its 5 byte wire form
pub fn encode_command(packet: &CommandPacket) -> [u8; COMMAND_FRAME_SIZE] {
    let [ps1, ps2, ps3, ps4] = packet.ps;
    [packet.opcode as u8, ps1, ps2, ps3, ps4]
}

/// Decode a 5 byte command frame
pub fn decode_command(frame: &[u8]) -> Result<CommandPacket, DecodeError> {
    let frame: [u8; COMMAND_FRAME_SIZE] = frame.try_into().map_err(|_| DecodeError::MalformedFrame {
        expected: COMMAND_FRAME_SIZE,
        actual: frame.len(),
    })?;

    let opcode = Opcode::from_u8(frame[0]).ok_or(DecodeError::UnknownOpcode(frame[0]))?;
    Ok(CommandPacket {
        opcode,
        ps: [frame[1], frame[2], frame[3], frame[4]],
    })
}
