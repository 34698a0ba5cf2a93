/*!
Telemetry packet sent by the remote steering unit.

The remote firmware transmits its C struct as-is:

```text
struct Data_Packet {
    float   latitude_degrees;   // offset 0
    float   longitude_degrees;  // offset 4
    int16_t mag_x_u_T;          // offset 8
    int16_t mag_y_u_T;          // offset 10
    int16_t mag_z_u_T;          // offset 12
};                              // 2 bytes tail padding -> 16 bytes
```

All fields are little-endian. There is no checksum or length prefix.
*/

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::protocol::{TELEMETRY_FIELDS_SIZE, TELEMETRY_FRAME_SIZE};

/// Decoded telemetry from the remote node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPacket {
    pub latitude_deg: f32,
    pub longitude_deg: f32,
    pub mag_x_ut: i16,
    pub mag_y_ut: i16,
    pub mag_z_ut: i16,
}

impl TelemetryPacket {
    /// Magnitude of the magnetometer vector in microtesla
    pub fn mag_magnitude_ut(&self) -> f64 {
        let (x, y, z) = (self.mag_x_ut as f64, self.mag_y_ut as f64, self.mag_z_ut as f64);
        (x * x + y * y + z * z).sqrt()
    }
}

/// Decode a 16 byte telemetry frame
pub fn decode_telemetry(frame: &[u8]) -> Result<TelemetryPacket, DecodeError> {
    if frame.len() != TELEMETRY_FRAME_SIZE {
        return Err(DecodeError::MalformedFrame {
            expected: TELEMETRY_FRAME_SIZE,
            actual: frame.len(),
        });
    }

    let mut buf = frame;
    Ok(TelemetryPacket {
        latitude_deg: buf.get_f32_le(),
        longitude_deg: buf.get_f32_le(),
        mag_x_ut: buf.get_i16_le(),
        mag_y_ut: buf.get_i16_le(),
        mag_z_ut: buf.get_i16_le(),
    })
}

/// Encode a telemetry packet the way the remote firmware lays it out
pub fn encode_telemetry(packet: &TelemetryPacket) -> [u8; TELEMETRY_FRAME_SIZE] {
    let mut frame = [0u8; TELEMETRY_FRAME_SIZE];
    {
        let mut buf = &mut frame[..TELEMETRY_FIELDS_SIZE];
        buf.put_f32_le(packet.latitude_deg);
        buf.put_f32_le(packet.longitude_deg);
        buf.put_i16_le(packet.mag_x_ut);
        buf.put_i16_le(packet.mag_y_ut);
        buf.put_i16_le(packet.mag_z_ut);
    }
    frame
}
