/*!
Radio transceiver implementations.

The console never talks to the RFM69 chip directly. Frames reach it either
through a packet-radio gateway that forwards them as UDP datagrams, or from
a simulated remote node used for bench testing.

Gateway datagram layout:

```text
outbound: [dest][src][id][flags] payload...
inbound:  [dest][src][id][flags][rssi: i8] payload...
```
*/

use std::net::{SocketAddr, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};
use shared::link::LINK_HEADER_SIZE;
use shared::{decode_command, encode_telemetry, LinkHeader, SharedError, TelemetryPacket};

use crate::config::RadioConfig;

/// Largest datagram the gateway forwards (RFM69 FIFO size)
const MAX_DATAGRAM_LEN: usize = 66;

/// Half-duplex packet radio owned by the link worker
pub trait Radio: Send {
    /// Wait up to `timeout` for one inbound frame
    fn poll_receive(&mut self, timeout: Duration) -> shared::Result<Option<Vec<u8>>>;

    /// Send `payload` to node `destination`. There is no acknowledgement.
    fn transmit(&mut self, payload: &[u8], destination: u8) -> shared::Result<()>;

    /// Signal strength of the last received frame in dBm
    fn signal_strength(&self) -> Option<i16>;
}

impl Radio for Box<dyn Radio> {
    fn poll_receive(&mut self, timeout: Duration) -> shared::Result<Option<Vec<u8>>> {
        (**self).poll_receive(timeout)
    }

    fn transmit(&mut self, payload: &[u8], destination: u8) -> shared::Result<()> {
        (**self).transmit(payload, destination)
    }

    fn signal_strength(&self) -> Option<i16> {
        (**self).signal_strength()
    }
}

/// Open the radio selected by the configuration
pub fn open_radio(config: &RadioConfig) -> shared::Result<Box<dyn Radio>> {
    if config.simulate {
        info!("🧪 Using simulated radio ({} ms telemetry interval)", config.simulated_interval_ms);
        Ok(Box::new(SimulatedRadio::new(config.simulated_interval())))
    } else {
        let radio = UdpRadio::bind(&config.bind_addr, config.bind_port, &config.gateway_addr, config.node_id)?;
        Ok(Box::new(radio))
    }
}

/// What a gateway datagram turned out to be
#[derive(Debug, PartialEq, Eq)]
enum GatewayFrame<'a> {
    Frame { header: LinkHeader, rssi_dbm: i16, payload: &'a [u8] },
    NotForUs(LinkHeader),
    Truncated(usize),
}

fn parse_gateway_datagram(datagram: &[u8], node_id: u8) -> GatewayFrame<'_> {
    let Some(header) = LinkHeader::from_bytes(datagram) else {
        return GatewayFrame::Truncated(datagram.len());
    };
    let Some((&rssi, payload)) = datagram[LINK_HEADER_SIZE..].split_first() else {
        return GatewayFrame::Truncated(datagram.len());
    };

    if !header.is_addressed_to(node_id) {
        return GatewayFrame::NotForUs(header);
    }

    GatewayFrame::Frame {
        header,
        rssi_dbm: rssi as i8 as i16,
        payload,
    }
}

/// Radio reached through a UDP packet-radio gateway
pub struct UdpRadio {
    socket: UdpSocket,
    runtime: Runtime,
    gateway: SocketAddr,
    node_id: u8,
    next_identifier: u8,
    last_rssi: Option<i16>,
    buffer: Vec<u8>,
}

impl UdpRadio {
    /// Bind the local socket and resolve the gateway address
    pub fn bind(bind_addr: &str, port: u16, gateway_addr: &str, node_id: u8) -> shared::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let gateway = gateway_addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| SharedError::config(format!("gateway address {} did not resolve", gateway_addr)))?;

        let socket_addr = format!("{}:{}", bind_addr, port);
        info!("🔌 Binding UDP socket to {}", socket_addr);

        let socket = runtime.block_on(UdpSocket::bind(&socket_addr))?;
        info!("✅ UDP socket bound, gateway at {}", gateway);

        let sock_ref = socket2::SockRef::from(&socket);
        sock_ref.set_recv_buffer_size(64 * 1024)?;

        Ok(Self {
            socket,
            runtime,
            gateway,
            node_id,
            next_identifier: 0,
            last_rssi: None,
            buffer: vec![0u8; MAX_DATAGRAM_LEN + LINK_HEADER_SIZE + 1],
        })
    }
}

impl Radio for UdpRadio {
    fn poll_receive(&mut self, timeout: Duration) -> shared::Result<Option<Vec<u8>>> {
        let Self { socket, runtime, buffer, .. } = self;
        // The timer has to be created inside the runtime
        let received = runtime.block_on(async { tokio::time::timeout(timeout, socket.recv_from(buffer)).await });

        let (len, from) = match received {
            Ok(result) => result?,
            // Timeout - nothing on the air
            Err(_) => return Ok(None),
        };

        if from != self.gateway {
            debug!("Ignoring datagram from {} (gateway is {})", from, self.gateway);
            return Ok(None);
        }

        match parse_gateway_datagram(&self.buffer[..len], self.node_id) {
            GatewayFrame::Frame { header, rssi_dbm, payload } => {
                debug!("Frame {} from node {} ({} bytes, {} dBm)", header.identifier, header.source, payload.len(), rssi_dbm);
                self.last_rssi = Some(rssi_dbm);
                Ok(Some(payload.to_vec()))
            }
            GatewayFrame::NotForUs(header) => {
                debug!("Dropping frame addressed to node {}", header.destination);
                Ok(None)
            }
            GatewayFrame::Truncated(len) => {
                warn!("⚠️ Gateway datagram too short: {} bytes", len);
                Ok(None)
            }
        }
    }

    fn transmit(&mut self, payload: &[u8], destination: u8) -> shared::Result<()> {
        let header = LinkHeader::outbound(destination, self.next_identifier);
        self.next_identifier = self.next_identifier.wrapping_add(1);

        let mut datagram = Vec::with_capacity(LINK_HEADER_SIZE + payload.len());
        datagram.extend_from_slice(&header.to_bytes());
        datagram.extend_from_slice(payload);

        let sent = self.runtime.block_on(self.socket.send_to(&datagram, self.gateway))?;
        if sent != datagram.len() {
            return Err(SharedError::link(format!("short send: {} of {} bytes", sent, datagram.len())));
        }
        Ok(())
    }

    fn signal_strength(&self) -> Option<i16> {
        self.last_rssi
    }
}

/// Latitude the simulated remote circles around
const SIM_BASE_LATITUDE_DEG: f32 = 40.4259;
/// Longitude the simulated remote circles around
const SIM_BASE_LONGITUDE_DEG: f32 = -86.9081;

/// Stand-in for the remote node: emits telemetry on a fixed interval and
/// logs every command it is sent
pub struct SimulatedRadio {
    interval: Duration,
    next_due: Instant,
    frame_counter: u32,
    last_rssi: Option<i16>,
}

impl SimulatedRadio {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: Instant::now(),
            frame_counter: 0,
            last_rssi: None,
        }
    }

    /// Synthetic telemetry: a slow circle with a rotating magnetic field
    fn generate_telemetry(frame_number: u32) -> TelemetryPacket {
        let angle = frame_number as f32 * 0.1;
        TelemetryPacket {
            latitude_deg: SIM_BASE_LATITUDE_DEG + 0.001 * angle.cos(),
            longitude_deg: SIM_BASE_LONGITUDE_DEG + 0.001 * angle.sin(),
            mag_x_ut: (25.0 * angle.cos()) as i16,
            mag_y_ut: (25.0 * angle.sin()) as i16,
            mag_z_ut: -43,
        }
    }
}

impl Radio for SimulatedRadio {
    fn poll_receive(&mut self, timeout: Duration) -> shared::Result<Option<Vec<u8>>> {
        let now = Instant::now();
        if now < self.next_due {
            thread::sleep((self.next_due - now).min(timeout));
            if Instant::now() < self.next_due {
                return Ok(None);
            }
        }

        self.next_due = Instant::now() + self.interval;
        let packet = Self::generate_telemetry(self.frame_counter);
        self.last_rssi = Some(-60 - (self.frame_counter % 12) as i16);
        self.frame_counter = self.frame_counter.wrapping_add(1);

        if self.frame_counter % 10 == 0 {
            info!("🧪 Generated {} synthetic telemetry frames", self.frame_counter);
        }

        Ok(Some(encode_telemetry(&packet).to_vec()))
    }

    fn transmit(&mut self, payload: &[u8], destination: u8) -> shared::Result<()> {
        match decode_command(payload) {
            Ok(command) => info!(
                "🧪 Simulated node {} received {} with phase words {:02X?}",
                destination,
                command.opcode.label(),
                command.ps
            ),
            Err(e) => warn!("🧪 Simulated node {} received an undecodable command: {}", destination, e),
        }
        Ok(())
    }

    fn signal_strength(&self) -> Option<i16> {
        self.last_rssi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{decode_telemetry, GROUND_NODE_ID, REMOTE_NODE_ID};

    #[test]
    fn test_parse_gateway_frame() {
        let datagram = [GROUND_NODE_ID, REMOTE_NODE_ID, 9, 0, (-72i8) as u8, 0xDE, 0xAD];
        match parse_gateway_datagram(&datagram, GROUND_NODE_ID) {
            GatewayFrame::Frame { header, rssi_dbm, payload } => {
                assert_eq!(header.source, REMOTE_NODE_ID);
                assert_eq!(header.identifier, 9);
                assert_eq!(rssi_dbm, -72);
                assert_eq!(payload, &[0xDE, 0xAD]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_gateway_filters_other_nodes() {
        let datagram = [7, REMOTE_NODE_ID, 0, 0, 0, 1, 2, 3];
        assert!(matches!(
            parse_gateway_datagram(&datagram, GROUND_NODE_ID),
            GatewayFrame::NotForUs(LinkHeader { destination: 7, .. })
        ));

        let broadcast = [0xFF, REMOTE_NODE_ID, 0, 0, 0, 1];
        assert!(matches!(
            parse_gateway_datagram(&broadcast, GROUND_NODE_ID),
            GatewayFrame::Frame { .. }
        ));
    }

    #[test]
    fn test_parse_gateway_truncated() {
        assert_eq!(parse_gateway_datagram(&[1, 2], GROUND_NODE_ID), GatewayFrame::Truncated(2));
        assert_eq!(parse_gateway_datagram(&[1, 2, 3, 4], GROUND_NODE_ID), GatewayFrame::Truncated(4));
    }

    #[test]
    fn test_udp_radio_exchanges_with_gateway() {
        let gateway = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        gateway.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let gateway_addr = gateway.local_addr().unwrap().to_string();

        let mut radio = UdpRadio::bind("127.0.0.1", 0, &gateway_addr, GROUND_NODE_ID).unwrap();
        let radio_addr = radio.socket.local_addr().unwrap();

        // Outbound: header then payload
        radio.transmit(&[2, 0x60, 0x28, 0x2C, 0x6C], REMOTE_NODE_ID).unwrap();
        let mut buf = [0u8; 64];
        let (len, _) = gateway.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[REMOTE_NODE_ID, GROUND_NODE_ID, 0, 0, 2, 0x60, 0x28, 0x2C, 0x6C]);

        // Inbound: header, RSSI, telemetry
        let telemetry = encode_telemetry(&SimulatedRadio::generate_telemetry(3));
        let mut datagram = vec![GROUND_NODE_ID, REMOTE_NODE_ID, 1, 0, (-55i8) as u8];
        datagram.extend_from_slice(&telemetry);
        gateway.send_to(&datagram, radio_addr).unwrap();

        let frame = radio.poll_receive(Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(frame, telemetry.to_vec());
        assert_eq!(radio.signal_strength(), Some(-55));
    }

    #[test]
    fn test_udp_radio_poll_times_out() {
        let gateway = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let gateway_addr = gateway.local_addr().unwrap().to_string();

        let mut radio = UdpRadio::bind("127.0.0.1", 0, &gateway_addr, GROUND_NODE_ID).unwrap();
        assert_eq!(radio.poll_receive(Duration::from_millis(20)).unwrap(), None);
        assert_eq!(radio.signal_strength(), None);
    }

    #[test]
    fn test_simulated_radio_emits_valid_telemetry() {
        let mut radio = SimulatedRadio::new(Duration::from_millis(5));

        let first = radio.poll_receive(Duration::from_millis(50)).unwrap().unwrap();
        let packet = decode_telemetry(&first).unwrap();
        assert!((packet.latitude_deg - SIM_BASE_LATITUDE_DEG).abs() < 0.01);
        assert!(radio.signal_strength().is_some());

        // Next frame is not due immediately
        assert_eq!(radio.poll_receive(Duration::ZERO).unwrap(), None);
        assert!(radio.poll_receive(Duration::from_millis(50)).unwrap().is_some());
    }

    #[test]
    fn test_simulated_radio_accepts_commands() {
        let mut radio = SimulatedRadio::new(Duration::from_secs(1));
        assert!(radio.transmit(&[1, 0x20, 0x20, 0x20, 0x20], REMOTE_NODE_ID).is_ok());
        assert!(radio.transmit(&[9], REMOTE_NODE_ID).is_ok());
    }
}
