/*!
Background link worker.

One thread owns the half-duplex radio. Each iteration it polls once for an
inbound frame, decodes and publishes it, then drains the pending-send slot
and transmits the queued command. Nothing that happens on the link stops the
loop; only the running flag does.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use tracing::{debug, error, info, warn};
use shared::protocol::COMMAND_FRAME_SIZE;
use shared::{decode_telemetry, encode_command, CommandPacket, DecodeError, TelemetryPacket};

use crate::radio::Radio;

/// Something the worker wants the operator to see
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Telemetry {
        packet: TelemetryPacket,
        rssi_dbm: Option<i16>,
        receive_count: u64,
        received_at: DateTime<Local>,
    },
    DecodeFailed {
        len: usize,
        error: DecodeError,
    },
    CommandSent {
        packet: CommandPacket,
        frame: [u8; COMMAND_FRAME_SIZE],
    },
    TransmitFailed {
        packet: CommandPacket,
        reason: String,
    },
}

/// Single-slot queue for the next command to transmit.
///
/// Raising a request while one is still queued replaces it.
#[derive(Debug, Clone)]
pub struct PendingSend {
    tx: Sender<CommandPacket>,
    rx: Receiver<CommandPacket>,
}

impl PendingSend {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Queue `packet` for transmission. Returns true if it replaced a
    /// request that had not been sent yet.
    pub fn raise(&self, packet: CommandPacket) -> bool {
        let mut packet = packet;
        let mut replaced = false;
        loop {
            match self.tx.try_send(packet) {
                Ok(()) => return replaced,
                Err(TrySendError::Full(rejected)) => {
                    replaced |= self.rx.try_recv().is_ok();
                    packet = rejected;
                }
                // Both ends live in this struct
                Err(TrySendError::Disconnected(_)) => return replaced,
            }
        }
    }

    /// Take the queued request, clearing the slot
    pub fn take(&self) -> Option<CommandPacket> {
        self.rx.try_recv().ok()
    }

    pub fn is_pending(&self) -> bool {
        !self.rx.is_empty()
    }
}

impl Default for PendingSend {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened on the receive side of one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    NoData,
    Telemetry,
    Malformed,
    ReceiveError,
}

/// What happened on the transmit side of one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Idle,
    Sent,
    Failed,
}

/// Outcome of a single worker iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub inbound: Inbound,
    pub dispatch: Dispatch,
}

/// Counters kept by the worker over its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub received: u64,
    pub decode_failures: u64,
    pub receive_errors: u64,
    pub sent: u64,
    pub transmit_failures: u64,
}

/// Owns the radio and multiplexes telemetry reception with command dispatch
pub struct LinkWorker<R: Radio> {
    radio: R,
    pending: PendingSend,
    events: Sender<LinkEvent>,
    destination: u8,
    poll_timeout: Duration,
    running: Arc<AtomicBool>,
    stats: WorkerStats,
}

impl<R: Radio> LinkWorker<R> {
    pub fn new(
        radio: R,
        pending: PendingSend,
        events: Sender<LinkEvent>,
        destination: u8,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            radio,
            pending,
            events,
            destination,
            poll_timeout,
            running: Arc::new(AtomicBool::new(true)),
            stats: WorkerStats::default(),
        }
    }

    /// Get a reference to the running flag for external control
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Run until the running flag is cleared
    pub fn run(&mut self) -> WorkerStats {
        info!("📡 Link worker started (destination node {}, poll timeout {:?})", self.destination, self.poll_timeout);

        while self.running.load(Ordering::SeqCst) {
            self.step();
        }

        let stats = self.stats();
        info!("📈 Link worker final stats:");
        info!("   Telemetry received: {}", stats.received);
        info!("   Decode failures: {}", stats.decode_failures);
        info!("   Receive errors: {}", stats.receive_errors);
        info!("   Commands sent: {}", stats.sent);
        info!("   Transmit failures: {}", stats.transmit_failures);

        stats
    }

    /// One poll, then one check of the pending-send slot
    pub fn step(&mut self) -> StepOutcome {
        let inbound = match self.radio.poll_receive(self.poll_timeout) {
            Ok(Some(frame)) => self.handle_frame(&frame),
            Ok(None) => Inbound::NoData,
            Err(e) => {
                error!("Radio receive error: {}", e);
                self.stats.receive_errors += 1;
                Inbound::ReceiveError
            }
        };

        // Taking the request clears the slot before the radio is busy, so a
        // request raised during transmission waits for the next iteration
        let dispatch = match self.pending.take() {
            Some(packet) => self.transmit(packet),
            None => Dispatch::Idle,
        };

        StepOutcome { inbound, dispatch }
    }

    fn handle_frame(&mut self, frame: &[u8]) -> Inbound {
        match decode_telemetry(frame) {
            Ok(packet) => {
                self.stats.received += 1;
                let rssi_dbm = self.radio.signal_strength();
                debug!("Telemetry #{}: {:?} ({:?} dBm)", self.stats.received, packet, rssi_dbm);
                self.publish(LinkEvent::Telemetry {
                    packet,
                    rssi_dbm,
                    receive_count: self.stats.received,
                    received_at: Local::now(),
                });
                Inbound::Telemetry
            }
            Err(error) => {
                warn!("⚠️ Unable to decode telemetry frame ({} bytes): {}", frame.len(), error);
                self.stats.decode_failures += 1;
                self.publish(LinkEvent::DecodeFailed { len: frame.len(), error });
                Inbound::Malformed
            }
        }
    }

    fn transmit(&mut self, packet: CommandPacket) -> Dispatch {
        let frame = encode_command(&packet);
        match self.radio.transmit(&frame, self.destination) {
            Ok(()) => {
                self.stats.sent += 1;
                info!("📤 Sent {} to node {}: {}", packet.opcode.label(), self.destination, hex::encode(frame));
                self.publish(LinkEvent::CommandSent { packet, frame });
                Dispatch::Sent
            }
            Err(e) => {
                error!("❌ Failed to transmit {}: {}", packet.opcode.label(), e);
                self.stats.transmit_failures += 1;
                self.publish(LinkEvent::TransmitFailed { packet, reason: e.to_string() });
                Dispatch::Failed
            }
        }
    }

    fn publish(&self, event: LinkEvent) {
        // Nobody listening is not an error for the link
        let _ = self.events.send(event);
    }
}

/// A link worker running on its own thread
pub struct LinkHandle {
    pending: PendingSend,
    events: Receiver<LinkEvent>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<WorkerStats>>,
}

impl LinkHandle {
    /// Move `radio` onto a new worker thread and start it
    pub fn spawn<R: Radio + 'static>(radio: R, destination: u8, poll_timeout: Duration) -> shared::Result<Self> {
        let pending = PendingSend::new();
        let (events_tx, events_rx) = unbounded();

        let mut worker = LinkWorker::new(radio, pending.clone(), events_tx, destination, poll_timeout);
        let running = worker.get_running_flag();

        let thread = thread::Builder::new()
            .name("link_worker".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            pending,
            events: events_rx,
            running,
            thread: Some(thread),
        })
    }

    pub fn pending(&self) -> &PendingSend {
        &self.pending
    }

    pub fn events(&self) -> &Receiver<LinkEvent> {
        &self.events
    }

    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |handle| handle.is_finished())
    }

    /// Stop the worker and wait for it to exit
    pub fn stop(&mut self) -> Option<WorkerStats> {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.thread.take()?;
        match handle.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                error!("Link worker thread panicked");
                None
            }
        }
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use shared::{encode_telemetry, Opcode, SharedError, REMOTE_NODE_ID};

    /// Radio that replays scripted frames and records every transmit
    #[derive(Clone, Default)]
    struct MockRadio {
        inbound: Arc<Mutex<VecDeque<shared::Result<Option<Vec<u8>>>>>>,
        sent: Arc<Mutex<Vec<(Vec<u8>, u8)>>>,
        fail_transmit: bool,
    }

    impl MockRadio {
        fn queue_frame(&self, frame: Vec<u8>) {
            self.inbound.lock().unwrap().push_back(Ok(Some(frame)));
        }

        fn queue_error(&self) {
            self.inbound.lock().unwrap().push_back(Err(SharedError::link("spi timeout")));
        }

        fn sent(&self) -> Vec<(Vec<u8>, u8)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Radio for MockRadio {
        fn poll_receive(&mut self, _timeout: Duration) -> shared::Result<Option<Vec<u8>>> {
            self.inbound.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        fn transmit(&mut self, payload: &[u8], destination: u8) -> shared::Result<()> {
            if self.fail_transmit {
                return Err(SharedError::link("radio busy"));
            }
            self.sent.lock().unwrap().push((payload.to_vec(), destination));
            Ok(())
        }

        fn signal_strength(&self) -> Option<i16> {
            Some(-67)
        }
    }

    fn telemetry() -> TelemetryPacket {
        TelemetryPacket {
            latitude_deg: 40.0,
            longitude_deg: -86.5,
            mag_x_ut: 1,
            mag_y_ut: 2,
            mag_z_ut: 3,
        }
    }

    fn command(opcode: Opcode, ps: [u8; 4]) -> CommandPacket {
        CommandPacket { opcode, ps }
    }

    fn worker(radio: MockRadio) -> (LinkWorker<MockRadio>, PendingSend, Receiver<LinkEvent>) {
        let pending = PendingSend::new();
        let (tx, rx) = unbounded();
        let worker = LinkWorker::new(radio, pending.clone(), tx, REMOTE_NODE_ID, Duration::from_millis(1));
        (worker, pending, rx)
    }

    #[test]
    fn test_pending_send_last_write_wins() {
        let pending = PendingSend::new();
        let first = command(Opcode::Blink, [0x20; 4]);
        let second = command(Opcode::SetPhaseShifters, [0x7F; 4]);

        assert!(!pending.raise(first));
        assert!(pending.is_pending());
        assert!(pending.raise(second));
        assert_eq!(pending.take(), Some(second));
        assert_eq!(pending.take(), None);
        assert!(!pending.is_pending());
    }

    #[test]
    fn test_telemetry_is_published() {
        let radio = MockRadio::default();
        radio.queue_frame(encode_telemetry(&telemetry()).to_vec());
        let (mut worker, _pending, events) = worker(radio);

        let outcome = worker.step();
        assert_eq!(outcome, StepOutcome { inbound: Inbound::Telemetry, dispatch: Dispatch::Idle });

        match events.try_recv().unwrap() {
            LinkEvent::Telemetry { packet, rssi_dbm, receive_count, .. } => {
                assert_eq!(packet, telemetry());
                assert_eq!(rssi_dbm, Some(-67));
                assert_eq!(receive_count, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(worker.stats().received, 1);
    }

    #[test]
    fn test_malformed_frame_does_not_stop_the_loop() {
        let radio = MockRadio::default();
        radio.queue_frame(vec![0u8; 14]);
        radio.queue_frame(encode_telemetry(&telemetry()).to_vec());
        let (mut worker, _pending, events) = worker(radio);

        assert_eq!(worker.step().inbound, Inbound::Malformed);
        assert_eq!(
            events.try_recv().unwrap(),
            LinkEvent::DecodeFailed {
                len: 14,
                error: DecodeError::MalformedFrame { expected: 16, actual: 14 },
            }
        );

        assert_eq!(worker.step().inbound, Inbound::Telemetry);
        let stats = worker.stats();
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.received, 1);
    }

    #[test]
    fn test_receive_error_is_counted() {
        let radio = MockRadio::default();
        radio.queue_error();
        let (mut worker, _pending, _events) = worker(radio);

        assert_eq!(worker.step().inbound, Inbound::ReceiveError);
        assert_eq!(worker.step().inbound, Inbound::NoData);
        assert_eq!(worker.stats().receive_errors, 1);
    }

    #[test]
    fn test_pending_request_transmits_exactly_once() {
        let radio = MockRadio::default();
        let (mut worker, pending, events) = worker(radio.clone());
        let packet = command(Opcode::SetPhaseShifters, [0x60, 0x28, 0x2C, 0x6C]);

        pending.raise(packet);
        assert_eq!(worker.step().dispatch, Dispatch::Sent);
        assert!(!pending.is_pending());
        assert_eq!(worker.step().dispatch, Dispatch::Idle);

        assert_eq!(radio.sent(), vec![(vec![2, 0x60, 0x28, 0x2C, 0x6C], REMOTE_NODE_ID)]);
        assert_eq!(
            events.try_recv().unwrap(),
            LinkEvent::CommandSent { packet, frame: [2, 0x60, 0x28, 0x2C, 0x6C] }
        );
    }

    #[test]
    fn test_superseded_request_is_not_sent() {
        let radio = MockRadio::default();
        let (mut worker, pending, _events) = worker(radio.clone());

        pending.raise(command(Opcode::Blink, [0x20; 4]));
        pending.raise(command(Opcode::NoOp, [0x20; 4]));
        worker.step();
        worker.step();

        assert_eq!(radio.sent(), vec![(vec![0, 0x20, 0x20, 0x20, 0x20], REMOTE_NODE_ID)]);
    }

    #[test]
    fn test_no_request_no_transmit() {
        let radio = MockRadio::default();
        let (mut worker, _pending, _events) = worker(radio.clone());
        for _ in 0..5 {
            worker.step();
        }
        assert!(radio.sent().is_empty());
    }

    #[test]
    fn test_transmit_failure_is_reported() {
        let radio = MockRadio { fail_transmit: true, ..MockRadio::default() };
        let (mut worker, pending, events) = worker(radio);
        let packet = command(Opcode::Blink, [0x20; 4]);

        pending.raise(packet);
        assert_eq!(worker.step().dispatch, Dispatch::Failed);
        assert!(matches!(events.try_recv().unwrap(), LinkEvent::TransmitFailed { packet: p, .. } if p == packet));
        assert_eq!(worker.stats().transmit_failures, 1);
        // Not retried
        assert_eq!(worker.step().dispatch, Dispatch::Idle);
    }

    #[test]
    fn test_handle_runs_and_stops() {
        let radio = MockRadio::default();
        radio.queue_frame(encode_telemetry(&telemetry()).to_vec());
        let mut handle = LinkHandle::spawn(radio.clone(), REMOTE_NODE_ID, Duration::from_millis(1)).unwrap();

        let packet = command(Opcode::Blink, [0x20; 4]);
        handle.pending().raise(packet);

        let mut sent = false;
        while let Ok(event) = handle.events().recv_timeout(Duration::from_secs(2)) {
            if matches!(event, LinkEvent::CommandSent { .. }) {
                sent = true;
                break;
            }
        }
        assert!(sent);

        let stats = handle.stop().unwrap();
        assert_eq!(stats.sent, 1);
        assert!(handle.is_finished());
        assert_eq!(radio.sent().len(), 1);
    }
}
