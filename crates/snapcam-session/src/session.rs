use bytes::Bytes;
use serde_json::{json, Map, Value};
use snapcam_frame::{encode_command, opcode_name, Command, ResponseAssembler, ACK_FRAME};
use snapcam_transport::{ascii_preview, CommandWriter, NotificationQueue, NotificationSender};
use tracing::{debug, trace, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// A command session with one camera.
///
/// Owns the command writer and the notification queue. Only one command is in
/// flight at a time: every sending method takes `&mut self`, so sharing a
/// session between threads needs an outer `Mutex`.
pub struct Session<W> {
    writer: W,
    queue: NotificationQueue,
    config: SessionConfig,
}

impl<W: CommandWriter> Session<W> {
    /// Create a session with default configuration.
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, SessionConfig::default())
    }

    /// Create a session with explicit configuration.
    pub fn with_config(writer: W, config: SessionConfig) -> Self {
        Self::with_queue(writer, NotificationQueue::new(), config)
    }

    /// Create a session around a queue the BLE stack is already feeding.
    pub fn with_queue(writer: W, queue: NotificationQueue, config: SessionConfig) -> Self {
        Self {
            writer,
            queue,
            config,
        }
    }

    /// Producer handle for the notification callback.
    pub fn notification_sender(&self) -> NotificationSender {
        self.queue.sender()
    }

    /// Notifications received but not consumed yet.
    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    /// Current session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Borrow the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Mutably borrow the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Consume the session and return the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Link (re)established: nothing queued so far belongs to us.
    pub fn on_connected(&self) {
        let dropped = self.queue.clear();
        debug!(dropped, "connected; response queue reset");
    }

    /// Link dropped: discard whatever the camera sent before going away.
    pub fn on_disconnected(&self) {
        let dropped = self.queue.clear();
        if dropped > 0 {
            warn!(dropped, "disconnected; discarded queued notifications");
        } else {
            debug!("disconnected");
        }
    }

    /// Send `opcode` with `args`.
    ///
    /// With `expect_response` the camera's reply object is returned, otherwise a
    /// synthetic `{"ret":1}` once every frame has been acknowledged.
    pub fn send(
        &mut self,
        opcode: u8,
        args: Map<String, Value>,
        expect_response: bool,
    ) -> Result<Value> {
        self.send_command(&Command::with_args(opcode, args), expect_response)
    }

    /// Send a command that only needs acknowledging.
    pub fn execute(&mut self, command: &Command) -> Result<()> {
        self.send_command(command, false).map(|_| ())
    }

    /// Send a command and return the camera's reply.
    pub fn request(&mut self, command: &Command) -> Result<Value> {
        self.send_command(command, true)
    }

    /// Send a command, retrying the whole exchange on timeout.
    pub fn send_command(&mut self, command: &Command, expect_response: bool) -> Result<Value> {
        let frames = encode_command(command, &self.config.frame)?;
        let attempts = self.config.max_send_attempts.max(1);
        let opcode = command.opcode();

        let mut attempt = 1u32;
        loop {
            let stale = self.queue.clear();
            if stale > 0 {
                warn!(stale, "response queue not empty; discarding");
            }
            debug!(
                opcode,
                command = opcode_name(opcode),
                attempt,
                frames = frames.len(),
                expect_response,
                "sending command"
            );

            match self.attempt(&frames, expect_response) {
                Err(SessionError::Timeout(timeout)) if attempt < attempts => {
                    warn!(opcode, attempt, ?timeout, "no notification in time; retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Wait for the next notification, bounded by the response timeout.
    pub fn receive_response(&self) -> Result<Bytes> {
        self.queue
            .recv_timeout(self.config.response_timeout)
            .ok_or(SessionError::Timeout(self.config.response_timeout))
    }

    fn attempt(&mut self, frames: &[Bytes], expect_response: bool) -> Result<Value> {
        for frame in frames {
            self.write(frame)?;
            let ack = self.receive_response()?;
            // Acknowledgment content is not validated.
            trace!(ack = %ascii_preview(&ack), "frame acknowledged");
        }
        debug!(queued = self.queue.len(), "command frames sent");

        if !expect_response {
            return Ok(json!({ "ret": 1 }));
        }
        self.receive_reply()
    }

    fn receive_reply(&mut self) -> Result<Value> {
        let first = self.receive_response()?;
        trace!(subframe = %ascii_preview(&first), "response sub-frame");
        let mut assembler = ResponseAssembler::start(&first)?;

        while !assembler.is_complete() {
            self.write(ACK_FRAME)?;
            let next = self.receive_response()?;
            trace!(subframe = %ascii_preview(&next), "response sub-frame");
            assembler.push(&next);
        }

        let value = assembler.finish()?;
        debug!(result = %value, "response received");
        Ok(value)
    }

    fn write(&mut self, frame: &[u8]) -> Result<()> {
        trace!(frame = %ascii_preview(frame), "write");
        self.writer.write_command(frame)?;
        Ok(())
    }
}

impl<W> std::fmt::Debug for Session<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("queue", &self.queue)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::BytesMut;
    use snapcam_frame::{encode_message, split_frames, FrameError};
    use snapcam_transport::TransportError;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;
    use crate::simulator::{SimulatedCamera, SimulatorConfig};

    fn fast_config() -> SessionConfig {
        SessionConfig {
            response_timeout: Duration::from_millis(25),
            ..SessionConfig::default()
        }
    }

    fn response_chunks(value: &Value, chunk: usize) -> Vec<Bytes> {
        let payload = serde_json::to_vec(value).unwrap();
        let mut message = BytesMut::new();
        encode_message(&payload, &mut message);
        split_frames(message.freeze(), chunk).unwrap()
    }

    /// Replies to each write with the next scripted batch of notifications.
    struct ScriptedPeer {
        notifier: NotificationSender,
        script: VecDeque<Vec<Bytes>>,
        writes: Vec<Vec<u8>>,
    }

    impl ScriptedPeer {
        fn new(notifier: NotificationSender, script: Vec<Vec<Bytes>>) -> Self {
            Self {
                notifier,
                script: script.into(),
                writes: Vec::new(),
            }
        }
    }

    impl CommandWriter for ScriptedPeer {
        fn write_command(&mut self, frame: &[u8]) -> snapcam_transport::Result<()> {
            self.writes.push(frame.to_vec());
            for payload in self.script.pop_front().unwrap_or_default() {
                self.notifier.push(payload);
            }
            Ok(())
        }
    }

    fn scripted_session(script: Vec<Vec<Bytes>>) -> Session<ScriptedPeer> {
        let queue = NotificationQueue::new();
        let peer = ScriptedPeer::new(queue.sender(), script);
        Session::with_queue(peer, queue, fast_config())
    }

    fn ack() -> Bytes {
        Bytes::from_static(ACK_FRAME)
    }

    struct FailingWriter {
        calls: usize,
    }

    impl CommandWriter for FailingWriter {
        fn write_command(&mut self, _frame: &[u8]) -> snapcam_transport::Result<()> {
            self.calls += 1;
            Err(TransportError::Write("gatt error 0x0e".to_string()))
        }
    }

    #[test]
    fn firmware_query_against_simulator() {
        let queue = NotificationQueue::new();
        let camera = SimulatedCamera::new(queue.sender());
        let mut session = Session::with_queue(camera, queue, fast_config());

        let value = session
            .send(25, Map::new(), true)
            .expect("firmware query should succeed");
        assert_eq!(value["ver"], "SNAPCAM_V1.0.8");
        assert_eq!(session.get_ref().received(), &[json!({"Type": 25})]);
    }

    #[test]
    fn no_response_returns_synthetic_ack() {
        let mut session = scripted_session(vec![vec![ack()]]);
        let value = session.send(14, Map::new(), false).unwrap();
        assert_eq!(value, json!({"ret": 1}));
        assert_eq!(session.get_ref().writes, vec![b"\xffb{\"Type\":14}CRC:d".to_vec()]);
    }

    #[test]
    fn one_ack_consumed_per_frame() {
        let command = Command::new(2).arg("Name", "a fairly long device name");
        let frame_count = encode_command(&command, &SessionConfig::default().frame)
            .unwrap()
            .len();
        assert!(frame_count > 1);

        let mut session = scripted_session(vec![vec![ack()]; frame_count]);
        session.execute(&command).unwrap();

        let peer = session.into_inner();
        assert_eq!(peer.writes.len(), frame_count);
        assert!(peer.writes.iter().all(|w| w.len() <= 20));
    }

    #[test]
    fn three_subframe_response_writes_two_acks() {
        let value = json!({"ret": 1, "ver": "V1.2.3_20190101", "model": "SnapCam"});
        let chunks = response_chunks(&value, 20);
        assert_eq!(chunks.len(), 3);

        let mut first_reply = vec![ack()];
        first_reply.push(chunks[0].clone());
        let mut session = scripted_session(vec![
            first_reply,
            vec![chunks[1].clone()],
            vec![chunks[2].clone()],
        ]);

        let result = session.request(&Command::new(25)).unwrap();
        assert_eq!(result, value);

        let peer = session.into_inner();
        assert_eq!(peer.writes.len(), 3);
        let ack_writes = peer
            .writes
            .iter()
            .filter(|w| w.as_slice() == ACK_FRAME)
            .count();
        assert_eq!(ack_writes, 2);
        assert_eq!(&peer.writes[1], ACK_FRAME);
        assert_eq!(&peer.writes[2], ACK_FRAME);
    }

    #[test]
    fn never_acked_fails_after_max_attempts() {
        let mut session = scripted_session(Vec::new());
        let err = session.execute(&Command::new(14)).unwrap_err();

        assert!(matches!(err, SessionError::Timeout(_)));
        assert!(err.is_timeout());
        let peer = session.into_inner();
        assert_eq!(peer.writes.len(), crate::config::MAX_SEND_RETRY as usize);
        assert!(peer.writes.iter().all(|w| w == &peer.writes[0]));
    }

    #[test]
    fn attempts_are_configurable() {
        let queue = NotificationQueue::new();
        let peer = ScriptedPeer::new(queue.sender(), Vec::new());
        let config = SessionConfig {
            max_send_attempts: 1,
            ..fast_config()
        };
        let mut session = Session::with_queue(peer, queue, config);
        assert!(session.execute(&Command::new(6)).unwrap_err().is_timeout());
        assert_eq!(session.get_ref().writes.len(), 1);
    }

    #[test]
    fn timeout_then_success_on_retry() {
        // First attempt: nothing. Second attempt: acked.
        let mut session = scripted_session(vec![Vec::new(), vec![ack()]]);
        session.execute(&Command::new(12)).unwrap();
        assert_eq!(session.get_ref().writes.len(), 2);
    }

    #[test]
    fn simulator_dropping_acks_recovers_within_budget() {
        let queue = NotificationQueue::new();
        let camera = SimulatedCamera::with_config(
            queue.sender(),
            SimulatorConfig {
                drop_acks: 2,
                ..SimulatorConfig::default()
            },
        );
        let mut session = Session::with_queue(camera, queue, fast_config());

        let value = session.send(27, Map::new(), true).unwrap();
        assert_eq!(value["battery"], "4");
    }

    #[test]
    fn stale_notifications_flushed_before_command() {
        let queue = NotificationQueue::new();
        let camera = SimulatedCamera::new(queue.sender());
        let mut session = Session::with_queue(camera, queue, fast_config());

        let sender = session.notification_sender();
        sender.push(Bytes::from_static(b"stale-1"));
        sender.push(Bytes::from_static(b"stale-2"));
        assert_eq!(session.queue().len(), 2);

        let value = session.send(29, Map::new(), true).unwrap();
        assert_eq!(value["ip"], "192.168.1.1");
        assert!(session.queue().is_empty());
    }

    #[test]
    fn unread_response_is_flushed_by_next_command() {
        let queue = NotificationQueue::new();
        let camera = SimulatedCamera::new(queue.sender());
        let mut session = Session::with_queue(camera, queue, fast_config());

        // The camera answers 25 regardless; not reading it leaves it queued.
        session.send(25, Map::new(), false).unwrap();
        assert!(!session.queue().is_empty());

        let value = session.send(18, Map::new(), true).unwrap();
        assert_eq!(value["ssid"], "SnapCam_5A3C");
    }

    #[test]
    fn bad_header_not_retried() {
        let mut session = scripted_session(vec![vec![
            ack(),
            Bytes::from_static(b"\xff123{\"ver\":\"x\"}"),
        ]]);
        let err = session.request(&Command::new(25)).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame(FrameError::BadFrameHeader)
        ));
        assert_eq!(session.get_ref().writes.len(), 1);
    }

    #[test]
    fn bad_crc_marker_not_retried() {
        let mut session = scripted_session(vec![vec![
            ack(),
            Bytes::from_static(b"\xff9{\"ret\":1}XXX:0"),
        ]]);
        let err = session.request(&Command::new(27)).unwrap_err();
        assert!(matches!(err, SessionError::Frame(FrameError::BadCrcFormat)));
        assert_eq!(session.get_ref().writes.len(), 1);
    }

    #[test]
    fn malformed_json_not_retried() {
        let mut session = scripted_session(vec![vec![
            ack(),
            Bytes::from_static(b"\xff9{\"ret\":1,CRC:0"),
            // never reached
        ]]);
        let err = session.request(&Command::new(27)).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame(FrameError::MalformedResponse(_))
        ));
    }

    #[test]
    fn transport_failure_not_retried() {
        let mut session = Session::with_config(FailingWriter { calls: 0 }, fast_config());
        let err = session.execute(&Command::new(14)).unwrap_err();
        assert!(matches!(err, SessionError::Transport(TransportError::Write(_))));
        assert_eq!(session.get_ref().calls, 1);
    }

    #[test]
    fn timeout_while_reassembling_retries_whole_command() {
        let value = json!({"ssid": "SnapCam_5A3C", "pwd": "12345678"});
        let chunks = response_chunks(&value, 20);
        assert!(chunks.len() >= 2);

        let mut script = vec![vec![ack(), chunks[0].clone()], Vec::new()];
        let mut retry = vec![vec![ack(), chunks[0].clone()]];
        retry.extend(chunks[1..].iter().map(|c| vec![c.clone()]));
        script.extend(retry);

        let mut session = scripted_session(script);
        assert_eq!(session.request(&Command::new(18)).unwrap(), value);

        let writes = &session.get_ref().writes;
        let command_writes = writes.iter().filter(|w| w.first() == Some(&0xFF)).count();
        assert_eq!(command_writes, 2);
    }

    /// Pushes late notifications when an attempt gives up and counts what the
    /// next attempt discards.
    struct LateNotifications {
        notifier: NotificationSender,
        late: Vec<Bytes>,
        discarded: Arc<AtomicUsize>,
    }

    struct StaleCount(u64);

    impl Visit for StaleCount {
        fn record_u64(&mut self, field: &Field, value: u64) {
            if field.name() == "stale" {
                self.0 = value;
            }
        }

        fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
    }

    impl<S: tracing::Subscriber> Layer<S> for LateNotifications {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let fields = event.metadata().fields();
            if fields.field("timeout").is_some() {
                for payload in &self.late {
                    self.notifier.push(payload.clone());
                }
            }
            if fields.field("stale").is_some() {
                let mut count = StaleCount(0);
                event.record(&mut count);
                self.discarded.fetch_add(count.0 as usize, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn notifications_arriving_between_attempts_are_discarded() {
        let reply = json!({"ret": 1, "ver": "SNAPCAM_V1.0.8"});
        let chunks = response_chunks(&reply, 20);
        assert_eq!(chunks.len(), 2);

        // First attempt hears nothing; the retry is answered normally.
        let mut session = scripted_session(vec![
            Vec::new(),
            vec![ack(), chunks[0].clone()],
            vec![chunks[1].clone()],
        ]);

        let discarded = Arc::new(AtomicUsize::new(0));
        let layer = LateNotifications {
            notifier: session.notification_sender(),
            late: vec![ack(), Bytes::from_static(b"\xff123garbage")],
            discarded: Arc::clone(&discarded),
        };
        let subscriber = tracing_subscriber::registry().with(layer);

        let result = tracing::subscriber::with_default(subscriber, || {
            session.request(&Command::new(25))
        });

        // Without the reset the late ack would be taken as the retry's ack
        // and the garbage parsed as its first sub-frame.
        assert_eq!(result.unwrap(), reply);
        assert_eq!(discarded.load(Ordering::SeqCst), 2);
        assert!(session.queue().is_empty());

        let command_writes = session
            .get_ref()
            .writes
            .iter()
            .filter(|w| w.first() == Some(&0xFF))
            .count();
        assert_eq!(command_writes, 2);
    }

    #[test]
    fn disconnect_clears_queue() {
        let session = scripted_session(Vec::new());
        session.notification_sender().push(Bytes::from_static(b"left over"));
        session.on_disconnected();
        assert!(session.queue().is_empty());

        session.notification_sender().push(Bytes::from_static(b"left over"));
        session.on_connected();
        assert!(session.queue().is_empty());
    }

    #[test]
    fn receive_response_times_out() {
        let session = scripted_session(Vec::new());
        let err = session.receive_response().unwrap_err();
        assert!(matches!(err, SessionError::Timeout(d) if d == Duration::from_millis(25)));
    }
}
