//! Engine task and handle — the cooperative control loop.
//!
//! A single spawned task owns the transport exclusively and runs the whole
//! receive path: bounded-timeout reads feed the reassembler, decoded frames
//! feed the scheduler, and `tick` output is written back to the bus. One
//! logical flow ever touches the serial line, no matter how many
//! collaborators (MQTT bridge, console, dashboard) hold the handle.
//!
//! Collaborators talk to the task over an `mpsc` channel of request
//! messages answered over `oneshot` — explicit context passing, no ambient
//! globals.
//! State-change notifications fan out over a `tokio::sync::broadcast`
//! channel.

use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pumpbus_core::error::{Error, Result};
use pumpbus_core::events::EngineEvent;
use pumpbus_core::stats::LinkStats;
use pumpbus_core::status::PumpStatus;
use pumpbus_core::transport::Transport;
use pumpbus_core::types::PumpCommand;

use crate::reassembler::Reassembler;
use crate::scheduler::{Scheduler, SchedulerConfig};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Configuration for the engine task.
#[derive(Debug, Clone)]
pub(crate) struct EngineConfig {
    /// Scheduler timing and addressing.
    pub scheduler: SchedulerConfig,
    /// Per-iteration bounded read timeout. The loop's tick cadence is at
    /// most this long; it must stay well under the response timeout.
    pub read_timeout: Duration,
    /// Reassembly buffer cap.
    pub max_buffer: usize,
}

/// A request sent from the handle to the engine task.
pub(crate) enum Request {
    /// Submit a command to the scheduler.
    Submit {
        command: PumpCommand,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Snapshot the last-known pump status.
    Status {
        reply: oneshot::Sender<PumpStatus>,
    },
    /// Snapshot the link counters.
    Stats {
        reply: oneshot::Sender<LinkStats>,
    },
    /// Cancel the external-program repeat obligation.
    CancelExternalProgram {
        reply: oneshot::Sender<()>,
    },
    /// Graceful shutdown; returns the transport for test recovery.
    Shutdown {
        reply: oneshot::Sender<Box<dyn Transport>>,
    },
}

/// Handle to the engine task.
///
/// This is the only surface collaborators see: submit a command, read the
/// status snapshot, subscribe to events. Clones of the command channel may
/// be handed to any number of adapters; the task serializes everything.
pub struct PumpHandle {
    cmd_tx: mpsc::Sender<Request>,
    event_tx: broadcast::Sender<EngineEvent>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PumpHandle {
    /// Submit a command to the scheduler.
    ///
    /// Returns [`Error::Busy`] while another command is awaiting its
    /// response; status queries queue instead.
    pub async fn submit(&self, command: PumpCommand) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Submit {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::NotConnected)?
    }

    /// Read-only snapshot of the last-known pump status.
    pub async fn status(&self) -> Result<PumpStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Status { reply: reply_tx })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::NotConnected)
    }

    /// Snapshot of the link statistics counters.
    pub async fn stats(&self) -> Result<LinkStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Stats { reply: reply_tx })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::NotConnected)
    }

    /// Cancel the external-program repeat obligation.
    pub async fn cancel_external_program(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::CancelExternalProgram { reply: reply_tx })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::NotConnected)
    }

    /// Subscribe to engine events (status updates, command completion and
    /// failure, overruns, transport errors).
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Shut down the engine task and recover the transport.
    pub async fn shutdown(self) -> Result<Box<dyn Transport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .cmd_tx
            .send(Request::Shutdown { reply: reply_tx })
            .await;
        let transport = reply_rx.await.map_err(|_| Error::NotConnected)?;
        self.cancel.cancel();
        let _ = self.task.await;
        Ok(transport)
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the engine task. Returns the collaborator-facing handle.
pub(crate) fn spawn_engine(transport: Box<dyn Transport>, config: EngineConfig) -> PumpHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Request>(32);
    let (event_tx, _) = broadcast::channel(64);
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let task = tokio::spawn(engine_loop(
        transport,
        config,
        event_tx.clone(),
        cmd_rx,
        cancel_clone,
    ));

    PumpHandle {
        cmd_tx,
        event_tx,
        cancel,
        task,
    }
}

// ---------------------------------------------------------------------------
// Engine loop
// ---------------------------------------------------------------------------

/// The main engine loop. Runs as a spawned Tokio task.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Collaborator requests
/// 3. Draining the bus
///
/// Every iteration ends with a scheduler tick, so timeouts and the repeat
/// obligation advance even when the bus is silent — the bounded read
/// timeout guarantees the tick cadence.
async fn engine_loop(
    mut transport: Box<dyn Transport>,
    config: EngineConfig,
    event_tx: broadcast::Sender<EngineEvent>,
    mut cmd_rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut scheduler = Scheduler::new(config.scheduler.clone(), Instant::now());
    let mut reassembler = Reassembler::with_max_buffer(config.max_buffer);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("engine task cancelled");
                break;
            }

            req = cmd_rx.recv() => {
                match req {
                    Some(Request::Submit { command, reply }) => {
                        let result = scheduler.submit(command);
                        let _ = reply.send(result);
                    }
                    Some(Request::Status { reply }) => {
                        let _ = reply.send(scheduler.current_status());
                    }
                    Some(Request::Stats { reply }) => {
                        let _ = reply.send(scheduler.stats());
                    }
                    Some(Request::CancelExternalProgram { reply }) => {
                        scheduler.cancel_external_program();
                        let _ = reply.send(());
                    }
                    Some(Request::Shutdown { reply }) => {
                        debug!("engine task shutdown requested");
                        let _ = reply.send(transport);
                        return;
                    }
                    None => {
                        debug!("all handles dropped, exiting engine task");
                        break;
                    }
                }
            }

            // Drain the bus: whatever arrived within one bounded read.
            _ = async {
                let mut buf = [0u8; 256];
                match transport.receive(&mut buf, config.read_timeout).await {
                    Ok(n) if n > 0 => {
                        let outcome = reassembler.feed(&buf[..n]);
                        scheduler.record_feed(&outcome);
                        let now = Instant::now();
                        for frame in &outcome.frames {
                            scheduler.on_frame(frame, now);
                        }
                    }
                    Ok(_) | Err(Error::Timeout) => {
                        // Silence is the normal idle state.
                    }
                    Err(e) => {
                        warn!(error = %e, "transport receive failed");
                        let _ = event_tx.send(EngineEvent::TransportError {
                            message: e.to_string(),
                        });
                        // Back off so a dead port cannot spin the loop.
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            } => {}
        }

        // Advance the clock-driven machinery and transmit anything due.
        if let Some(bytes) = scheduler.tick(Instant::now()) {
            if let Err(e) = transport.send(&bytes).await {
                warn!(error = %e, "transport send failed");
                let _ = event_tx.send(EngineEvent::TransportError {
                    message: e.to_string(),
                });
            }
        }

        for event in scheduler.take_events() {
            let _ = event_tx.send(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pumpbus_core::types::{ControlMode, PumpMode, RunAction};
    use pumpbus_test_harness::{MockTransport, SimulatedPump};

    use crate::commands;

    const PUMP: u8 = 0x60;
    const CONTROLLER: u8 = 0x20;

    fn test_config() -> EngineConfig {
        EngineConfig {
            scheduler: SchedulerConfig {
                response_timeout: Duration::from_millis(200),
                ..SchedulerConfig::default()
            },
            read_timeout: Duration::from_millis(10),
            max_buffer: 4096,
        }
    }

    fn encoded(command: PumpCommand) -> Vec<u8> {
        commands::encode_command(command, PUMP, CONTROLLER).unwrap()
    }

    /// The pump's echo-acknowledgement for a command's wire bytes.
    fn ack_bytes(command: PumpCommand) -> Vec<u8> {
        let frame = commands::build_frame(command, PUMP, CONTROLLER);
        crate::frame::encode_frame(frame.source, frame.destination, frame.command, &frame.data)
            .unwrap()
    }

    #[tokio::test]
    async fn submit_command_and_receive_ack() {
        let mut mock = MockTransport::new();
        let command = PumpCommand::SetRun(RunAction::Start);
        mock.expect(&encoded(command), &ack_bytes(command));

        let handle = spawn_engine(Box::new(mock), test_config());
        let mut events = handle.subscribe();

        handle.submit(command).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if let Ok(e) = events.recv().await {
                    if matches!(e, EngineEvent::CommandCompleted { .. }) {
                        break e;
                    }
                }
            }
        })
        .await
        .expect("command should complete");
        assert!(matches!(
            event,
            EngineEvent::CommandCompleted {
                command: PumpCommand::SetRun(RunAction::Start)
            }
        ));

        let _ = handle.shutdown().await;
    }

    #[tokio::test]
    async fn status_query_fills_snapshot() {
        let mut pump = SimulatedPump::new(PUMP);
        pump.set_running(true);
        pump.set_rpm(2400);

        let query = encoded(PumpCommand::QueryStatus);
        // Decode with the harness's copy of pumpbus-pentair so the frame type
        // matches what `SimulatedPump::handle_frame` expects: the dev-dependency
        // cycle means this test build links a separate copy of this crate.
        let (frame, _) = pumpbus_test_harness::pumpbus_pentair::frame::decode_frame(&query).unwrap();
        let response = pump.handle_frame(&frame).expect("simulator should answer");

        let mut mock = MockTransport::new();
        mock.expect(&query, &response.encode().unwrap());

        let handle = spawn_engine(Box::new(mock), test_config());
        let mut events = handle.subscribe();

        handle.submit(PumpCommand::QueryStatus).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if let Ok(EngineEvent::StatusUpdated { .. }) = events.recv().await {
                    break;
                }
            }
        })
        .await
        .expect("status should update");

        let status = handle.status().await.unwrap();
        assert!(status.valid);
        assert!(status.running);
        assert_eq!(status.rpm, 2400);

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(stats.frames_received, 1);

        let _ = handle.shutdown().await;
    }

    #[tokio::test]
    async fn unanswered_command_fails_after_retries() {
        let mut mock = MockTransport::new();
        let command = PumpCommand::SetRun(RunAction::Stop);
        // Two transmissions (initial + one retry), both unanswered.
        mock.expect(&encoded(command), &[]);
        mock.expect(&encoded(command), &[]);

        let handle = spawn_engine(Box::new(mock), test_config());
        let mut events = handle.subscribe();

        handle.submit(command).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(e @ EngineEvent::CommandFailed { .. }) = events.recv().await {
                    break e;
                }
            }
        })
        .await
        .expect("command should fail after retries");
        assert!(matches!(
            event,
            EngineEvent::CommandFailed { attempts: 2, .. }
        ));

        let status = handle.status().await.unwrap();
        assert!(status.stale);

        let _ = handle.shutdown().await;
    }

    #[tokio::test]
    async fn busy_while_command_in_flight() {
        let mut mock = MockTransport::new();
        let command = PumpCommand::SetControl(ControlMode::Remote);
        // Accept the send but leave it unanswered so it stays in flight.
        mock.expect(&encoded(command), &[]);

        let handle = spawn_engine(Box::new(mock), test_config());
        handle.submit(command).await.unwrap();

        // Give the engine a beat to dispatch.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = handle.submit(PumpCommand::SetMode(PumpMode::Filter)).await;
        assert!(matches!(result, Err(Error::Busy)));

        let _ = handle.shutdown().await;
    }

    #[tokio::test]
    async fn garbage_on_the_bus_does_not_break_the_exchange() {
        let mut mock = MockTransport::new();
        let command = PumpCommand::SetRun(RunAction::Start);

        // Response preceded by line noise and another device's chatter.
        let mut noisy = vec![0x13, 0x37, 0xFF, 0x00];
        noisy.extend_from_slice(&ack_bytes(command));
        mock.expect(&encoded(command), &noisy);

        let handle = spawn_engine(Box::new(mock), test_config());
        let mut events = handle.subscribe();

        handle.submit(command).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if let Ok(EngineEvent::CommandCompleted { .. }) = events.recv().await {
                    break;
                }
            }
        })
        .await
        .expect("ack should survive the noise");

        let _ = handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_recovers_transport() {
        let mock = MockTransport::new();
        let handle = spawn_engine(Box::new(mock), test_config());

        let transport = handle.shutdown().await.unwrap();
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn handle_calls_fail_after_task_exit() {
        let mock = MockTransport::new();
        let handle = spawn_engine(Box::new(mock), test_config());
        let cmd_tx = handle.cmd_tx.clone();
        let event_tx = handle.event_tx.clone();
        let cancel = handle.cancel.clone();

        let _ = handle.shutdown().await;

        let orphan = PumpHandle {
            cmd_tx,
            event_tx,
            cancel,
            task: tokio::spawn(async {}),
        };
        let result = orphan.submit(PumpCommand::QueryStatus).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }
}
