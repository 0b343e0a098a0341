//! Command scheduler — the request/response session state machine.
//!
//! One command may be outstanding on the half-duplex bus at a time. The
//! scheduler tracks it from dispatch through acknowledgement, enforces the
//! response deadline and retry budget, keeps the status snapshot fresh with
//! a low-priority idle poll, and carries the external-program repeat
//! obligation: a pump running an external program must have the selecting
//! command re-asserted every repeat interval or it silently falls back to
//! local control. The repeat is a hard wire-protocol deadline (how much
//! overrun a real drive tolerates is unverified), so a due repeat is always
//! enqueued ahead of any waiting poll.
//!
//! All timing is driven by [`Scheduler::tick`] comparing injected
//! [`Instant`]s against stored deadlines — no sleeps, no ambient clock.
//! Tests advance a simulated clock; the engine task passes `Instant::now()`
//! at a bounded cadence.
//!
//! Session states: idle → awaiting-response → (idle on a matching frame, or
//! retransmit on deadline until the retry budget is spent, then idle with a
//! failure event). A command is never silently dropped.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use pumpbus_core::{
    ControlMode, EngineEvent, Error, LinkStats, PumpCommand, PumpMode, PumpStatus, Result,
};

use crate::address;
use crate::commands;
use crate::frame::Frame;
use crate::reassembler::FeedResult;

/// How long to wait for the pump to answer one command.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Idle interval after which a status poll is enqueued.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(15_000);

/// Cadence at which an external-program command must be re-asserted.
pub const EXTERNAL_PROGRAM_REPEAT_INTERVAL: Duration = Duration::from_millis(30_000);

/// Default number of retransmissions after the first timeout.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Scheduler timing and addressing configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Bus address of the pump this engine drives.
    pub pump_address: u8,
    /// Bus address this engine claims (remote-controller range).
    pub controller_address: u8,
    /// Deadline for one command/response exchange.
    pub response_timeout: Duration,
    /// Retransmissions allowed after the first timeout.
    pub max_retries: u32,
    /// Bus-idle interval that triggers a status poll.
    pub poll_interval: Duration,
    /// External-program re-assertion cadence.
    pub repeat_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            pump_address: address::DEFAULT_PUMP,
            controller_address: address::DEFAULT_CONTROLLER,
            response_timeout: RESPONSE_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            poll_interval: STATUS_POLL_INTERVAL,
            repeat_interval: EXTERNAL_PROGRAM_REPEAT_INTERVAL,
        }
    }
}

/// Where a dispatched command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Submitted through the engine handle.
    Collaborator,
    /// The external-program repeat obligation.
    Repeat,
    /// The idle status poll.
    Poll,
}

/// The one command currently awaiting a response.
#[derive(Debug)]
struct Pending {
    command: PumpCommand,
    origin: Origin,
    /// CFI the response must echo.
    command_id: u8,
    /// Encoded once; retransmitted verbatim on retry.
    wire_bytes: Vec<u8>,
    deadline: Instant,
    /// Transmissions so far (1 = initial send).
    attempts: u32,
}

#[derive(Debug, Clone, Copy)]
struct Queued {
    command: PumpCommand,
    origin: Origin,
}

/// The armed external-program obligation.
#[derive(Debug, Clone, Copy)]
struct RepeatState {
    command: PumpCommand,
    mode: PumpMode,
    /// Cadence is measured dispatch-to-dispatch, so the deadline never
    /// drifts by response latency.
    next_due: Instant,
}

/// The session state machine. Pure and synchronous: I/O and real time live
/// in the engine task, which feeds frames in and writes the bytes `tick`
/// hands back.
pub struct Scheduler {
    config: SchedulerConfig,
    outstanding: Option<Pending>,
    queue: VecDeque<Queued>,
    repeat: Option<RepeatState>,
    status: PumpStatus,
    stats: LinkStats,
    /// Last dispatch or received frame; drives the idle poll.
    last_activity: Instant,
    /// Events accumulated since the last [`Scheduler::take_events`] drain.
    events: Vec<EngineEvent>,
}

impl Scheduler {
    /// Create a scheduler. `now` seeds the idle-poll clock.
    pub fn new(config: SchedulerConfig, now: Instant) -> Self {
        Scheduler {
            config,
            outstanding: None,
            queue: VecDeque::new(),
            repeat: None,
            status: PumpStatus::default(),
            stats: LinkStats::default(),
            last_activity: now,
            events: Vec::new(),
        }
    }

    /// Submit a command for dispatch on the next tick.
    ///
    /// Returns [`Error::Busy`] while a command is outstanding, except for
    /// [`PumpCommand::QueryStatus`], which queues (and dedupes) instead.
    /// Accepting a command that changes mode away from an armed external
    /// program cancels the repeat obligation in the same call — there is
    /// no window where both are armed.
    pub fn submit(&mut self, command: PumpCommand) -> Result<()> {
        if command.is_poll() {
            self.enqueue_poll();
            return Ok(());
        }

        if self.outstanding.is_some()
            || self.queue.iter().any(|q| q.origin == Origin::Collaborator)
        {
            return Err(Error::Busy);
        }

        if let Some(rep) = self.repeat {
            let cancels = match command {
                PumpCommand::SetMode(mode) => mode != rep.mode,
                PumpCommand::SetControl(ControlMode::Local) => true,
                _ => false,
            };
            if cancels {
                debug!(command = %command, "command cancels external-program repeat");
                self.disarm_repeat();
            }
        }

        debug!(command = %command, "command accepted");
        self.queue.push_back(Queued {
            command,
            origin: Origin::Collaborator,
        });
        Ok(())
    }

    /// Explicitly cancel the external-program repeat obligation.
    pub fn cancel_external_program(&mut self) {
        self.disarm_repeat();
    }

    /// Feed one decoded frame from the reassembler.
    ///
    /// Frames addressed to other devices are ignored without error —
    /// expected traffic on a shared bus. Status data is trusted only from
    /// the configured pump address.
    pub fn on_frame(&mut self, frame: &Frame, now: Instant) {
        self.stats.frames_received += 1;
        self.last_activity = now;

        let to_us = frame.destination == self.config.controller_address;
        if !to_us && frame.destination != address::BROADCAST {
            trace!(
                dst = frame.destination,
                src = frame.source,
                cmd = frame.command,
                "ignoring frame addressed to another device"
            );
            return;
        }

        let from_pump = frame.source == self.config.pump_address;

        if commands::is_status_response(frame) {
            if from_pump {
                match commands::parse_status(&frame.data) {
                    Ok(mut status) => {
                        status.last_updated = Some(now);
                        debug!(
                            rpm = status.rpm,
                            watts = status.watts,
                            running = status.running,
                            "status updated"
                        );
                        self.status = status.clone();
                        self.events.push(EngineEvent::StatusUpdated { status });
                    }
                    Err(e) => warn!(error = %e, "malformed status payload"),
                }
            } else {
                trace!(src = frame.source, "status from unconfigured pump ignored");
            }
        }

        // A response resolves the outstanding command when it comes from
        // our pump, directly to us, echoing the CFI. Broadcast status
        // frames refresh the snapshot above but resolve nothing.
        let resolves = to_us
            && from_pump
            && self
                .outstanding
                .as_ref()
                .is_some_and(|p| p.command_id == frame.command);
        if resolves {
            if let Some(pending) = self.outstanding.take() {
                debug!(
                    command = %pending.command,
                    attempts = pending.attempts,
                    "command acknowledged"
                );
                if pending.origin == Origin::Collaborator {
                    self.events.push(EngineEvent::CommandCompleted {
                        command: pending.command,
                    });
                    // Entering an external program arms the repeat
                    // obligation. Repeat-origin completions leave the
                    // cadence alone — next_due was set at dispatch.
                    if let Some(mode) = pending.command.selected_mode() {
                        if mode.is_external_program() {
                            self.arm_repeat(pending.command, mode, now);
                        }
                    }
                }
            }
        }
    }

    /// Drive deadlines: response timeout/retry, the external-program
    /// repeat, the idle poll, and dispatch of the next queued command.
    ///
    /// Must be called at a bounded cadence. Returns at most one frame of
    /// wire bytes to transmit.
    pub fn tick(&mut self, now: Instant) -> Option<Vec<u8>> {
        // Response deadline.
        if self
            .outstanding
            .as_ref()
            .is_some_and(|p| now >= p.deadline)
        {
            let can_retry = self
                .outstanding
                .as_ref()
                .is_some_and(|p| p.attempts <= self.config.max_retries);
            if can_retry {
                if let Some(pending) = self.outstanding.as_mut() {
                    pending.attempts += 1;
                    pending.deadline = now + self.config.response_timeout;
                    self.stats.retries += 1;
                    self.stats.frames_sent += 1;
                    warn!(
                        command = %pending.command,
                        attempt = pending.attempts,
                        "response timeout, retransmitting"
                    );
                    return Some(pending.wire_bytes.clone());
                }
            } else if let Some(pending) = self.outstanding.take() {
                self.stats.response_timeouts += 1;
                // Stale, not cleared: the last good data is still the
                // best guess, it is just old.
                self.status.stale = true;
                warn!(
                    command = %pending.command,
                    attempts = pending.attempts,
                    "command failed, retry budget exhausted"
                );
                self.events.push(EngineEvent::CommandFailed {
                    command: pending.command,
                    attempts: pending.attempts,
                });
            }
        }

        // External-program repeat: ahead of any queued poll.
        if let Some(rep) = self.repeat {
            if now >= rep.next_due {
                let already_queued = self.queue.iter().any(|q| q.origin == Origin::Repeat);
                let in_flight = self
                    .outstanding
                    .as_ref()
                    .is_some_and(|p| p.origin == Origin::Repeat);
                if !already_queued && !in_flight {
                    debug!(mode = %rep.mode, "external-program repeat due");
                    self.queue.push_front(Queued {
                        command: rep.command,
                        origin: Origin::Repeat,
                    });
                }
            }
        }

        // Idle poll: keeps status fresh with no command traffic.
        if now >= self.last_activity + self.config.poll_interval {
            self.enqueue_poll();
        }

        // Dispatch next if the line is free.
        if self.outstanding.is_none() {
            while let Some(next) = self.queue.pop_front() {
                match commands::encode_command(
                    next.command,
                    self.config.pump_address,
                    self.config.controller_address,
                ) {
                    Ok(bytes) => {
                        debug!(command = %next.command, "dispatching");
                        self.outstanding = Some(Pending {
                            command: next.command,
                            origin: next.origin,
                            command_id: commands::command_id(next.command),
                            wire_bytes: bytes.clone(),
                            deadline: now + self.config.response_timeout,
                            attempts: 1,
                        });
                        self.stats.frames_sent += 1;
                        self.last_activity = now;
                        if next.origin == Origin::Repeat {
                            if let Some(rep) = self.repeat.as_mut() {
                                rep.next_due = now + self.config.repeat_interval;
                            }
                        }
                        return Some(bytes);
                    }
                    Err(e) => {
                        // Unreachable for the fixed command payloads, but
                        // surface and drop rather than wedge the queue.
                        error!(command = %next.command, error = %e, "failed to encode command");
                        self.events.push(EngineEvent::CommandFailed {
                            command: next.command,
                            attempts: 0,
                        });
                    }
                }
            }
        }

        None
    }

    /// Fold one reassembler feed outcome into stats and events.
    pub fn record_feed(&mut self, feed: &FeedResult) {
        self.stats.bytes_discarded += feed.discarded as u64;
        self.stats.checksum_errors += feed.bad_checksums as u64;
        if feed.overrun > 0 {
            self.stats.overruns += 1;
            self.events.push(EngineEvent::BufferOverrun {
                dropped: feed.overrun,
            });
        }
    }

    /// Read-only snapshot of the last-known pump status.
    pub fn current_status(&self) -> PumpStatus {
        self.status.clone()
    }

    /// Snapshot of the link counters.
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// The command currently awaiting a response, if any.
    pub fn outstanding_command(&self) -> Option<PumpCommand> {
        self.outstanding.as_ref().map(|p| p.command)
    }

    /// The armed external-program mode, if any.
    pub fn repeat_mode(&self) -> Option<PumpMode> {
        self.repeat.map(|r| r.mode)
    }

    /// Drain events accumulated since the last call.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    fn enqueue_poll(&mut self) {
        let poll_in_flight = self
            .outstanding
            .as_ref()
            .is_some_and(|p| p.origin == Origin::Poll);
        let poll_queued = self.queue.iter().any(|q| q.origin == Origin::Poll);
        if poll_in_flight || poll_queued {
            return;
        }
        trace!("status poll enqueued");
        self.queue.push_back(Queued {
            command: PumpCommand::QueryStatus,
            origin: Origin::Poll,
        });
    }

    fn arm_repeat(&mut self, command: PumpCommand, mode: PumpMode, now: Instant) {
        let previous = self.repeat.map(|r| r.mode);
        self.repeat = Some(RepeatState {
            command,
            mode,
            next_due: now + self.config.repeat_interval,
        });
        if previous != Some(mode) {
            debug!(mode = %mode, "external-program repeat armed");
            self.events.push(EngineEvent::ExternalProgramArmed { mode });
        }
    }

    fn disarm_repeat(&mut self) {
        if self.repeat.take().is_some() {
            self.queue.retain(|q| q.origin != Origin::Repeat);
            debug!("external-program repeat disarmed");
            self.events.push(EngineEvent::ExternalProgramCancelled);
        }
    }
}
