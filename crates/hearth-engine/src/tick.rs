//! Fixed-timestep tick scheduling for a [`Room`].
//!
//! Each tick runs four phases in a fixed order:
//!
//! 1. **input**: buffered client intent steers player bodies.
//! 2. **physics_step**: the rapier world advances one fixed step.
//! 3. **sync**: ECS positions/velocities and replicated views are refreshed
//!    from the bodies.
//! 4. **replicate**: players entering or leaving the replicated set gain or
//!    lose their view.
//!
//! A phase that fails recoverably (a stale body handle, say) aborts the rest
//! of that tick only; the next tick starts from the input phase again. A
//! fatal failure means the physics world can no longer be trusted: the room
//! is torn down, every client is forced out, and no further ticks run.
//!
//! # Example
//!
//! ```
//! use hearth_engine::prelude::*;
//!
//! let room = Room::new(RoomConfig::default(), Box::new(FlatTerrain { height: 0.0 })).unwrap();
//! let mut scheduler = TickScheduler::new(room);
//!
//! scheduler.room_mut().on_join("alice".into()).unwrap();
//! assert!(matches!(scheduler.tick(), TickReport::Completed { tick: 1 }));
//! assert_eq!(scheduler.room().replicated().players().len(), 1);
//! ```

use std::fmt;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::PhysicsError;
use crate::replicate::ReplicatedState;
use crate::room::Room;
use crate::session::SessionId;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// One step of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Input,
    PhysicsStep,
    Sync,
    Replicate,
}

impl Phase {
    /// Execution order within a tick.
    pub const ALL: [Phase; 4] = [Phase::Input, Phase::PhysicsStep, Phase::Sync, Phase::Replicate];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Input => "input",
            Phase::PhysicsStep => "physics_step",
            Phase::Sync => "sync",
            Phase::Replicate => "replicate",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics / TickReport
// ---------------------------------------------------------------------------

/// Timing diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per phase that ran, in execution order.
    pub phase_times: Vec<(Phase, Duration)>,
    pub total_time: Duration,
}

/// Outcome of a single [`TickScheduler::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum TickReport {
    /// All phases ran.
    Completed { tick: u64 },
    /// `phase` failed recoverably; later phases of this tick were skipped.
    Aborted { tick: u64, phase: Phase, error: PhysicsError },
    /// `phase` failed fatally and the room was torn down. `evicted` lists
    /// the sessions that were removed and must be disconnected.
    Fatal {
        tick: u64,
        phase: Phase,
        error: PhysicsError,
        evicted: Vec<SessionId>,
    },
    /// The room was already terminated; nothing ran.
    Halted,
}

// ---------------------------------------------------------------------------
// Network boundary
// ---------------------------------------------------------------------------

/// A client event delivered by the network layer.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Join { session: SessionId },
    /// An `"input"` message.
    Message { session: SessionId, payload: Value },
    Leave { session: SessionId },
}

/// The network layer as seen from the simulation.
pub trait Transport {
    /// Disconnect `session` from the server side.
    fn force_leave(&mut self, session: &SessionId);

    /// Deliver the current replicated state to clients.
    fn publish(&mut self, state: &ReplicatedState);
}

// ---------------------------------------------------------------------------
// TickScheduler
// ---------------------------------------------------------------------------

/// Drives a [`Room`] through its tick phases.
#[derive(Debug)]
pub struct TickScheduler {
    room: Room,
    tick_counter: u64,
    last_diagnostics: TickDiagnostics,
}

impl TickScheduler {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            tick_counter: 0,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    /// Run one tick.
    ///
    /// The counter advances on every attempted tick, including aborted and
    /// fatal ones. A terminated room reports [`TickReport::Halted`] and the
    /// counter stays put.
    pub fn tick(&mut self) -> TickReport {
        if !self.room.is_running() {
            return TickReport::Halted;
        }
        self.tick_counter += 1;
        let tick = self.tick_counter;
        let tick_start = Instant::now();
        let mut phase_times = Vec::with_capacity(Phase::ALL.len());

        let mut report = TickReport::Completed { tick };
        for phase in Phase::ALL {
            let phase_start = Instant::now();
            let result = self.room.run_phase(phase);
            phase_times.push((phase, phase_start.elapsed()));

            let Err(err) = result else {
                continue;
            };
            if err.is_fatal() {
                tracing::error!(tick, phase = %phase, error = %err.source, "fatal tick failure, tearing room down");
                let evicted = self.room.teardown();
                report = TickReport::Fatal {
                    tick,
                    phase,
                    error: err.source,
                    evicted,
                };
            } else {
                tracing::warn!(tick, phase = %phase, error = %err.source, "tick aborted");
                report = TickReport::Aborted {
                    tick,
                    phase,
                    error: err.source,
                };
            }
            break;
        }

        self.last_diagnostics = TickDiagnostics {
            phase_times,
            total_time: tick_start.elapsed(),
        };
        report
    }

    /// Apply one network event immediately.
    ///
    /// A join that fails is rolled back by the room; the client is then
    /// forced to leave.
    pub fn handle_event(&mut self, event: NetworkEvent, transport: &mut dyn Transport) {
        match event {
            NetworkEvent::Join { session } => {
                if let Err(err) = self.room.on_join(session.clone()) {
                    tracing::warn!(session = %session, error = %err, "join failed, forcing leave");
                    transport.force_leave(&session);
                }
            }
            NetworkEvent::Message { session, payload } => {
                self.room.on_message(&session, &payload);
            }
            NetworkEvent::Leave { session } => {
                self.room.on_leave(&session);
            }
        }
    }

    /// Real-time driver.
    ///
    /// Ticks at the room's fixed rate, applying every event the moment it
    /// arrives in between. Deadlines are scheduled from the previous
    /// deadline, not from when the tick finished, so the cadence does not
    /// drift. Returns once the room is terminated or the event channel
    /// disconnects.
    pub fn run(&mut self, events: &Receiver<NetworkEvent>, transport: &mut dyn Transport) -> u64 {
        let interval = self.room.config().tick_interval();
        let mut deadline = Instant::now() + interval;

        while self.room.is_running() {
            let now = Instant::now();
            if now >= deadline {
                match self.tick() {
                    TickReport::Completed { .. } => transport.publish(self.room.replicated()),
                    TickReport::Fatal { evicted, .. } => {
                        for session in &evicted {
                            transport.force_leave(session);
                        }
                        break;
                    }
                    TickReport::Aborted { .. } => {}
                    TickReport::Halted => break,
                }
                deadline += interval;
                if deadline <= Instant::now() {
                    tracing::warn!(tick = self.tick_counter, "tick overran its interval, resetting schedule");
                    deadline = Instant::now() + interval;
                }
                continue;
            }

            match events.recv_timeout(deadline - now) {
                Ok(event) => self.handle_event(event, transport),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!(ticks = self.tick_counter, "event channel closed, stopping");
                    break;
                }
            }
        }
        self.tick_counter
    }

    // -- accessors ----------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Mutable room access for applying network events outside [`run`](Self::run).
    pub fn room_mut(&mut self) -> &mut Room {
        &mut self.room
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }

    pub fn into_room(self) -> Room {
        self.room
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
