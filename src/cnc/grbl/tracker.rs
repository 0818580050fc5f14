use std::{collections::VecDeque, time::Duration};

use ndarray::{s, Array1};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    cnc::{
        gcode::{
            geometry::{offset_arc_center, radius_arc_center},
            parser::parse_words,
            ArcParameters, AxisValues, CoordinateMode, GCode, ModalState, MotionMode, Word,
            AXIS_COUNT,
        },
        simulator::{step_length, HandleGeneration, SimulationHandle, StepOutcome, Trajectory},
    },
    config::TrackerConfig,
    util::format_bytes::format_bytes,
};

use super::{
    buffer::CommandBuffer,
    messages::{GrblMessage, GrblPosition, GrblStatus, RunState},
    parser::parse_grbl_line,
    realtime::RealtimeCommand,
};

pub const SYSTEM_PREFIX: &str = "$";
pub const JOG_PREFIX: &str = "$J=";

#[derive(Debug, Error, PartialEq)]
pub enum TrackerError {
    #[error("could not parse {line:?}: {description}")]
    Parse { line: String, description: String },
    #[error("command is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MotionKind {
    Program,
    Jog,
}

/// A motion resolved against the modal state in force when its line was sent.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionRequest {
    pub mode: MotionMode,
    pub distance_mode: CoordinateMode,
    pub arc_center_mode: CoordinateMode,
    pub target: AxisValues,
    pub feed_rate: f64,
    pub arc: Option<ArcParameters>,
}

#[derive(Debug, Clone)]
struct QueuedMotion {
    command: Vec<u8>,
    request: MotionRequest,
}
impl QueuedMotion {
    fn kind(&self) -> MotionKind {
        if self.command.starts_with(JOG_PREFIX.as_bytes()) {
            MotionKind::Jog
        } else {
            MotionKind::Program
        }
    }
}

#[derive(Debug)]
struct ActiveMotion {
    handle: SimulationHandle,
    kind: MotionKind,
    trajectory: Trajectory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerSnapshot {
    pub run_state: RunState,
    pub position: Vec<f64>,
    pub in_motion: bool,
    pub motion_kind: Option<MotionKind>,
    pub queued: usize,
    pub buffered_bytes: usize,
    pub reported_feed: Option<f64>,
}

/*
    Everything known about one connected controller. Outgoing commands go through `send_command`,
incoming lines through `receive_message`; between status reports an external scheduler calls `tick`
once per tick interval to move the simulated tool.
*/
pub struct MachineTracker {
    modal: ModalState,
    position: Array1<f64>,
    run_state: RunState,
    buffer: CommandBuffer,
    queue: VecDeque<QueuedMotion>,
    active: Option<ActiveMotion>,
    handles: HandleGeneration,
    simulate_motion: bool,
    held: bool,
    tick_interval: Duration,
    work_coordinate_offset: Option<Array1<f64>>,
    reported_feed: Option<f64>,
}

impl MachineTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        MachineTracker {
            modal: ModalState::default(),
            position: Array1::zeros(AXIS_COUNT),
            run_state: RunState::Idle,
            buffer: CommandBuffer::new(config.buffer_capacity),
            queue: VecDeque::new(),
            active: None,
            handles: HandleGeneration::default(),
            simulate_motion: config.simulate_motion,
            held: false,
            tick_interval: config.tick_interval(),
            work_coordinate_offset: None,
            reported_feed: None,
        }
    }

    pub fn would_overflow(&self, command: &[u8]) -> bool {
        self.buffer.would_overflow(command)
    }
    /// Records `command` as written to the controller and applies its effects.
    ///
    /// A line that fails to parse still occupies controller buffer space, but leaves modal and
    /// motion state untouched.
    pub fn send_command(&mut self, command: &[u8]) -> Result<(), TrackerError> {
        if command.is_empty() {
            warn!("ignoring empty command");
            return Ok(());
        }
        if let Some(realtime) = RealtimeCommand::from_command(command) {
            self.handle_realtime(realtime);
            return Ok(());
        }
        self.buffer.register_sent(command);
        debug!("sent {}", format_bytes(command));

        let line = std::str::from_utf8(command).map_err(|_| {
            warn!("skipping non UTF-8 command {}", format_bytes(command));
            TrackerError::InvalidUtf8
        })?;
        if let Some(payload) = line.strip_prefix(JOG_PREFIX) {
            self.handle_jog(command, payload)
        } else if line.starts_with(SYSTEM_PREFIX) {
            Ok(())
        } else {
            self.handle_standard(command, line)
        }
    }
    /// Applies one line received from the controller and returns how it was understood.
    pub fn receive_message(&mut self, line: &str) -> GrblMessage {
        let message = parse_grbl_line(line);
        match &message {
            GrblMessage::GrblOk => self.buffer.register_ack(),
            GrblMessage::GrblError(code) => {
                self.buffer.register_error();
                match code {
                    Some(code) => warn!("controller error {}: {}", code, GrblMessage::get_error_text(*code)),
                    None => warn!("controller error"),
                }
            }
            GrblMessage::GrblAlarm(code) => {
                warn!("controller alarm {}: {}", code, GrblMessage::get_alarm_text(*code))
            }
            GrblMessage::GrblGreeting(version) => {
                info!("controller reset (Grbl {})", version);
                self.reset();
            }
            GrblMessage::StatusEvent(status) => self.apply_status(status),
            GrblMessage::ProbeEvent(probe) => debug!("probe finished: {:?}", probe),
            GrblMessage::Unrecognized(text) => warn!("unrecognized controller line {:?}", text),
        }
        message
    }
    /// Advances whatever motion is active by one tick, starting queued motions as earlier ones
    /// finish.
    pub fn tick(&mut self) {
        if self.held || !self.simulate_motion {
            return;
        }
        match self.active.as_ref().map(|active| active.handle) {
            Some(handle) => {
                self.tick_motion(handle);
            }
            None => self.drain_queue(),
        }
    }
    /// Advances the motion identified by `handle`. Returns false, doing nothing, if that motion
    /// is no longer the active one.
    pub fn tick_motion(&mut self, handle: SimulationHandle) -> bool {
        let active = match &mut self.active {
            Some(active) if active.handle == handle => active,
            _ => {
                debug!("ignoring tick for finished motion {:?}", handle);
                return false;
            }
        };
        if self.held {
            return true;
        }
        if active.trajectory.advance(&mut self.position) == StepOutcome::Complete {
            debug!("{:?} motion complete at {}", active.kind, self.position);
            self.active = None;
            self.drain_queue();
        }
        true
    }
    /// Disabling simulation drops the active motion and everything queued behind it.
    pub fn set_simulation_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.active = None;
            self.queue.clear();
        }
        self.simulate_motion = enabled;
    }

    pub fn position(&self) -> &Array1<f64> {
        &self.position
    }
    pub fn run_state(&self) -> RunState {
        self.run_state
    }
    pub fn modal(&self) -> &ModalState {
        &self.modal
    }
    pub fn buffer(&self) -> &CommandBuffer {
        &self.buffer
    }
    pub fn is_in_motion(&self) -> bool {
        self.active.is_some()
    }
    pub fn is_held(&self) -> bool {
        self.held
    }
    pub fn simulation_enabled(&self) -> bool {
        self.simulate_motion
    }
    pub fn active_motion(&self) -> Option<(SimulationHandle, MotionKind)> {
        self.active.as_ref().map(|active| (active.handle, active.kind))
    }
    /// Raw commands waiting for the active motion to finish, oldest first.
    pub fn queued(&self) -> impl Iterator<Item = &[u8]> {
        self.queue.iter().map(|queued| queued.command.as_slice())
    }
    pub fn work_coordinate_offset(&self) -> Option<&Array1<f64>> {
        self.work_coordinate_offset.as_ref()
    }
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            run_state: self.run_state,
            position: self.position.to_vec(),
            in_motion: self.is_in_motion(),
            motion_kind: self.active.as_ref().map(|active| active.kind),
            queued: self.queue.len(),
            buffered_bytes: self.buffer.pending_size(),
            reported_feed: self.reported_feed,
        }
    }

    fn handle_standard(&mut self, command: &[u8], line: &str) -> Result<(), TrackerError> {
        let words = parse_line(line)?;
        let line_words = self.modal.apply_words(&words);
        if line_words.target.is_empty() || !self.simulate_motion {
            return Ok(());
        }
        let request = MotionRequest {
            mode: self.modal.motion_mode,
            distance_mode: self.modal.distance_mode,
            arc_center_mode: self.modal.arc_center_mode,
            target: line_words.target,
            feed_rate: self.modal.feed_rate,
            arc: line_words.arc_parameters(),
        };
        self.submit(command, request);
        Ok(())
    }
    // Jog words are read into locals: G90/G91 and F apply to this jog only.
    fn handle_jog(&mut self, command: &[u8], payload: &str) -> Result<(), TrackerError> {
        let words = parse_line(payload)?;
        let mut distance_mode = self.modal.distance_mode;
        let mut feed_rate = self.modal.feed_rate;
        let mut target = AxisValues::default();
        for word in &words {
            match word {
                Word::G(GCode::SetCoordinateMode(mode)) => distance_mode = *mode,
                Word::Axis(axis, value) => target.set(*axis, *value),
                Word::Feed(feed) => feed_rate = *feed,
                _ => (),
            }
        }
        if target.is_empty() || !self.simulate_motion {
            return Ok(());
        }
        let request = MotionRequest {
            mode: MotionMode::Linear,
            distance_mode,
            arc_center_mode: self.modal.arc_center_mode,
            target,
            feed_rate,
            arc: None,
        };
        self.submit(command, request);
        Ok(())
    }
    fn submit(&mut self, command: &[u8], request: MotionRequest) {
        let queued = QueuedMotion {
            command: command.to_vec(),
            request,
        };
        if self.active.is_some() || !self.queue.is_empty() {
            debug!("queueing {}", format_bytes(command));
            self.queue.push_back(queued);
        } else {
            self.dispatch(queued.kind(), &queued.request);
        }
    }
    fn drain_queue(&mut self) {
        while self.active.is_none() {
            match self.queue.pop_front() {
                Some(queued) => {
                    debug!("starting queued {}", format_bytes(&queued.command));
                    self.dispatch(queued.kind(), &queued.request);
                }
                None => break,
            }
        }
    }

    fn dispatch(&mut self, kind: MotionKind, request: &MotionRequest) {
        let step = step_length(request.feed_rate, self.tick_interval);
        let target = self.resolve_target(request);
        let trajectory = match request.mode {
            MotionMode::Rapid => {
                debug!("rapid to {} left to the next status report", target);
                None
            }
            MotionMode::Linear => {
                let delta = &target - &self.position;
                if delta.iter().all(|component| *component == 0.0) {
                    return;
                }
                if step <= 0.0 {
                    warn!("no feed rate set; move to {} not simulated", target);
                    return;
                }
                Trajectory::linear(&self.position, &delta, step)
            }
            MotionMode::Arc(orientation) => {
                let start = (self.position[0], self.position[1]);
                let end = (target[0], target[1]);
                let center = match request.arc {
                    Some(ArcParameters::Radius(radius)) => {
                        match radius_arc_center(start, end, radius, orientation) {
                            Ok(center) => center,
                            Err(error) => {
                                warn!("arc to {} not simulated: {}", target, error);
                                return;
                            }
                        }
                    }
                    Some(ArcParameters::Offsets(offsets)) => {
                        offset_arc_center(start, offsets, request.arc_center_mode)
                    }
                    None => {
                        warn!("arc to {} has neither R nor I/J words", target);
                        return;
                    }
                };
                if step <= 0.0 {
                    warn!("no feed rate set; arc to {} not simulated", target);
                    return;
                }
                let z_travel = target[2] - self.position[2];
                Trajectory::arc(start, end, center, orientation, z_travel, step)
            }
        };
        if let Some(trajectory) = trajectory {
            let handle = self.handles.advance();
            debug!("{:?} motion {:?} over {:.3}", kind, handle, trajectory.length());
            self.active = Some(ActiveMotion {
                handle,
                kind,
                trajectory,
            });
        }
    }
    fn resolve_target(&self, request: &MotionRequest) -> Array1<f64> {
        (0..AXIS_COUNT)
            .map(|axis| {
                let current = self.position[axis];
                match (request.distance_mode, request.target.get(axis)) {
                    (CoordinateMode::Absolute, Some(value)) => value,
                    (CoordinateMode::Incremental, Some(value)) => current + value,
                    (_, None) => current,
                }
            })
            .collect()
    }

    fn handle_realtime(&mut self, command: RealtimeCommand) {
        match command {
            RealtimeCommand::StatusReport => debug!("status report requested"),
            RealtimeCommand::JogCancel => self.cancel_jog(),
            RealtimeCommand::Reset => {
                info!("soft reset sent");
                self.reset();
            }
            RealtimeCommand::FeedHold => self.held = true,
            RealtimeCommand::CycleStart => self.held = false,
            other => debug!("realtime {:?} has no effect on the simulation", other),
        }
    }
    fn cancel_jog(&mut self) {
        if let Some(ActiveMotion { kind: MotionKind::Jog, .. }) = self.active {
            self.active = None;
        }
        let before = self.queue.len();
        self.queue.retain(|queued| queued.kind() != MotionKind::Jog);
        debug!("jog cancelled; {} queued jogs dropped", before - self.queue.len());
    }
    // The controller forgets its buffer and parser state on reset; position is kept.
    fn reset(&mut self) {
        self.buffer.clear();
        self.queue.clear();
        self.active = None;
        self.held = false;
        self.modal = ModalState::default();
    }

    fn apply_status(&mut self, status: &GrblStatus) {
        if let Some(offset) = &status.work_coordinate_offset {
            self.work_coordinate_offset = Some(offset.clone());
        }
        match status.machine_position(self.work_coordinate_offset.as_ref()) {
            Some(position) if position.len() >= AXIS_COUNT => {
                self.position = position.slice(s![..AXIS_COUNT]).to_owned();
            }
            Some(position) => warn!("status position {} has too few axes", position),
            None => {
                if let Some(GrblPosition::Work(_)) = status.position {
                    debug!("work position reported before any work offset");
                }
            }
        }
        match status.state {
            Some(state) => self.run_state = state,
            None => debug!("unknown state {:?}", status.state_token),
        }
        if let Some(feed) = status.current_feed {
            self.reported_feed = Some(feed);
        }
        if let Some(rx_free) = status.rx_bytes {
            let expected = self
                .buffer
                .capacity()
                .saturating_sub(self.buffer.pending_size());
            if rx_free as usize != expected {
                debug!("controller reports {} bytes free, ledger expects {}", rx_free, expected);
            }
        }
    }
}

fn parse_line(line: &str) -> Result<Vec<Word>, TrackerError> {
    parse_words(line).map_err(|error| {
        warn!("skipping {:?}: {} at {:?}", line, error.description, error.remaining);
        TrackerError::Parse {
            line: line.to_string(),
            description: error.description,
        }
    })
}
