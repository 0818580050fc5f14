use std::borrow::Cow;

use ndarray::Array1;
use serde::Serialize;

// See: the Real-time Status Reports section at:  https://github.com/gnea/grbl/blob/master/doc/markdown/interface.md
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Alarm,
    CheckMode,
    Homing,
    Cycle,
    Hold,
    Jog,
    SafetyDoor,
    Sleep,
}
impl RunState {
    /// Maps a report's state token (without any `:substate` suffix).
    pub fn from_token(token: &str) -> Option<RunState> {
        match token {
            "Idle" => Some(RunState::Idle),
            "Run" => Some(RunState::Cycle),
            "Hold" => Some(RunState::Hold),
            "Jog" => Some(RunState::Jog),
            "Home" => Some(RunState::Homing),
            "Alarm" => Some(RunState::Alarm),
            "Check" => Some(RunState::CheckMode),
            "Door" => Some(RunState::SafetyDoor),
            "Sleep" => Some(RunState::Sleep),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GrblPosition {
    Machine(Array1<f64>),
    Work(Array1<f64>),
}
#[derive(Debug, Clone, PartialEq)]
pub struct GrblStatus {
    pub state: Option<RunState>,
    pub state_token: String,
    pub position: Option<GrblPosition>,
    pub current_feed: Option<f64>,
    pub current_spindle: Option<f64>,
    pub planner: Option<u64>,
    pub rx_bytes: Option<u64>,
    pub work_coordinate_offset: Option<Array1<f64>>,
    pub line_number: Option<u64>,
    pub pins: Option<String>,
    pub overrides: Option<(u8, u8, u8)>,
    pub accessory_state: Option<String>,
    pub unknown_terms: Vec<String>,
}
impl GrblStatus {
    pub fn new(state_token: &str, position: Option<GrblPosition>) -> Self {
        let base_token = state_token.split(':').next().unwrap_or(state_token);
        GrblStatus {
            state: RunState::from_token(base_token),
            state_token: state_token.to_string(),
            position,
            current_feed: None,
            current_spindle: None,
            planner: None,
            rx_bytes: None,
            work_coordinate_offset: None,
            line_number: None,
            pins: None,
            overrides: None,
            accessory_state: None,
            unknown_terms: Vec::new(),
        }
    }
    /// Machine position, converting a work position with the report's or a remembered offset.
    pub fn machine_position(&self, remembered_offset: Option<&Array1<f64>>) -> Option<Array1<f64>> {
        match &self.position {
            Some(GrblPosition::Machine(position)) => Some(position.clone()),
            Some(GrblPosition::Work(position)) => self
                .work_coordinate_offset
                .as_ref()
                .or(remembered_offset)
                .filter(|offset| offset.len() == position.len())
                .map(|offset| position + offset),
            None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeEvent {
    pub success: bool,
    pub position: Array1<f64>,
}
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, PartialEq)]
pub enum GrblMessage {
    ProbeEvent(ProbeEvent),
    StatusEvent(GrblStatus),
    GrblError(Option<u64>),
    GrblAlarm(u64),
    GrblOk,
    GrblGreeting(String),
    Unrecognized(String),
}
impl GrblMessage {
    /// Whether the message retires the oldest line in the controller's receive buffer.
    pub fn is_acknowledgement(&self) -> bool {
        matches!(self, GrblMessage::GrblOk | GrblMessage::GrblError(_))
    }
    pub fn get_alarm_text(index: u64) -> Cow<'static, str> {
        match index {
            1 => "Hard limit triggered; position likely lost, re-home.".into(),
            2 => "Motion target exceeds machine travel; position retained.".into(),
            3 => "Reset while in motion; position likely lost, re-home.".into(),
            4 => "Probe fail: probe not in the expected initial state.".into(),
            5 => "Probe fail: no contact within programmed travel.".into(),
            6 => "Homing fail: reset during homing cycle.".into(),
            7 => "Homing fail: safety door opened during homing.".into(),
            8 => "Homing fail: could not clear limit switch on pull-off.".into(),
            9 => "Homing fail: limit switch not found within search distance.".into(),
            _ => Cow::Owned(format!("Unknown ALARM:{}", index)),
        }
    }
    pub fn get_error_text(index: u64) -> Cow<'static, str> {
        match index {
            1 => "Word letter missing.".into(),
            2 => "Numeric value invalid or missing.".into(),
            3 => "'$' system command not recognized.".into(),
            8 => "'$' command only valid when idle.".into(),
            9 => "G-code locked out during alarm or jog.".into(),
            11 => "Line exceeds the maximum line length.".into(),
            15 => "Jog target exceeds machine travel.".into(),
            16 => "Jog command has no '=' or contains prohibited g-code.".into(),
            20 => "Unsupported or invalid g-code command.".into(),
            22 => "Feed rate undefined.".into(),
            33 => "Invalid motion target for arc or probe.".into(),
            34 => "Arc radius definition could not be solved.".into(),
            35 => "Arc offset definition missing the IJK word in plane.".into(),
            _ => Cow::Owned(format!("Unknown error:{}", index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn state_tokens() {
        assert_eq!(RunState::from_token("Run"), Some(RunState::Cycle));
        assert_eq!(RunState::from_token("Door"), Some(RunState::SafetyDoor));
        assert_eq!(RunState::from_token("idle"), None);
        assert_eq!(GrblStatus::new("Hold:1", None).state, Some(RunState::Hold));
    }

    #[test]
    fn work_position_uses_offset() {
        let mut status = GrblStatus::new("Idle", Some(GrblPosition::Work(array![1.0, 2.0, 3.0])));
        assert_eq!(status.machine_position(None), None);
        let remembered = array![10.0, 10.0, 10.0];
        assert_eq!(status.machine_position(Some(&remembered)), Some(array![11.0, 12.0, 13.0]));
        status.work_coordinate_offset = Some(array![-1.0, -2.0, -3.0]);
        assert_eq!(status.machine_position(Some(&remembered)), Some(array![0.0, 0.0, 0.0]));
    }
}
