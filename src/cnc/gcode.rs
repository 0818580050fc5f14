pub mod geometry;
pub mod parser;

use serde::Serialize;

pub const AXIS_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unit {
    Inch,
    Millimeter,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoordinateMode {
    Absolute,
    Incremental,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orientation {
    Clockwise,
    Counterclockwise,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MotionMode {
    Rapid,
    Linear,
    Arc(Orientation),
}

// G codes the tracker interprets. Everything else is carried through as `Other` and ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum GCode {
    Motion(MotionMode),
    SetUnits(Unit),
    SetCoordinateMode(CoordinateMode),
    SetArcCenterMode(CoordinateMode),
    Other(String),
}
impl GCode {
    pub fn from_number(number: &str) -> GCode {
        match number {
            "0" | "00" => GCode::Motion(MotionMode::Rapid),
            "1" | "01" => GCode::Motion(MotionMode::Linear),
            "2" | "02" => GCode::Motion(MotionMode::Arc(Orientation::Clockwise)),
            "3" | "03" => GCode::Motion(MotionMode::Arc(Orientation::Counterclockwise)),
            "20" => GCode::SetUnits(Unit::Inch),
            "21" => GCode::SetUnits(Unit::Millimeter),
            "90" => GCode::SetCoordinateMode(CoordinateMode::Absolute),
            "91" => GCode::SetCoordinateMode(CoordinateMode::Incremental),
            "90.1" => GCode::SetArcCenterMode(CoordinateMode::Absolute),
            "91.1" => GCode::SetArcCenterMode(CoordinateMode::Incremental),
            other => GCode::Other(other.to_string()),
        }
    }
}

/// One `(letter, value)` word of a command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Word {
    G(GCode),
    Axis(usize, f64), // X, Y, Z as 0, 1, 2
    Feed(f64),
    Radius(f64),
    Offset(usize, f64), // I, J as 0, 1
    Other(char, f64),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisValues(pub [Option<f64>; AXIS_COUNT]);
impl AxisValues {
    pub fn set(&mut self, axis: usize, value: f64) {
        self.0[axis] = Some(value);
    }
    pub fn get(&self, axis: usize) -> Option<f64> {
        self.0[axis]
    }
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArcParameters {
    Radius(f64),
    Offsets([Option<f64>; 2]),
}

/// Everything a single line asked for, before it is applied to the machine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineWords {
    pub target: AxisValues,
    pub radius: Option<f64>,
    pub offsets: [Option<f64>; 2],
}
impl LineWords {
    pub fn arc_parameters(&self) -> Option<ArcParameters> {
        match self.radius {
            Some(radius) => Some(ArcParameters::Radius(radius)),
            None if self.offsets.iter().any(Option::is_some) => {
                Some(ArcParameters::Offsets(self.offsets))
            }
            None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModalState {
    pub distance_mode: CoordinateMode,
    pub arc_center_mode: CoordinateMode,
    pub unit: Unit,
    pub motion_mode: MotionMode,
    pub feed_rate: f64,
}
impl Default for ModalState {
    fn default() -> Self {
        ModalState {
            distance_mode: CoordinateMode::Absolute,
            arc_center_mode: CoordinateMode::Incremental,
            unit: Unit::Millimeter,
            motion_mode: MotionMode::Linear,
            feed_rate: 0.0,
        }
    }
}
impl ModalState {
    /// Applies the words of one line: modal words update `self`, the rest are collected.
    pub fn apply_words(&mut self, words: &[Word]) -> LineWords {
        let mut line = LineWords::default();
        for word in words {
            match word {
                Word::G(GCode::Motion(mode)) => self.motion_mode = *mode,
                Word::G(GCode::SetUnits(unit)) => self.unit = *unit,
                Word::G(GCode::SetCoordinateMode(mode)) => self.distance_mode = *mode,
                Word::G(GCode::SetArcCenterMode(mode)) => self.arc_center_mode = *mode,
                Word::G(GCode::Other(_)) => (),
                Word::Axis(axis, value) => line.target.set(*axis, *value),
                Word::Feed(feed) => self.feed_rate = *feed,
                Word::Radius(radius) => line.radius = Some(*radius),
                Word::Offset(axis, value) => line.offsets[*axis] = Some(*value),
                Word::Other(_, _) => (),
            }
        }
        line
    }
}
