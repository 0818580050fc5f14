use std::{f64::consts::TAU, time::Duration};

use ndarray::Array1;

use super::gcode::{
    geometry::{angle_of, arc_length, circumference, tuple_dif, tuple_mag, Point},
    Orientation,
};

pub const MILLISECONDS_PER_MINUTE: f64 = 60_000.0;

/// Identifies one scheduled motion. A tick carrying a stale handle does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationHandle(u64);

#[derive(Debug, Default)]
pub struct HandleGeneration {
    generation: u64,
}
impl HandleGeneration {
    pub fn advance(&mut self) -> SimulationHandle {
        self.generation += 1;
        SimulationHandle(self.generation)
    }
}

/// Distance covered in one tick at `feed_rate` units per minute.
pub fn step_length(feed_rate: f64, tick_interval: Duration) -> f64 {
    feed_rate * tick_interval.as_millis() as f64 / MILLISECONDS_PER_MINUTE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Complete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Trajectory {
    Linear {
        start: Array1<f64>,
        step: Array1<f64>,
        distance: f64,
        step_length: f64,
    },
    Arc {
        center: Point,
        angular_step: f64,
        z_step: f64,
        arc_length: f64,
        travelled: f64,
        step_length: f64,
    },
}

impl Trajectory {
    /// Straight move by `delta` from `start`. `None` when there is nothing to simulate.
    pub fn linear(start: &Array1<f64>, delta: &Array1<f64>, step_length: f64) -> Option<Trajectory> {
        let distance = delta.dot(delta).sqrt();
        if distance == 0.0 || step_length <= 0.0 || !distance.is_finite() {
            return None;
        }
        Some(Trajectory::Linear {
            start: start.clone(),
            step: delta * (step_length / distance),
            distance,
            step_length,
        })
    }
    /// Arc in the XY plane around `center`, sized by the center-to-end radius. Z moves by
    /// `z_travel` in proportion to the arc covered, giving a helix.
    pub fn arc(
        start: Point,
        end: Point,
        center: Point,
        orientation: Orientation,
        z_travel: f64,
        step_length: f64,
    ) -> Option<Trajectory> {
        let radius = tuple_mag(tuple_dif(end, center));
        if radius == 0.0 || step_length <= 0.0 || !radius.is_finite() {
            return None;
        }
        let increment = TAU * step_length / circumference(radius);
        let angular_step = match orientation {
            Orientation::Clockwise => -increment,
            Orientation::Counterclockwise => increment,
        };
        let arc_length = arc_length(start, end, center, orientation);
        Some(Trajectory::Arc {
            center,
            angular_step,
            z_step: z_travel * step_length / arc_length,
            arc_length,
            travelled: 0.0,
            step_length,
        })
    }
    pub fn length(&self) -> f64 {
        match self {
            Trajectory::Linear { distance, .. } => *distance,
            Trajectory::Arc { arc_length, .. } => *arc_length,
        }
    }
    /// Moves `position` by one tick. Stops once less than one more step remains, without
    /// snapping onto the end point.
    pub fn advance(&mut self, position: &mut Array1<f64>) -> StepOutcome {
        let (remaining, step_length) = match self {
            Trajectory::Linear {
                start,
                step,
                distance,
                step_length,
            } => {
                *position += &*step;
                let travelled_vector = &*position - &*start;
                let travelled = travelled_vector.dot(&travelled_vector).sqrt();
                (*distance - travelled, *step_length)
            }
            Trajectory::Arc {
                center,
                angular_step,
                z_step,
                arc_length,
                travelled,
                step_length,
            } => {
                let offset = (position[0] - center.0, position[1] - center.1);
                let radius = tuple_mag(offset);
                let angle = angle_of(offset) + *angular_step;
                position[0] = center.0 + radius * angle.cos();
                position[1] = center.1 + radius * angle.sin();
                position[2] += *z_step;
                *travelled += *step_length;
                (*arc_length - *travelled, *step_length)
            }
        };
        if remaining > step_length {
            StepOutcome::Continue
        } else {
            StepOutcome::Complete
        }
    }
}
