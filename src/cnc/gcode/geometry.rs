use std::f64::consts::TAU;

use thiserror::Error;

use super::{CoordinateMode, Orientation};

pub type Point = (f64, f64);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("radius-form arc with coincident start and end points")]
    CoincidentEndpoints,
    #[error("radius too small to reach the end point (4r² - chord² = {centre_displacement_squared})")]
    ImpossibleRadius { centre_displacement_squared: f64 },
}

pub fn tuple_dif(x: Point, y: Point) -> Point {
    (x.0 - y.0, x.1 - y.1)
}
pub fn tuple_sum(x: Point, y: Point) -> Point {
    (x.0 + y.0, x.1 + y.1)
}
fn tuple_mag_sq(x: Point) -> f64 {
    x.0 * x.0 + x.1 * x.1
}
pub fn tuple_mag(x: Point) -> f64 {
    tuple_mag_sq(x).sqrt()
}
pub fn angle_of(x: Point) -> f64 {
    x.1.atan2(x.0)
}

/// Angle swept travelling from `start` to `end` around `center` in the given direction, in (0, 2π].
/// Coincident start and end points sweep a full circle.
pub fn arc_angle(start: Point, end: Point, center: Point, orientation: Orientation) -> f64 {
    let start_angle = angle_of(tuple_dif(start, center));
    let end_angle = angle_of(tuple_dif(end, center));
    let raw = match orientation {
        Orientation::Clockwise => start_angle - end_angle,
        Orientation::Counterclockwise => end_angle - start_angle,
    };
    let angle = raw.rem_euclid(TAU);
    if angle == 0.0 {
        TAU
    } else {
        angle
    }
}
pub fn circumference(radius: f64) -> f64 {
    TAU * radius
}
/// Length of the arc, with the radius taken from the center-to-end distance.
pub fn arc_length(start: Point, end: Point, center: Point, orientation: Orientation) -> f64 {
    let radius = tuple_mag(tuple_dif(end, center));
    arc_angle(start, end, center, orientation) / TAU * circumference(radius)
}

// Same construction the firmware uses: the center sits on the chord's perpendicular bisector,
// a negative radius selecting the arc that sweeps more than half a turn.
pub fn radius_arc_center(
    start: Point,
    end: Point,
    radius: f64,
    orientation: Orientation,
) -> Result<Point, GeometryError> {
    let chord = tuple_dif(end, start);
    let chord_length = tuple_mag(chord);
    if chord_length == 0.0 {
        return Err(GeometryError::CoincidentEndpoints);
    }
    let centre_displacement_squared = 4.0 * radius * radius - tuple_mag_sq(chord);
    if centre_displacement_squared < 0.0 {
        return Err(GeometryError::ImpossibleRadius { centre_displacement_squared });
    }
    let mut scale = -centre_displacement_squared.sqrt() / chord_length;
    if orientation == Orientation::Counterclockwise {
        scale = -scale;
    }
    if radius < 0.0 {
        scale = -scale;
    }
    let offset = (
        0.5 * (chord.0 - chord.1 * scale),
        0.5 * (chord.1 + chord.0 * scale),
    );
    Ok(tuple_sum(start, offset))
}

/// Center given by I/J words. Missing words leave that coordinate at the start point.
pub fn offset_arc_center(start: Point, offsets: [Option<f64>; 2], mode: CoordinateMode) -> Point {
    match mode {
        CoordinateMode::Incremental => (
            start.0 + offsets[0].unwrap_or(0.0),
            start.1 + offsets[1].unwrap_or(0.0),
        ),
        CoordinateMode::Absolute => (offsets[0].unwrap_or(start.0), offsets[1].unwrap_or(start.1)),
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {}, got {}", b, a);
    }

    #[test]
    fn semicircle_from_radius() {
        let center = radius_arc_center((0.0, 0.0), (10.0, 0.0), 5.0, Orientation::Clockwise).unwrap();
        assert_close(tuple_mag(tuple_dif((0.0, 0.0), center)), 5.0);
        assert_close(tuple_mag(tuple_dif((10.0, 0.0), center)), 5.0);
        assert_eq!(
            arc_angle((0.0, 0.0), (10.0, 0.0), center, Orientation::Clockwise),
            PI
        );
        assert_close(arc_length((0.0, 0.0), (10.0, 0.0), center, Orientation::Clockwise), 5.0 * PI);
    }

    #[test]
    fn radius_sign_picks_minor_or_major_arc() {
        let start = (0.0, 0.0);
        let end = (10.0, 0.0);
        let minor = radius_arc_center(start, end, 10.0, Orientation::Clockwise).unwrap();
        let major = radius_arc_center(start, end, -10.0, Orientation::Clockwise).unwrap();
        assert_close(tuple_mag(tuple_dif(start, minor)), 10.0);
        assert_close(tuple_mag(tuple_dif(end, major)), 10.0);
        assert!(arc_angle(start, end, minor, Orientation::Clockwise) < PI);
        assert!(arc_angle(start, end, major, Orientation::Clockwise) > PI);
    }

    #[test]
    fn clockwise_and_counterclockwise_centers_mirror() {
        let cw = radius_arc_center((0.0, 0.0), (10.0, 0.0), 10.0, Orientation::Clockwise).unwrap();
        let ccw = radius_arc_center((0.0, 0.0), (10.0, 0.0), 10.0, Orientation::Counterclockwise).unwrap();
        assert_close(cw.0, ccw.0);
        assert_close(cw.1, -ccw.1);
    }

    #[test]
    fn impossible_radius_is_rejected() {
        let result = radius_arc_center((0.0, 0.0), (10.0, 0.0), 4.0, Orientation::Clockwise);
        assert!(matches!(result, Err(GeometryError::ImpossibleRadius { .. })));
    }

    #[test]
    fn coincident_endpoints_are_rejected() {
        let result = radius_arc_center((3.0, 3.0), (3.0, 3.0), 4.0, Orientation::Counterclockwise);
        assert_eq!(result, Err(GeometryError::CoincidentEndpoints));
    }

    #[test]
    fn quarter_turns() {
        let center = (0.0, 0.0);
        assert_close(arc_angle((1.0, 0.0), (0.0, 1.0), center, Orientation::Counterclockwise), FRAC_PI_2);
        assert_close(arc_angle((1.0, 0.0), (0.0, 1.0), center, Orientation::Clockwise), 3.0 * FRAC_PI_2);
    }

    #[test]
    fn full_circle_in_both_directions() {
        let center = (0.0, 0.0);
        assert_eq!(arc_angle((1.0, 0.0), (1.0, 0.0), center, Orientation::Clockwise), TAU);
        assert_eq!(arc_angle((1.0, 0.0), (1.0, 0.0), center, Orientation::Counterclockwise), TAU);
        assert_close(circumference(1.0), TAU);
    }

    #[test]
    fn offset_centers() {
        let start = (2.0, 3.0);
        assert_eq!(offset_arc_center(start, [Some(1.0), None], CoordinateMode::Incremental), (3.0, 3.0));
        assert_eq!(offset_arc_center(start, [None, Some(-1.0)], CoordinateMode::Absolute), (2.0, -1.0));
    }
}
