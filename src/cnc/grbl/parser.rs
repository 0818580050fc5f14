use {
    super::messages::*,
    ndarray::Array1,
    nom::{
        self,
        branch::alt,
        bytes::complete::{tag, take_until, take_while},
        combinator::{all_consuming, fail, flat_map, map_parser, map_res, opt, success},
        error::{FromExternalError, ParseError},
        multi::separated_list0,
        sequence::{delimited, preceded, separated_pair, terminated, tuple},
        Compare, FindSubstring, IResult, InputIter, InputLength, InputTake, Parser,
    },
    std::num::{ParseFloatError, ParseIntError},
};

enum GrblStatusPart {
    Position(GrblPosition),
    CurrentFeed(f64),
    CurrentSpindle(f64),
    Planner(u64),
    RxBytes(u64),
    WorkCoordinateOffset(Array1<f64>),
    LineNumber(u64),
    Pins(String),
    Overrides(u8, u8, u8),
    AccessoryState(String),
    Unknown(String),
}
fn apply_grbl_status(mut status: GrblStatus, part: GrblStatusPart) -> GrblStatus {
    match part {
        GrblStatusPart::Position(position) => status.position = Some(position),
        GrblStatusPart::CurrentFeed(feed) => status.current_feed = Some(feed),
        GrblStatusPart::CurrentSpindle(spindle) => status.current_spindle = Some(spindle),
        GrblStatusPart::Planner(planner) => status.planner = Some(planner),
        GrblStatusPart::RxBytes(rx_bytes) => status.rx_bytes = Some(rx_bytes),
        GrblStatusPart::WorkCoordinateOffset(wco) => status.work_coordinate_offset = Some(wco),
        GrblStatusPart::LineNumber(line_number) => status.line_number = Some(line_number),
        GrblStatusPart::Pins(pins) => status.pins = Some(pins),
        GrblStatusPart::Overrides(feed, rapid, spindle) => {
            status.overrides = Some((feed, rapid, spindle))
        }
        GrblStatusPart::AccessoryState(accessories) => status.accessory_state = Some(accessories),
        GrblStatusPart::Unknown(unknown) => status.unknown_terms.push(unknown),
    };
    status
}

pub fn take_until_or_nonempty_all<T, Input, Error: ParseError<Input>>(
    tag: T,
) -> impl Fn(Input) -> IResult<Input, Input, Error>
where
    Input: InputTake + InputLength + FindSubstring<T>,
    T: InputLength + Clone,
{
    move |input| {
        let size = match input.find_substring(tag.clone()) {
            Some(offset) => offset,
            None => {
                let length = input.input_len();
                if length == 0 {
                    return fail(input);
                }
                length
            }
        };
        let (suffix, prefix) = input.take_split(size);
        Ok((suffix, prefix))
    }
}
pub fn all<Input, Error>(input: Input) -> IResult<Input, Input, Error>
where
    Input: InputTake + InputLength,
{
    Ok(input.take_split(input.input_len()))
}
fn split_by<T, Input, Error: ParseError<Input>>(
    separator: T,
) -> impl FnMut(Input) -> IResult<Input, Vec<Input>, Error>
where
    Input: InputTake + InputLength + FindSubstring<T> + Clone + InputIter + Compare<T>,
    T: InputLength + Clone,
{
    separated_list0(
        tag(separator.clone()),
        take_until_or_nonempty_all(separator),
    )
}
fn split_by_then<T, I, O, E, F>(separator: T, parser: F) -> impl FnMut(I) -> IResult<I, Vec<O>, E>
where
    I: InputTake + InputLength + FindSubstring<T> + Clone + InputIter + Compare<T>,
    T: InputLength + Clone,
    E: ParseError<I>,
    F: Parser<I, O, E>,
{
    let mut split = split_by(separator);
    let mut applied_parser = all_consuming(parser);
    move |input| {
        let (remaining, parts) = split.parse(input)?;
        let result = parts
            .into_iter()
            .map(|part| applied_parser(part).map(|(_remaining, result)| result))
            .collect::<Result<Vec<O>, _>>()?;
        Ok((remaining, result))
    }
}
fn take_until_through<'a, Error: 'a + ParseError<&'a str>>(
    separator: &'a str,
) -> impl 'a + FnMut(&'a str) -> IResult<&'a str, &'a str, Error> {
    terminated(take_until(separator), tag(separator))
}
fn enclosed_by<'a, Error: 'a + ParseError<&'a str>>(
    open: &'a str,
    close: &'a str,
) -> impl 'a + FnMut(&'a str) -> IResult<&'a str, &'a str, Error> {
    delimited(tag(open), take_until(close), tag(close))
}

fn parse_f64<'a, Error: 'a + ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, f64, Error>
where
    Error: FromExternalError<&'a str, ParseFloatError>,
{
    map_res(
        take_while(|c: char| c.is_ascii_digit() || c == '.' || c == '-'),
        |substr: &str| substr.parse::<f64>(),
    )
    .parse(input)
}
fn parse_u64<'a, Error: 'a + ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, u64, Error>
where
    Error: FromExternalError<&'a str, ParseIntError>,
{
    map_res(take_while(|c: char| c.is_ascii_digit()), |substr: &str| {
        substr.parse::<u64>()
    })
    .parse(input)
}
fn parse_u8<'a, Error: 'a + ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, u8, Error>
where
    Error: FromExternalError<&'a str, ParseIntError>,
{
    map_res(take_while(|c: char| c.is_ascii_digit()), |substr: &str| {
        substr.parse::<u8>()
    })
    .parse(input)
}

fn parse_float_array<'a, Error: 'a + ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Array1<f64>, Error>
where
    Error: FromExternalError<&'a str, ParseFloatError>,
{
    all_consuming(split_by_then(",", parse_f64).map(|floats| floats.into_iter().collect()))
        .parse(input)
}
fn parse_grbl_status_part<'a, Error: 'a + ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Vec<GrblStatusPart>, Error>
where
    Error: FromExternalError<&'a str, ParseFloatError>,
    Error: FromExternalError<&'a str, ParseIntError>,
{
    all_consuming(flat_map(
        take_until_through(":"),
        |head| -> Box<dyn Parser<&'a str, Vec<GrblStatusPart>, Error>> {
            match head {
                "MPos" => Box::new(parse_float_array.map(|position| {
                    vec![GrblStatusPart::Position(GrblPosition::Machine(position))]
                })),
                "WPos" => Box::new(parse_float_array.map(|position| {
                    vec![GrblStatusPart::Position(GrblPosition::Work(position))]
                })),
                "WCO" => Box::new(
                    parse_float_array.map(|wco| vec![GrblStatusPart::WorkCoordinateOffset(wco)]),
                ),
                "Bf" => Box::new(separated_pair(parse_u64, tag(","), parse_u64).map(
                    |(planner, rx_bytes)| {
                        vec![
                            GrblStatusPart::Planner(planner),
                            GrblStatusPart::RxBytes(rx_bytes),
                        ]
                    },
                )),
                "Ln" => Box::new(parse_u64.map(|ln| vec![GrblStatusPart::LineNumber(ln)])),
                "F" => Box::new(parse_f64.map(|feed| vec![GrblStatusPart::CurrentFeed(feed)])),
                "FS" => Box::new(separated_pair(parse_f64, tag(","), parse_f64).map(
                    |(feed, spindle)| {
                        vec![
                            GrblStatusPart::CurrentFeed(feed),
                            GrblStatusPart::CurrentSpindle(spindle),
                        ]
                    },
                )),
                "Pn" => {
                    Box::new(all.map(|pins: &str| vec![GrblStatusPart::Pins(pins.to_string())]))
                }
                "Ov" => Box::new(
                    tuple((parse_u8, tag(","), parse_u8, tag(","), parse_u8)).map(
                        |(feed, _, rapids, _, spindle)| {
                            vec![GrblStatusPart::Overrides(feed, rapids, spindle)]
                        },
                    ),
                ),
                "A" => Box::new(all.map(|accessories: &str| {
                    vec![GrblStatusPart::AccessoryState(accessories.to_string())]
                })),
                _ => Box::new(fail),
            }
        },
    ))
    .or(all.map(|input: &str| vec![GrblStatusPart::Unknown(input.to_string())]))
    .parse(input)
}
fn parse_grbl_status<'a, Error: 'a + ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, GrblStatus, Error>
where
    Error: FromExternalError<&'a str, ParseFloatError>,
    Error: FromExternalError<&'a str, ParseIntError>,
{
    let (rest, (state_token, pieces)) = enclosed_by("<", ">")
        .and_then(take_until_or_nonempty_all("|").and(
            opt(preceded(tag("|"), split_by_then("|", parse_grbl_status_part))),
        ))
        .parse(input)?;
    let status = GrblStatus::new(state_token, None);
    let status = pieces
        .into_iter()
        .flatten()
        .flatten()
        .fold(status, apply_grbl_status);
    Ok((rest, status))
}
fn parse_grbl_square_brackets<'a, Error: 'a + ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, GrblMessage, Error>
where
    Error: FromExternalError<&'a str, ParseFloatError>,
    Error: FromExternalError<&'a str, ParseIntError>,
{
    enclosed_by("[", "]")
        .and_then(flat_map(
            take_until_through(":"),
            |head| -> Box<dyn Parser<&'a str, GrblMessage, Error>> {
                match head {
                    "PRB" => Box::new(
                        separated_pair(
                            map_parser(take_until(":"), parse_float_array),
                            tag(":"),
                            parse_u64.map(|u| u != 0),
                        )
                        .map(|(position, success)| {
                            GrblMessage::ProbeEvent(ProbeEvent { success, position })
                        }),
                    ),
                    _ => Box::new(fail),
                }
            },
        ))
        .parse(input)
}
fn parse_grbl_ok<'a, Error: 'a + ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, GrblMessage, Error> {
    tag("ok").map(|_| GrblMessage::GrblOk).parse(input)
}
fn parse_grbl_error<'a, Error: 'a + ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, GrblMessage, Error>
where
    Error: FromExternalError<&'a str, ParseIntError>,
{
    preceded(tag("error"), opt(preceded(tag(":"), parse_u64)))
        .map(GrblMessage::GrblError)
        .parse(input)
}
fn parse_grbl_alarm<'a, Error: 'a + ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, GrblMessage, Error>
where
    Error: FromExternalError<&'a str, ParseIntError>,
{
    preceded(tag("ALARM:"), parse_u64)
        .map(GrblMessage::GrblAlarm)
        .parse(input)
}
fn parse_grbl_greeting<'a, Error: 'a + ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, GrblMessage, Error> {
    preceded(tag("Grbl"), all)
        .map(|version: &str| GrblMessage::GrblGreeting(version.trim().to_string()))
        .parse(input)
}
fn parse_grbl_line_impl<'a, Error: 'a + ParseError<&'a str>>(
    message: &'a str,
) -> IResult<&'a str, GrblMessage, Error>
where
    Error: FromExternalError<&'a str, ParseFloatError>,
    Error: FromExternalError<&'a str, ParseIntError>,
{
    alt((
        parse_grbl_status.map(GrblMessage::StatusEvent),
        parse_grbl_square_brackets,
        parse_grbl_ok,
        parse_grbl_error,
        parse_grbl_alarm,
        parse_grbl_greeting,
        success(()).map(|_| GrblMessage::Unrecognized(message.to_string())),
    ))
    .parse(message)
}
/// Classifies one line received from the controller. Never fails; unknown shapes are `Unrecognized`.
pub fn parse_grbl_line(message: &str) -> GrblMessage {
    let message = message.trim_end_matches(|c| c == '\n' || c == '\r');
    match parse_grbl_line_impl::<()>(message) {
        Ok((_, parsed)) => parsed,
        Err(_) => GrblMessage::Unrecognized(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use nom::error::VerboseError;

    use super::*;

    #[test]
    fn test_split_by() {
        let input = "a|b|ced";
        let result: Result<_, nom::Err<()>> = split_by("|").parse(input);
        assert_eq!(result, Ok(("", vec!["a", "b", "ced"])));
    }
    #[test]
    fn test_enclosed_by() {
        let input = "<robert>outside";
        let result: Result<_, nom::Err<()>> = enclosed_by("<", ">").parse(input);
        assert_eq!(result, Ok(("outside", "robert")));
    }
    #[test]
    fn test_split_by_then() {
        let input = "10.5,1,-5.875";
        let result: Result<_, nom::Err<()>> = split_by_then(",", parse_f64).parse(input);
        assert_eq!(result, Ok(("", vec![10.5, 1.0, -5.875])));
    }
    #[test]
    fn test_parse_grbl_status() {
        let input = "<Idle|MPos:0.00,1.00,3.00|Pn:XY|WCO:5.00,-5.25,17>";
        let result: Result<_, nom::Err<VerboseError<_>>> = parse_grbl_status(input);
        let mut status = GrblStatus::new("Idle", Some(GrblPosition::Machine(array![0.0, 1.0, 3.0])));
        status.work_coordinate_offset = Some(array![5.00, -5.25, 17.0]);
        status.pins = Some("XY".to_string());
        assert_eq!(result, Ok(("", status)));
    }
    #[test]
    fn test_parse_grbl_status_all_fields() {
        let input = "<Hold:0|WPos:0.00,1.00,3.00|FS:100,500|Bf:15,128|Ln:42|Ov:25,50,200|A:SM|Unknown>";
        let result: Result<_, nom::Err<VerboseError<_>>> = parse_grbl_status(input);
        let mut status = GrblStatus::new("Hold:0", Some(GrblPosition::Work(array![0.0, 1.0, 3.0])));
        status.current_feed = Some(100.0);
        status.current_spindle = Some(500.0);
        status.planner = Some(15);
        status.rx_bytes = Some(128);
        status.line_number = Some(42);
        status.overrides = Some((25, 50, 200));
        status.accessory_state = Some("SM".to_string());
        status.unknown_terms.push("Unknown".to_string());
        assert_eq!(result, Ok(("", status)));
        assert_eq!(status_state(input), Some(RunState::Hold));
    }
    fn status_state(line: &str) -> Option<RunState> {
        match parse_grbl_line(line) {
            GrblMessage::StatusEvent(status) => status.state,
            other => panic!("expected status, got {:?}", other),
        }
    }
    #[test]
    fn test_state_only_status() {
        match parse_grbl_line("<Sleep>") {
            GrblMessage::StatusEvent(status) => {
                assert_eq!(status.state, Some(RunState::Sleep));
                assert_eq!(status.position, None);
            }
            other => panic!("expected status, got {:?}", other),
        }
    }
    #[test]
    fn test_unknown_state_keeps_position() {
        match parse_grbl_line("<Dancing|MPos:1,2,3>") {
            GrblMessage::StatusEvent(status) => {
                assert_eq!(status.state, None);
                assert_eq!(status.position, Some(GrblPosition::Machine(array![1.0, 2.0, 3.0])));
            }
            other => panic!("expected status, got {:?}", other),
        }
    }
    #[test]
    fn test_malformed_position_is_unknown_term() {
        match parse_grbl_line("<Idle|MPos:1,x,3>") {
            GrblMessage::StatusEvent(status) => {
                assert_eq!(status.position, None);
                assert_eq!(status.unknown_terms, vec!["MPos:1,x,3".to_string()]);
            }
            other => panic!("expected status, got {:?}", other),
        }
    }
    #[test]
    fn test_acknowledgements() {
        assert_eq!(parse_grbl_line("ok\r\n"), GrblMessage::GrblOk);
        assert_eq!(parse_grbl_line("error:22"), GrblMessage::GrblError(Some(22)));
        assert_eq!(parse_grbl_line("error"), GrblMessage::GrblError(None));
        assert!(parse_grbl_line("ok").is_acknowledgement());
        assert!(!parse_grbl_line("ALARM:1").is_acknowledgement());
    }
    #[test]
    fn test_other_lines() {
        assert_eq!(parse_grbl_line("ALARM:3"), GrblMessage::GrblAlarm(3));
        assert_eq!(
            parse_grbl_line("Grbl 1.1h ['$' for help]"),
            GrblMessage::GrblGreeting("1.1h ['$' for help]".to_string())
        );
        assert_eq!(
            parse_grbl_line("[PRB:1.000,2.000,-3.500:1]"),
            GrblMessage::ProbeEvent(ProbeEvent { success: true, position: array![1.0, 2.0, -3.5] })
        );
        assert_eq!(
            parse_grbl_line("[MSG:Caution: Unlocked]"),
            GrblMessage::Unrecognized("[MSG:Caution: Unlocked]".to_string())
        );
    }
}
