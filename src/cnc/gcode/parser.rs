use {
    super::{GCode, Word},
    nom::{
        bytes::complete::{tag, take_until, take_while, take_while1},
        character::complete::{satisfy, space0},
        combinator::map_res,
        error::{FromExternalError, ParseError},
        sequence::delimited,
        Finish, IResult, Parser,
    },
    std::num::ParseFloatError,
};

#[derive(Debug, PartialEq)]
pub struct GCodeParseError<'a> {
    pub remaining: &'a str,
    pub description: String,
}
impl<'a> ParseError<&'a str> for GCodeParseError<'a> {
    fn from_error_kind(input: &'a str, _kind: nom::error::ErrorKind) -> Self {
        GCodeParseError {
            remaining: input,
            description: "unknown".to_string(),
        }
    }

    fn append(_: &'a str, _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}
impl<'a> FromExternalError<&'a str, ParseFloatError> for GCodeParseError<'a> {
    fn from_external_error(
        input: &'a str,
        _kind: nom::error::ErrorKind,
        e: ParseFloatError,
    ) -> Self {
        GCodeParseError {
            remaining: input,
            description: e.to_string(),
        }
    }
}
fn map_error_description<'a, O, P: Parser<&'a str, O, GCodeParseError<'a>>, D: ToString>(
    mut parser: P,
    description: D,
) -> impl FnMut(&'a str) -> IResult<&'a str, O, GCodeParseError<'a>> {
    move |input| {
        parser.parse(input).map_err(|e| {
            e.map(|e| GCodeParseError {
                remaining: e.remaining,
                description: description.to_string(),
            })
        })
    }
}
fn make_error<O, D: ToString>(input: &str, description: D) -> IResult<&str, O, GCodeParseError> {
    Err(nom::Err::Error(GCodeParseError {
        remaining: input,
        description: description.to_string(),
    }))
}
macro_rules! extract_input {
    ( $name: ident,  $x: expr ) => {{
        let (new_input, value) = $x($name)?;
        $name = new_input;
        value
    }};
}

fn whitespace(input: &str) -> IResult<&str, &str, GCodeParseError> {
    space0(input)
}
fn parse_f64<'a, Error: 'a + ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, f64, Error>
where
    Error: FromExternalError<&'a str, ParseFloatError>,
{
    map_res(
        take_while(|c: char| c.is_ascii_digit() || c == '.' || c == '-' || c == '+'),
        |substr: &str| substr.parse::<f64>(),
    )
    .parse(input)
}
fn parse_word(true_start: &str) -> IResult<&str, Word, GCodeParseError> {
    let mut input = true_start;
    let letter = extract_input!(
        input,
        map_error_description(satisfy(|c: char| c.is_ascii_alphabetic()), "expected a word letter")
    )
    .to_ascii_uppercase();
    extract_input!(input, whitespace);
    if letter == 'G' {
        let number = extract_input!(
            input,
            map_error_description(
                take_while1(|c: char| c.is_ascii_digit() || c == '.'),
                "expected number after G"
            )
        );
        return Ok((input, Word::G(GCode::from_number(number))));
    }
    let value = extract_input!(
        input,
        map_error_description(parse_f64, format!("expected number after {}", letter))
    );
    let word = match letter {
        'X' => Word::Axis(0, value),
        'Y' => Word::Axis(1, value),
        'Z' => Word::Axis(2, value),
        'F' => Word::Feed(value),
        'R' => Word::Radius(value),
        'I' => Word::Offset(0, value),
        'J' => Word::Offset(1, value),
        other => Word::Other(other, value),
    };
    Ok((input, word))
}
fn parse_words_impl(mut input: &str) -> IResult<&str, Vec<Word>, GCodeParseError> {
    let mut words = Vec::new();
    loop {
        extract_input!(input, whitespace);
        if input.is_empty() || input.starts_with(';') {
            return Ok(("", words));
        }
        if input.starts_with('(') {
            let prior_input = input;
            let closed: IResult<&str, &str, GCodeParseError> =
                delimited(tag("("), take_until(")"), tag(")"))(input);
            match closed {
                Ok((rest, _comment)) => input = rest,
                Err(_) => return make_error(prior_input, "unclosed comment"),
            }
            continue;
        }
        let word = extract_input!(input, parse_word);
        words.push(word);
    }
}

/// Splits one command line into words, dropping comments and the line terminator.
pub fn parse_words(line: &str) -> Result<Vec<Word>, GCodeParseError> {
    let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
    parse_words_impl(line).finish().map(|(_rest, words)| words)
}
