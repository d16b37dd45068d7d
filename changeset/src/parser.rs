use std::{
    str::FromStr,
    time::{Duration, SystemTime},
};

use changelist::{Changelist, FileSpec, LogEntry};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_till1},
    character::complete::{char, digit1, newline},
    combinator::{all_consuming, map, map_res, value},
    multi::{length_data, many0},
    sequence::{delimited, terminated, tuple},
    Finish, IResult,
};

use crate::Error;

pub(crate) fn entries(input: &[u8]) -> Result<Vec<LogEntry>, Error> {
    Ok(all_consuming(many0(entry))(input)
        .finish()
        .map_err(|e| Error::Parse {
            offset: input.len() - e.input.len(),
            kind: e.code,
        })?
        .1)
}

fn entry(input: &[u8]) -> IResult<&[u8], LogEntry> {
    terminated(
        alt((
            map(change, LogEntry::Change),
            map(field("label", text), LogEntry::Label),
        )),
        newline,
    )(input)
}

fn change(input: &[u8]) -> IResult<&[u8], Changelist> {
    map(
        tuple((
            field("change", number::<u32>),
            field("author", text),
            field("client", text),
            field("time", number::<u64>),
            description,
            many0(file),
        )),
        |(id, author, client, time, description, files)| Changelist {
            id,
            author,
            client,
            description,
            time: SystemTime::UNIX_EPOCH + Duration::from_secs(time),
            files,
        },
    )(input)
}

fn description(input: &[u8]) -> IResult<&[u8], String> {
    map_res(
        terminated(
            length_data(field("data", number::<usize>)),
            newline,
        ),
        utf8,
    )(input)
}

fn file(input: &[u8]) -> IResult<&[u8], FileSpec> {
    map(
        delimited(
            tag(b"file "),
            tuple((
                terminated(word, char(' ')),
                terminated(
                    alt((value(None, char('-')), map(number::<u32>, Some))),
                    char(' '),
                ),
                text,
            )),
            newline,
        ),
        |(action, revision, depot_path)| FileSpec {
            depot_path,
            revision,
            action,
        },
    )(input)
}

/// Matches a `name value\n` line, returning the parsed value.
fn field<'a, O, F>(name: &'static str, parser: F) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], O>
where
    F: FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
{
    delimited(
        tuple((tag(name.as_bytes()), char(' '))),
        parser,
        newline,
    )
}

fn number<T: FromStr>(input: &[u8]) -> IResult<&[u8], T> {
    map_res(map_res(digit1, std::str::from_utf8), T::from_str)(input)
}

fn word(input: &[u8]) -> IResult<&[u8], String> {
    map_res(take_till1(|c| c == b' ' || c == b'\n'), utf8)(input)
}

fn text(input: &[u8]) -> IResult<&[u8], String> {
    map_res(take_till(|c| c == b'\n'), utf8)(input)
}

fn utf8(input: &[u8]) -> Result<String, std::string::FromUtf8Error> {
    String::from_utf8(input.to_vec())
}
