//! Parser for the tagged output produced by `p4 -ztag`.
//!
//! Each field is printed as `... name value`. Records are separated by blank
//! lines, but multi-line values (such as change descriptions) may contain
//! blank lines too, so a record is only considered complete once a field name
//! repeats.

use std::{collections::BTreeMap, str::FromStr};

use nom::{
    bytes::complete::{tag, take_till, take_till1},
    character::complete::char,
    combinator::{map, opt},
    sequence::{preceded, tuple},
    IResult,
};

use crate::Error;

/// A single tagged record.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn required(&self, field: &str) -> Result<&str, Error> {
        self.get(field)
            .ok_or_else(|| Error::MissingField(field.to_string()))
    }

    /// Parses a required field.
    pub fn parse<T: FromStr>(&self, field: &str) -> Result<T, Error> {
        let value = self.required(field)?;
        value.trim().parse().map_err(|_| Error::InvalidField {
            field: field.to_string(),
            value: value.to_string(),
        })
    }

    fn insert(&mut self, field: String, value: String) {
        self.0.insert(field, value);
    }

    fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    fn finish(mut self) -> Option<Self> {
        for value in self.0.values_mut() {
            while value.ends_with('\n') {
                value.pop();
            }
        }

        if self.0.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Field(&'a str, &'a str),
    Text(&'a str),
}

pub(crate) fn parse(input: &[u8]) -> Vec<Record> {
    let input = String::from_utf8_lossy(input);

    let mut records = Vec::new();
    let mut current = Record::default();
    let mut last: Option<String> = None;

    for raw in input.lines() {
        match line(raw) {
            Line::Field(name, value) => {
                if current.contains(name) {
                    records.extend(std::mem::take(&mut current).finish());
                }
                current.insert(name.to_string(), value.to_string());
                last = Some(name.to_string());
            }
            Line::Text(text) => {
                if let Some(value) = last.as_ref().and_then(|name| current.0.get_mut(name)) {
                    value.push('\n');
                    value.push_str(text);
                }
            }
        }
    }
    records.extend(current.finish());

    records
}

fn line(input: &str) -> Line {
    match field(input) {
        Ok((_, (name, value))) => Line::Field(name, value),
        Err(_) => Line::Text(input),
    }
}

fn field(input: &str) -> IResult<&str, (&str, &str)> {
    map(
        tuple((
            preceded(tag("... "), take_till1(|c| c == ' ')),
            opt(preceded(char(' '), take_till(|c| c == '\n'))),
        )),
        |(name, value)| (name, value.unwrap_or_default()),
    )(input)
}
