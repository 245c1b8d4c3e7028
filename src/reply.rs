//! Typed decoding of response frames.
//!
//! Each expected reply shape has a single decoding rule. Unexpected text on
//! a single-line frame is how the server reports application errors inline,
//! so those decode to [`BloomError::Server`] carrying the verbatim line; a
//! frame of the wrong kind entirely (a block where a line was expected, or
//! vice versa with no error text to relay) is a [`BloomError::Decode`].

use std::collections::HashMap;

use crate::{
    codec::Frame,
    command::{Command, ExpectedReply},
    error::{BloomError, FILTER_NOT_FOUND},
    filter::FilterInfo,
};

const YES: &str = "Yes";
const NO: &str = "No";
const DONE: &str = "Done";
const EXISTS: &str = "Exists";

/// Decoded response value, shaped by the command's expected reply.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Reply {
    Bool(bool),
    BoolMap(HashMap<String, bool>),
    Confirmed,
    Filters(Vec<FilterInfo>),
    Info(Box<FilterInfo>),
}

impl Reply {
    pub(crate) fn into_bool(self) -> Result<bool, BloomError> {
        match self {
            Self::Bool(value) => Ok(value),
            other => Err(mismatch(&other)),
        }
    }

    pub(crate) fn into_bool_map(self) -> Result<HashMap<String, bool>, BloomError> {
        match self {
            Self::BoolMap(map) => Ok(map),
            other => Err(mismatch(&other)),
        }
    }

    pub(crate) fn into_confirmation(self) -> Result<(), BloomError> {
        match self {
            Self::Confirmed => Ok(()),
            other => Err(mismatch(&other)),
        }
    }

    pub(crate) fn into_filters(self) -> Result<Vec<FilterInfo>, BloomError> {
        match self {
            Self::Filters(filters) => Ok(filters),
            other => Err(mismatch(&other)),
        }
    }

    pub(crate) fn into_info(self) -> Result<FilterInfo, BloomError> {
        match self {
            Self::Info(info) => Ok(*info),
            other => Err(mismatch(&other)),
        }
    }
}

fn mismatch(reply: &Reply) -> BloomError {
    BloomError::Decode(format!("reply shape mismatch: {reply:?}"))
}

fn parse_bool(token: &str) -> Option<bool> {
    match token {
        YES => Some(true),
        NO => Some(false),
        _ => None,
    }
}

/// Decode `frame` according to the expected reply shape of `command`.
pub(crate) fn decode(frame: &Frame, command: &Command) -> Result<Reply, BloomError> {
    match (command.expected, frame) {
        (ExpectedReply::Bool, Frame::Line(line)) => parse_bool(line)
            .map(Reply::Bool)
            .ok_or_else(|| BloomError::Server(line.clone())),
        (ExpectedReply::BoolList, Frame::Line(line)) => decode_bool_list(line, &command.keys),
        (ExpectedReply::Confirmation, Frame::Line(line)) => match line.as_str() {
            DONE => Ok(Reply::Confirmed),
            _ => Err(BloomError::Server(line.clone())),
        },
        (ExpectedReply::CreateConfirmation, Frame::Line(line)) => match line.as_str() {
            // An already-present filter satisfies a create.
            DONE | EXISTS => Ok(Reply::Confirmed),
            _ => Err(BloomError::Server(line.clone())),
        },
        (ExpectedReply::DropConfirmation, Frame::Line(line)) => match line.as_str() {
            // Dropping a filter that is already gone is success.
            DONE | FILTER_NOT_FOUND => Ok(Reply::Confirmed),
            _ => Err(BloomError::Server(line.clone())),
        },
        (ExpectedReply::FilterList, Frame::Block(lines)) => lines
            .iter()
            .map(|line| FilterInfo::from_list_row(line))
            .collect::<Result<Vec<_>, _>>()
            .map(Reply::Filters),
        (ExpectedReply::Info, Frame::Block(lines)) => {
            let name = command.filter.as_deref().unwrap_or_default();
            FilterInfo::from_info_block(name, lines).map(|info| Reply::Info(Box::new(info)))
        }
        // A single line where a block was expected is the server reporting
        // an error inline.
        (ExpectedReply::FilterList | ExpectedReply::Info, Frame::Line(line)) => {
            Err(BloomError::Server(line.clone()))
        }
        (_, Frame::Block(lines)) => Err(BloomError::Decode(format!(
            "unexpected block of {} lines",
            lines.len()
        ))),
    }
}

fn decode_bool_list(line: &str, keys: &[String]) -> Result<Reply, BloomError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != keys.len() {
        return Err(BloomError::Server(line.to_string()));
    }
    let mut map = HashMap::with_capacity(keys.len());
    for (key, token) in keys.iter().zip(tokens) {
        let Some(value) = parse_bool(token) else {
            return Err(BloomError::Server(line.to_string()));
        };
        map.insert(key.clone(), value);
    }
    Ok(Reply::BoolMap(map))
}
