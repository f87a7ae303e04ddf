//! Encoding and decoding for the subset of the memcache text protocol used by
//! a [`ServerLink`](crate::ServerLink): `get`, `set` and `delete`.
//!
//! Every line on the wire is terminated with `\r\n`.

use std::io::Write;

use crate::{CacheError, Result};

/// Longest key accepted by memcache compatible servers.
pub const MAX_KEY_LENGTH: usize = 250;

pub(crate) const CRLF: &[u8] = b"\r\n";

/// A single request sent to a server.
#[derive(Debug, Clone, PartialEq)]
pub enum Command<'a> {
    Get { key: &'a str },

    /// Flags and expiration are always sent as `0`.
    Set { key: &'a str, value: &'a [u8] },

    Delete { key: &'a str },
}

impl Command<'_> {
    /// Write the wire representation of the command. The writer is not flushed.
    pub fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        match self {
            Command::Get { key } => write!(w, "get {}\r\n", key)?,
            Command::Set { key, value } => {
                write!(w, "set {} 0 0 {}\r\n", key, value.len())?;
                w.write_all(value)?;
                w.write_all(CRLF)?;
            }
            Command::Delete { key } => write!(w, "delete {}\r\n", key)?,
        }
        Ok(())
    }
}

/// Keys must be non-empty, at most [`MAX_KEY_LENGTH`] bytes and free of
/// whitespace and control characters, otherwise they would break the line framing.
pub fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && !key
            .bytes()
            .any(|b| b.is_ascii_whitespace() || b.is_ascii_control());
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidKey {
            key: key.to_string(),
        })
    }
}

/// Header of a `VALUE` response line, describing the payload which follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRecord {
    pub key: String,
    pub flag: u32,

    /// Number of payload bytes following the header line.
    pub length: usize,
}

/// Parse a `VALUE <key> <flag> <length>\r\n` header line.
pub fn parse_value_header(line: &str) -> Result<ValueRecord> {
    let fields: Vec<&str> = line.split(' ').collect();
    if fields[0] != "VALUE" {
        return Err(CacheError::protocol("result not VALUE"));
    }
    if fields.len() != 4 {
        return Err(CacheError::protocol("invalid length"));
    }

    let flag = fields[2].parse()?;
    let length = strip_line_ending(fields[3]).parse()?;
    Ok(ValueRecord {
        key: fields[1].to_string(),
        flag,
        length,
    })
}

/// Status line returned by the server after a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Stored,
    NotStored,
    Exists,
    NotFound,
    Deleted,
    End,

    /// `ERROR`, `CLIENT_ERROR <msg>` or `SERVER_ERROR <msg>`.
    Error(String),

    /// Anything else, such as a `VALUE` header.
    Other(String),
}

impl Reply {
    pub fn parse(line: &str) -> Reply {
        let line = strip_line_ending(line);
        match line {
            "STORED" => Reply::Stored,
            "NOT_STORED" => Reply::NotStored,
            "EXISTS" => Reply::Exists,
            "NOT_FOUND" => Reply::NotFound,
            "DELETED" => Reply::Deleted,
            "END" => Reply::End,
            "ERROR" => Reply::Error(line.to_string()),
            l if l.starts_with("CLIENT_ERROR") || l.starts_with("SERVER_ERROR") => {
                Reply::Error(l.to_string())
            }
            other => Reply::Other(other.to_string()),
        }
    }
}

fn strip_line_ending(s: &str) -> &str {
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .unwrap_or(s)
}
