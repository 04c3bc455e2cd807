//! Token addressing.
//!
//! Two levels, one separator:
//!   runtime token: `<referenceGUID>.id[<ordinal>]`
//!   sub-token:     `<TypeName>.<UniqueID>`
//!
//! RULE: Both split on '.' into exactly two non-empty parts. These strings are
//! the only link between a saved document and live objects after a restart,
//! so neither part may itself contain the separator.

use crate::{
    error::{SaveError, SaveResult},
    types::Token,
};
use std::fmt;

pub const SEPARATOR: char = '.';

fn invalid(token: &str, reason: impl Into<String>) -> SaveError {
    SaveError::InvalidToken {
        token:  token.to_string(),
        reason: reason.into(),
    }
}

fn split_pair(token: &str) -> SaveResult<(&str, &str)> {
    let mut parts = token.split(SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) if !a.is_empty() && !b.is_empty() => Ok((a, b)),
        _ => Err(invalid(token, "expected exactly two non-empty parts separated by '.'")),
    }
}

/// Check a token part before it is used to build a token.
pub fn validate_part(part: &str) -> SaveResult<()> {
    if part.is_empty() || part.contains(SEPARATOR) {
        return Err(invalid(part, "token part must be non-empty and must not contain '.'"));
    }
    Ok(())
}

/// Token for a scene-resident saveable.
pub fn world_token(type_name: &str, guid: &str) -> Token {
    format!("{type_name}{SEPARATOR}{guid}")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeToken {
    pub reference_guid: String,
    pub ordinal:        u32,
}

impl RuntimeToken {
    pub fn new(reference_guid: impl Into<String>, ordinal: u32) -> Self {
        Self {
            reference_guid: reference_guid.into(),
            ordinal,
        }
    }

    pub fn parse(token: &str) -> SaveResult<Self> {
        let (guid, id_part) = split_pair(token)?;
        let digits = id_part
            .strip_prefix("id[")
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| invalid(token, "second part must be id[<n>]"))?;
        // Canonical decimal only, so the parsed token prints back to the same key.
        let canonical = !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && (digits == "0" || !digits.starts_with('0'));
        if !canonical {
            return Err(invalid(token, "ordinal must be a decimal number without sign or leading zeros"));
        }
        let ordinal = digits
            .parse::<u32>()
            .map_err(|e| invalid(token, format!("bad ordinal: {e}")))?;
        Ok(Self::new(guid, ordinal))
    }
}

impl fmt::Display for RuntimeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}id[{}]", self.reference_guid, self.ordinal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubToken {
    pub type_name: String,
    pub unique_id: String,
}

impl SubToken {
    pub fn new(type_name: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            unique_id: unique_id.into(),
        }
    }

    pub fn parse(token: &str) -> SaveResult<Self> {
        let (type_name, unique_id) = split_pair(token)?;
        Ok(Self::new(type_name, unique_id))
    }
}

impl fmt::Display for SubToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.type_name, self.unique_id)
    }
}
