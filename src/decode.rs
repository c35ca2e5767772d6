//! Data-URI base64 decoding for inline image uploads.

use base64::{prelude::BASE64_STANDARD, Engine};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("data URI has no ',' separating prefix and payload")]
    MissingSeparator,

    #[error("data URI prefix {0:?} is not of the form data:<mime>;base64")]
    InvalidPrefix(String),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// The two halves of a `data:<mime>;base64,<payload>` string.
#[derive(Debug, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime: &'a str,
    pub payload: &'a str,
}

pub fn parse_data_uri(input: &str) -> Result<DataUri<'_>, DecodeError> {
    let (prefix, payload) = input
        .split_once(',')
        .ok_or(DecodeError::MissingSeparator)?;
    let mime = prefix
        .strip_prefix("data:")
        .and_then(|rest| rest.strip_suffix(";base64"))
        .ok_or_else(|| DecodeError::InvalidPrefix(prefix.to_string()))?;

    Ok(DataUri { mime, payload })
}

/// Decodes the payload of a data URI into raw image bytes.
///
/// Whitespace inside the payload is dropped and missing `=` padding is
/// restored, since browsers and some clients emit either.
pub fn decode_image64(input: &str) -> Result<Vec<u8>, DecodeError> {
    let DataUri { payload, .. } = parse_data_uri(input)?;

    let mut padded: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }

    Ok(BASE64_STANDARD.decode(padded)?)
}
