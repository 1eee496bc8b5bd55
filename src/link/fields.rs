//! Declared query-parameter fields shared by the URI-style decoders
//!
//! Each protocol lists the query parameters it understands as a static slice
//! of [`QueryField`]s. A field names the parameter and the typed slot it
//! fills, so a string parameter can only land in a `String` slot and an
//! integer parameter in an `i64` slot.

use super::DecodeError;
use percent_encoding::percent_decode_str;
use url::Url;

/// Typed target of a query parameter
pub enum FieldTarget<T> {
    Str(fn(&mut T) -> &mut Option<String>),
    Int(fn(&mut T) -> &mut Option<i64>),
}

/// One query parameter a protocol reads
pub struct QueryField<T> {
    pub name: &'static str,
    pub target: FieldTarget<T>,
}

impl<T> QueryField<T> {
    pub const fn str(name: &'static str, slot: fn(&mut T) -> &mut Option<String>) -> Self {
        Self {
            name,
            target: FieldTarget::Str(slot),
        }
    }

    pub const fn int(name: &'static str, slot: fn(&mut T) -> &mut Option<i64>) -> Self {
        Self {
            name,
            target: FieldTarget::Int(slot),
        }
    }
}

/// Fill `record` from the URL query using the declared field list.
///
/// The first occurrence of a parameter wins. Missing parameters and integers
/// that fail to parse leave the slot untouched.
pub fn apply_query<T>(record: &mut T, uri: &Url, fields: &[QueryField<T>]) {
    for field in fields {
        let Some(value) = uri
            .query_pairs()
            .find(|(key, _)| key == field.name)
            .map(|(_, value)| value.into_owned())
        else {
            continue;
        };

        match field.target {
            FieldTarget::Str(slot) => *slot(record) = Some(value),
            FieldTarget::Int(slot) => {
                if let Ok(number) = value.trim().parse::<i64>() {
                    *slot(record) = Some(number);
                }
            }
        }
    }
}

/// Percent-decoded fragment, or the raw fragment if it is not valid UTF-8
/// once decoded. Missing fragment yields an empty remark.
pub fn remark_from_fragment(uri: &Url) -> String {
    uri.fragment().map(decode_component).unwrap_or_default()
}

/// Percent-decode a URI component, keeping the raw text on failure
pub fn decode_component(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Host and port of a parsed link, both required
pub fn endpoint(uri: &Url, protocol: &'static str) -> Result<(String, u16), DecodeError> {
    let host = uri
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| DecodeError::malformed(protocol, "missing host"))?;
    let port = uri
        .port()
        .ok_or_else(|| DecodeError::malformed(protocol, "missing port"))?;
    Ok((host.to_string(), port))
}

/// Percent-decoded user-info credential, required to be non-empty
pub fn credential(uri: &Url, protocol: &'static str) -> Result<String, DecodeError> {
    let user = uri.username();
    if user.is_empty() {
        return Err(DecodeError::malformed(protocol, "missing credential"));
    }
    Ok(decode_component(user))
}

/// `host:port`, bracketing IPv6 hosts
pub fn format_address(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
