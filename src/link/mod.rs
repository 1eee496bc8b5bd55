//! Link decoder registry
//!
//! This module provides functionality for:
//! - Recognising the protocol of a raw proxy link by its leading identifier
//! - Decoding each protocol's URI grammar into a typed record
//! - Reducing every record to a protocol-agnostic [`CanonicalSummary`]
//!
//! Decoding is fallible per link. Callers decide what to do with a
//! [`DecodeError`]; the fetch path keeps the link with an unknown protocol.

pub mod fields;
pub mod hysteria2;
pub mod shadowsocks;
pub mod socks;
pub mod trojan;
pub mod vless;
pub mod vmess;
pub mod wireguard;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use std::fmt;
use thiserror::Error;

pub use hysteria2::Hysteria2;
pub use shadowsocks::Shadowsocks;
pub use socks::Socks;
pub use trojan::Trojan;
pub use vless::Vless;
pub use vmess::Vmess;
pub use wireguard::Wireguard;

/// Why a single link could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported link: no decoder matches {0:?}")]
    Unsupported(String),

    #[error("invalid URI: {0}")]
    Url(#[from] url::ParseError),

    #[error("malformed {protocol} link: {reason}")]
    Malformed {
        protocol: &'static str,
        reason: String,
    },
}

impl DecodeError {
    pub fn malformed(protocol: &'static str, reason: impl Into<String>) -> Self {
        DecodeError::Malformed {
            protocol,
            reason: reason.into(),
        }
    }
}

/// Protocol-agnostic view of a decoded link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSummary {
    pub protocol: &'static str,
    pub remark: String,
    /// `host:port`, for listing and diagnostics only
    pub address: String,
}

impl fmt::Display for CanonicalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.remark.is_empty() {
            write!(f, "{} {}", self.protocol, self.address)
        } else {
            write!(f, "{} {} ({})", self.protocol, self.address, self.remark)
        }
    }
}

/// Supported proxy protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Vmess,
    Vless,
    Trojan,
    Shadowsocks,
    Socks,
    Wireguard,
    Hysteria2,
}

/// Identifier prefixes, checked in order
const IDENTIFIERS: &[(&str, Protocol)] = &[
    ("vmess://", Protocol::Vmess),
    ("vless://", Protocol::Vless),
    ("trojan://", Protocol::Trojan),
    ("ss://", Protocol::Shadowsocks),
    ("socks://", Protocol::Socks),
    ("wireguard://", Protocol::Wireguard),
    ("hysteria2://", Protocol::Hysteria2),
    ("hy2://", Protocol::Hysteria2),
];

impl Protocol {
    /// Find the protocol whose identifier starts `link`
    pub fn detect(link: &str) -> Option<Protocol> {
        IDENTIFIERS
            .iter()
            .find(|(prefix, _)| starts_with_ignore_case(link, prefix))
            .map(|(_, protocol)| *protocol)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Vmess => "vmess",
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "shadowsocks",
            Protocol::Socks => "socks",
            Protocol::Wireguard => "wireguard",
            Protocol::Hysteria2 => "hysteria2",
        }
    }

    /// Decode `link` with this protocol's grammar
    pub fn parse(&self, link: &str) -> Result<ParsedLink, DecodeError> {
        Ok(match self {
            Protocol::Vmess => ParsedLink::Vmess(Vmess::parse(link)?),
            Protocol::Vless => ParsedLink::Vless(Vless::parse(link)?),
            Protocol::Trojan => ParsedLink::Trojan(Trojan::parse(link)?),
            Protocol::Shadowsocks => ParsedLink::Shadowsocks(Shadowsocks::parse(link)?),
            Protocol::Socks => ParsedLink::Socks(Socks::parse(link)?),
            Protocol::Wireguard => ParsedLink::Wireguard(Wireguard::parse(link)?),
            Protocol::Hysteria2 => ParsedLink::Hysteria2(Hysteria2::parse(link)?),
        })
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A fully decoded link
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLink {
    Vmess(Vmess),
    Vless(Vless),
    Trojan(Trojan),
    Shadowsocks(Shadowsocks),
    Socks(Socks),
    Wireguard(Wireguard),
    Hysteria2(Hysteria2),
}

impl ParsedLink {
    pub fn protocol(&self) -> Protocol {
        match self {
            ParsedLink::Vmess(_) => Protocol::Vmess,
            ParsedLink::Vless(_) => Protocol::Vless,
            ParsedLink::Trojan(_) => Protocol::Trojan,
            ParsedLink::Shadowsocks(_) => Protocol::Shadowsocks,
            ParsedLink::Socks(_) => Protocol::Socks,
            ParsedLink::Wireguard(_) => Protocol::Wireguard,
            ParsedLink::Hysteria2(_) => Protocol::Hysteria2,
        }
    }

    pub fn summary(&self) -> CanonicalSummary {
        let (remark, address) = match self {
            ParsedLink::Vmess(v) => (&v.remark, v.address()),
            ParsedLink::Vless(v) => (&v.remark, v.address()),
            ParsedLink::Trojan(v) => (&v.remark, v.address()),
            ParsedLink::Shadowsocks(v) => (&v.remark, v.address()),
            ParsedLink::Socks(v) => (&v.remark, v.address()),
            ParsedLink::Wireguard(v) => (&v.remark, v.endpoint.clone()),
            ParsedLink::Hysteria2(v) => (&v.remark, v.address()),
        };
        CanonicalSummary {
            protocol: self.protocol().name(),
            remark: remark.clone(),
            address,
        }
    }
}

/// Parse a raw link into its typed record
pub fn parse(link: &str) -> Result<ParsedLink, DecodeError> {
    let link = link.trim();
    let protocol = Protocol::detect(link).ok_or_else(|| DecodeError::Unsupported(preview(link)))?;
    protocol.parse(link)
}

/// Decode a raw link into its canonical summary
pub fn decode(link: &str) -> Result<CanonicalSummary, DecodeError> {
    parse(link).map(|parsed| parsed.summary())
}

/// Decode base64 text embedded in a link, accepting the padded, unpadded
/// and URL-safe alphabets links are found with in the wild
pub(crate) fn decode_base64_text(encoded: &str) -> Option<String> {
    let encoded = encoded.trim();
    [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(encoded).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

/// The remainder of `link` after a case-insensitive identifier prefix
pub(crate) fn strip_identifier<'a>(link: &'a str, prefix: &str) -> Option<&'a str> {
    starts_with_ignore_case(link, prefix).then(|| &link[prefix.len()..])
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Short, char-safe excerpt of a link for error messages
fn preview(link: &str) -> String {
    const MAX_CHARS: usize = 32;
    let mut excerpt: String = link.chars().take(MAX_CHARS).collect();
    if link.chars().count() > MAX_CHARS {
        excerpt.push_str("...");
    }
    excerpt
}
