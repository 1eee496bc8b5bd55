//! `vmess://<base64(json)>`
//!
//! The JSON payload follows the v2rayN share format. Numeric fields are
//! emitted as either JSON numbers or strings depending on the client, so
//! every field is read as text.

use super::fields;
use super::DecodeError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const PROTOCOL: &str = "vmess";
const IDENTIFIER: &str = "vmess://";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Vmess {
    #[serde(default, rename = "v", deserialize_with = "text")]
    pub version: Option<String>,
    #[serde(default, rename = "add", deserialize_with = "text")]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub port: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub id: Option<String>,
    #[serde(default, rename = "aid", deserialize_with = "text")]
    pub alter_id: Option<String>,
    #[serde(default, rename = "scy", deserialize_with = "text")]
    pub security: Option<String>,
    #[serde(default, rename = "net", deserialize_with = "text")]
    pub network: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "text")]
    pub header_type: Option<String>,
    #[serde(default, rename = "host", deserialize_with = "text")]
    pub request_host: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub tls: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub sni: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub alpn: Option<String>,
    #[serde(default, rename = "fp", deserialize_with = "text")]
    pub fingerprint: Option<String>,
    #[serde(default, rename = "ps", deserialize_with = "remark")]
    pub remark: String,
}

impl Vmess {
    pub fn parse(link: &str) -> Result<Self, DecodeError> {
        let payload = super::strip_identifier(link, IDENTIFIER)
            .ok_or_else(|| DecodeError::malformed(PROTOCOL, "missing vmess:// identifier"))?;
        let json = super::decode_base64_text(payload)
            .ok_or_else(|| DecodeError::malformed(PROTOCOL, "payload is not base64"))?;
        let vmess: Vmess = serde_json::from_str(&json)
            .map_err(|e| DecodeError::malformed(PROTOCOL, format!("invalid JSON payload: {}", e)))?;

        if vmess.host.as_deref().map_or(true, str::is_empty) {
            return Err(DecodeError::malformed(PROTOCOL, "missing address"));
        }
        Ok(vmess)
    }

    /// Port as a number, absent if missing or not numeric
    pub fn port_number(&self) -> Option<u16> {
        self.port.as_deref().and_then(|p| p.trim().parse().ok())
    }

    pub fn address(&self) -> String {
        let host = self.host.as_deref().unwrap_or_default();
        match self.port_number() {
            Some(port) => fields::format_address(host, port),
            None => host.to_string(),
        }
    }
}

fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn remark<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    text(deserializer).map(Option::unwrap_or_default)
}
