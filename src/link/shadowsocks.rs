//! Shadowsocks links
//!
//! Two layouts are in circulation:
//! - SIP002: `ss://<userinfo>@<host>:<port>[/][?plugin=..]#<remark>` where the
//!   user-info is base64 of `method:password` or the plain, percent-encoded pair
//! - legacy: `ss://<base64(method:password@host:port)>#<remark>`

use super::fields::{self, QueryField};
use super::DecodeError;
use url::Url;

const PROTOCOL: &str = "shadowsocks";
const IDENTIFIER: &str = "ss://";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shadowsocks {
    pub method: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub plugin: Option<String>,
    pub remark: String,
}

const FIELDS: &[QueryField<Shadowsocks>] = &[QueryField::str("plugin", |s| &mut s.plugin)];

impl Shadowsocks {
    pub fn parse(link: &str) -> Result<Self, DecodeError> {
        let rest = super::strip_identifier(link, IDENTIFIER)
            .ok_or_else(|| DecodeError::malformed(PROTOCOL, "missing ss:// identifier"))?;
        let (body, fragment) = match rest.split_once('#') {
            Some((body, fragment)) => (body, Some(fragment)),
            None => (rest, None),
        };
        if body.is_empty() {
            return Err(DecodeError::malformed(PROTOCOL, "empty link body"));
        }

        let normalized = if body.contains('@') {
            format!("{}{}", IDENTIFIER, body)
        } else {
            let decoded = super::decode_base64_text(body)
                .ok_or_else(|| DecodeError::malformed(PROTOCOL, "body is not base64"))?;
            format!("{}{}", IDENTIFIER, decoded)
        };
        let uri = Url::parse(&normalized)?;
        let (host, port) = fields::endpoint(&uri, PROTOCOL)?;
        let (method, password) = Self::user_info(&uri)?;

        let mut ss = Shadowsocks {
            method,
            password,
            host,
            port,
            remark: fragment.map(fields::decode_component).unwrap_or_default(),
            ..Default::default()
        };
        fields::apply_query(&mut ss, &uri, FIELDS);
        Ok(ss)
    }

    fn user_info(uri: &Url) -> Result<(String, String), DecodeError> {
        let user = fields::decode_component(uri.username());
        if let Some(password) = uri.password() {
            return Ok((user, fields::decode_component(password)));
        }

        let pair = super::decode_base64_text(&user)
            .ok_or_else(|| DecodeError::malformed(PROTOCOL, "user-info is not base64"))?;
        pair.split_once(':')
            .map(|(method, password)| (method.to_string(), password.to_string()))
            .ok_or_else(|| DecodeError::malformed(PROTOCOL, "user-info lacks method:password"))
    }

    pub fn address(&self) -> String {
        fields::format_address(&self.host, self.port)
    }
}
