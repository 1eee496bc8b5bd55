//! `socks://<base64(user:pass)>@<host>:<port>#<remark>`

use super::fields;
use super::DecodeError;
use url::Url;

const PROTOCOL: &str = "socks";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Socks {
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub remark: String,
}

impl Socks {
    pub fn parse(link: &str) -> Result<Self, DecodeError> {
        let uri = Url::parse(link)?;
        let (host, port) = fields::endpoint(&uri, PROTOCOL)?;

        let mut socks = Socks {
            host,
            port,
            remark: fields::remark_from_fragment(&uri),
            ..Default::default()
        };

        if !uri.username().is_empty() {
            let user_info = fields::decode_component(uri.username());
            // Either base64 of `user:pass` or plain `user:pass`
            let credentials = match uri.password() {
                Some(password) => format!("{}:{}", user_info, fields::decode_component(password)),
                None => super::decode_base64_text(&user_info).unwrap_or(user_info),
            };
            let (username, password) = match credentials.split_once(':') {
                Some((user, pass)) => (user.to_string(), Some(pass.to_string())),
                None => (credentials, None),
            };
            socks.username = Some(username);
            socks.password = password;
        }

        Ok(socks)
    }

    pub fn address(&self) -> String {
        fields::format_address(&self.host, self.port)
    }
}
