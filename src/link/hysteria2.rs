//! `hysteria2://<auth>@<host>:<port>?<params>#<remark>` (also `hy2://`)

use super::fields::{self, QueryField};
use super::DecodeError;
use url::Url;

const PROTOCOL: &str = "hysteria2";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hysteria2 {
    pub auth: String,
    pub host: String,
    pub port: u16,
    pub sni: Option<String>,
    pub obfs: Option<String>,
    pub obfs_password: Option<String>,
    pub insecure: Option<i64>,
    pub pin_sha256: Option<String>,
    pub remark: String,
}

const FIELDS: &[QueryField<Hysteria2>] = &[
    QueryField::str("sni", |h| &mut h.sni),
    QueryField::str("obfs", |h| &mut h.obfs),
    QueryField::str("obfs-password", |h| &mut h.obfs_password),
    QueryField::int("insecure", |h| &mut h.insecure),
    QueryField::str("pinSHA256", |h| &mut h.pin_sha256),
];

impl Hysteria2 {
    pub fn parse(link: &str) -> Result<Self, DecodeError> {
        let uri = Url::parse(link)?;
        let (host, port) = fields::endpoint(&uri, PROTOCOL)?;

        // `user:pass` auth is carried whole
        let mut auth = fields::credential(&uri, PROTOCOL)?;
        if let Some(password) = uri.password() {
            auth = format!("{}:{}", auth, fields::decode_component(password));
        }

        let mut hysteria = Hysteria2 {
            auth,
            host,
            port,
            remark: fields::remark_from_fragment(&uri),
            ..Default::default()
        };
        fields::apply_query(&mut hysteria, &uri, FIELDS);
        Ok(hysteria)
    }

    pub fn address(&self) -> String {
        fields::format_address(&self.host, self.port)
    }
}
