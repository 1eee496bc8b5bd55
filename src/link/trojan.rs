//! `trojan://<password>@<host>:<port>?<params>#<remark>`

use super::fields::{self, QueryField};
use super::DecodeError;
use url::Url;

const PROTOCOL: &str = "trojan";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trojan {
    pub password: String,
    pub host: String,
    pub port: u16,
    pub security: Option<String>,
    pub network: Option<String>,
    pub header_type: Option<String>,
    pub request_host: Option<String>,
    pub path: Option<String>,
    pub sni: Option<String>,
    pub alpn: Option<String>,
    pub fingerprint: Option<String>,
    pub service_name: Option<String>,
    pub allow_insecure: Option<i64>,
    pub remark: String,
}

const FIELDS: &[QueryField<Trojan>] = &[
    QueryField::str("security", |t| &mut t.security),
    QueryField::str("type", |t| &mut t.network),
    QueryField::str("headerType", |t| &mut t.header_type),
    QueryField::str("host", |t| &mut t.request_host),
    QueryField::str("path", |t| &mut t.path),
    QueryField::str("sni", |t| &mut t.sni),
    QueryField::str("alpn", |t| &mut t.alpn),
    QueryField::str("fp", |t| &mut t.fingerprint),
    QueryField::str("serviceName", |t| &mut t.service_name),
    QueryField::int("allowInsecure", |t| &mut t.allow_insecure),
];

impl Trojan {
    pub fn parse(link: &str) -> Result<Self, DecodeError> {
        let uri = Url::parse(link)?;
        let (host, port) = fields::endpoint(&uri, PROTOCOL)?;

        let mut trojan = Trojan {
            password: fields::credential(&uri, PROTOCOL)?,
            host,
            port,
            remark: fields::remark_from_fragment(&uri),
            ..Default::default()
        };
        fields::apply_query(&mut trojan, &uri, FIELDS);
        Ok(trojan)
    }

    pub fn address(&self) -> String {
        fields::format_address(&self.host, self.port)
    }
}
