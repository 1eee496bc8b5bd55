//! `vless://<uuid>@<host>:<port>?<params>#<remark>`

use super::fields::{self, QueryField};
use super::DecodeError;
use url::Url;

const PROTOCOL: &str = "vless";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vless {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub encryption: Option<String>,
    pub flow: Option<String>,
    pub security: Option<String>,
    pub network: Option<String>,
    pub header_type: Option<String>,
    pub request_host: Option<String>,
    pub path: Option<String>,
    pub sni: Option<String>,
    pub alpn: Option<String>,
    pub fingerprint: Option<String>,
    pub public_key: Option<String>,
    pub short_id: Option<String>,
    pub spider_x: Option<String>,
    pub service_name: Option<String>,
    pub mode: Option<String>,
    pub remark: String,
}

const FIELDS: &[QueryField<Vless>] = &[
    QueryField::str("encryption", |v| &mut v.encryption),
    QueryField::str("flow", |v| &mut v.flow),
    QueryField::str("security", |v| &mut v.security),
    QueryField::str("type", |v| &mut v.network),
    QueryField::str("headerType", |v| &mut v.header_type),
    QueryField::str("host", |v| &mut v.request_host),
    QueryField::str("path", |v| &mut v.path),
    QueryField::str("sni", |v| &mut v.sni),
    QueryField::str("alpn", |v| &mut v.alpn),
    QueryField::str("fp", |v| &mut v.fingerprint),
    QueryField::str("pbk", |v| &mut v.public_key),
    QueryField::str("sid", |v| &mut v.short_id),
    QueryField::str("spx", |v| &mut v.spider_x),
    QueryField::str("serviceName", |v| &mut v.service_name),
    QueryField::str("mode", |v| &mut v.mode),
];

impl Vless {
    pub fn parse(link: &str) -> Result<Self, DecodeError> {
        let uri = Url::parse(link)?;
        let (host, port) = fields::endpoint(&uri, PROTOCOL)?;

        let mut vless = Vless {
            id: fields::credential(&uri, PROTOCOL)?,
            host,
            port,
            remark: fields::remark_from_fragment(&uri),
            ..Default::default()
        };
        fields::apply_query(&mut vless, &uri, FIELDS);
        Ok(vless)
    }

    pub fn address(&self) -> String {
        fields::format_address(&self.host, self.port)
    }
}
