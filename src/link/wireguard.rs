//! `wireguard://<secret key>@<endpoint>?address=..&publickey=..&mtu=..#<remark>`

use super::fields::{self, QueryField};
use super::DecodeError;
use url::Url;

const PROTOCOL: &str = "wireguard";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wireguard {
    pub secret_key: String,
    pub endpoint: String,
    pub public_key: Option<String>,
    /// Comma separated interface addresses
    pub local_address: Option<String>,
    pub mtu: Option<i64>,
    pub reserved: Option<String>,
    pub remark: String,
}

const FIELDS: &[QueryField<Wireguard>] = &[
    QueryField::str("publickey", |w| &mut w.public_key),
    QueryField::str("address", |w| &mut w.local_address),
    QueryField::int("mtu", |w| &mut w.mtu),
    QueryField::str("reserved", |w| &mut w.reserved),
];

impl Wireguard {
    pub fn parse(link: &str) -> Result<Self, DecodeError> {
        let uri = Url::parse(link)?;
        let host = uri
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| DecodeError::malformed(PROTOCOL, "missing endpoint"))?;
        // The port is optional; a bare host is kept as the endpoint
        let endpoint = match uri.port() {
            Some(port) => fields::format_address(host, port),
            None => host.to_string(),
        };

        let mut wireguard = Wireguard {
            secret_key: fields::credential(&uri, PROTOCOL)?,
            endpoint,
            remark: fields::remark_from_fragment(&uri),
            ..Default::default()
        };
        fields::apply_query(&mut wireguard, &uri, FIELDS);
        Ok(wireguard)
    }

    pub fn local_addresses(&self) -> Vec<&str> {
        self.local_address
            .as_deref()
            .map(|a| a.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}
