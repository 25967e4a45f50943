use std::convert::TryFrom;
use std::fmt;
use std::net::Ipv4Addr;

use ipnetwork::IpNetworkError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rib::{Origin, PathAttributes, Prefix, Route};

/// One message exchanged with a neighbor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    #[serde(flatten)]
    pub body: Body,
}

/// Message payloads, tagged by the wire `type` field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "msg")]
pub enum Body {
    #[serde(rename = "update")]
    Update(Announcement),
    #[serde(rename = "revoke")]
    Revoke(Vec<Withdrawal>),
    #[serde(rename = "data")]
    Data(Value),
    #[serde(rename = "dump")]
    Dump(Value),
    #[serde(rename = "table")]
    Table(Vec<TableEntry>),
    #[serde(rename = "no route")]
    NoRoute(Value),
}

impl Body {
    pub fn kind(&self) -> &'static str {
        match self {
            Body::Update(_) => "update",
            Body::Revoke(_) => "revoke",
            Body::Data(_) => "data",
            Body::Dump(_) => "dump",
            Body::Table(_) => "table",
            Body::NoRoute(_) => "no route",
        }
    }
}

impl Message {
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr, body: Body) -> Self {
        Self { src, dst, body }
    }

    pub fn no_route(src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self::new(src, dst, Body::NoRoute(Value::Object(Default::default())))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<Message {} src={} dst={}>",
            self.body.kind(),
            self.src,
            self.dst
        )
    }
}

/// Payload of an `update`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub network: Ipv4Addr,
    pub netmask: Ipv4Addr,
    #[serde(rename = "localpref")]
    pub local_pref: u32,
    #[serde(rename = "selfOrigin")]
    pub self_origin: bool,
    #[serde(rename = "ASPath")]
    pub as_path: Vec<u32>,
    pub origin: Origin,
}

impl Announcement {
    /// Route learned from `peer` through this announcement
    pub fn to_route(&self, peer: Ipv4Addr) -> Result<Route, IpNetworkError> {
        Ok(Route {
            prefix: Prefix::new(self.network, self.netmask)?,
            attributes: PathAttributes {
                local_pref: self.local_pref,
                self_origin: self.self_origin,
                as_path: self.as_path.clone(),
                origin: self.origin,
            },
            peer,
        })
    }

    /// Copy of this announcement as re-advertised by `asn`
    pub fn propagated(&self, asn: u32) -> Self {
        let mut as_path = Vec::with_capacity(self.as_path.len() + 1);
        as_path.push(asn);
        as_path.extend_from_slice(&self.as_path);
        Self {
            as_path,
            ..self.clone()
        }
    }
}

/// One prefix in a `revoke`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub network: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl TryFrom<&Withdrawal> for Prefix {
    type Error = IpNetworkError;

    fn try_from(withdrawal: &Withdrawal) -> Result<Self, Self::Error> {
        Prefix::new(withdrawal.network, withdrawal.netmask)
    }
}

/// One row of a `table` (dump reply)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub network: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub peer: Ipv4Addr,
    #[serde(rename = "localpref")]
    pub local_pref: u32,
    #[serde(rename = "selfOrigin")]
    pub self_origin: bool,
    #[serde(rename = "ASPath")]
    pub as_path: Vec<u32>,
    pub origin: Origin,
}

impl From<&Route> for TableEntry {
    fn from(route: &Route) -> Self {
        TableEntry {
            network: route.prefix.network(),
            netmask: route.prefix.netmask(),
            peer: route.peer,
            local_pref: route.attributes.local_pref,
            self_origin: route.attributes.self_origin,
            as_path: route.attributes.as_path.clone(),
            origin: route.attributes.origin,
        }
    }
}
