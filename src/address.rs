//! SCION endpoint addressing.
//!
//! An endpoint is an ISD-AS identifier paired with a host address. The
//! textual form accepted on the command line is `"<isd>-<as>,[<host>]"`, for
//! example `1-ff00:0:111,[127.0.0.1]` or `1-ff00:0:112,[CS]`.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

lazy_static! {
    static ref ENDPOINT_REGEX: Regex =
        Regex::new(r"^(\d+-[\d:A-Fa-f]+),\[([^\]]+)\]$").expect("static regex");
}

/// Largest AS number that is printed in decimal (BGP style).
pub const MAX_BGP_ASN: u64 = u32::MAX as u64;

/// Largest representable AS number (48 bits).
pub const MAX_ASN: u64 = (1 << 48) - 1;

const ASN_BITS: u32 = 48;
const HEX_GROUP_BITS: u32 = 16;

/// Errors produced while parsing endpoint strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    /// The input does not have the `<ia>,[<host>]` shape.
    #[error("no valid SCION address: {0:?}")]
    Malformed(String),
    /// The ISD-AS part could not be parsed.
    #[error("invalid IA string: {0}")]
    InvalidIsdAsn(String),
    /// The host part is neither a service name nor an IP literal.
    #[error("invalid IP address string: {0}")]
    InvalidHost(String),
}

// ============================================================================
// ISD-AS
// ============================================================================

/// ISD-AS identifier packed into 64 bits: 16 bits ISD, 48 bits AS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IsdAsn(pub u64);

impl IsdAsn {
    pub fn new(isd: u16, asn: u64) -> Self {
        IsdAsn(((isd as u64) << ASN_BITS) | (asn & MAX_ASN))
    }

    pub fn isd(&self) -> u16 {
        (self.0 >> ASN_BITS) as u16
    }

    pub fn asn(&self) -> u64 {
        self.0 & MAX_ASN
    }

    pub fn to_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for IsdAsn {
    fn from(value: u64) -> Self {
        IsdAsn(value)
    }
}

impl From<IsdAsn> for u64 {
    fn from(value: IsdAsn) -> Self {
        value.0
    }
}

impl fmt::Display for IsdAsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let asn = self.asn();
        if asn <= MAX_BGP_ASN {
            return write!(f, "{}-{}", self.isd(), asn);
        }
        write!(
            f,
            "{}-{:x}:{:x}:{:x}",
            self.isd(),
            (asn >> (2 * HEX_GROUP_BITS)) & 0xffff,
            (asn >> HEX_GROUP_BITS) & 0xffff,
            asn & 0xffff
        )
    }
}

impl FromStr for IsdAsn {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressParseError::InvalidIsdAsn(s.to_string());

        let (isd, asn) = s.split_once('-').ok_or_else(invalid)?;
        if isd.is_empty() || !isd.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let isd: u16 = isd.parse().map_err(|_| invalid())?;
        let asn = parse_asn(asn).ok_or_else(invalid)?;

        Ok(IsdAsn::new(isd, asn))
    }
}

impl TryFrom<String> for IsdAsn {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IsdAsn> for String {
    fn from(value: IsdAsn) -> Self {
        value.to_string()
    }
}

/// Parse the AS part: decimal up to 32 bits, or three hex groups.
fn parse_asn(s: &str) -> Option<u64> {
    if !s.contains(':') {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let asn: u64 = s.parse().ok()?;
        return (asn <= MAX_BGP_ASN).then_some(asn);
    }

    let groups: Vec<&str> = s.split(':').collect();
    if groups.len() != 3 {
        return None;
    }

    let mut asn = 0u64;
    for group in groups {
        if group.is_empty() || group.len() > 4 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let value = u16::from_str_radix(group, 16).ok()?;
        asn = (asn << HEX_GROUP_BITS) | value as u64;
    }
    Some(asn)
}

// ============================================================================
// Host addresses
// ============================================================================

/// Anycast/multicast service address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceAddr(u16);

impl ServiceAddr {
    pub const DAEMON: ServiceAddr = ServiceAddr(0x0001);
    pub const CONTROL: ServiceAddr = ServiceAddr(0x0002);
    pub const WILDCARD: ServiceAddr = ServiceAddr(0x0010);

    const MULTICAST_FLAG: u16 = 0x8000;

    pub fn multicast(self) -> Self {
        ServiceAddr(self.0 | Self::MULTICAST_FLAG)
    }

    pub fn anycast(self) -> Self {
        ServiceAddr(self.0 & !Self::MULTICAST_FLAG)
    }

    pub fn is_multicast(&self) -> bool {
        self.0 & Self::MULTICAST_FLAG != 0
    }

    pub fn to_u16(self) -> u16 {
        self.0
    }

    fn base_name(&self) -> Option<&'static str> {
        match self.anycast() {
            ServiceAddr::DAEMON => Some("DS"),
            ServiceAddr::CONTROL => Some("CS"),
            ServiceAddr::WILDCARD => Some("Wildcard"),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base_name() {
            Some(name) if self.is_multicast() => write!(f, "{name}_M"),
            Some(name) => write!(f, "{name}"),
            None => write!(f, "<SVC:{:#06x}>", self.0),
        }
    }
}

impl FromStr for ServiceAddr {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, multicast) = match s.rsplit_once('_') {
            Some((name, "A")) => (name, false),
            Some((name, "M")) => (name, true),
            _ => (s, false),
        };

        let svc = match name {
            "DS" => ServiceAddr::DAEMON,
            "CS" => ServiceAddr::CONTROL,
            "Wildcard" => ServiceAddr::WILDCARD,
            _ => return Err(AddressParseError::InvalidHost(s.to_string())),
        };

        Ok(if multicast { svc.multicast() } else { svc })
    }
}

/// Host part of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HostAddr {
    Ip(IpAddr),
    Svc(ServiceAddr),
}

impl HostAddr {
    /// Type tag used in derivation inputs.
    pub fn type_code(&self) -> u8 {
        match self {
            HostAddr::Ip(IpAddr::V4(_)) => 1,
            HostAddr::Ip(IpAddr::V6(_)) => 2,
            HostAddr::Svc(_) => 3,
        }
    }

    /// Raw address bytes (4, 16 or 2 bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            HostAddr::Ip(IpAddr::V4(ip)) => ip.octets().to_vec(),
            HostAddr::Ip(IpAddr::V6(ip)) => ip.octets().to_vec(),
            HostAddr::Svc(svc) => svc.to_u16().to_be_bytes().to_vec(),
        }
    }
}

impl From<IpAddr> for HostAddr {
    fn from(ip: IpAddr) -> Self {
        HostAddr::Ip(ip)
    }
}

impl From<ServiceAddr> for HostAddr {
    fn from(svc: ServiceAddr) -> Self {
        HostAddr::Svc(svc)
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostAddr::Ip(ip) => write!(f, "{ip}"),
            HostAddr::Svc(svc) => write!(f, "{svc}"),
        }
    }
}

impl FromStr for HostAddr {
    type Err = AddressParseError;

    /// Service names take precedence over IP literals.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(svc) = s.parse::<ServiceAddr>() {
            return Ok(HostAddr::Svc(svc));
        }
        s.parse::<IpAddr>()
            .map(HostAddr::Ip)
            .map_err(|_| AddressParseError::InvalidHost(s.to_string()))
    }
}

impl TryFrom<String> for HostAddr {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HostAddr> for String {
    fn from(value: HostAddr) -> Self {
        value.to_string()
    }
}

// ============================================================================
// Endpoints
// ============================================================================

/// A SCION endpoint: ISD-AS plus host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScionAddr {
    pub isd_as: IsdAsn,
    pub host: HostAddr,
}

impl ScionAddr {
    pub fn new(isd_as: IsdAsn, host: HostAddr) -> Self {
        Self { isd_as, host }
    }
}

impl fmt::Display for ScionAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},[{}]", self.isd_as, self.host)
    }
}

impl FromStr for ScionAddr {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = ENDPOINT_REGEX
            .captures(s)
            .ok_or_else(|| AddressParseError::Malformed(s.to_string()))?;

        let isd_as: IsdAsn = captures[1].parse()?;
        let host: HostAddr = captures[2].parse()?;

        Ok(ScionAddr { isd_as, host })
    }
}

/// Parse an endpoint string of the form `"<ia>,[<host>]"`.
pub fn parse_endpoint(s: &str) -> Result<ScionAddr, AddressParseError> {
    s.parse()
}
