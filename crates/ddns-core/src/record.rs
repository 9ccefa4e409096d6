//! Resource records
//!
//! The store only serves address records. [`RecordData`] is the tagged
//! variant over the supported kinds; adding a kind means adding a variant
//! and its presentation form here.
//!
//! ## Presentation form
//!
//! One record per line, fields separated by whitespace:
//!
//! ```text
//! a.example.com.	30	IN	A	1.2.3.4
//! a.example.com.	30	IN	AAAA	2001:db8::1
//! ```
//!
//! Names are always written fully qualified. The same text is used as the
//! in-memory value of the store and as a line of the record file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::key;
use crate::{Error, Result};

/// TTL given to records created through the control API (seconds)
pub const DEFAULT_TTL: u32 = 30;

/// The only class served
pub const CLASS_IN: &str = "IN";

/// Supported record types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    #[default]
    #[serde(rename = "A", alias = "a")]
    A,
    /// IPv6 address record
    #[serde(rename = "AAAA", alias = "aaaa")]
    Aaaa,
}

impl RecordType {
    /// Numeric type code used on the wire and in storage keys
    pub fn code(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Aaaa => 28,
        }
    }

    /// Map a numeric type code to a supported type
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(RecordType::A),
            28 => Some(RecordType::Aaaa),
            _ => None,
        }
    }

    /// Mnemonic used in presentation form
    pub fn mnemonic(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Record type that carries the given address
    pub fn for_address(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            other => Err(Error::invalid_record(format!(
                "unsupported record type '{}'",
                other
            ))),
        }
    }
}

/// Type-specific payload of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
}

impl RecordData {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordData::A(_) => RecordType::A,
            RecordData::Aaaa(_) => RecordType::Aaaa,
        }
    }

    pub fn address(&self) -> IpAddr {
        match self {
            RecordData::A(ip) => IpAddr::V4(*ip),
            RecordData::Aaaa(ip) => IpAddr::V6(*ip),
        }
    }
}

impl From<IpAddr> for RecordData {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => RecordData::A(v4),
            IpAddr::V6(v6) => RecordData::Aaaa(v6),
        }
    }
}

/// One DNS answer entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Fully qualified owner name, case as written
    name: String,
    ttl: u32,
    data: RecordData,
}

impl ResourceRecord {
    /// Build a record, validating and fully qualifying `name`
    pub fn new(name: &str, ttl: u32, data: RecordData) -> Result<Self> {
        key::split_labels(name)?;

        let name = if name.ends_with('.') {
            name.to_string()
        } else {
            format!("{}.", name)
        };

        Ok(Self { name, ttl, data })
    }

    /// Build an address record with the default TTL
    ///
    /// The record type follows the address family.
    pub fn address_record(name: &str, ip: IpAddr) -> Result<Self> {
        Self::new(name, DEFAULT_TTL, RecordData::from(ip))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn data(&self) -> &RecordData {
        &self.data
    }

    pub fn record_type(&self) -> RecordType {
        self.data.record_type()
    }

    pub fn address(&self) -> IpAddr {
        self.data.address()
    }

    /// Storage key of this record
    pub fn key(&self) -> Result<String> {
        key::derive_key(&self.name, self.record_type().code())
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.name,
            self.ttl,
            CLASS_IN,
            self.record_type(),
            self.address()
        )
    }
}

impl FromStr for ResourceRecord {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [name, ttl, class, rtype, value] = fields.as_slice() else {
            return Err(Error::invalid_record(format!(
                "expected 5 fields, got {}: '{}'",
                fields.len(),
                line
            )));
        };

        let ttl: u32 = ttl
            .parse()
            .map_err(|_| Error::invalid_record(format!("bad TTL '{}'", ttl)))?;

        if !class.eq_ignore_ascii_case(CLASS_IN) {
            return Err(Error::invalid_record(format!("unsupported class '{}'", class)));
        }

        let data = match rtype.parse::<RecordType>()? {
            RecordType::A => RecordData::A(
                value
                    .parse()
                    .map_err(|_| Error::invalid_record(format!("bad IPv4 address '{}'", value)))?,
            ),
            RecordType::Aaaa => RecordData::Aaaa(
                value
                    .parse()
                    .map_err(|_| Error::invalid_record(format!("bad IPv6 address '{}'", value)))?,
            ),
        };

        Self::new(name, ttl, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presentation_form() {
        let record = ResourceRecord::address_record("a.example.com", "1.2.3.4".parse().unwrap())
            .unwrap();
        assert_eq!(record.to_string(), "a.example.com.\t30\tIN\tA\t1.2.3.4");

        let parsed: ResourceRecord = record.to_string().parse().unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_ipv6_becomes_aaaa() {
        let record =
            ResourceRecord::address_record("v6.example.com.", "2001:db8::1".parse().unwrap())
                .unwrap();
        assert_eq!(record.record_type(), RecordType::Aaaa);
        assert_eq!(record.name(), "v6.example.com.");
        assert_eq!(record.to_string(), "v6.example.com.\t30\tIN\tAAAA\t2001:db8::1");
    }

    #[test]
    fn test_parse_accepts_spaces_and_lowercase() {
        let parsed: ResourceRecord = "host.example.org 300 in a 10.0.0.1".parse().unwrap();
        assert_eq!(parsed.name(), "host.example.org.");
        assert_eq!(parsed.ttl(), 300);
        assert_eq!(parsed.address(), "10.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        for line in [
            "",
            "a.example.com. 30 IN A",
            "a.example.com. thirty IN A 1.2.3.4",
            "a.example.com. 30 CH A 1.2.3.4",
            "a.example.com. 30 IN MX 1.2.3.4",
            "a.example.com. 30 IN A 2001:db8::1",
            "a.example.com. 30 IN AAAA 1.2.3.4",
            "bad name. 30 IN A 1.2.3.4",
        ] {
            assert!(line.parse::<ResourceRecord>().is_err(), "'{}' should not parse", line);
        }
    }

    #[test]
    fn test_key_uses_record_type() {
        let a = ResourceRecord::address_record("a.example.com", "1.2.3.4".parse().unwrap())
            .unwrap();
        let aaaa = ResourceRecord::address_record("a.example.com", "::1".parse().unwrap()).unwrap();
        assert_eq!(a.key().unwrap(), "com.example.a_1");
        assert_eq!(aaaa.key().unwrap(), "com.example.a_28");
    }

    #[test]
    fn test_record_type_codes() {
        assert_eq!(RecordType::from_code(1), Some(RecordType::A));
        assert_eq!(RecordType::from_code(28), Some(RecordType::Aaaa));
        assert_eq!(RecordType::from_code(15), None);
        assert_eq!("aaaa".parse::<RecordType>().unwrap(), RecordType::Aaaa);
    }
}
