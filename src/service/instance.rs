//! Fully resolved service instances.

use std::{
    collections::{btree_map::Entry, BTreeMap, BTreeSet},
    fmt,
    net::{IpAddr, SocketAddr},
};

use crate::{
    packet::{
        records::{Record, ResourceRecord, PTR, SRV, TXT},
        Type,
    },
    DomainName,
};

use super::record_set::RecordSet;

/// A discovered service instance: where it can be reached, plus its metadata.
///
/// An [`Instance`] only exists once its SRV record and at least one of its host's addresses
/// have been received.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instance {
    name: String,
    full_name: DomainName,
    host: DomainName,
    addresses: BTreeSet<IpAddr>,
    port: u16,
    text: TxtRecords,
}

impl Instance {
    /// Joins the PTR record `ptr` with the SRV, TXT and address records in `records`.
    ///
    /// Returns `None` if the chain is incomplete.
    pub(crate) fn assemble(ptr: &PTR, records: &RecordSet) -> Option<Self> {
        let full_name = ptr.ptrdname();
        let name = full_name.first_label()?.to_string_lossy();

        let Some(srv) = preferred_srv(records.get(full_name, Type::SRV)) else {
            log::debug!("{}: no SRV record", full_name);
            return None;
        };

        let host = srv.target();
        let addresses = records
            .get(host, Type::A)
            .iter()
            .chain(records.get(host, Type::AAAA))
            .filter_map(|rr| match rr.record() {
                Record::A(a) => Some(IpAddr::V4(a.addr())),
                Record::AAAA(aaaa) => Some(IpAddr::V6(aaaa.addr())),
                _ => None,
            })
            .collect::<BTreeSet<_>>();
        if addresses.is_empty() {
            log::debug!("{}: no address for {}", full_name, host);
            return None;
        }

        let text = records
            .get(full_name, Type::TXT)
            .iter()
            .find_map(|rr| rr.record().as_txt())
            .map(TxtRecords::from_txt)
            .unwrap_or_default();

        Some(Self {
            name,
            full_name: full_name.clone(),
            host: host.clone(),
            addresses,
            port: srv.port(),
            text,
        })
    }

    /// Returns the user-visible instance name (the first label of the full name).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the full `<instance>.<service>.<domain>` name.
    #[inline]
    pub fn full_name(&self) -> &DomainName {
        &self.full_name
    }

    /// Returns the host the instance runs on.
    #[inline]
    pub fn host(&self) -> &DomainName {
        &self.host
    }

    #[inline]
    pub fn addresses(&self) -> &BTreeSet<IpAddr> {
        &self.addresses
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[inline]
    pub fn text(&self) -> &TxtRecords {
        &self.text
    }

    /// Returns an endpoint for every address of the instance.
    pub fn socket_addrs(&self) -> impl Iterator<Item = SocketAddr> + '_ {
        self.addresses
            .iter()
            .map(move |addr| SocketAddr::new(*addr, self.port))
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{}", self.full_name, self.host, self.port)?;
        for addr in &self.addresses {
            write!(f, " {}", addr)?;
        }
        f.write_str(")")?;
        if !self.text.is_empty() {
            write!(f, " [{}]", self.text)?;
        }
        Ok(())
    }
}

/// Picks the SRV record to use: lowest priority first, then highest weight (RFC 2782).
fn preferred_srv(records: &[ResourceRecord]) -> Option<&SRV> {
    records
        .iter()
        .filter_map(|rr| rr.record().as_srv())
        .min_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then(b.weight().cmp(&a.weight()))
        })
}

/// List of `key=value` records stored in a DNS-SD TXT record of a service instance.
///
/// Keys are matched case-insensitively. If a key appears more than once, the first occurrence
/// wins (RFC 6763, section 6.4).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TxtRecords {
    // keys are lowercased
    map: BTreeMap<String, TxtRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TxtRecord {
    key: String,
    value: Option<Vec<u8>>,
}

impl TxtRecord {
    fn value(&self) -> TxtRecordValue<'_> {
        match &self.value {
            Some(v) => TxtRecordValue::Value(v),
            None => TxtRecordValue::NoValue,
        }
    }
}

impl TxtRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_txt(txt: &TXT) -> Self {
        let mut map = BTreeMap::new();

        for entry in txt.entries() {
            let mut split = entry.splitn(2, |&b| b == b'=');
            let key = split.next().unwrap_or_default();
            let key = match String::from_utf8(key.to_vec()) {
                Ok(key) if !key.is_empty() => key,
                Ok(_) => {
                    log::debug!("TXT entry without key: {}", entry.escape_ascii());
                    continue;
                }
                Err(e) => {
                    log::debug!("non-UTF-8 TXT key: {}", e);
                    continue;
                }
            };
            let value = split.next().map(<[u8]>::to_vec);
            match map.entry(key.to_ascii_lowercase()) {
                Entry::Vacant(e) => {
                    e.insert(TxtRecord { key, value });
                }
                Entry::Occupied(e) => {
                    log::debug!("TXT key '{}' already occupied, ignoring", e.key());
                }
            }
        }

        Self { map }
    }

    /// Returns an iterator over all key-value pairs, ordered by lowercased key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, TxtRecordValue<'_>)> {
        self.map
            .values()
            .map(|rec| (rec.key.as_str(), rec.value()))
    }

    pub fn get(&self, key: &str) -> Option<TxtRecordValue<'_>> {
        self.map
            .get(&key.to_ascii_lowercase())
            .map(TxtRecord::value)
    }

    /// Returns the value of `key` as a string, if it is present, has a value and is UTF-8.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            TxtRecordValue::Value(v) => std::str::from_utf8(v).ok(),
            TxtRecordValue::NoValue => None,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Display for TxtRecords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rec) in self.map.values().enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }

            f.write_str(&rec.key)?;
            if let Some(v) = &rec.value {
                f.write_str("=")?;
                v.escape_ascii().fmt(f)?;
            }
        }
        Ok(())
    }
}

/// The value of one TXT key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TxtRecordValue<'a> {
    /// The key is a boolean flag without `=`.
    NoValue,
    /// The (possibly empty) bytes after the `=`.
    Value(&'a [u8]),
}

impl<'a> fmt::Debug for TxtRecordValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoValue => f.write_str("-"),
            Self::Value(v) => match std::str::from_utf8(v) {
                Ok(s) => s.fmt(f),
                Err(_) => write!(f, "\"{}\"", v.escape_ascii()),
            },
        }
    }
}
