//! DNS resource records.
//!
//! [`Record`] holds the type-specific record data of the record types relevant to DNS-SD, and
//! [`ResourceRecord`] attaches the owner name, class and TTL every record carries.
//!
//! Record data is always decoded into owned values, so records can outlive the datagram they were
//! received in.

use std::{
    fmt::{self, Write as _},
    hash::{Hash, Hasher},
    net::{Ipv4Addr, Ipv6Addr},
};

use super::{decoder::Reader, encoder::Writer, name::DomainName, Class, Error, Type};

/// Gives record types write access to the RDATA of the record being encoded.
pub struct RecordEncoder<'w, 'a> {
    pub(crate) w: &'w mut Writer<'a>,
}

/// Gives record types read access to the RDATA of the record being decoded.
pub struct RecordDecoder<'a> {
    pub(crate) r: Reader<'a>,
}

/// Trait implemented by all structured resource record types.
pub trait RecordData: Sized + Into<Record> {
    /// The associated resource record type.
    const TYPE: Type;

    /// Writes the data of this resource record to the given encoder.
    fn encode(&self, enc: &mut RecordEncoder<'_, '_>);

    /// Attempts to decode an instance of this resource record from an RDATA field.
    fn decode(dec: &mut RecordDecoder<'_>) -> Result<Self, Error>;
}

type DecodeFn = fn(&mut RecordDecoder<'_>) -> Result<Record, Error>;

fn decode_as<R: RecordData>(dec: &mut RecordDecoder<'_>) -> Result<Record, Error> {
    R::decode(dec).map(Into::into)
}

macro_rules! records {
    (
        $($record:ident),+ $(,)?
    ) => {
        /// Record data of a resource record.
        ///
        /// Types without a dedicated decoder are kept as [`Unknown`], so that a single foreign or
        /// future record type never prevents the rest of a message from being read.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum Record {
            $( $record($record), )+
            Unknown(Unknown),
        }

        impl Record {
            /// The decode table: maps a wire TYPE code to the decoder for its record data.
            fn decoder(ty: Type) -> Option<DecodeFn> {
                match ty {
                    $( Type::$record => Some(decode_as::<$record> as DecodeFn), )+
                    _ => None,
                }
            }

            pub(crate) fn encode(&self, enc: &mut RecordEncoder<'_, '_>) {
                match self {
                    $( Record::$record(rr) => rr.encode(enc), )+
                    Record::Unknown(rr) => rr.encode(enc),
                }
            }

            /// Returns the TYPE code this record is encoded with.
            pub fn record_type(&self) -> Type {
                match self {
                    $( Record::$record(_) => Type::$record, )+
                    Record::Unknown(rr) => rr.ty,
                }
            }
        }

        $(
            impl From<$record> for Record {
                #[inline]
                fn from(rr: $record) -> Self {
                    Record::$record(rr)
                }
            }
        )+

        impl From<Unknown> for Record {
            #[inline]
            fn from(rr: Unknown) -> Self {
                Record::Unknown(rr)
            }
        }

        impl fmt::Display for Record {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( Record::$record(r) => r.fmt(f), )+
                    Record::Unknown(r) => r.fmt(f),
                }
            }
        }
    };
}

records!(A, AAAA, PTR, SRV, TXT);

impl Record {
    /// Decodes record data of type `ty`, which must span all of `rdata`.
    pub(crate) fn decode(ty: Type, rdata: Reader<'_>) -> Result<Self, Error> {
        let mut dec = RecordDecoder { r: rdata };
        let record = match Self::decoder(ty) {
            Some(decode) => decode(&mut dec)?,
            None => Record::Unknown(Unknown::decode(ty, &mut dec)?),
        };
        if !dec.r.buf().is_empty() {
            return Err(Error::RdataLength);
        }
        Ok(record)
    }

    pub fn as_ptr(&self) -> Option<&PTR> {
        match self {
            Record::PTR(ptr) => Some(ptr),
            _ => None,
        }
    }

    pub fn as_srv(&self) -> Option<&SRV> {
        match self {
            Record::SRV(srv) => Some(srv),
            _ => None,
        }
    }

    pub fn as_txt(&self) -> Option<&TXT> {
        match self {
            Record::TXT(txt) => Some(txt),
            _ => None,
        }
    }
}

/// A complete resource record: owner name, class, TTL and [`Record`] data.
///
/// Two resource records are equal when their name, class and data are equal. The TTL and the
/// cache-flush bit are bookkeeping of the sender and don't take part in comparisons.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    name: DomainName,
    class: Class,
    cache_flush: bool,
    ttl: u32,
    record: Record,
}

impl ResourceRecord {
    /// TTL used by [`ResourceRecord::new`], the RFC 6762 recommendation for host name records.
    pub const DEFAULT_TTL: u32 = 120;

    /// Creates an Internet-class record with the default TTL.
    pub fn new(name: DomainName, record: impl Into<Record>) -> Self {
        Self {
            name,
            class: Class::IN,
            cache_flush: false,
            ttl: Self::DEFAULT_TTL,
            record: record.into(),
        }
    }

    #[inline]
    pub fn with_class(self, class: Class) -> Self {
        Self { class, ..self }
    }

    #[inline]
    pub fn with_cache_flush(self, cache_flush: bool) -> Self {
        Self {
            cache_flush,
            ..self
        }
    }

    #[inline]
    pub fn with_ttl(self, ttl: u32) -> Self {
        Self { ttl, ..self }
    }

    #[inline]
    pub fn name(&self) -> &DomainName {
        &self.name
    }

    #[inline]
    pub fn class(&self) -> Class {
        self.class
    }

    /// Returns whether the record's mDNS cache-flush bit is set.
    #[inline]
    pub fn cache_flush(&self) -> bool {
        self.cache_flush
    }

    /// Returns the record's Time To Live, in seconds.
    #[inline]
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    #[inline]
    pub fn record(&self) -> &Record {
        &self.record
    }

    #[inline]
    pub fn record_type(&self) -> Type {
        self.record.record_type()
    }
}

impl PartialEq for ResourceRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.class == other.class && self.record == other.record
    }
}

impl Eq for ResourceRecord {}

impl Hash for ResourceRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.class.hash(state);
        self.record.hash(state);
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.name,
            self.ttl,
            self.class,
            self.record_type(),
            self.record,
        )
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct A {
    addr: Ipv4Addr,
}

impl RecordData for A {
    const TYPE: Type = Type::A;

    fn encode(&self, enc: &mut RecordEncoder<'_, '_>) {
        enc.w.write_slice(&self.addr.octets())
    }

    fn decode(dec: &mut RecordDecoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            addr: Ipv4Addr::from(dec.r.read_array::<4>()?),
        })
    }
}

impl A {
    #[inline]
    pub fn new(addr: Ipv4Addr) -> Self {
        Self { addr }
    }

    #[inline]
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }
}

impl fmt::Display for A {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct AAAA {
    addr: Ipv6Addr,
}

impl RecordData for AAAA {
    const TYPE: Type = Type::AAAA;

    fn encode(&self, enc: &mut RecordEncoder<'_, '_>) {
        enc.w.write_slice(&self.addr.octets());
    }

    fn decode(dec: &mut RecordDecoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            addr: Ipv6Addr::from(dec.r.read_array::<16>()?),
        })
    }
}

impl AAAA {
    #[inline]
    pub fn new(addr: Ipv6Addr) -> Self {
        Self { addr }
    }

    #[inline]
    pub fn addr(&self) -> Ipv6Addr {
        self.addr
    }
}

impl fmt::Display for AAAA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}

/// Points from a service type to one of its instances.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct PTR {
    ptrdname: DomainName,
}

impl RecordData for PTR {
    const TYPE: Type = Type::PTR;

    fn encode(&self, enc: &mut RecordEncoder<'_, '_>) {
        enc.w.write_domain_name(&self.ptrdname);
    }

    fn decode(dec: &mut RecordDecoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            ptrdname: dec.r.read_domain_name()?,
        })
    }
}

impl PTR {
    pub fn new(ptrdname: DomainName) -> Self {
        Self { ptrdname }
    }

    pub fn ptrdname(&self) -> &DomainName {
        &self.ptrdname
    }
}

impl fmt::Display for PTR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.ptrdname.fmt(f)
    }
}

/// A list of `<character-string>`s. DNS-SD stores `key=value` metadata in them.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct TXT {
    entries: Vec<Box<[u8]>>,
}

impl RecordData for TXT {
    const TYPE: Type = Type::TXT;

    fn encode(&self, enc: &mut RecordEncoder<'_, '_>) {
        if self.entries.is_empty() {
            // A TXT record must contain at least one string, so "no entries" is encoded as a
            // single empty string (RFC 6763, section 6.1).
            enc.w.write_character_string(&[]);
        }
        for entry in self.entries() {
            enc.w.write_character_string(entry);
        }
    }

    fn decode(dec: &mut RecordDecoder<'_>) -> Result<Self, Error> {
        let mut entries = Vec::new();

        // Technically at least one is required, but we accept 0 too.
        while !dec.r.buf().is_empty() {
            let entry = dec.r.read_character_string()?;
            // The single empty string is the "no entries" encoding, not an entry.
            if !entry.is_empty() {
                entries.push(entry.into());
            }
        }

        Ok(Self { entries })
    }
}

impl TXT {
    /// Creates a new [`TXT`] resource record containing `entries`.
    ///
    /// # Panics
    ///
    /// Panics if an entry is longer than 255 bytes.
    pub fn new<I, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let entries = entries
            .into_iter()
            .map(|entry| Box::<[u8]>::from(entry.as_ref()))
            .collect::<Vec<_>>();
        assert!(
            entries.iter().all(|entry| entry.len() <= 255),
            "TXT entries are limited to 255 bytes"
        );
        Self { entries }
    }

    /// Returns an iterator over all non-empty *character string* values in this record.
    ///
    /// Each *character string* is an arbitrary sequence of bytes. Their interpretation is up to
    /// higher-level specifications (see [`TxtRecords`](crate::TxtRecords)).
    pub fn entries(&self) -> impl Iterator<Item = &'_ [u8]> {
        self.entries.iter().map(|entry| &**entry)
    }
}

impl fmt::Display for TXT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries().enumerate() {
            if i != 0 {
                f.write_char(' ')?;
            }
            write!(f, "\"{}\"", entry.escape_ascii())?;
        }
        Ok(())
    }
}

/// Locates a service instance: the host it runs on and the port it listens on.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct SRV {
    priority: u16,
    weight: u16,
    port: u16,
    target: DomainName,
}

impl RecordData for SRV {
    const TYPE: Type = Type::SRV;

    fn encode(&self, enc: &mut RecordEncoder<'_, '_>) {
        enc.w.write_u16(self.priority);
        enc.w.write_u16(self.weight);
        enc.w.write_u16(self.port);
        enc.w.write_domain_name(&self.target);
    }

    fn decode(dec: &mut RecordDecoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            priority: dec.r.read_u16()?,
            weight: dec.r.read_u16()?,
            port: dec.r.read_u16()?,
            target: dec.r.read_domain_name()?,
        })
    }
}

impl SRV {
    pub fn new(priority: u16, weight: u16, port: u16, target: DomainName) -> Self {
        Self {
            priority,
            weight,
            port,
            target,
        }
    }

    /// Returns the priority value of this service (lower values mean that the service should be
    /// preferred).
    #[inline]
    pub fn priority(&self) -> u16 {
        self.priority
    }

    /// Returns the relative weight among records of the same priority (higher values are
    /// preferred).
    #[inline]
    pub fn weight(&self) -> u16 {
        self.weight
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[inline]
    pub fn target(&self) -> &DomainName {
        &self.target
    }
}

impl fmt::Display for SRV {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.priority, self.weight, self.port, self.target,
        )
    }
}

/// Record data of a type this crate has no decoder for, kept verbatim.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Unknown {
    ty: Type,
    data: Box<[u8]>,
}

impl Unknown {
    pub fn new(ty: Type, data: impl Into<Box<[u8]>>) -> Self {
        Self {
            ty,
            data: data.into(),
        }
    }

    fn decode(ty: Type, dec: &mut RecordDecoder<'_>) -> Result<Self, Error> {
        let len = dec.r.buf().len();
        Ok(Self::new(ty, dec.r.read_slice(len)?))
    }

    fn encode(&self, enc: &mut RecordEncoder<'_, '_>) {
        enc.w.write_slice(&self.data);
    }

    #[inline]
    pub fn record_type(&self) -> Type {
        self.ty
    }

    /// Returns the raw, undecoded record data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for Unknown {
    /// Uses the RFC 3597 generic record data format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\# {}", self.data.len())?;
        if !self.data.is_empty() {
            write!(f, " {}", crate::hex::Hex(&self.data))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Write;

    use expect_test::expect;

    use super::*;

    fn domain(s: &str) -> DomainName {
        s.parse().unwrap()
    }

    fn decode(ty: Type, rdata: &[u8]) -> Result<Record, Error> {
        Record::decode(ty, Reader::new(rdata))
    }

    #[test]
    fn display() {
        let records: [Record; 6] = [
            A::new(Ipv4Addr::new(192, 168, 1, 10)).into(),
            AAAA::new("fe80::1".parse().unwrap()).into(),
            PTR::new(domain("Lamp._hap._tcp.local")).into(),
            SRV::new(0, 5, 8080, domain("lamp.local")).into(),
            TXT::new(["id=ab:cd", "flag", "bin=\x01"]).into(),
            Unknown::new(Type::NSEC, vec![0xc0u8, 0x0c]).into(),
        ];
        let mut out = String::new();
        for record in &records {
            writeln!(out, "{}: {}", record.record_type(), record).unwrap();
        }

        expect![[r#"
            A: 192.168.1.10
            AAAA: fe80::1
            PTR: Lamp._hap._tcp.local.
            SRV: 0 5 8080 lamp.local.
            TXT: "id=ab:cd" "flag" "bin=\x01"
            NSEC: \# 2 c00c
        "#]]
        .assert_eq(&out);
    }

    #[test]
    fn decode_table_dispatch() {
        assert_eq!(
            decode(Type::A, &[10, 0, 0, 1]),
            Ok(Record::A(A::new(Ipv4Addr::new(10, 0, 0, 1))))
        );
        assert_eq!(
            decode(Type::AAAA, &[0; 16]),
            Ok(Record::AAAA(AAAA::new(Ipv6Addr::UNSPECIFIED)))
        );
        assert_eq!(
            decode(Type::SRV, &[0, 1, 0, 2, 0x1f, 0x90, 1, b'h', 0]),
            Ok(Record::SRV(SRV::new(1, 2, 8080, domain("h"))))
        );
        assert_eq!(
            decode(Type::CNAME, &[1, b'h', 0]),
            Ok(Record::Unknown(Unknown::new(Type::CNAME, vec![1, b'h', 0])))
        );
        assert_eq!(
            decode(Type(0xff00), &[]),
            Ok(Record::Unknown(Unknown::new(Type(0xff00), Vec::<u8>::new())))
        );
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert_eq!(decode(Type::A, &[10, 0, 0]), Err(Error::Eof));
        assert_eq!(decode(Type::A, &[10, 0, 0, 1, 0]), Err(Error::RdataLength));
        assert_eq!(decode(Type::AAAA, &[0; 4]), Err(Error::Eof));
        // name ends before the declared length
        assert_eq!(
            decode(Type::PTR, &[1, b'h', 0, 0xaa]),
            Err(Error::RdataLength)
        );
        // character string runs past the end
        assert_eq!(decode(Type::TXT, &[5, b'a']), Err(Error::Eof));
    }

    #[test]
    fn txt_entries() {
        let txt = decode(Type::TXT, b"\x03a=1\x00\x04flag").unwrap();
        let txt = txt.as_txt().unwrap();
        assert_eq!(txt.entries().collect::<Vec<_>>(), [&b"a=1"[..], b"flag"]);

        let empty = decode(Type::TXT, &[0]).unwrap();
        assert_eq!(empty.as_txt().unwrap().entries().count(), 0);
        assert_eq!(decode(Type::TXT, &[]), Ok(empty));
    }

    #[test]
    fn unknown_record_data() {
        let rr = ResourceRecord::new(
            domain("lamp.local"),
            Unknown::new(Type::HINFO, vec![1, b'x', 1, b'y']),
        );
        assert_eq!(rr.record_type(), Type::HINFO);
        match rr.record() {
            Record::Unknown(unknown) => assert_eq!(unknown.data(), b"\x01x\x01y"),
            other => panic!("expected unknown record data, got {:?}", other),
        }
    }

    #[test]
    fn resource_record_identity() {
        let a = ResourceRecord::new(domain("lamp.local"), A::new(Ipv4Addr::LOCALHOST));
        let b = ResourceRecord::new(domain("LAMP.local"), A::new(Ipv4Addr::LOCALHOST))
            .with_ttl(4500)
            .with_cache_flush(true);
        assert_eq!(a, b);
        assert_ne!(a, a.clone().with_class(Class::CH));
        assert_eq!(a.record_type(), Type::A);
        assert_eq!(b.ttl(), 4500);
        assert!(b.cache_flush());
        assert!(a.record().as_ptr().is_none());
    }
}
