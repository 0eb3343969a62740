//! (m)DNS packet decoder and encoder.

#[macro_use]
mod macros;
pub mod decoder;
pub mod encoder;
mod error;
pub mod name;
pub mod question;
pub mod records;

use core::fmt;

use bitflags::bitflags;

pub use error::Error;

ffi_enum! {
    /// Resource Record types.
    ///
    /// Only a handful of these are decoded into structured data (see [`records::Record`]), every
    /// other type is carried as [`records::Unknown`].
    pub enum Type: u16 {
        A = 1,
        NS = 2,
        CNAME = 5,
        SOA = 6,
        PTR = 12,
        HINFO = 13,
        MX = 15,
        TXT = 16,
        AAAA = 28,
        SRV = 33,
        OPT = 41,
        NSEC = 47,
        /// Only valid in questions: requests records of every type.
        ANY = 255,
    }
}

impl Type {
    /// Returns whether a question asking for `self` is answered by a record of type `ty`.
    pub fn matches(&self, ty: Type) -> bool {
        *self == Self::ANY || *self == ty
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

ffi_enum! {
    /// Resource Record classes.
    ///
    /// The top bit of the raw class field is used by mDNS as the cache-flush (in records) or
    /// unicast-response (in questions) bit. It is stripped before a [`Class`] is created.
    pub enum Class: u16 {
        /// The Internet.
        IN = 1,
        /// Chaosnet.
        CH = 3,
        /// Hesiod.
        HS = 4,
        /// Only valid in questions: requests records of every class.
        ANY = 255,
    }
}

impl Class {
    /// Returns whether a question asking for `self` is answered by a record of class `class`.
    pub fn matches(&self, class: Class) -> bool {
        *self == Self::ANY || *self == class
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// Bit positions in the header flags are inverted, because RFC 1035 starts counting at the MSb.
const fn be_pos(pos: u16) -> u16 {
    15 - pos
}

bitflags! {
    #[derive(Debug)]
    #[repr(transparent)]
    struct HeaderFlags: u16 {
        /// If set, the message is a response to a query. If unset, it is a query.
        const QR = 1 << be_pos(0);
        const OPCODE = Self::OPCODE_MASK;
        /// Authoritative Answer. mDNS responders set this on all responses.
        const AA = 1 << be_pos(5);
        /// In mDNS queries this announces that known-answer records continue in a follow-up
        /// packet. In responses it is unused.
        const TC = 1 << be_pos(6);
        const RD = 1 << be_pos(7);
        const RA = 1 << be_pos(8);
        const RCODE = Self::RCODE_MASK;
    }
}

impl HeaderFlags {
    const OPCODE_POS: u16 = 11;
    const OPCODE_MASK: u16 = 0b1111 << Self::OPCODE_POS;

    const RCODE_MASK: u16 = 0b1111;
}

/// Packet header.
///
/// All fields are stored in network byte order, so this can be read from and written to a
/// packet buffer directly.
#[derive(Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Header {
    id: [u8; 2],
    flags: [u8; 2],
    qdcount: [u8; 2],
    ancount: [u8; 2],
    nscount: [u8; 2],
    arcount: [u8; 2],
}

impl Header {
    /// Size of the header on the wire.
    pub const LEN: usize = 12;

    fn flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_retain(u16::from_be_bytes(self.flags))
    }

    fn modify_flags(&mut self, with: impl FnOnce(&mut HeaderFlags)) {
        let mut flags = self.flags();
        with(&mut flags);
        self.flags = flags.bits().to_be_bytes();
    }

    /// Returns the 16-bit message ID.
    ///
    /// Multicast queries use ID 0, and mDNS responders are free to ignore it.
    #[inline]
    pub fn id(&self) -> u16 {
        u16::from_be_bytes(self.id)
    }

    #[inline]
    pub fn is_query(&self) -> bool {
        !self.is_response()
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        self.flags().contains(HeaderFlags::QR)
    }

    pub fn set_response(&mut self, is_response: bool) {
        self.modify_flags(|f| f.set(HeaderFlags::QR, is_response));
    }

    pub fn is_authority(&self) -> bool {
        self.flags().contains(HeaderFlags::AA)
    }

    pub fn set_authority(&mut self, aa: bool) {
        self.modify_flags(|f| f.set(HeaderFlags::AA, aa));
    }

    pub fn is_truncated(&self) -> bool {
        self.flags().contains(HeaderFlags::TC)
    }

    pub fn set_truncated(&mut self, trunc: bool) {
        self.modify_flags(|f| f.set(HeaderFlags::TC, trunc));
    }

    /// Returns the raw 4-bit operation code. Only 0 (standard query) is used by mDNS.
    pub fn opcode(&self) -> u8 {
        ((self.flags().bits() & HeaderFlags::OPCODE_MASK) >> HeaderFlags::OPCODE_POS) as u8
    }

    pub fn set_opcode(&mut self, opcode: u8) {
        self.modify_flags(|f| {
            f.remove(HeaderFlags::OPCODE);
            f.insert(HeaderFlags::from_bits_retain(
                (u16::from(opcode) << HeaderFlags::OPCODE_POS) & HeaderFlags::OPCODE_MASK,
            ));
        });
    }

    /// Returns the raw 4-bit response code. Only 0 (no error) is used by mDNS.
    pub fn rcode(&self) -> u8 {
        (self.flags().bits() & HeaderFlags::RCODE_MASK) as u8
    }

    pub fn set_rcode(&mut self, rcode: u8) {
        self.modify_flags(|f| {
            f.remove(HeaderFlags::RCODE);
            f.insert(HeaderFlags::from_bits_retain(
                u16::from(rcode) & HeaderFlags::RCODE_MASK,
            ));
        });
    }

    pub fn question_count(&self) -> u16 {
        u16::from_be_bytes(self.qdcount)
    }

    pub fn answer_count(&self) -> u16 {
        u16::from_be_bytes(self.ancount)
    }

    pub fn authority_count(&self) -> u16 {
        u16::from_be_bytes(self.nscount)
    }

    pub fn additional_count(&self) -> u16 {
        u16::from_be_bytes(self.arcount)
    }

    /// Returns the total number of resource records following the *Question* section.
    pub fn record_count(&self) -> usize {
        usize::from(self.answer_count())
            + usize::from(self.authority_count())
            + usize::from(self.additional_count())
    }

    fn set_counts(&mut self, qdcount: u16, ancount: u16, nscount: u16, arcount: u16) {
        self.qdcount = qdcount.to_be_bytes();
        self.ancount = ancount.to_be_bytes();
        self.nscount = nscount.to_be_bytes();
        self.arcount = arcount.to_be_bytes();
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("id", &self.id())
            .field("flags", &self.flags())
            .field("qdcount", &self.question_count())
            .field("ancount", &self.answer_count())
            .field("nscount", &self.authority_count())
            .field("arcount", &self.additional_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header() {
        let mut h = Header::default();
        assert!(h.is_query());
        assert!(!h.is_authority());
        assert!(!h.is_truncated());
        assert_eq!(core::mem::size_of::<Header>(), Header::LEN);

        h.set_response(true);
        h.set_authority(true);
        assert!(h.is_response());
        assert!(h.is_authority());
        assert_eq!(h.flags, [0x84, 0x00]);

        assert_eq!(h.opcode(), 0);
        h.set_opcode(5);
        assert_eq!(h.opcode(), 5);
        h.set_opcode(0);
        assert_eq!(h.opcode(), 0);

        assert_eq!(h.rcode(), 0);
        h.set_rcode(3);
        assert_eq!(h.rcode(), 3);
        h.set_rcode(0);
        assert_eq!(h.rcode(), 0);
        assert!(h.is_response());

        assert_eq!(h.id(), 0);
        let raw: [u8; 12] = [0x12, 0x34, 0x84, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let h: Header = bytemuck::pod_read_unaligned(&raw);
        assert_eq!(h.id(), 0x1234);
        assert!(h.is_response());
    }

    #[test]
    fn header_counts() {
        let mut h = Header::default();
        h.set_counts(1, 2, 3, 0x0104);
        assert_eq!(h.question_count(), 1);
        assert_eq!(h.answer_count(), 2);
        assert_eq!(h.authority_count(), 3);
        assert_eq!(h.additional_count(), 0x0104);
        assert_eq!(h.record_count(), 2 + 3 + 0x0104);
        assert_eq!(h.arcount, [0x01, 0x04]);
    }

    #[test]
    fn type_and_class_matching() {
        assert!(Type::ANY.matches(Type::SRV));
        assert!(Type::PTR.matches(Type::PTR));
        assert!(!Type::PTR.matches(Type::TXT));
        assert!(Class::ANY.matches(Class::IN));
        assert!(!Class::IN.matches(Class::CH));
        assert_eq!(format!("{:?}", Type(999)), "(unknown Type: 0x3e7)");
        assert_eq!(Type::SRV.to_string(), "SRV");
    }
}
