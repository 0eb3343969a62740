//! DNS packet decoder.

use std::{cmp, fmt, mem::size_of};

use bytemuck::AnyBitPattern;

use super::{
    name::{DomainName, Label},
    question::Question,
    records::{Record, ResourceRecord},
    Class, Error, Header, Type,
};

/// Bit in the raw class field used by mDNS as the cache-flush / unicast-response flag.
pub(crate) const CLASS_TOP_BIT: u16 = 0x8000;

#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    /// The buffer containing the whole DNS message.
    full_buf: &'a [u8],
    /// The current reader position in the buffer.
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self {
            full_buf: buf,
            pos: 0,
        }
    }

    /// Returns the unread part of the buffer.
    pub(crate) fn buf(&self) -> &'a [u8] {
        &self.full_buf[self.pos..]
    }

    pub(crate) fn read_obj<T: AnyBitPattern>(&mut self) -> Result<T, Error> {
        let bytes = self.buf().get(..size_of::<T>()).ok_or(Error::Eof)?;
        self.pos += size_of::<T>();
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn peek_u8(&self) -> Result<u8, Error> {
        self.full_buf.get(self.pos).copied().ok_or(Error::Eof)
    }

    pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self.pos.checked_add(len).ok_or(Error::Eof)?;
        match self.full_buf.get(self.pos..end) {
            Some(slice) => {
                self.pos = end;
                Ok(slice)
            }
            None => Err(Error::Eof),
        }
    }

    pub(crate) fn read_array<const LEN: usize>(&mut self) -> Result<[u8; LEN], Error> {
        let slice = self.read_slice(LEN)?;
        slice.try_into().map_err(|_| Error::Eof)
    }

    /// Splits off another `Reader` at the current position, with a backing store truncated to
    /// `self.pos + len`, and skips `self` past those `len` bytes.
    ///
    /// The split-off reader can still follow name compression pointers into earlier parts of the
    /// message, but can never read past the end of the record data it was created for.
    fn split_off(&mut self, len: usize) -> Result<Reader<'a>, Error> {
        if self.buf().len() >= len {
            let mut copy = self.clone();
            copy.full_buf = &copy.full_buf[..self.pos + len];
            self.pos += len;
            Ok(copy)
        } else {
            Err(Error::Eof)
        }
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, Error> {
        self.read_obj::<u8>()
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Reads a `<character-string>` value.
    pub(crate) fn read_character_string(&mut self) -> Result<&'a [u8], Error> {
        let length = self.read_u8()?;
        self.read_slice(length.into())
    }

    /// Reads a `<domain-name>` value, following compression pointers.
    pub(crate) fn read_domain_name(&mut self) -> Result<DomainName, Error> {
        let mut domain_name = DomainName::ROOT;
        let mut encoded_len = 1;
        let mut min_pos = self.pos;
        let mut copy = self.clone();
        loop {
            let length = copy.peek_u8()?;
            match length & 0b1100_0000 {
                0b1100_0000 => {
                    // 16-bit pointer to somewhere else in the UDP message.
                    let ptr = usize::from(copy.read_u16()? & 0b0011_1111_1111_1111);
                    if ptr >= min_pos {
                        // Pointers have to point to an earlier part of the message, which rules
                        // out loops.
                        return Err(Error::PointerLoop);
                    }
                    self.pos = cmp::max(self.pos, copy.pos);
                    min_pos = ptr;
                    copy.pos = ptr;
                }
                0b0000_0000 => {
                    copy.pos += 1;

                    // Length byte followed by a label of that many bytes.
                    let length = usize::from(length);
                    if length == 0 {
                        break;
                    }
                    encoded_len += 1 + length;
                    if encoded_len > DomainName::MAX_ENCODED_LEN {
                        return Err(Error::InvalidValue);
                    }
                    let label = copy.read_slice(length)?;
                    domain_name.push_label(Label::try_new(label)?);
                }
                // 01 and 10 are reserved label types
                _ => return Err(Error::InvalidValue),
            }
        }

        self.pos = cmp::max(self.pos, copy.pos);
        Ok(domain_name)
    }

    fn read_question(&mut self) -> Result<Question, Error> {
        let name = self.read_domain_name()?;
        let ty = Type(self.read_u16()?);
        let raw_class = self.read_u16()?;
        Ok(Question::new(name, ty, Class(raw_class & !CLASS_TOP_BIT))
            .unicast_response(raw_class & CLASS_TOP_BIT != 0))
    }

    fn read_resource_record(&mut self) -> Result<ResourceRecord, Error> {
        let name = self.read_domain_name()?;
        let ty = Type(self.read_u16()?);
        let raw_class = self.read_u16()?;
        let ttl = self.read_u32()?;
        let rdlength = self.read_u16()?;
        let rdata = self.split_off(usize::from(rdlength))?;
        let record = Record::decode(ty, rdata)?;
        Ok(ResourceRecord::new(name, record)
            .with_class(Class(raw_class & !CLASS_TOP_BIT))
            .with_cache_flush(raw_class & CLASS_TOP_BIT != 0)
            .with_ttl(ttl))
    }
}

/// The message section a resource record was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Answer,
    Authority,
    Additional,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::Answer => "ANS",
            Section::Authority => "AUTH",
            Section::Additional => "ADDL",
        })
    }
}

/// Streaming decoder for DNS messages.
///
/// In DNS messages, sections are ordered as follows:
/// - *Question* section
/// - *Answer* section
/// - *Authority* section
/// - *Additional Records* section
///
/// The decoder starts out at the *Question* section. [`MessageDecoder::questions`] reads it,
/// [`MessageDecoder::records`] skips whatever is left of it and yields the resource records of the
/// three remaining sections in order.
pub struct MessageDecoder<'a> {
    header: Header,
    q_remaining: u16,
    r: Reader<'a>,
    has_errored: bool,
}

impl<'a> MessageDecoder<'a> {
    /// Creates a streaming message decoder that will read from `buf`.
    pub fn new(buf: &'a [u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let header = r.read_obj::<Header>()?;
        Ok(Self {
            header,
            q_remaining: header.question_count(),
            r,
            has_errored: false,
        })
    }

    /// Returns the message header.
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns an iterator over the remaining [`Question`]s in the *Question* section.
    ///
    /// Iteration stops after the first error.
    pub fn questions(&mut self) -> QuestionIter<'_, 'a> {
        QuestionIter { dec: self }
    }

    fn next_question(&mut self) -> Option<Result<Question, Error>> {
        if self.has_errored || self.q_remaining == 0 {
            return None;
        }

        match self.r.read_question() {
            Ok(q) => {
                self.q_remaining -= 1;
                Some(Ok(q))
            }
            Err(e) => {
                self.has_errored = true;
                Some(Err(e))
            }
        }
    }

    /// Skips the remaining entries in the *Question* section and returns an iterator over all
    /// records in the *Answer*, *Authority* and *Additional Records* sections.
    pub fn records(mut self) -> Result<RecordIter<'a>, Error> {
        while let Some(res) = self.next_question() {
            res?;
        }

        Ok(RecordIter {
            r: self.r,
            remaining: [
                (Section::Answer, self.header.answer_count()),
                (Section::Authority, self.header.authority_count()),
                (Section::Additional, self.header.additional_count()),
            ],
            has_errored: false,
        })
    }
}

/// An iterator over [`Question`]s in the *Question* section of a DNS message.
pub struct QuestionIter<'dec, 'data> {
    dec: &'dec mut MessageDecoder<'data>,
}

impl<'dec, 'data> Iterator for QuestionIter<'dec, 'data> {
    type Item = Result<Question, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.dec.next_question()
    }
}

/// Iterator over the resource records of a DNS message, tagged with their [`Section`].
///
/// Iteration stops after the first error, since the position of any following record is unknown.
pub struct RecordIter<'a> {
    r: Reader<'a>,
    remaining: [(Section, u16); 3],
    has_errored: bool,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<(Section, ResourceRecord), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_errored {
            return None;
        }

        let (section, remaining) = self.remaining.iter_mut().find(|(_, n)| *n != 0)?;
        match self.r.read_resource_record() {
            Ok(rr) => {
                *remaining -= 1;
                Some(Ok((*section, rr)))
            }
            Err(e) => {
                self.has_errored = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::{
        hex,
        packet::records::{Unknown, A, PTR},
    };

    #[test]
    fn decode_domain_name() {
        let mut r = Reader::new(&[
            7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm', 0,
        ]);
        let name = r.read_domain_name().unwrap();
        assert_eq!(name.to_string(), "example.com.");

        let mut r = Reader::new(&[0]);
        let name = r.read_domain_name().unwrap();
        assert_eq!(name.to_string(), ".");
    }

    #[test]
    fn read_integers() {
        let mut r = Reader::new(&[0x12, 0x34, 0xde, 0xad, 0xbe, 0xef, 192, 168, 1, 10, 0xff]);
        assert_eq!(r.read_u16(), Ok(0x1234));
        assert_eq!(r.read_u32(), Ok(0xdeadbeef));
        assert_eq!(r.read_array::<4>(), Ok([192, 168, 1, 10]));
        assert_eq!(r.read_u16(), Err(Error::Eof));
        assert_eq!(r.read_array::<2>(), Err(Error::Eof));
        assert_eq!(r.read_u8(), Ok(0xff));
    }

    #[test]
    fn decode_domain_name_pointer() {
        let mut r = Reader::new(&[
            b'_', // never read
            3, b'c', b'o', b'm', 0, // "com."
            7, b'e', b'x', b'a', b'm', b'p', b'l', b'e',
            // ptr to 1:
            0b1100_0000, 1,
        ]);
        r.pos = 1;
        let name = r.read_domain_name().unwrap();
        assert_eq!(name.to_string(), "com.");
        let name = r.read_domain_name().unwrap();
        assert_eq!(name.to_string(), "example.com.");
        assert_eq!(r.read_u8(), Err(Error::Eof), "should be at EOF");
    }

    #[test]
    fn decode_domain_name_pointer_oob() {
        let mut r = Reader::new(&[0xff, 0xff]);
        assert_eq!(r.read_domain_name(), Err(Error::PointerLoop));

        // pointer cut off after its first byte
        let mut r = Reader::new(&[1, b'a', 0b1100_0000]);
        assert_eq!(r.read_domain_name(), Err(Error::Eof));
    }

    #[test]
    fn decode_domain_name_dos() {
        let mut r = Reader::new(&[
            // pointer to self:
            0b1100_0000,
            0,
        ]);
        assert_eq!(r.read_domain_name(), Err(Error::PointerLoop));

        let mut r = Reader::new(&[
            // fallthrough:
            1,
            b'a',
            // pointer to 0:
            0b1100_0000,
            0,
        ]);
        r.pos = 2;
        assert_eq!(r.read_domain_name(), Err(Error::PointerLoop));
    }

    #[test]
    fn decode_reserved_label_type() {
        let mut r = Reader::new(&[0b0100_0001, b'a', 0]);
        assert_eq!(r.read_domain_name(), Err(Error::InvalidValue));
    }

    #[test]
    fn split_off_bounds_record_data() {
        let mut r = Reader::new(&[1, 2, 3, 4, 5]);
        let mut rdata = r.split_off(2).unwrap();
        assert_eq!(rdata.read_u16(), Ok(0x0102));
        assert_eq!(rdata.read_u8(), Err(Error::Eof));
        assert_eq!(r.buf(), &[3, 4, 5]);
        assert_eq!(r.split_off(4).err(), Some(Error::Eof));
    }

    /// A response carrying one PTR answer and one A record in the additional section, using name
    /// compression for both owner names.
    const CAPTURED_RESPONSE: &str = "
        0000 8400 0000 0001 0000 0001
        055f68747470 045f746370 056c6f63616c 00
        000c 0001 00001194 0007
            046c616d70 c00c
        c028
        0001 8001 00000078 0004
            c0a8010a
    ";

    #[test]
    fn decode_captured_response() {
        let msg = hex::parse(CAPTURED_RESPONSE);
        let dec = MessageDecoder::new(&msg).unwrap();
        assert!(dec.header().is_response());
        assert!(dec.header().is_authority());
        assert_eq!(dec.header().record_count(), 2);

        let records = dec
            .records()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);

        let (section, ptr) = &records[0];
        assert_eq!(*section, Section::Answer);
        assert_eq!(ptr.name().to_string(), "_http._tcp.local.");
        assert_eq!(ptr.ttl(), 4500);
        assert!(!ptr.cache_flush());
        assert_eq!(
            ptr.record(),
            &Record::PTR(PTR::new("lamp._http._tcp.local".parse().unwrap()))
        );

        let (section, a) = &records[1];
        assert_eq!(*section, Section::Additional);
        assert_eq!(a.name().to_string(), "lamp._http._tcp.local.");
        assert_eq!(a.class(), Class::IN);
        assert!(a.cache_flush());
        assert_eq!(a.record(), &Record::A(A::new(Ipv4Addr::new(192, 168, 1, 10))));
    }

    #[test]
    fn unknown_record_between_ptrs() {
        let msg = hex::parse(
            "
            0000 8400 0000 0003 0000 0000
            045f666f6f 045f746370 056c6f63616c 00
            000c 0001 00000078 0004
                0161 c00c
            c00c
            0063 0001 00000078 0005
                0102030405
            c00c
            000c 0001 00000078 0004
                0162 c00c
            ",
        );
        let records = MessageDecoder::new(&msg)
            .unwrap()
            .records()
            .unwrap()
            .map(|res| res.map(|(_, rr)| rr.record().clone()))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(
            records,
            [
                Record::PTR(PTR::new("a._foo._tcp.local".parse().unwrap())),
                Record::Unknown(Unknown::new(Type(0x63), vec![1u8, 2, 3, 4, 5])),
                Record::PTR(PTR::new("b._foo._tcp.local".parse().unwrap())),
            ]
        );
    }

    #[test]
    fn truncated_message() {
        let msg = hex::parse(CAPTURED_RESPONSE);
        let truncated = &msg[..msg.len() - 2];
        let mut records = MessageDecoder::new(truncated).unwrap().records().unwrap();
        assert!(records.next().unwrap().is_ok());
        assert_eq!(records.next().unwrap().err(), Some(Error::Eof));
        assert!(records.next().is_none(), "iteration stops after an error");

        assert_eq!(MessageDecoder::new(&msg[..11]).err(), Some(Error::Eof));
    }

    #[test]
    fn rdata_length_mismatch() {
        // A record with 5 bytes of RDATA
        let msg = hex::parse(
            "
            0000 8400 0000 0001 0000 0000
            0161 00
            0001 0001 00000078 0005
                0a00000105
            ",
        );
        let mut records = MessageDecoder::new(&msg).unwrap().records().unwrap();
        assert_eq!(records.next().unwrap().err(), Some(Error::RdataLength));
    }

    #[test]
    fn decode_questions() {
        let msg = hex::parse(
            "
            0000 0000 0002 0000 0000 0000
            045f666f6f 045f746370 056c6f63616c 00
            000c 0001
            0161 c00c
            0021 8001
            ",
        );
        let mut dec = MessageDecoder::new(&msg).unwrap();
        assert!(dec.header().is_query());
        let questions = dec.questions().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].name().to_string(), "_foo._tcp.local.");
        assert_eq!(questions[0].ty(), Type::PTR);
        assert!(!questions[0].is_unicast_response());
        assert_eq!(questions[1].name().to_string(), "a._foo._tcp.local.");
        assert_eq!(questions[1].ty(), Type::SRV);
        assert_eq!(questions[1].class(), Class::IN);
        assert!(questions[1].is_unicast_response());
        assert_eq!(dec.records().unwrap().count(), 0);
    }
}
