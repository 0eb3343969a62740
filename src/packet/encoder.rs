//! DNS packet encoder.

use core::marker::PhantomData;
use std::mem::align_of;

use super::{
    decoder::CLASS_TOP_BIT, name::DomainName, question::Question, records::RecordEncoder,
    records::ResourceRecord, Error, Header,
};

pub(crate) struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
    trunc: bool,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            trunc: false,
        }
    }

    fn modify_header(&mut self, with: impl FnOnce(&mut Header)) {
        assert_eq!(align_of::<Header>(), 1);

        if let Some(bytes) = self.buf.get_mut(..Header::LEN) {
            with(bytemuck::from_bytes_mut(bytes));
        }
    }

    pub(crate) fn write_slice(&mut self, data: &[u8]) {
        let buf = &mut self.buf[self.pos..];
        if data.len() > buf.len() {
            self.trunc = true;
            let len = buf.len();
            buf.copy_from_slice(&data[..len]);
            self.pos += len;
        } else {
            buf[..data.len()].copy_from_slice(data);
            self.pos += data.len();
        }
    }

    pub(crate) fn write_u8(&mut self, b: u8) {
        self.write_slice(&[b]);
    }

    pub(crate) fn write_u16(&mut self, v: u16) {
        self.write_slice(&v.to_be_bytes());
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.write_slice(&v.to_be_bytes());
    }

    /// Writes `name` without compression.
    pub(crate) fn write_domain_name(&mut self, name: &DomainName) {
        for label in name.labels() {
            self.write_u8(label.as_bytes().len() as u8);
            self.write_slice(label.as_bytes());
        }
        // Implicit root label at the end.
        self.write_u8(0);
    }

    pub(crate) fn write_character_string(&mut self, string: &[u8]) {
        assert!(string.len() <= 255);
        self.write_u8(string.len() as u8);
        self.write_slice(string);
    }
}

/// DNS message sections, used as type-level markers by [`MessageEncoder`].
pub mod section {
    mod sealed {
        pub trait Sealed {}
    }
    pub trait Section: sealed::Sealed {}
    pub enum Question {}
    pub enum Answer {}
    pub enum Additional {}
    impl sealed::Sealed for Question {}
    impl sealed::Sealed for Answer {}
    impl sealed::Sealed for Additional {}
    impl Section for Question {}
    impl Section for Answer {}
    impl Section for Additional {}
}
use section::Section;

struct EncoderInner<'a> {
    w: Writer<'a>,
    qdcount: u16,
    ancount: u16,
    arcount: u16,
}

impl<'a> Drop for EncoderInner<'a> {
    fn drop(&mut self) {
        let (qd, an, ar) = (self.qdcount, self.ancount, self.arcount);
        let trunc = self.w.trunc;
        self.w.modify_header(|h| {
            h.set_counts(qd, an, 0, ar);
            if trunc {
                h.set_truncated(true);
            }
        });
    }
}

/// Writes a DNS message into a caller-provided buffer.
///
/// Sections have to be written in order; the section type parameter only offers the methods
/// valid for the current section. Names are written uncompressed.
pub struct MessageEncoder<'a, S: Section> {
    inner: EncoderInner<'a>,
    _p: PhantomData<S>,
}

impl<'a, S: Section> MessageEncoder<'a, S> {
    /// Overrides the whole message header.
    ///
    /// Note that the [`MessageEncoder`] will modify the record counts on drop, to ensure that the
    /// message can be parsed correctly.
    pub fn set_header(&mut self, header: Header) {
        self.inner.w.modify_header(|h| *h = header);
    }

    /// Finishes encoding the message, and returns the number of bytes that were written to the
    /// buffer.
    ///
    /// If the message did not fit into the provided buffer, this will return
    /// [`Error::Truncated`], and the message's truncation bit will be set.
    pub fn finish(self) -> Result<usize, Error> {
        if self.inner.w.trunc {
            Err(Error::Truncated)
        } else {
            Ok(self.inner.w.pos)
        }
    }

    fn transition<T: Section>(self) -> MessageEncoder<'a, T> {
        MessageEncoder {
            inner: self.inner,
            _p: PhantomData,
        }
    }

    fn write_rr(&mut self, rr: &ResourceRecord) {
        let w = &mut self.inner.w;
        w.write_domain_name(rr.name());
        w.write_u16(rr.record_type().to_raw());
        let flush = if rr.cache_flush() { CLASS_TOP_BIT } else { 0 };
        w.write_u16(rr.class().to_raw() | flush);
        w.write_u32(rr.ttl());

        // RDLENGTH is only known after the data is written, so leave room and patch it in.
        let lenpos = w.pos;
        w.write_u16(0);
        let before_rdata = w.pos;
        rr.record().encode(&mut RecordEncoder { w: &mut *w });
        if w.trunc {
            return;
        }

        let finished_pos = w.pos;
        match u16::try_from(finished_pos - before_rdata) {
            Ok(rdata_len) => {
                w.pos = lenpos;
                w.write_u16(rdata_len);
                w.pos = finished_pos;
            }
            Err(_) => w.trunc = true,
        }
    }
}

impl<'a> MessageEncoder<'a, section::Question> {
    /// Creates a new message encoder that will write to `buf`.
    ///
    /// The message starts out with an all-zero header, which is a standard query with ID 0.
    pub fn new(buf: &'a mut [u8]) -> Self {
        let mut w = Writer::new(buf);
        w.write_slice(&[0; Header::LEN]);
        Self {
            inner: EncoderInner {
                w,
                qdcount: 0,
                ancount: 0,
                arcount: 0,
            },
            _p: PhantomData,
        }
    }

    /// Adds a question to the *Question* section.
    pub fn question(&mut self, question: &Question) {
        let w = &mut self.inner.w;
        w.write_domain_name(question.name());
        w.write_u16(question.ty().to_raw());
        let qu = if question.is_unicast_response() {
            CLASS_TOP_BIT
        } else {
            0
        };
        w.write_u16(question.class().to_raw() | qu);
        self.inner.qdcount += 1;
    }

    /// Moves the encoder to the *Answer* section.
    #[inline]
    pub fn answers(self) -> MessageEncoder<'a, section::Answer> {
        self.transition()
    }
}

impl<'a> MessageEncoder<'a, section::Answer> {
    pub fn add_answer(&mut self, rr: &ResourceRecord) {
        self.write_rr(rr);
        self.inner.ancount += 1;
    }

    /// Moves the encoder to the *Additional Records* section.
    ///
    /// mDNS responders put no records in the *Authority* section of responses, so that section
    /// is skipped.
    #[inline]
    pub fn additional(self) -> MessageEncoder<'a, section::Additional> {
        self.transition()
    }
}

impl<'a> MessageEncoder<'a, section::Additional> {
    pub fn add_additional(&mut self, rr: &ResourceRecord) {
        self.write_rr(rr);
        self.inner.arcount += 1;
    }
}
