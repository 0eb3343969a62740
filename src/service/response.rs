//! Received mDNS responses.

use crate::{
    packet::{decoder::MessageDecoder, question::Question, records::ResourceRecord, Header},
    Error,
};

/// A parsed mDNS message: its header and the resource records of all of its sections.
#[derive(Debug, Clone)]
pub struct Response {
    header: Header,
    records: Vec<ResourceRecord>,
}

impl Response {
    /// Decodes one received datagram.
    ///
    /// The *Question* section is skipped. Records from the *Answer*, *Authority* and *Additional
    /// Records* sections are all kept, since responders commonly put the records a browser needs
    /// next into the additional section.
    pub fn from_datagram(datagram: &[u8]) -> Result<Self, Error> {
        let dec = MessageDecoder::new(datagram)?;
        let header = *dec.header();
        let mut records = Vec::with_capacity(header.record_count());
        for res in dec.records()? {
            let (section, rr) = res?;
            log::trace!("{}: {}", section, rr);
            records.push(rr);
        }
        Ok(Self { header, records })
    }

    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[inline]
    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }

    #[inline]
    pub fn into_records(self) -> Vec<ResourceRecord> {
        self.records
    }

    /// Returns whether this is a successful standard response (not a query, opcode and response
    /// code 0). Everything else is ignored by browsers (RFC 6762, section 18).
    pub fn is_valid_response(&self) -> bool {
        self.header.is_response() && self.header.opcode() == 0 && self.header.rcode() == 0
    }

    /// Returns whether this is a valid response containing an answer to any of `questions`.
    pub fn answers<'q>(&self, questions: impl IntoIterator<Item = &'q Question>) -> bool {
        if !self.is_valid_response() {
            return false;
        }
        questions
            .into_iter()
            .any(|q| self.records.iter().any(|rr| q.answered_by(rr)))
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::{
        hex,
        packet::{
            encoder::MessageEncoder,
            records::{Record, Unknown, A, PTR},
            Class, Type,
        },
        DomainName,
    };

    fn domain(s: &str) -> DomainName {
        s.parse().unwrap()
    }

    fn encode_response(header: Header, records: &[ResourceRecord]) -> Vec<u8> {
        let mut buf = [0; 512];
        let mut enc = MessageEncoder::new(&mut buf);
        enc.set_header(header);
        let mut enc = enc.answers();
        for rr in records {
            enc.add_answer(rr);
        }
        let len = enc.finish().unwrap();
        buf[..len].to_vec()
    }

    fn response_header() -> Header {
        let mut h = Header::default();
        h.set_response(true);
        h.set_authority(true);
        h
    }

    #[test]
    fn from_datagram_keeps_all_sections() {
        let msg = hex::parse(
            "
            0000 8400 0001 0001 0000 0001
            055f68747470 045f746370 056c6f63616c 00
            000c 0001
            c00c
            000c 0001 00001194 0007
                046c616d70 c00c
            c02e
            0001 8001 00000078 0004
                c0a8010a
            ",
        );
        let response = Response::from_datagram(&msg).unwrap();
        assert!(response.is_valid_response());
        assert_eq!(response.records().len(), 2);
        assert_eq!(response.records()[1].name(), &domain("lamp._http._tcp.local"));
        assert_eq!(
            response.records()[1].record(),
            &Record::A(A::new(Ipv4Addr::new(192, 168, 1, 10)))
        );
    }

    #[test]
    fn unknown_types_are_skipped() {
        let service = domain("_foo._tcp.local");
        let msg = encode_response(
            response_header(),
            &[
                ResourceRecord::new(service.clone(), PTR::new(domain("a._foo._tcp.local"))),
                ResourceRecord::new(service.clone(), Unknown::new(Type(0x1234), vec![9u8; 7])),
                ResourceRecord::new(service, PTR::new(domain("b._foo._tcp.local"))),
            ],
        );
        let response = Response::from_datagram(&msg).unwrap();
        let ptrs = response
            .records()
            .iter()
            .filter_map(|rr| rr.record().as_ptr())
            .map(|ptr| ptr.ptrdname().to_string())
            .collect::<Vec<_>>();
        assert_eq!(ptrs, ["a._foo._tcp.local.", "b._foo._tcp.local."]);
    }

    #[test]
    fn malformed() {
        assert_eq!(Response::from_datagram(&[0; 5]).err(), Some(Error::Eof));

        let mut msg = encode_response(
            response_header(),
            &[ResourceRecord::new(domain("a.local"), A::new(Ipv4Addr::LOCALHOST))],
        );
        msg.pop();
        assert_eq!(Response::from_datagram(&msg).err(), Some(Error::Eof));
    }

    #[test]
    fn relevance() {
        let browse = Question::new(domain("_foo._tcp.local"), Type::PTR, Class::IN);
        let srv = Question::new(domain("a._foo._tcp.local"), Type::SRV, Class::IN);
        let ptr = ResourceRecord::new(
            domain("_foo._tcp.local"),
            PTR::new(domain("a._foo._tcp.local")),
        );

        let response =
            Response::from_datagram(&encode_response(response_header(), &[ptr.clone()])).unwrap();
        assert!(response.answers([&browse]));
        assert!(response.answers([&srv, &browse]));
        assert!(!response.answers([&srv]));
        assert!(!response.answers(std::iter::empty()));

        // queries, and responses with error codes, never count
        let query =
            Response::from_datagram(&encode_response(Header::default(), &[ptr.clone()])).unwrap();
        assert!(!query.answers([&browse]));

        let mut header = response_header();
        header.set_rcode(3);
        let error = Response::from_datagram(&encode_response(header, &[ptr])).unwrap();
        assert!(!error.is_valid_response());
        assert!(!error.answers([&browse]));
    }
}
