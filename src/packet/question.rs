//! DNS questions.

use std::{
    fmt,
    hash::{Hash, Hasher},
    io,
    net::{SocketAddr, UdpSocket},
};

use super::{
    encoder::MessageEncoder, name::DomainName, records::ResourceRecord, Class, Error, Header, Type,
};
use crate::hex::Hex;

/// One entry of the *Question* section: asks for the records of a `(name, type, class)` triple.
///
/// Questions are identified by that triple alone. The mDNS unicast-response bit is carried along
/// but does not take part in comparisons.
#[derive(Debug, Clone)]
pub struct Question {
    name: DomainName,
    ty: Type,
    class: Class,
    unicast_response: bool,
}

impl Question {
    /// Creates a question for the records of type `ty` and class `class` owned by `name`.
    pub fn new(name: DomainName, ty: Type, class: Class) -> Self {
        Self {
            name,
            ty,
            class,
            unicast_response: false,
        }
    }

    /// Sets the mDNS "QU" bit, requesting that responders reply via unicast.
    #[inline]
    pub fn unicast_response(self, unicast_response: bool) -> Self {
        Self {
            unicast_response,
            ..self
        }
    }

    #[inline]
    pub fn name(&self) -> &DomainName {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> Type {
        self.ty
    }

    #[inline]
    pub fn class(&self) -> Class {
        self.class
    }

    #[inline]
    pub fn is_unicast_response(&self) -> bool {
        self.unicast_response
    }

    /// Returns whether `rr` is an answer to this question.
    pub fn answered_by(&self, rr: &ResourceRecord) -> bool {
        self.ty.matches(rr.record_type())
            && self.class.matches(rr.class())
            && self.name == *rr.name()
    }

    /// Writes a query message containing only this question into `buf`, returning the encoded
    /// message.
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> Result<&'a [u8], Error> {
        // Multicast queries should use ID 0, responders ignore it anyway.
        let mut enc = MessageEncoder::new(buf);
        enc.set_header(Header::default());
        enc.question(self);
        let len = enc.finish()?;
        Ok(&buf[..len])
    }

    /// Sends this question as a single-question query datagram to `group` via `sock`.
    pub fn ask_on(&self, sock: &UdpSocket, group: SocketAddr) -> io::Result<()> {
        let mut buf = [0; 512];
        let query = self.encode(&mut buf)?;
        log::trace!("asking {} on {}: {}", self, group, Hex(query));
        sock.send_to(query, group)?;
        Ok(())
    }
}

impl PartialEq for Question {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.ty == other.ty && self.class == other.class
    }
}

impl Eq for Question {}

impl Hash for Question {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.ty.hash(state);
        self.class.hash(state);
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.class, self.ty)?;
        if self.unicast_response {
            f.write_str(" (QU)")?;
        }
        Ok(())
    }
}
