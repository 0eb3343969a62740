use std::{fmt, io};

/// Reasons a datagram could not be parsed or a message could not be built.
///
/// A received datagram failing with any of these is dropped on its own; the query it arrived
/// during keeps running.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum Error {
    /// The datagram ended in the middle of a field.
    Eof,
    /// A name compression pointer did not point strictly backwards.
    PointerLoop,
    /// Reserved label type, oversized name, or other value that no valid message contains.
    InvalidValue,
    /// The message being encoded did not fit into its buffer.
    ///
    /// The encoded header has its TC bit set in that case.
    Truncated,
    /// A name contained an empty label before its end.
    InvalidEmptyLabel,
    /// A label was longer than [`Label::MAX_LEN`](super::name::Label::MAX_LEN) bytes.
    LabelTooLong,
    /// Record data was shorter or longer than its RDLENGTH field.
    RdataLength,
}

impl Error {
    fn message(&self) -> &'static str {
        match self {
            Error::Eof => "datagram ends in the middle of a field",
            Error::PointerLoop => "name compression pointer does not point backwards",
            Error::InvalidValue => "datagram contains an invalid value",
            Error::Truncated => "message does not fit into the datagram buffer",
            Error::InvalidEmptyLabel => "domain name contains an empty label",
            Error::LabelTooLong => "domain name label is longer than 63 bytes",
            Error::RdataLength => "record data does not match its RDLENGTH",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for Error {}

/// Building a question can only fail on its name or on the buffer size, everything else comes
/// from a received datagram.
impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        let kind = match e {
            Error::InvalidEmptyLabel | Error::LabelTooLong | Error::Truncated => {
                io::ErrorKind::InvalidInput
            }
            Error::Eof => io::ErrorKind::UnexpectedEof,
            Error::PointerLoop | Error::InvalidValue | Error::RdataLength => {
                io::ErrorKind::InvalidData
            }
        };
        io::Error::new(kind, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_io_error() {
        let e = io::Error::from(Error::PointerLoop);
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);
        assert_eq!(
            e.to_string(),
            "name compression pointer does not point backwards"
        );
        assert_eq!(
            e.get_ref().and_then(|e| e.downcast_ref::<Error>()),
            Some(&Error::PointerLoop)
        );

        assert_eq!(io::Error::from(Error::Eof).kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(
            io::Error::from(Error::Truncated).kind(),
            io::ErrorKind::InvalidInput
        );
    }
}
