//! DNS-SD service types, search domains and instance discovery.

use std::{fmt, str::FromStr};

use crate::{
    packet::{question::Question, Class, Type},
    DomainName, Error, Label,
};

pub mod instance;
pub mod query;
pub(crate) mod record_set;
pub mod response;

/// Transport protocol used by a service (`_tcp` or `_udp`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceTransport {
    /// Service uses TCP.
    TCP,
    /// Anything but TCP (UDP, SCTP, etc.).
    Other,
}

impl ServiceTransport {
    fn as_str(&self) -> &str {
        match self {
            ServiceTransport::TCP => "_tcp",
            ServiceTransport::Other => "_udp",
        }
    }

    pub fn to_label(&self) -> Label {
        Label::new(self.as_str())
    }
}

/// A service type identifier, like `_http._tcp`.
///
/// A service type is identified by a unique name ([`Label`]), and the [`ServiceTransport`] the
/// service can be reached with.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Service {
    /// The service name, starting with an underscore.
    name: Label,
    transport: ServiceTransport,
}

impl Service {
    /// Creates a new service.
    ///
    /// # Panics
    ///
    /// Panics if `name` does not start with an underscore (`_`).
    pub fn new(name: Label, transport: ServiceTransport) -> Self {
        assert!(name.as_bytes().starts_with(b"_"));
        Self { name, transport }
    }

    #[inline]
    pub fn name(&self) -> &Label {
        &self.name
    }

    #[inline]
    pub fn transport(&self) -> ServiceTransport {
        self.transport
    }

    /// Returns the name under which instances of this service are enumerated in `domain`
    /// (`<service>.<transport>.<domain>`).
    pub fn to_domain(&self, domain: &Domain) -> DomainName {
        let mut name = DomainName::from_iter([self.name.clone(), self.transport.to_label()]);
        name.extend(&domain.name());
        name
    }

    /// Returns the PTR question that browses for instances of this service in `domain`.
    pub fn browse_question(&self, domain: &Domain) -> Question {
        Question::new(self.to_domain(domain), Type::PTR, Class::IN)
    }
}

impl FromStr for Service {
    type Err = Error;

    /// Parses a service type of the form `_name._tcp` or `_name._udp`. A trailing `.` is
    /// accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = DomainName::from_str(s)?;
        let [name, transport] = parsed.labels() else {
            return Err(Error::InvalidValue);
        };
        if !name.as_bytes().starts_with(b"_") {
            return Err(Error::InvalidValue);
        }
        let transport = match transport.as_bytes().to_ascii_lowercase().as_slice() {
            b"_tcp" => ServiceTransport::TCP,
            b"_udp" => ServiceTransport::Other,
            _ => return Err(Error::InvalidValue),
        };
        Ok(Self {
            name: name.clone(),
            transport,
        })
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.transport.as_str())
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The domain services are browsed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Domain {
    /// The link-local multicast domain `local.`.
    Local,
    /// Any other domain.
    Named(DomainName),
}

impl Domain {
    pub fn name(&self) -> DomainName {
        match self {
            Domain::Local => DomainName::from_iter([Label::new("local")]),
            Domain::Named(name) => name.clone(),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_service() {
        let service: Service = "_http._tcp".parse().unwrap();
        assert_eq!(service.name(), &Label::new("_http"));
        assert_eq!(service.transport(), ServiceTransport::TCP);
        assert_eq!(service.to_string(), "_http._tcp");

        let service: Service = "_hue._UDP.".parse().unwrap();
        assert_eq!(service.transport(), ServiceTransport::Other);
        assert_eq!(service.to_string(), "_hue._udp");

        assert_eq!("http._tcp".parse::<Service>(), Err(Error::InvalidValue));
        assert_eq!("_http._sctp".parse::<Service>(), Err(Error::InvalidValue));
        assert_eq!("_http".parse::<Service>(), Err(Error::InvalidValue));
        assert_eq!(
            "_http._tcp.local".parse::<Service>(),
            Err(Error::InvalidValue)
        );
        assert_eq!("_http..".parse::<Service>(), Err(Error::InvalidEmptyLabel));
    }

    #[test]
    fn browse_question() {
        let service = Service::new(Label::new("_nanoleafapi"), ServiceTransport::TCP);
        let q = service.browse_question(&Domain::Local);
        assert_eq!(q.to_string(), "_nanoleafapi._tcp.local. IN PTR");

        let domain = Domain::Named("example.org".parse().unwrap());
        assert_eq!(
            service.to_domain(&domain).to_string(),
            "_nanoleafapi._tcp.example.org."
        );
        assert_eq!(Domain::Local.to_string(), "local.");
    }
}
