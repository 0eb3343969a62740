//! Multicast DNS Service Discovery queries.
//!
//! A [`Query`] sends a DNS-SD browse request for one service type to the local network, follows
//! the PTR → SRV/TXT → A/AAAA record chain of every instance that answers, and returns the fully
//! resolved [`Instance`]s once the network goes quiet.
//!
//! ```no_run
//! use mdns_query::{Domain, Query, Service};
//!
//! let service: Service = "_http._tcp".parse()?;
//! for instance in Query::new(service, Domain::Local).run_once()? {
//!     println!("{} at {:?}:{}", instance.name(), instance.addresses(), instance.port());
//! }
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```

use std::net::{Ipv4Addr, Ipv6Addr};

mod hex;
pub mod packet;
pub mod service;
mod socket;

pub use packet::{
    name::{DomainName, Label},
    question::Question,
    Class, Error, Type,
};
pub use service::{
    instance::{Instance, TxtRecordValue, TxtRecords},
    query::{CancelToken, Query},
    response::Response,
    Domain, Service, ServiceTransport,
};

/// UDP port used by multicast DNS.
pub const MDNS_PORT: u16 = 5353;

/// IPv4 multicast group joined by mDNS participants.
pub const MDNS_IPV4_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// IPv6 (link-local scope) multicast group joined by mDNS participants.
pub const MDNS_IPV6_GROUP: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);

/// Size of multicast DNS message buffers.
///
/// Unicast DNS is limited to 512 Byte messages, but mDNS allows messages up to the maximum
/// Ethernet jumbo frame payload (RFC 6762, section 17).
pub const MDNS_BUFFER_SIZE: usize = 9000;
