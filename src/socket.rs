//! Multicast sockets joined to the mDNS groups.

use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6, UdpSocket},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use socket2::{Domain, Protocol, Socket, Type};

use crate::{packet::question::Question, MDNS_IPV4_GROUP, MDNS_IPV6_GROUP, MDNS_PORT};

/// Where a query's questions go and its responses come from.
///
/// Both methods are called concurrently: the caller sends the initial question while the
/// listener thread receives.
pub(crate) trait Transport: Sync {
    /// Transmits `question` once on every joined address family.
    fn ask(&self, question: &Question) -> io::Result<()>;

    /// Waits up to `timeout` for one datagram. Returns `Ok(None)` if none arrived in time.
    fn recv(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<(usize, SocketAddr)>>;
}

/// Socket options applied when joining the mDNS groups.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SocketConfig {
    pub(crate) multicast_ttl: u32,
    /// Local address of the interface to send IPv4 queries from (unspecified: OS default).
    pub(crate) interface_v4: Ipv4Addr,
    /// Index of the interface to send IPv6 queries from (0: OS default).
    pub(crate) interface_v6: u32,
}

struct Member {
    sock: UdpSocket,
    group: SocketAddr,
}

/// One UDP socket per joined address family, all bound to port 5353.
///
/// The sockets are closed when this is dropped.
pub(crate) struct MulticastSockets {
    members: Vec<Member>,
    next: AtomicUsize,
}

impl MulticastSockets {
    /// Joins the IPv4 group and, if possible, the IPv6 group.
    ///
    /// Fails only if neither group could be joined.
    pub(crate) fn open(config: &SocketConfig) -> io::Result<Self> {
        let mut members = Vec::with_capacity(2);
        let mut v4_err = None;

        match open_v4(config) {
            Ok(member) => members.push(member),
            Err(e) => {
                log::warn!("failed to join {}: {}", MDNS_IPV4_GROUP, e);
                v4_err = Some(e);
            }
        }
        match open_v6(config) {
            Ok(member) => members.push(member),
            Err(e) => log::debug!("IPv6 unavailable, failed to join {}: {}", MDNS_IPV6_GROUP, e),
        }

        if members.is_empty() {
            return Err(v4_err.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, "no mDNS group joined")
            }));
        }

        for member in &members {
            log::debug!("joined {} on {:?}", member.group, member.sock.local_addr());
        }
        Ok(Self {
            members,
            next: AtomicUsize::new(0),
        })
    }
}

fn open_v4(config: &SocketConfig) -> io::Result<Member> {
    let sock = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    sock.set_reuse_address(true)?;
    sock.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MDNS_PORT).into())?;
    if !config.interface_v4.is_unspecified() {
        sock.set_multicast_if_v4(&config.interface_v4)?;
    }
    sock.join_multicast_v4(&MDNS_IPV4_GROUP, &config.interface_v4)?;
    sock.set_multicast_loop_v4(true)?;
    sock.set_multicast_ttl_v4(config.multicast_ttl)?;

    Ok(Member {
        sock: UdpSocket::from(sock),
        group: SocketAddrV4::new(MDNS_IPV4_GROUP, MDNS_PORT).into(),
    })
}

fn open_v6(config: &SocketConfig) -> io::Result<Member> {
    let sock = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    sock.set_only_v6(true)?;
    sock.set_reuse_address(true)?;
    sock.bind(&SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, MDNS_PORT, 0, 0).into())?;
    if config.interface_v6 != 0 {
        sock.set_multicast_if_v6(config.interface_v6)?;
    }
    sock.join_multicast_v6(&MDNS_IPV6_GROUP, config.interface_v6)?;
    sock.set_multicast_loop_v6(true)?;
    sock.set_multicast_hops_v6(config.multicast_ttl)?;

    Ok(Member {
        sock: UdpSocket::from(sock),
        group: SocketAddrV6::new(MDNS_IPV6_GROUP, MDNS_PORT, 0, config.interface_v6).into(),
    })
}

impl Transport for MulticastSockets {
    fn ask(&self, question: &Question) -> io::Result<()> {
        let mut last_err = None;
        let mut sent = 0;
        for member in &self.members {
            match question.ask_on(&member.sock, member.group) {
                Ok(()) => sent += 1,
                Err(e) => {
                    log::warn!("failed to send {} to {}: {}", question, member.group, e);
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if sent == 0 => Err(e),
            _ => Ok(()),
        }
    }

    fn recv(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<(usize, SocketAddr)>> {
        // A single thread serves every family, so each socket gets a share of the timeout and
        // the starting socket rotates between calls.
        let n = self.members.len();
        let share = (timeout / n as u32).max(Duration::from_millis(1));
        for _ in 0..n {
            let member = &self.members[self.next.fetch_add(1, Ordering::Relaxed) % n];
            member.sock.set_read_timeout(Some(share))?;
            match member.sock.recv_from(buf) {
                Ok(res) => return Ok(Some(res)),
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
impl MulticastSockets {
    /// Number of joined address families.
    pub(crate) fn families(&self) -> usize {
        self.members.len()
    }

    /// Counts the copies of `datagram` received within `wait`, from any family.
    pub(crate) fn count_received(&self, datagram: &[u8], wait: Duration) -> usize {
        let mut buf = vec![0; crate::MDNS_BUFFER_SIZE];
        let end = std::time::Instant::now() + wait;
        let mut count = 0;
        while let Some(left) = end.checked_duration_since(std::time::Instant::now()) {
            let slice = left.min(Duration::from_millis(50));
            if let Ok(Some((len, _))) = self.recv(&mut buf, slice) {
                if buf[..len] == *datagram {
                    count += 1;
                }
            }
        }
        count
    }
}
