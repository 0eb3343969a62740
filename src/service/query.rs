//! One-shot DNS-SD browsing.

use std::{
    collections::HashSet,
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, SyncSender},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    hex::Hex,
    packet::question::Question,
    socket::{MulticastSockets, SocketConfig, Transport},
    MDNS_BUFFER_SIZE,
};

use super::{instance::Instance, record_set::RecordSet, response::Response, Domain, Service};

/// Longest single wait for a datagram, bounding how late a cancellation or deadline is noticed.
const RECV_SLICE: Duration = Duration::from_millis(50);

/// Aborts a running [`Query`] from another thread.
///
/// A cancelled query stops listening within a few milliseconds and returns the instances it could
/// resolve so far.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every query holding a clone of this token. Cannot be undone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns whether [`CancelToken::cancel`] was called on this token or any of its clones.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// A synchronous mDNS query for the instances of one service type.
///
/// Running the query sends a PTR question for the service, then follows every answer to its SRV,
/// TXT and address records by asking further questions as needed. It stops once no relevant
/// response arrived for the configured timeout, and returns every [`Instance`] whose records
/// were complete by then.
///
/// A [`Query`] is consumed by running it.
pub struct Query {
    service: Service,
    domain: Domain,
    timeout: Duration,
    sockets: SocketConfig,
    cancel: CancelToken,
}

impl Query {
    /// How long a query waits for further responses after the last relevant one.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(750);

    /// Multicast TTL (IPv4) and hop limit (IPv6) of outgoing questions.
    pub const DEFAULT_MULTICAST_TTL: u32 = 10;

    /// Creates a query for `service` in `domain` with the default timeout.
    pub fn new(service: Service, domain: Domain) -> Self {
        Self::with_timeout(service, domain, Self::DEFAULT_TIMEOUT)
    }

    /// Creates a query for `service` in `domain` that stops after `timeout` without relevant
    /// traffic.
    pub fn with_timeout(service: Service, domain: Domain, timeout: Duration) -> Self {
        Self {
            service,
            domain,
            timeout,
            sockets: SocketConfig {
                multicast_ttl: Self::DEFAULT_MULTICAST_TTL,
                interface_v4: Ipv4Addr::UNSPECIFIED,
                interface_v6: 0,
            },
            cancel: CancelToken::new(),
        }
    }

    /// Sets the time to wait for further responses after the last relevant one.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_multicast_ttl(&mut self, ttl: u32) {
        self.sockets.multicast_ttl = ttl;
    }

    /// Sets the local IPv4 address of the interface to query on. By default, the OS picks one.
    pub fn set_interface_v4(&mut self, addr: Ipv4Addr) {
        self.sockets.interface_v4 = addr;
    }

    /// Sets the index of the interface to query on via IPv6. By default (0), the OS picks one.
    pub fn set_interface_v6(&mut self, index: u32) {
        self.sockets.interface_v6 = index;
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns a token that cancels this query when triggered, even while it is running.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Returns the PTR question this query starts with.
    pub fn question(&self) -> Question {
        self.service.browse_question(&self.domain)
    }

    /// Runs the query, blocking until it times out or is cancelled.
    ///
    /// Only fails if the query could not be sent at all; instances whose records did not all
    /// arrive in time are left out of the result.
    pub fn run_once(self) -> io::Result<HashSet<Instance>> {
        self.run(None)
    }

    /// Like [`Query::run_once`], but also stops listening at `deadline`.
    pub fn run_once_until(self, deadline: Instant) -> io::Result<HashSet<Instance>> {
        self.run(Some(deadline))
    }

    fn run(self, deadline: Option<Instant>) -> io::Result<HashSet<Instance>> {
        let sockets = MulticastSockets::open(&self.sockets)?;
        self.run_on(&sockets, deadline)
    }

    pub(crate) fn run_on<T: Transport>(
        self,
        transport: &T,
        deadline: Option<Instant>,
    ) -> io::Result<HashSet<Instance>> {
        let browse = self.question();
        let session = Session {
            transport,
            asked: Mutex::new(HashSet::new()),
            stop: AtomicBool::new(false),
            cancel: self.cancel,
            timeout: self.timeout,
            deadline,
        };

        let start = Instant::now();
        let records = thread::scope(|s| {
            let (ready_tx, ready_rx) = mpsc::sync_channel(1);
            let listener = thread::Builder::new()
                .name("mdns-listener".into())
                .spawn_scoped(s, || session.listen(ready_tx))?;

            // An error means the listener exited before it got to receive.
            if ready_rx.recv().is_ok() {
                if let Err(e) = session.ask(&browse) {
                    session.stop.store(true, Ordering::Release);
                    listener.join().ok();
                    return Err(e);
                }
            }

            listener
                .join()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "mDNS listener thread panicked"))
        })?;

        let instances = records.instances(&browse);
        log::info!(
            "{}: {} instance(s) after {:?}",
            browse.name(),
            instances.len(),
            start.elapsed(),
        );
        Ok(instances)
    }
}

/// State of one query run.
///
/// The asked questions are shared between the caller, which sends the first one, and the
/// listener thread, which sends all follow-ups.
struct Session<'t, T> {
    transport: &'t T,
    asked: Mutex<HashSet<Question>>,
    stop: AtomicBool,
    cancel: CancelToken,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl<'t, T: Transport> Session<'t, T> {
    fn asked(&self) -> MutexGuard<'_, HashSet<Question>> {
        self.asked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends `question`, unless it was already sent during this run.
    fn ask(&self, question: &Question) -> io::Result<()> {
        if !self.asked().insert(question.clone()) {
            return Ok(());
        }
        log::debug!("asking {}", question);
        self.transport.ask(question)
    }

    fn listen(&self, ready: SyncSender<()>) -> RecordSet {
        let mut records = RecordSet::new();
        let mut buf = vec![0; MDNS_BUFFER_SIZE];
        let mut last_relevant = Instant::now();

        log::debug!("listening for {:?}", self.timeout);
        // The caller might be gone already, there's nobody to notify then.
        ready.send(()).ok();

        loop {
            if self.cancel.is_cancelled() {
                log::debug!("query cancelled");
                break;
            }
            if self.stop.load(Ordering::Acquire) {
                break;
            }

            let idle_end = last_relevant + self.timeout;
            let end = match self.deadline {
                Some(deadline) if deadline < idle_end => deadline,
                _ => idle_end,
            };
            let remaining = end.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::debug!("no relevant traffic for {:?}, done", last_relevant.elapsed());
                break;
            }

            let slice = remaining.min(RECV_SLICE);
            let (len, from) = match self.transport.recv(&mut buf, slice) {
                Ok(Some(res)) => res,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("failed to receive: {}", e);
                    thread::sleep(slice);
                    continue;
                }
            };

            if self.process(&buf[..len], from, &mut records) {
                last_relevant = Instant::now();
            }
        }

        records
    }

    /// Handles one datagram and returns whether it was relevant to this query.
    fn process(&self, datagram: &[u8], from: SocketAddr, records: &mut RecordSet) -> bool {
        log::trace!("recv from {}: {}", from, Hex(datagram));

        let response = match Response::from_datagram(datagram) {
            Ok(response) => response,
            Err(e) => {
                log::debug!("dropping malformed packet from {}: {}", from, e);
                return false;
            }
        };
        if !response.answers(self.asked().iter()) {
            log::trace!("ignoring unrelated packet from {}", from);
            return false;
        }

        let added = records.merge(response.into_records());
        log::debug!("{} new record(s) from {}", added, from);
        if added != 0 {
            for question in records.missing_questions() {
                if let Err(e) = self.ask(&question) {
                    log::warn!("failed to send {}: {}", question, e);
                }
            }
        }
        true
    }
}
