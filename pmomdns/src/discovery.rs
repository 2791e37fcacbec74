//! Un tour de découverte mDNS : une requête PTR multicast, puis collecte des
//! réponses pendant une fenêtre fixe.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use pmoutils::{list_ipv4_interfaces, send_multicast_v4};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, trace, warn};

use crate::codec::{build_query, decode_response};
use crate::records::{self, MdnsRecord, RecordType, SrvRecord};
use crate::{MDNS_MULTICAST_ADDR, MDNS_PORT, MdnsError};

/// Réponse d'un hôte, décodée et étiquetée avec son adresse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdnsResult {
    pub peer: SocketAddr,
    pub query_type: RecordType,
    pub query_name: String,
    pub records: Vec<MdnsRecord>,
}

impl MdnsResult {
    pub fn from_packet(
        packet: &[u8],
        peer: SocketAddr,
        validate_flags: bool,
    ) -> Result<Self, MdnsError> {
        let response = decode_response(packet, validate_flags)?;
        Ok(Self {
            peer,
            query_type: response.query_type,
            query_name: response.query_name,
            records: response.records,
        })
    }

    pub fn records_of(&self, rtype: RecordType) -> impl Iterator<Item = &MdnsRecord> {
        self.records.iter().filter(move |r| r.rtype == rtype)
    }

    /// IPv4 addresses from the A records; malformed ones are skipped.
    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        self.records_of(RecordType::A)
            .filter_map(|r| records::parse_a(&r.data).ok())
            .collect()
    }

    pub fn ptr_names(&self) -> Vec<String> {
        self.records_of(RecordType::Ptr)
            .filter_map(|r| records::parse_ptr(&r.data).ok())
            .collect()
    }

    /// Instance label of the first PTR answer (`Chromecast-1234`).
    pub fn instance_name(&self) -> Option<String> {
        self.records_of(RecordType::Ptr)
            .find_map(|r| records::parse_ptr_instance(&r.data).ok())
    }

    pub fn srv(&self) -> Option<SrvRecord> {
        self.records_of(RecordType::Srv)
            .find_map(|r| records::parse_srv(&r.data).ok())
    }

    /// All TXT attributes, merged. The first occurrence of a key wins.
    pub fn txt(&self) -> HashMap<String, String> {
        let mut merged = HashMap::new();
        for record in self.records_of(RecordType::Txt) {
            match records::parse_txt(&record.data) {
                Ok(entries) => {
                    for (key, value) in entries {
                        merged.entry(key).or_insert(value);
                    }
                }
                Err(e) => trace!("Skipping TXT record {}: {}", record.name, e),
            }
        }
        merged
    }

    /// True when the response is about `service` or one of its instances.
    pub fn concerns(&self, service: &str) -> bool {
        let service = service.trim_end_matches('.');
        let suffix = format!(".{}", service);
        let matches = |name: &str| {
            name.eq_ignore_ascii_case(service)
                || name.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase())
        };

        matches(&self.query_name) || self.records.iter().any(|r| matches(&r.name))
    }

    fn merge(&mut self, other: MdnsResult) {
        for record in other.records {
            if !self.records.contains(&record) {
                self.records.push(record);
            }
        }
    }
}

/// Paramètres d'un tour de découverte.
#[derive(Debug, Clone)]
pub struct MdnsConfig {
    /// Durée de la fenêtre de collecte
    pub window: Duration,
    /// Rejette les paquets dont les flags ne décrivent pas une réponse standard
    pub validate_flags: bool,
    /// Timeout de lecture du socket, donc la réactivité à la fin de fenêtre
    pub read_timeout: Duration,
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(5000),
            validate_flags: true,
            read_timeout: Duration::from_millis(100),
        }
    }
}

/// Client de découverte mDNS
#[derive(Debug, Clone, Default)]
pub struct MdnsDiscovery {
    config: MdnsConfig,
}

impl MdnsDiscovery {
    pub fn new(config: MdnsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MdnsConfig {
        &self.config
    }

    /// Envoie une requête PTR pour `service` et renvoie les réponses reçues
    /// pendant la fenêtre.
    ///
    /// Un paquet illisible est ignoré, il n'interrompt jamais la collecte.
    /// Les réponses d'un même hôte pour `service` sont fusionnées.
    pub fn discover(&self, service: &str) -> Result<Vec<MdnsResult>, MdnsError> {
        let query = build_query(service, rand::random::<u16>())?;
        let socket = open_socket(self.config.read_timeout)?;

        let target = SocketAddrV4::new(MDNS_MULTICAST_ADDR, MDNS_PORT);
        let sent = send_multicast_v4(&socket, &query, target, &list_ipv4_interfaces())?;
        debug!("📤 mDNS query sent for {} to {} on {} interface(s)", service, target, sent);

        let stop = AtomicBool::new(false);
        let results = thread::scope(|scope| {
            let collector = scope.spawn(|| self.collect(&socket, service, &stop));
            thread::sleep(self.config.window);
            stop.store(true, Ordering::SeqCst);
            collector.join().map_err(|_| MdnsError::CollectorPanicked)
        })?;

        info!(
            "✅ mDNS discovery for {} done: {} responder(s)",
            service,
            results.len()
        );
        Ok(results)
    }

    fn collect(&self, socket: &UdpSocket, service: &str, stop: &AtomicBool) -> Vec<MdnsResult> {
        let mut results = Vec::new();
        let mut buf = [0u8; 9000];

        while !stop.load(Ordering::SeqCst) {
            match socket.recv_from(&mut buf) {
                Ok((n, peer)) => {
                    match MdnsResult::from_packet(&buf[..n], peer, self.config.validate_flags) {
                        Ok(result) if result.concerns(service) => {
                            debug!("📥 mDNS response from {} ({} records)", peer, result.records.len());
                            absorb(&mut results, result, service);
                        }
                        Ok(result) => {
                            trace!("Ignoring mDNS response from {} about {}", peer, result.query_name);
                        }
                        Err(e) => {
                            trace!("Dropping mDNS packet from {}: {}", peer, e);
                        }
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    warn!("❌ mDNS read error: {}", e);
                    thread::sleep(self.config.read_timeout);
                }
            }
        }

        results
    }
}

/// Ajoute `result`, ou le fusionne avec la réponse déjà reçue du même hôte
/// pour `service`.
///
/// Une annonce sans question porte le nom de son premier enregistrement : un
/// même récepteur peut répondre une fois par PTR et une fois par TXT/SRV.
fn absorb(results: &mut Vec<MdnsResult>, result: MdnsResult, service: &str) {
    let same_host = |r: &MdnsResult| r.peer == result.peer && r.concerns(service);
    match results.iter_mut().find(|r| same_host(r)) {
        Some(existing) => existing.merge(result),
        None => results.push(result),
    }
}

fn open_socket(read_timeout: Duration) -> Result<UdpSocket, MdnsError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;

    let shared: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MDNS_PORT).into();
    if let Err(e) = socket.bind(&shared.into()) {
        // Un répondeur système occupe déjà 5353 : requête "legacy unicast",
        // les réponses reviennent sur le port éphémère.
        debug!("mDNS: cannot bind {} ({}), using an ephemeral port", shared, e);
        let ephemeral: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into();
        socket.bind(&ephemeral.into())?;
    }

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(read_timeout))?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_multicast_ttl_v4(255)?;

    let mut joined = 0;
    for (name, ipv4) in list_ipv4_interfaces() {
        match socket.join_multicast_v4(&MDNS_MULTICAST_ADDR, &ipv4) {
            Ok(()) => {
                debug!("mDNS: joined {} on {} ({})", MDNS_MULTICAST_ADDR, ipv4, name);
                joined += 1;
            }
            Err(e) => warn!("mDNS: failed to join {} on {}: {}", MDNS_MULTICAST_ADDR, ipv4, e),
        }
    }
    if joined == 0 {
        if let Err(e) = socket.join_multicast_v4(&MDNS_MULTICAST_ADDR, &Ipv4Addr::UNSPECIFIED) {
            warn!("mDNS: failed to join {} on the default interface: {}", MDNS_MULTICAST_ADDR, e);
        }
    }

    Ok(socket)
}
