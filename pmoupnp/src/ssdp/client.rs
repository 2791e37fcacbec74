/*!
The SSDP client is a *control point*.
It must **not** bind to UDP port 1900.

If another SSDP stack on the host already listens on 0.0.0.0:1900, two sockets
bound there (even with SO_REUSEPORT) get incoming datagrams load-balanced by
the kernel, and HTTP/200 replies are lost randomly.

Therefore the client binds 0.0.0.0:0, sends M-SEARCH to the multicast group
and receives the unicast replies on its ephemeral port.
*/
//! Client SSDP pour la découverte des devices UPnP

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use pmoutils::{list_ipv4_interfaces, send_multicast_v4};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, trace, warn};

use super::message::{SsdpResult, build_msearch, parse_search_response};
use super::{SSDP_MULTICAST_ADDR, SSDP_PORT, SsdpConfig};

/// Client SSDP : un `M-SEARCH` puis une fenêtre de collecte par appel.
#[derive(Debug, Clone, Default)]
pub struct SsdpClient {
    config: SsdpConfig,
}

impl SsdpClient {
    pub fn new(config: SsdpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SsdpConfig {
        &self.config
    }

    /// Cherche les devices répondant à `st`.
    ///
    /// Une réponse illisible est ignorée sans interrompre la collecte ; une
    /// même annonce (USN, LOCATION) reçue plusieurs fois n'est gardée qu'une fois.
    pub fn search(&self, st: &str) -> std::io::Result<Vec<SsdpResult>> {
        let socket = open_socket(self.config.read_timeout)?;

        let msg = build_msearch(st, self.config.mx);
        let target = SocketAddrV4::new(SSDP_MULTICAST_ADDR, SSDP_PORT);
        match send_multicast_v4(&socket, msg.as_bytes(), target, &list_ipv4_interfaces()) {
            Ok(sent) => {
                info!("📤 M-SEARCH sent on {} interface(s) (ST={}, MX={})", sent, st, self.config.mx);
                debug!("📨 M-SEARCH payload\n{}", msg);
            }
            Err(e) => {
                warn!("❌ Failed to send M-SEARCH: {}", e);
                return Err(e);
            }
        }

        let stop = AtomicBool::new(false);
        let results = thread::scope(|scope| {
            let collector = scope.spawn(|| self.collect(&socket, &stop));
            thread::sleep(self.config.window);
            stop.store(true, Ordering::SeqCst);
            collector
                .join()
                .map_err(|_| std::io::Error::other("SSDP collector thread panicked"))
        })?;

        info!("✅ SSDP search for {} done: {} response(s)", st, results.len());
        Ok(results)
    }

    fn collect(&self, socket: &UdpSocket, stop: &AtomicBool) -> Vec<SsdpResult> {
        let mut results: Vec<SsdpResult> = Vec::new();
        let mut buf = [0u8; 8192];

        while !stop.load(Ordering::SeqCst) {
            match socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    let data = String::from_utf8_lossy(&buf[..n]);
                    match parse_search_response(&data, Some(from)) {
                        Ok(res) => {
                            if results
                                .iter()
                                .any(|r| r.usn == res.usn && r.location == res.location)
                            {
                                trace!("Duplicate SSDP response from {} ({})", from, res.usn);
                            } else {
                                debug!("📥 SSDP response from {}: {}", from, res.usn);
                                results.push(res);
                            }
                        }
                        Err(e) => trace!("Dropping SSDP message from {}: {}", from, e),
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    warn!("❌ SSDP client read error: {}", e);
                    thread::sleep(self.config.read_timeout);
                }
            }
        }

        results
    }
}

fn open_socket(read_timeout: Duration) -> std::io::Result<UdpSocket> {
    let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket2.set_reuse_address(true)?;

    let bind_addr: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into();
    socket2.bind(&bind_addr.into())?;

    let socket: UdpSocket = socket2.into();
    socket.set_read_timeout(Some(read_timeout))?;
    socket.set_multicast_loop_v4(true)?; // utile en dev local

    for (name, ipv4) in list_ipv4_interfaces() {
        match socket.join_multicast_v4(&SSDP_MULTICAST_ADDR, &ipv4) {
            Ok(()) => debug!("SSDP: joined {} on {} ({})", SSDP_MULTICAST_ADDR, ipv4, name),
            Err(e) => warn!("SSDP: failed to join {} on {}: {}", SSDP_MULTICAST_ADDR, ipv4, e),
        }
    }

    Ok(socket)
}
