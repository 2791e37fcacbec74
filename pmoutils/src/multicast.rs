use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use socket2::SockRef;
use tracing::{debug, warn};

/// Envoie `payload` vers `target` une fois par interface de `interfaces`.
///
/// Sans interface, l'envoi suit la route par défaut. Renvoie le nombre
/// d'envois réussis ; l'erreur n'est remontée que si aucun n'a abouti.
pub fn send_multicast_v4(
    socket: &UdpSocket,
    payload: &[u8],
    target: SocketAddrV4,
    interfaces: &[(String, Ipv4Addr)],
) -> io::Result<usize> {
    if interfaces.is_empty() {
        socket.send_to(payload, target)?;
        return Ok(1);
    }

    let sock = SockRef::from(socket);
    let mut sent = 0;
    let mut last_error = None;

    for (name, ipv4) in interfaces {
        match sock
            .set_multicast_if_v4(ipv4)
            .and_then(|()| socket.send_to(payload, target))
        {
            Ok(_) => {
                debug!("📤 {} bytes to {} via {} ({})", payload.len(), target, ipv4, name);
                sent += 1;
            }
            Err(e) => {
                warn!("Cannot send to {} via {} ({}): {}", target, ipv4, name, e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if sent == 0 => Err(e),
        _ => Ok(sent),
    }
}
