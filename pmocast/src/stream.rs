use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use rustls::{ClientConnection, StreamOwned};

/// Flux d'octets vers un récepteur Cast.
///
/// La boucle de réception lit avec un timeout court pour relâcher
/// régulièrement le flux partagé avec les écritures.
pub trait CastStream: Read + Write + Send {
    fn set_poll_timeout(&self, timeout: Duration) -> std::io::Result<()>;
}

impl CastStream for TcpStream {
    fn set_poll_timeout(&self, timeout: Duration) -> std::io::Result<()> {
        self.set_read_timeout(Some(timeout))
    }
}

impl CastStream for StreamOwned<ClientConnection, TcpStream> {
    fn set_poll_timeout(&self, timeout: Duration) -> std::io::Result<()> {
        self.sock.set_read_timeout(Some(timeout))
    }
}
