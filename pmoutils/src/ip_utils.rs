use get_if_addrs::get_if_addrs;
use std::net::{Ipv4Addr, UdpSocket};

/// Devine l'adresse IP locale de la machine.
///
/// Cette fonction tente de déterminer l'adresse IP locale en créant une connexion UDP
/// vers un serveur DNS public (8.8.8.8). Cette technique permet d'identifier l'interface
/// réseau qui serait utilisée pour communiquer avec Internet.
///
/// Retourne `"127.0.0.1"` si aucune interface n'est utilisable.
///
/// # Note
///
/// UDP est sans connexion : aucun paquet n'est émis, on demande simplement au
/// système quelle interface serait utilisée pour joindre la cible.
pub fn guess_local_ip() -> String {
    match UdpSocket::bind("0.0.0.0:0") {
        Ok(socket) => {
            if socket.connect("8.8.8.8:80").is_ok() {
                if let Ok(local_addr) = socket.local_addr() {
                    return local_addr.ip().to_string();
                }
            }
            "127.0.0.1".to_string()
        }
        Err(_) => "127.0.0.1".to_string(),
    }
}

/// Lists the non-loopback IPv4 addresses of the local interfaces.
///
/// Multicast discovery joins its group once per address returned here.
/// An interface enumeration failure yields an empty list.
pub fn list_ipv4_interfaces() -> Vec<(String, Ipv4Addr)> {
    let mut result = Vec::new();

    if let Ok(interfaces) = get_if_addrs() {
        for iface in interfaces {
            if let std::net::IpAddr::V4(ipv4) = iface.ip() {
                if !ipv4.is_loopback() {
                    result.push((iface.name, ipv4));
                }
            }
        }
    }

    result
}
