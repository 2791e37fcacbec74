//! Liste les récepteurs Cast et les renderers UPnP du réseau local.
//!
//! Usage:
//!   cargo run --example discover

use pmoconfig::get_config;
use pmocontrol::{Device, Named, discover_devices};
use tracing_subscriber::EnvFilter;

fn main() {
    let config = get_config();
    let level = config.get_log_min_level().unwrap_or_else(|_| "INFO".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_lowercase())),
        )
        .init();

    tracing::info!("Starting cast/UPnP discovery...");
    let devices = discover_devices(&config);

    println!("=====================");
    println!("Devices detected : {}", devices.len());
    for (index, device) in devices.iter().enumerate() {
        let location = match device {
            Device::Cast(d) => d.addr().to_string(),
            Device::Upnp(d) => d.description_url().unwrap_or_default(),
        };
        println!("{:>2}. [{}] {} ({})", index, device.protocol(), device.name(), location);
    }
    println!("=====================");
}
