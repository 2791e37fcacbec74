//! Envoie une URL vers un device découvert.
//!
//! Le média doit déjà être servi en HTTP (par exemple par le serveur de
//! fichiers local, sur `guess_local_ip()`).
//!
//! Usage:
//!   cargo run --example cast_url -- <index> <url> <mime-type>
//!
//! Example:
//!   cargo run --example cast_url -- 0 http://192.168.1.10:8080/movie.mp4 video/mp4

use std::env;
use std::process;

use anyhow::{Context, Result, anyhow};
use pmoconfig::get_config;
use pmocontrol::{DeviceConnection, MediaControl, Named, discover_devices};
use pmoutils::guess_local_ip;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <index> <url> <mime-type>", args[0]);
        eprintln!("\nExample:");
        eprintln!("  {} 0 http://{}:8080/movie.mp4 video/mp4", args[0], guess_local_ip());
        process::exit(1);
    }

    let index: usize = args[1].parse().context("index must be a number")?;
    let url = &args[2];
    let mime_type = &args[3];

    let config = get_config();
    let level = config.get_log_min_level().unwrap_or_else(|_| "INFO".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_lowercase())),
        )
        .init();

    let mut devices = discover_devices(&config);
    for (i, device) in devices.iter().enumerate() {
        println!("{:>2}. [{}] {}", i, device.protocol(), device.name());
    }

    let count = devices.len();
    let device = devices
        .get_mut(index)
        .ok_or_else(|| anyhow!("no device #{} ({} discovered)", index, count))?;

    println!("Connecting to {}...", device.name());
    device.connect()?;

    match device.load_media(url, mime_type) {
        Ok(()) => println!("✅ {} is playing {}", device.name(), url),
        Err(e) => println!("❌ Launch failed: {}", e),
    }

    device.disconnect();
    Ok(())
}
