//! # TAPCP Server for Memory-Mapped Platforms
//!
//! Deployable daemon serving a gateware target's registers, raw address
//! spaces and device catalog over the TAPCP protocol (TFTP on UDP).
//!
//! ## Overview
//!
//! This crate wires the [`tapcp_server`](https://docs.rs/tapcp-server/) engine
//! to two concrete backends: a memory-mapped hardware window (UIO node or
//! `/dev/mem`) for real platforms, and a RAM-backed simulator for bench
//! testing and client development.
pub mod backends;

use std::error::Error;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;
use tapcp_server::server::{Config, Server};

fn parse_hex32(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x");
    u32::from_str_radix(digits, 16).map_err(|e| e.to_string())
}

#[derive(Parser, Eq, PartialEq, Clone)]
enum BackendImpl {
    /// Serve a memory-mapped hardware window
    Devmem {
        /// Character device carrying the FPGA window (UIO node or /dev/mem)
        path: PathBuf,
        #[arg(
            short,
            long,
            value_parser = parse_hex32,
            default_value = "4000000",
            help = "FPGA window size in bytes (hex)"
        )]
        size: u32,
        #[arg(short, long, help = "File holding the packed device catalog")]
        catalog: PathBuf,
        #[arg(long, help = "Optional second device carrying the CPU window")]
        cpu_path: Option<PathBuf>,
        #[arg(
            long,
            value_parser = parse_hex32,
            default_value = "10000",
            help = "CPU window size in bytes (hex)"
        )]
        cpu_size: u32,
    },
    /// Serve a simulated target (no hardware required)
    Sim {
        #[arg(
            short,
            long,
            default_value = "4096",
            help = "Words of simulated FPGA space"
        )]
        words: usize,
    },
}

#[derive(Parser)]
#[command(about = "TAPCP server for memory-mapped FPGA platforms", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "69")]
    port: u16,

    #[arg(short, long, default_value = "127.0.0.1")]
    ip: IpAddr,

    #[clap(subcommand)]
    backend: Option<BackendImpl>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    log::info!("Starting TAPCP server");

    let args = Args::parse();
    let addr = SocketAddr::new(args.ip, args.port);
    let config = Config::default();
    log::debug!(
        "config: addr={}, timeout={:?}, retries={}",
        addr,
        config.timeout,
        config.retries
    );

    match args.backend {
        Some(BackendImpl::Devmem {
            path,
            size,
            catalog,
            cpu_path,
            cpu_size,
        }) => {
            use crate::backends::devmem::DevmemTarget;

            let blob = fs::read(&catalog)?;
            log::info!(
                "loaded catalog from {} ({} bytes)",
                catalog.display(),
                blob.len()
            );
            let mut target = DevmemTarget::new(&path, size, blob)?;
            if let Some(cpu_path) = cpu_path {
                target.map_cpu_window(&cpu_path, cpu_size)?;
            } else {
                log::warn!("no CPU window mapped; /cpu reads will return zeros");
            }
            let mut server = Server::bind(target, config, addr)?;
            server.serve()?;
        }
        Some(BackendImpl::Sim { words }) => {
            use crate::backends::sim::SimTarget;

            log::info!("serving simulated target ({} words)", words);
            let mut server = Server::bind(SimTarget::new(words), config, addr)?;
            server.serve()?;
        }
        None => {
            println!(
                "No backend given. Use tapcp-server-mmio devmem <path> --catalog <file> for hardware, or tapcp-server-mmio sim for a simulated target."
            );
        }
    }
    Ok(())
}
