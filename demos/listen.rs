//! Accept one peer at a time and print every overlay record it sends.
//!
//! Usage: cargo run --example listen [ADDR]
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::env;
use std::net::TcpListener;
use std::process;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use refbus::{
    CharacterDescriptor, Connection, DeleteLayer, DeleteOperation, Disconnect, GraphicDescriptor,
    InteractiveHeader, Renderer, SessionConfig, TextLevel,
};

const DEFAULT_ADDR: &str = "0.0.0.0:7788";

/// Prints each record on one line.
struct Printer;

impl Renderer for Printer {
    fn draw_graphic(&mut self, header: &InteractiveHeader, g: &GraphicDescriptor) {
        println!(
            "[{:04X}->{:04X}] {:?} {:?} '{}' layer={} color={:?} width={} \
             start=({},{}) end=({},{}) r={} angles={}..{}",
            header.sender_id,
            header.receiver_id,
            g.operation,
            g.shape,
            g.name_lossy(),
            g.layer,
            g.color,
            g.width,
            g.start_x,
            g.start_y,
            g.end_x,
            g.end_y,
            g.radius,
            g.start_angle,
            g.end_angle,
        );
    }

    fn draw_character(&mut self, header: &InteractiveHeader, c: &CharacterDescriptor) {
        println!(
            "[{:04X}->{:04X}] text '{}' at ({},{}) layer={} {:?}",
            header.sender_id,
            header.receiver_id,
            c.text_lossy(),
            c.graphic.start_x,
            c.graphic.start_y,
            c.graphic.layer,
            c.graphic.operation,
        );
    }

    fn delete_layer(&mut self, header: &InteractiveHeader, d: &DeleteLayer) {
        let target = match d.operation {
            DeleteOperation::All => "all layers".to_string(),
            DeleteOperation::Layer => format!("layer {}", d.layer),
            other => format!("{other:?} layer {}", d.layer),
        };
        println!("[{:04X}->{:04X}] delete {target}", header.sender_id, header.receiver_id);
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let listener = match TcpListener::bind(&addr) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind {addr}: {e}");
            process::exit(1);
        }
    };
    info!(%addr, "listening");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".into());
        let _ = stream.set_nodelay(true);
        info!(%peer, "peer connected");

        let mut conn = Connection::new(stream, SessionConfig::default());
        if let Err(e) = conn.send_text(TextLevel::Info, "overlay ready") {
            warn!(%peer, error = %e, "greeting not sent");
        }
        match conn.serve(&mut Printer) {
            Ok(Disconnect::PeerClosed) => info!(%peer, "peer left"),
            Ok(Disconnect::Rejected(e)) => warn!(%peer, error = %e, "peer dropped"),
            Err(e) => warn!(%peer, error = %e, "connection failed"),
        }
    }
}
