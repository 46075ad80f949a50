//! Chat server demo
//!
//! Run with: cargo run --example chat_server [BIND_ADDR]
//!
//! Without an argument the address comes from `HUB_BIND_ADDR` (default
//! 0.0.0.0:5000).
//!
//! ## Listening
//!
//! With websocat:
//!   websocat ws://localhost:5000/ws
//!   {"type":"join","circleId":"c1"}
//!
//! ## Posting
//!
//! Type lines on the server's stdin:
//!   c1 alice hello everyone
//!
//! Each line is `<circleId> <senderId> <content>`. The message is persisted to
//! the in-memory store and pushed to every client that joined `c1`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hub_chat::{ChatHub, ChatServer, InMemoryMessageStore, NewMessage, ServerConfig};
use tokio::io::{AsyncBufReadExt, BufReader};

fn print_usage() {
    println!("Usage: chat_server [BIND_ADDR]");
    println!();
    println!("  BIND_ADDR   host:port to listen on (overrides HUB_BIND_ADDR)");
    println!();
    println!("Environment:");
    println!("  HUB_BIND_ADDR            default 0.0.0.0:5000");
    println!("  HUB_WS_PATH              upgrade path, default /ws");
    println!("  HUB_MAX_CONNECTIONS      0 = unlimited");
    println!("  HUB_PING_INTERVAL_SECS   keep-alive ping interval");
    println!("  RUST_LOG                 log filter");
}

fn parse_line(line: &str) -> Option<NewMessage> {
    let mut parts = line.trim().splitn(3, char::is_whitespace);
    let circle = parts.next()?;
    let sender = parts.next()?;
    let content = parts.next()?.trim();
    Some(NewMessage::new(circle, sender, content))
}

async fn post_from_stdin(hub: Arc<ChatHub<InMemoryMessageStore>>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("stdin error: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let Some(draft) = parse_line(&line) else {
            eprintln!("expected: <circleId> <senderId> <content>");
            continue;
        };

        match hub.post_message(draft).await {
            Ok(message) => println!("[{}] posted {}", message.circle_id, message.id),
            Err(e) => eprintln!("rejected: {}", e),
        }
    }
}

async fn print_stats(hub: Arc<ChatHub<InMemoryMessageStore>>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    interval.tick().await;
    loop {
        interval.tick().await;
        let stats = hub.stats();
        println!(
            "Stats: connections={} joins={} messages={} deliveries={} failures={}",
            stats.active_connections,
            stats.joins,
            stats.messages_ingested,
            stats.deliveries,
            stats.delivery_failures,
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hub_chat=debug".parse()?)
                .add_directive("chat_server=debug".parse()?),
        )
        .init();

    let mut config = ServerConfig::from_env()?;
    if let Some(addr) = args.get(1) {
        let addr: SocketAddr = match addr.parse() {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: invalid bind address {:?}: {}", addr, e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        };
        config = config.bind(addr);
    }

    println!(
        "Starting chat server on ws://{}{}",
        config.bind_addr,
        config.ws_path.as_deref().unwrap_or("/")
    );
    println!("Post with: <circleId> <senderId> <content>");
    println!();

    let hub = Arc::new(ChatHub::new(InMemoryMessageStore::new()));
    let server = ChatServer::new(config, Arc::clone(&hub));

    tokio::spawn(post_from_stdin(Arc::clone(&hub)));
    tokio::spawn(print_stats(Arc::clone(&hub)));

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nShutting down...");
    };

    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}
