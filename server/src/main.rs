use std::sync::Arc;

use tokio::io;

use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_stream::StreamExt;

use tracing_subscriber::fmt;
use tracing::{error, info, Level};

use relay_server::server::{ChatServer, KickOutcome};
use relay_server::server_types::Notification;

const DEFAULT_PORT: u16 = 12345;

const GREETINGS: &str = "$ Admin console commands: /start [port], /stop, /users, /kick <name>\n$ Any other input is broadcast to the room";

#[tokio::main]
async fn main() -> io::Result<()> {
    fmt()
        .compact()
        .with_max_level(Level::INFO)
        .init();

    let port = std::env::args()
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let server = Arc::new(ChatServer::new());

    // mirror chat traffic and lifecycle events into the server log
    let mut notices = server.subscribe();
    let _h = tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            match notice {
                Notification::ChatLine(line) => info!("{}", line),
                Notification::UserJoined(name) => info!("User {} is online", name),
                Notification::UserLeft(name) => info!("User {} is offline", name),
                Notification::Log(line) => info!("{}", line),
            }
        }
    });

    if let Err(e) = server.start(port).await {
        error!("Unable to start: {}", e);
        return Ok(());
    }

    println!("{}", GREETINGS);

    // admin console over stdin, standing in for the operator UI
    let mut lines = FramedRead::new(io::stdin(), LinesCodec::new());

    while let Some(Ok(line)) = lines.next().await {
        let input = line.trim();

        if input.is_empty() {
            continue;
        } else if input == "/stop" {
            if let Err(e) = server.stop().await {
                error!("{}", e);
            }
        } else if let Some(arg) = input.strip_prefix("/start") {
            let port = arg.trim().parse().unwrap_or(DEFAULT_PORT);
            if let Err(e) = server.start(port).await {
                error!("{}", e);
            }
        } else if input == "/users" {
            info!("Users currently online: {:?}", server.users().await);
        } else if let Some(name) = input.strip_prefix("/kick") {
            match server.kick(name.trim()).await {
                KickOutcome::Kicked => info!("Kicked {}", name.trim()),
                KickOutcome::NotFound => info!("No such user {:?}", name.trim()),
            }
        } else {
            server.admin_broadcast(input).await;
        }
    }

    if server.is_running().await {
        let _ = server.stop().await;
    }

    Ok(())
}
