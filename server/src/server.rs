use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, Receiver as NotificationReceiver, Sender as AbortSender};
use tokio::sync::{mpsc, Mutex};

use thiserror::Error;
use tracing::info;

use relay_protocol::{admin_line, kick_notice, KICKED_PRIVATE_NOTICE, SHUTDOWN_NOTICE};

use crate::delivery::Delivery;
use crate::dispatcher::Dispatcher;
use crate::registry::Registry;
use crate::server_listener::ServerListener;
use crate::server_types::{Notification, Notifier};

const LISTEN_HOST: &str = "127.0.0.1";

const EVENT_QUEUE_SIZE: usize = 64;
const NOTIFY_QUEUE_SIZE: usize = 64;
const ABORT_ALL: u8 = 1;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server is already running")]
    AlreadyRunning,
    #[error("server is not running")]
    NotRunning,
    #[error("unable to bind port {port}: {source}")]
    Bind {
        port: u16,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickOutcome {
    Kicked,
    NotFound,
}

struct RunState {
    running: bool,
    abort_tx: Option<AbortSender<u8>>,
}

/// Command surface the presentation layer drives. Owns the registry and
/// the server lifecycle; everything the UI renders arrives through the
/// [`Notification`] channel handed out by [`subscribe`](Self::subscribe).
pub struct ChatServer {
    clients: Registry,
    outgoing: Delivery,
    notify_tx: Notifier,
    state: Mutex<RunState>,
}

impl ChatServer {
    pub fn new() -> Self {
        let clients = Registry::new();
        let outgoing = Delivery::new(&clients);
        let (notify_tx, _) = broadcast::channel(NOTIFY_QUEUE_SIZE);

        ChatServer {
            clients,
            outgoing,
            notify_tx,
            state: Mutex::new(RunState {
                running: false,
                abort_tx: None,
            }),
        }
    }

    pub fn subscribe(&self) -> NotificationReceiver<Notification> {
        self.notify_tx.subscribe()
    }

    /// Stopped -> Running: bind the listening socket, launch the accept
    /// and dispatch loops. A bind failure leaves the server Stopped and
    /// is fatal to this attempt only.
    pub async fn start(&self, port: u16) -> Result<SocketAddr, ServerError> {
        let mut state = self.state.lock().await;
        if state.running {
            return Err(ServerError::AlreadyRunning);
        }

        let listener = TcpListener::bind((LISTEN_HOST, port))
            .await
            .map_err(|source| ServerError::Bind { port, source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { port, source })?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_SIZE);
        let (abort_tx, _) = broadcast::channel(1);

        ServerListener::spawn_accept(
            listener,
            self.clients.clone(),
            event_tx,
            self.notify_tx.clone(),
            abort_tx.subscribe(),
        );
        Dispatcher::spawn(
            event_rx,
            self.clients.clone(),
            self.outgoing.clone(),
            self.notify_tx.clone(),
            abort_tx.subscribe(),
        );

        state.running = true;
        state.abort_tx = Some(abort_tx);

        info!("Server listening on {:?}", &addr);
        self.log(format!("server listening on {}", &addr));

        Ok(addr)
    }

    /// Running -> Stopped: farewell broadcast, close the listening socket
    /// and every session, leave the registry empty.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let mut state = self.state.lock().await;
        if !state.running {
            return Err(ServerError::NotRunning);
        }

        // farewell goes out while every session can still receive it
        let line = self.outgoing.broadcast(SHUTDOWN_NOTICE).await;
        let _ = self.notify_tx.send(Notification::ChatLine(line));

        state.running = false;
        if let Some(abort_tx) = state.abort_tx.take() {
            let _ = abort_tx.send(ABORT_ALL);
        }

        for session in self.clients.drain().await {
            session.close();
        }

        info!("Server stopped");
        self.log("server stopped".to_owned());

        Ok(())
    }

    /// Public notice to everyone, private notice to the target, then the
    /// target is closed and removed synchronously.
    pub async fn kick(&self, nickname: &str) -> KickOutcome {
        let target = match self.clients.get(nickname).await {
            Some(target) => target,
            None => return KickOutcome::NotFound,
        };

        // everyone, the target included, sees the public notice
        let line = self.outgoing.broadcast(&kick_notice(nickname)).await;
        let _ = self.notify_tx.send(Notification::ChatLine(line));

        self.outgoing.send_to(nickname, KICKED_PRIVATE_NOTICE).await;

        // removal precedes close so the patrol pass never sees the kicked
        // session as dead-but-registered and announces it twice
        self.clients.remove(nickname).await;
        target.close();

        info!("Kicked user {}", nickname);
        self.log(format!("kicked user {}", nickname));
        let _ = self.notify_tx.send(Notification::UserLeft(nickname.to_owned()));

        KickOutcome::Kicked
    }

    /// One broadcast per nonblank line, in the order given.
    /// A no-op while the server is stopped.
    pub async fn admin_broadcast(&self, text: &str) {
        if !self.is_running().await {
            return;
        }

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let out = self.outgoing.broadcast(&admin_line(line)).await;
            let _ = self.notify_tx.send(Notification::ChatLine(out));
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    // nicknames currently registered, for seeding the presentation layer
    pub async fn users(&self) -> Vec<String> {
        self.clients.nicknames().await
    }

    fn log(&self, line: String) {
        let _ = self.notify_tx.send(Notification::Log(line));
    }
}

impl Default for ChatServer {
    fn default() -> Self {
        Self::new()
    }
}
