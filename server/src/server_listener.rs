use tokio::net::TcpListener;
use tokio::select;
use tokio::sync::broadcast::Receiver as AbortReceiver;

use tracing::{error, info};

use crate::client_handler::ClientHandler;
use crate::registry::Registry;
use crate::server_types::{EventSender, Notification, Notifier};

pub struct ServerListener;

impl ServerListener {
    // Accept loop: turns raw connections into client handler tasks until
    // the abort signal arrives. Accept failures while running are logged
    // and the loop continues; shutdown exits before the socket can fail,
    // so an intentional stop is never reported as an error.
    pub fn spawn_accept(
        listener: TcpListener,
        clients: Registry,
        events: EventSender,
        notifier: Notifier,
        mut abort_rx: AbortReceiver<u8>,
    ) {
        let _h = tokio::spawn(async move {
            loop {
                select! {
                    _ = abort_rx.recv() => {
                        info!("Accept loop exiting");
                        break;
                    }
                    res = listener.accept() => {
                        match res {
                            Ok((tcp_socket, addr)) => {
                                info!("Server received new client connection {:?}", &addr);

                                let (tcp_read, tcp_write) = tcp_socket.into_split();
                                let handler = ClientHandler::new(
                                    tcp_read,
                                    tcp_write,
                                    addr,
                                    events.clone(),
                                    clients.clone(),
                                );

                                ClientHandler::spawn(handler);
                            }
                            Err(e) => {
                                error!("Accept failed: {:?}", e);
                                let _ = notifier.send(Notification::Log(format!("accept failed: {}", e)));
                            }
                        }
                    }
                }
            }
            // listener drops here, releasing the port for a later start
        });
    }
}
