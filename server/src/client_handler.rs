use std::net::SocketAddr;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::select;

use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_stream::StreamExt;
use futures::SinkExt;

use tracing::{debug, info};

use relay_protocol::{screen_name, HANDSHAKE_INVALID, HANDSHAKE_OK};

use crate::registry::Registry;
use crate::server_types::{Event, EventSender};
use crate::session::Session;

const LINES_MAX_LEN: usize = 256;

type LineReader = FramedRead<OwnedReadHalf, LinesCodec>;

// Handles server communication with one client: the nickname handshake,
// then the read loop relaying chat lines to the dispatcher.
// Essentially this models the client actor on the server side.
pub struct ClientHandler {
    tcp_read: Option<OwnedReadHalf>,
    tcp_write: Option<OwnedWriteHalf>,
    addr: SocketAddr,
    events: EventSender,
    clients: Registry,
}

impl ClientHandler {
    pub fn new(
        tcp_read: OwnedReadHalf,
        tcp_write: OwnedWriteHalf,
        addr: SocketAddr,
        events: EventSender,
        clients: Registry,
    ) -> Self {
        Self {
            tcp_read: Some(tcp_read),
            tcp_write: Some(tcp_write),
            addr,
            events,
            clients,
        }
    }

    // Spawn tokio task to handle this connection:
    // if registration succeeds then only handle client reads
    pub fn spawn(mut handler: ClientHandler) {
        let _h = tokio::spawn(async move {
            handler.run().await;
        });
    }

    async fn run(&mut self) {
        let input = self.tcp_read.take().unwrap();
        let mut lines = FramedRead::new(input, LinesCodec::new_with_max_length(LINES_MAX_LEN));

        if let Some(session) = self.register(&mut lines).await {
            self.handle_read(session, lines).await;
        }
    }

    // Nickname handshake: one line in, OK or INVALID out.
    // Rejected connections are answered and dropped without a broadcast.
    async fn register(&mut self, lines: &mut LineReader) -> Option<Session> {
        let proposed = match lines.next().await {
            Some(Ok(line)) => line,
            _ => {
                info!("Connection {:?} closed before a nickname arrived", &self.addr);
                return None;
            }
        };

        let tcp_write = self.tcp_write.take().unwrap();

        let name = match screen_name(&proposed) {
            Ok(name) => name.to_owned(),
            Err(reason) => {
                info!(
                    "Rejecting nickname {:?} from {:?}: {:?}",
                    &proposed, &self.addr, reason
                );
                Self::reject(tcp_write).await;
                return None;
            }
        };

        let session = Session::new(name.clone(), tcp_write);

        // duplicate check and insert happen under one registry lock
        if !self.clients.insert(session.clone()).await {
            info!(
                "Rejecting nickname {:?} from {:?}: already taken",
                &name, &self.addr
            );
            session.send(HANDSHAKE_INVALID);
            return None; // dropping the handles flushes the reply and closes
        }

        session.send(HANDSHAKE_OK);
        info!("User {} joined from {:?}", &name, &self.addr);

        if self.events.send(Event::Joined(name)).await.is_err() {
            // dispatcher already gone, the server is stopping
            session.close();
            return None;
        }

        Some(session)
    }

    async fn reject(tcp_write: OwnedWriteHalf) {
        let mut fw = FramedWrite::new(tcp_write, LinesCodec::new());

        if let Err(e) = fw.send(HANDSHAKE_INVALID).await {
            debug!("Unable to send handshake reply: {:?}", e);
        }
    }

    // Loop to handle ongoing client msgs: every nonempty line becomes a
    // chat event for the dispatcher. Exits on peer EOF, read error or
    // force-close; the registry is never touched from here, the patrol
    // pass discovers the dead session instead.
    async fn handle_read(&mut self, session: Session, mut lines: LineReader) {
        loop {
            select! {
                _ = session.closed() => {
                    debug!("Session {} force-closed", session.nickname());
                    break;
                }
                value = lines.next() => {
                    match value {
                        Some(Ok(line)) if !line.is_empty() => {
                            let event = Event::Chat(session.nickname().to_owned(), line);
                            if self.events.send(event).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            debug!("Connection {:?} closing error: {:?}", &self.addr, e);
                            break;
                        }
                        None => {
                            info!("Client {:?} connection has closed", &self.addr);
                            break;
                        }
                    }
                }
            }
        }

        session.close();
    }
}
