use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::Notify;

use tokio_util::codec::{FramedWrite, LinesCodec};
use futures::SinkExt;

use tracing::debug;

const OUTBOUND_QUEUE_SIZE: usize = 64;

// One registered client. Clones share the same underlying connection,
// so the registry, broadcast snapshots and the read loop all talk to
// the one writer task.
#[derive(Clone)]
pub struct Session {
    nickname: String,
    outbound: Sender<String>,
    alive: Arc<AtomicBool>,
    closer: Arc<Notify>,
}

impl Session {
    pub fn new(nickname: String, tcp_write: OwnedWriteHalf) -> Self {
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);

        Self::spawn_writer(nickname.clone(), outbound_rx, tcp_write);

        Session {
            nickname,
            outbound,
            alive: Arc::new(AtomicBool::new(true)),
            closer: Arc::new(Notify::new()),
        }
    }

    // Writer task drains queued lines to the peer until every session
    // handle is gone or the peer stops accepting writes, then drops the
    // write half which closes the socket
    fn spawn_writer(nickname: String, mut outbound_rx: Receiver<String>, tcp_write: OwnedWriteHalf) {
        let _h = tokio::spawn(async move {
            let mut fw = FramedWrite::new(tcp_write, LinesCodec::new());

            while let Some(line) = outbound_rx.recv().await {
                if let Err(e) = fw.send(line).await {
                    debug!("Write to client {} failed: {:?}", &nickname, e);
                    break;
                }
            }
        });
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    // true until the read loop terminates or the session is force-closed
    pub fn is_live(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Queue one line for the peer; a no-op once the session is closed.
    /// Failures stay local to this session, a broken peer is discovered
    /// by the next patrol pass rather than surfaced to the caller.
    pub fn send(&self, line: &str) {
        if !self.is_live() {
            return;
        }

        if let Err(e) = self.outbound.try_send(line.to_owned()) {
            debug!("Dropping line for {}: {:?}", &self.nickname, e);
        }
    }

    /// Idempotent: marks the session not-live and unblocks a pending read.
    pub fn close(&self) {
        self.alive.store(false, Ordering::Relaxed);
        self.closer.notify_one();
    }

    // resolves once close() has been called
    pub async fn closed(&self) {
        self.closer.notified().await;
    }
}
