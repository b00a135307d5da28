use tokio::select;
use tokio::sync::broadcast::Receiver as AbortReceiver;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

use tracing::info;

use relay_protocol::{chat_line, join_notice, leave_notice};

use crate::delivery::Delivery;
use crate::registry::Registry;
use crate::server_types::{Event, EventReceiver, Notification, Notifier};

const PATROL_INTERVAL: Duration = Duration::from_millis(100);

// Single consumer of the event queue and sole liveness reaper. Both jobs
// run under the same fixed tick so broadcast order stays consistent with
// detection order.
pub struct Dispatcher;

impl Dispatcher {
    pub fn spawn(
        mut events: EventReceiver,
        clients: Registry,
        outgoing: Delivery,
        notifier: Notifier,
        mut abort_rx: AbortReceiver<u8>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = time::interval(PATROL_INTERVAL);

            loop {
                select! {
                    _ = abort_rx.recv() => {
                        info!("Dispatch loop exiting");
                        break;
                    }
                    _ = tick.tick() => {
                        Self::drain_events(&mut events, &outgoing, &notifier).await;
                        Self::reap_dead(&clients, &outgoing, &notifier).await;
                    }
                }
            }
        })
    }

    // Drain everything queued since the last tick, in arrival order
    async fn drain_events(events: &mut EventReceiver, outgoing: &Delivery, notifier: &Notifier) {
        loop {
            let event = match events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };

            match event {
                Event::Joined(name) => {
                    let line = outgoing.broadcast(&join_notice(&name)).await;
                    let _ = notifier.send(Notification::UserJoined(name));
                    let _ = notifier.send(Notification::ChatLine(line));
                }
                Event::Chat(name, text) => {
                    let line = outgoing.broadcast(&chat_line(&name, &text)).await;
                    let _ = notifier.send(Notification::ChatLine(line));
                }
            }
        }
    }

    // Sessions whose read loop has ended are dropped from the registry
    // and announced with a leave notice
    async fn reap_dead(clients: &Registry, outgoing: &Delivery, notifier: &Notifier) {
        for session in clients.reap_dead().await {
            let name = session.nickname().to_owned();
            info!("User {} has left", &name);

            let line = outgoing.broadcast(&leave_notice(&name)).await;
            let _ = notifier.send(Notification::Log(format!("user {} disconnected", &name)));
            let _ = notifier.send(Notification::UserLeft(name));
            let _ = notifier.send(Notification::ChatLine(line));
        }
    }
}
