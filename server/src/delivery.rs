use tracing::debug;

use relay_protocol::with_timestamp;

use crate::registry::Registry;

// handles msg delivery back to clients
#[derive(Clone)]
pub struct Delivery {
    registry: Registry,
}

impl Delivery {
    pub fn new(registry: &Registry) -> Self {
        Delivery {
            registry: registry.clone(),
        }
    }

    /// Stamp the payload with wall time and fan it out to a registry
    /// snapshot. Sends are queued per session outside the registry lock,
    /// so one dead or slow peer never stalls the rest; per-session
    /// failures are swallowed inside `Session::send`.
    ///
    /// Returns the stamped line for the caller's log pane.
    pub async fn broadcast(&self, payload: &str) -> String {
        let line = with_timestamp(payload);
        debug!("Broadcasting {:?}", &line);

        for session in self.registry.snapshot().await {
            session.send(&line);
        }

        line
    }

    // single-target delivery, unstamped (private notices)
    pub async fn send_to(&self, nickname: &str, line: &str) {
        if let Some(session) = self.registry.get(nickname).await {
            session.send(line);
        }
    }
}
