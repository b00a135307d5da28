use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use relay_protocol::screen_name;

use crate::session::Session;

// Live clients keyed by nickname, shared across the acceptor, the
// dispatcher and the admin surface. The single place uniqueness and the
// reserved-name invariant are enforced.
#[derive(Clone)]
pub struct Registry {
    clients: Arc<Mutex<HashMap<String, Session>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // Follows HashSet insert semantics: true means the nickname was free
    // and the session is now registered. Callers screen the name before
    // building a session; the re-check here keeps the invariant local.
    pub async fn insert(&self, session: Session) -> bool {
        if screen_name(session.nickname()).is_err() {
            return false;
        }

        let mut mg = self.clients.lock().await;
        if mg.contains_key(session.nickname()) {
            return false;
        }

        mg.insert(session.nickname().to_owned(), session);
        true
    }

    pub async fn get(&self, nickname: &str) -> Option<Session> {
        self.clients.lock().await.get(nickname).cloned()
    }

    pub async fn remove(&self, nickname: &str) -> Option<Session> {
        self.clients.lock().await.remove(nickname)
    }

    // Cloned handles, so sends never happen under the registry lock
    pub async fn snapshot(&self) -> Vec<Session> {
        self.clients.lock().await.values().cloned().collect()
    }

    pub async fn nicknames(&self) -> Vec<String> {
        self.clients.lock().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    /// Remove and return every session whose read loop has terminated.
    pub async fn reap_dead(&self) -> Vec<Session> {
        let mut mg = self.clients.lock().await;

        let dead: Vec<String> = mg
            .iter()
            .filter(|(_, session)| !session.is_live())
            .map(|(nickname, _)| nickname.clone())
            .collect();

        dead.into_iter().filter_map(|nickname| mg.remove(&nickname)).collect()
    }

    /// Empty the registry, handing back the sessions for shutdown.
    pub async fn drain(&self) -> Vec<Session> {
        self.clients.lock().await.drain().map(|(_, session)| session).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::{TcpListener, TcpStream};

    async fn test_session(nickname: &str) -> (Session, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = TcpStream::connect(addr).await.unwrap();
        let (accepted, _) = listener.accept().await.unwrap();
        let (_tcp_read, tcp_write) = accepted.into_split();

        (Session::new(nickname.to_owned(), tcp_write), peer)
    }

    #[tokio::test]
    async fn nicknames_are_unique() {
        let registry = Registry::new();
        let (first, _p1) = test_session("anna").await;
        let (second, _p2) = test_session("anna").await;

        assert!(registry.insert(first).await);
        assert!(!registry.insert(second).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn reserved_name_is_never_a_key() {
        let registry = Registry::new();
        let (session, _peer) = test_session("admin").await;

        assert!(!registry.insert(session).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn remove_is_single_shot() {
        let registry = Registry::new();
        let (session, _peer) = test_session("anna").await;
        registry.insert(session).await;

        assert!(registry.remove("anna").await.is_some());
        assert!(registry.remove("anna").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn reap_takes_only_dead_sessions() {
        let registry = Registry::new();
        let (anna, _p1) = test_session("anna").await;
        let (bert, _p2) = test_session("bert").await;
        registry.insert(anna).await;
        registry.insert(bert.clone()).await;

        bert.close();

        let reaped = registry.reap_dead().await;
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].nickname(), "bert");
        assert_eq!(registry.nicknames().await, vec!["anna".to_owned()]);
    }

    #[tokio::test]
    async fn drain_empties_the_registry() {
        let registry = Registry::new();
        let (anna, _p1) = test_session("anna").await;
        let (bert, _p2) = test_session("bert").await;
        registry.insert(anna).await;
        registry.insert(bert).await;

        assert_eq!(registry.drain().await.len(), 2);
        assert!(registry.is_empty().await);
    }
}
