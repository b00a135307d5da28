use tokio::sync::{broadcast, mpsc};

// server type definitions

// chat traffic queued by sessions and the acceptor, drained by the dispatcher
#[derive(Debug)]
pub enum Event {
    Joined(String),
    Chat(String, String), // (nickname, text)
}

pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;

// async notifications the presentation layer subscribes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Log(String),
    UserJoined(String),
    UserLeft(String),
    ChatLine(String),
}

pub type Notifier = broadcast::Sender<Notification>;
