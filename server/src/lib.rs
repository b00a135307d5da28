pub mod client_handler;
pub mod delivery;
pub mod dispatcher;
pub mod registry;
pub mod server;
pub mod server_listener;
pub mod server_types;
pub mod session;
