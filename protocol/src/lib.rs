//! Line protocol shared by the relay server and its clients:
//! handshake replies, nickname screening and chat line formatting.
//!
//! The wire is newline-delimited UTF-8 text with no framing beyond that;
//! everything here is a pure function over strings.

use chrono::Local;

pub const HANDSHAKE_OK: &str = "OK";
pub const HANDSHAKE_INVALID: &str = "INVALID";

// nickname reserved for the operator, matched case-insensitively
pub const ADMIN_NAME: &str = "Admin";

// sent directly to a kicked client, never broadcast, so no time prefix
pub const KICKED_PRIVATE_NOTICE: &str = "Admin: you have been removed from the chat room";

pub const SHUTDOWN_NOTICE: &str = "Admin：【server is shutting down】";

const TIME_FORMAT: &str = "[%H:%M:%S]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameError {
    Empty,
    Reserved,
}

/// Validate a proposed nickname, returning the trimmed form.
/// Uniqueness is the registry's concern, not ours.
pub fn screen_name(raw: &str) -> Result<&str, NameError> {
    let name = raw.trim();

    if name.is_empty() {
        return Err(NameError::Empty);
    }

    if name.eq_ignore_ascii_case(ADMIN_NAME) {
        return Err(NameError::Reserved);
    }

    Ok(name)
}

// Wall-clock prefix applied to every broadcast line
pub fn with_timestamp(payload: &str) -> String {
    format!("{}{}", Local::now().format(TIME_FORMAT), payload)
}

pub fn chat_line(nickname: &str, text: &str) -> String {
    format!("{}：{}", nickname, text)
}

pub fn admin_line(text: &str) -> String {
    format!("{}：{}", ADMIN_NAME, text)
}

pub fn join_notice(nickname: &str) -> String {
    format!("{}：【entered the chat room】", nickname)
}

pub fn leave_notice(nickname: &str) -> String {
    format!("{}：【left the chat room】", nickname)
}

pub fn kick_notice(nickname: &str) -> String {
    format!("{}：【removed for violation】", nickname)
}
