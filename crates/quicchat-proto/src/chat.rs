//! Chat-line conventions carried inside CONTENT payloads.
//!
//! The protocol has no identity field. A client names itself by prefixing
//! every line with `"<username>: "`, and the server learns the name from the
//! first such line it sees on a stream. Payloads without the separator are
//! relayed untouched and leave the stream's identity alone.

/// Separator between username and text.
pub const SEPARATOR: &str = ": ";

/// Control text asking the server for the active user list.
pub const LIST_COMMAND: &str = "/list";

/// Greeting the server writes to every newly accepted stream.
pub const WELCOME: &str =
    "Welcome to quicchat! Everyone here is asked to keep the conversation respectful.";

/// Build a chat line: `"<username>: <text>"`.
pub fn compose(username: &str, text: &str) -> String {
    format!("{username}{SEPARATOR}{text}")
}

/// Split a chat line on the first separator.
///
/// Returns `None` if the payload has no separator. The username may be empty
/// (`": hi"`), and the text may itself contain further separators.
pub fn split(payload: &str) -> Option<(&str, &str)> {
    payload.split_once(SEPARATOR)
}

/// `"<username> joined the chat"`
pub fn join_notice(username: &str) -> String {
    format!("{username} joined the chat")
}

/// `"<username> left the chat"`
pub fn leave_notice(username: &str) -> String {
    format!("{username} left the chat")
}

/// Reply to [`LIST_COMMAND`]: `"Active users: alice, bob"`.
pub fn active_users_reply<S: AsRef<str>>(users: &[S]) -> String {
    let names: Vec<&str> = users.iter().map(AsRef::as_ref).collect();
    format!("Active users: {}", names.join(", "))
}
