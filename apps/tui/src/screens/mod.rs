//! TUI screen definitions.
//!
//! The app is a single page; each screen encapsulates its own state and
//! rendering logic.

mod chat;

pub(crate) use chat::{Action, ChatScreen};
