//! # Switch Service
//!
//! The connection manager of the seed. It owns the session table, runs the
//! dial loop, the session tasks, the session-event loop and periodic
//! address book persistence, and tears all of it down on shutdown.
//!
//! ## Tasks
//!
//! ```text
//! listener loop ──accept──→ handshake ──→ session task ─┐
//! dial loop ─────dial────→ handshake ──→ session task ─┤ SessionEvent
//!                                                       ↓
//!                                   event loop (churn, logging)
//! save loop ──→ SharedAddressBook::save
//! ```
//!
//! Lock order: address book, then session table, then back-off table.
//! No lock is held across an await point.

mod address_book;
mod api;
mod config;
mod core;
mod events;
mod maintenance;
mod session;

pub use self::address_book::SharedAddressBook;
pub use self::config::SwitchConfig;
pub use self::core::Switch;
pub use self::events::{DisconnectReason, SessionCommand, SessionEvent, SessionHandle};

#[cfg(test)]
mod tests;
