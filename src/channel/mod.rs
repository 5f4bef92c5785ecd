//! The three access disciplines over one physical-port abstraction.
//!
//! - [`GenericChannel`]: bounded on-demand read/write over a long-lived
//!   connection (known response sizes).
//! - [`ListenerChannel`]: continuous background drain of a line so bursts
//!   between polls are not lost.
//! - [`TransactionChannel`]: one-shot write-then-read exchanges over a fresh
//!   connection per call.

mod generic;
mod listener;
mod transaction;

pub use generic::GenericChannel;
pub use listener::{ListenerChannel, POLL_READ_TIMEOUT, START_GRACE_PERIOD};
pub use transaction::TransactionChannel;
