//! Parley terminal client.
//!
//! A line-oriented frontend for the [`parley_app::Runtime`]: commands and
//! messages are read from stdin, the conversation is printed to stdout and
//! logs go to stderr.
//!
//! # Components
//!
//! - [`StdioDriver`]: [`parley_app::Driver`] over stdin, stdout, WebSocket and
//!   HTTP
//! - [`Printer`]: Incremental rendering of [`parley_app::ChatView`]
//! - [`SystemEnv`]: Wall clock and OS randomness
//! - [`session`]: Local session store

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod printer;
pub mod session;
mod stdio;
mod system_env;

pub use printer::Printer;
pub use session::SessionError;
pub use stdio::{DriverError, StdioDriver};
pub use system_env::SystemEnv;
