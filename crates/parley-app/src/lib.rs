//! Application layer for Parley
//!
//! Generic runtime that wires the Sans-IO [`parley_client::Client`] to a
//! platform driver, enabling deterministic simulation testing with the same
//! code that runs in production.
//!
//! # Components
//!
//! - [`Driver`]: Trait for platform-specific I/O abstraction
//! - [`Runtime`]: Generic orchestration loop using Driver
//! - [`ChatView`]: Read-only snapshot handed to renderers
//! - [`parse_line`]: Line-oriented command parsing

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod driver;
mod event;
mod input;
mod runtime;
mod view;

pub use driver::Driver;
pub use event::{AppEvent, UserIntent};
pub use input::{HELP, InputError, parse_line};
pub use runtime::Runtime;
pub use view::ChatView;
