//! # mamwrap-core
//!
//! Job drivers for the application wrapping workflow.
//!
//! This crate provides:
//! - The collaborator traits the drivers depend on (`traits`)
//! - The cooperative poll primitive: `PollPolicy`, `CancelToken`, `Poller`
//! - `WrapJobDriver`, which reconciles policies, submits a wrap and polls it
//! - `SigningJobDriver`, which submits signing and polls it
//! - `Publisher`, which creates, uploads and publishes a new binary
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mamwrap_core::{WrapJobDriver, SigningJobDriver, SigningMode};
//!
//! let report = WrapJobDriver::new(catalog, client.clone(), client.clone(), client.clone())
//!     .run(&app_psk, &selection)?;
//! ```

pub mod poll;
pub mod publish;
pub mod sign;
pub mod traits;
pub mod wrap;

pub use poll::{CancelToken, PollPolicy, Poller, ThreadSleeper};
pub use publish::Publisher;
pub use sign::{SigningJobDriver, SigningMode};
pub use wrap::{WrapJobDriver, WrapReport};
