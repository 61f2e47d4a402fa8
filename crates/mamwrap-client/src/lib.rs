//! # mamwrap-client
//!
//! The HTTP side of mamwrap: layered configuration, the two-API session, and
//! `PlatformClient`, which implements the collaborator traits the job
//! drivers in `mamwrap-core` are written against.
//!
//! Calls are blocking. Every failure mode of the platform (bad status,
//! `error` key in the body, missing result key, transport error) surfaces as
//! a `MamError`.

pub mod config;
pub mod http;
pub mod response;
pub mod session;
pub mod upload;

pub use config::{ClientConfig, ConfigOverrides, LoadOptions, RegionConfig, RegionEndpoints};
pub use http::{PlatformClient, Transport};
pub use session::Session;
pub use upload::fallback_command;
