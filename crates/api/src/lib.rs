//! REST wrapper for the Jupyter Server API. Only the slice the execution
//! channel needs: enough session/kernel lifecycle to obtain the id pair that
//! opens a streaming connection.

pub mod client;
pub mod session;
pub mod types;

pub use client::{ApiError, Client, ClientBuilder};
pub use session::Sessions;
pub use types::{Kernel, KernelSpec, NewSession, Session, SessionType, Version};
