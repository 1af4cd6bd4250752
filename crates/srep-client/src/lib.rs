//! srep-client: Rust client library for the srep API.
//!
//! Provides the play lifecycle and scenario catalog calls, the shell socket
//! transport, the three-task shell relay, and a fixed-delay retry wrapper
//! for waiting out plays that are still starting.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use srep_client::{retry, Client, ClientOptions, GetShellRequest, RetryPolicy, ShellOptions};
//! use srep_core::{CallContext, Dimensions};
//!
//! # async fn example() -> srep_core::SrepResult<()> {
//! let client = Client::new(ClientOptions {
//!     token: "secret".into(),
//!     ..Default::default()
//! })?;
//! let ctx = CallContext::new();
//! let req = GetShellRequest {
//!     id: "7c1a3f0e-1d2b-4c5d-8e9f-0a1b2c3d4e5f".into(),
//!     rows: 24,
//!     cols: 80,
//! };
//!
//! let policy = RetryPolicy::new(10, Duration::from_secs(3))?;
//! let channel = retry(policy, &ctx, |ctx| {
//!     let (client, req) = (&client, &req);
//!     async move { client.connect_shell(&ctx, req).await }
//! })
//! .await?;
//! let size = || Ok(Dimensions::new(24, 80));
//! let outcome = srep_client::relay::run(
//!     channel,
//!     tokio::io::stdin(),
//!     tokio::io::stdout(),
//!     size,
//!     &ShellOptions::default(),
//!     &ctx,
//! )
//! .await?;
//! println!("{:?}", outcome.exit);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod plays;
pub mod relay;
pub mod retry;
pub mod scenarios;
pub mod transport;

// Re-export primary public types.
pub use client::{Client, ClientOptions};
pub use plays::*;
pub use relay::{InputEnd, ShellExit, ShellOptions, ShellOutcome, TerminalSize};
pub use retry::{retry, Retry, RetryPolicy};
pub use scenarios::*;
pub use transport::{MessageChannel, ShellTarget};

// Re-export srep-core error types for convenience.
pub use srep_core::{SrepError, SrepResult};
