//! srep-core: shared protocol library for the srep shell client.
//!
//! Provides the shell socket message types, JSON codec, play and scenario
//! records, the error taxonomy, and the caller-scoped cancellation context.

pub mod codec;
pub mod context;
pub mod error;
pub mod messages;
pub mod plays;
pub mod scenarios;

// Re-export commonly used items at crate root.
pub use codec::{decode, encode, Utf8Decoder};
pub use context::{CallContext, Interrupted};
pub use error::{SrepError, SrepResult};
pub use messages::{Dimensions, MessageType, TerminalMessage};
pub use plays::{Play, PlayStatus};
pub use scenarios::{Metadata, Scenario};
