//! Transport-independent core of the module bus.
//!
//! The core owns three tightly coupled pieces:
//! * [`Transfer`] – the reference-counted buffer entity moving data between
//!   host and modules, with direction-dependent storage ownership.
//! * [`ChannelRegistry`] – the bounded channel-id → handler map feeding
//!   inbound dispatch.
//! * [`CompletionQueue`] – the deferred-completion worker that keeps
//!   user-supplied callbacks out of the producer's execution context.
//!
//! [`Host`] ties them to a [`transport::Transport`] backend and to the
//! control-plane session from `svc-codec`.

mod dispatch;
mod error;
mod host;
mod registry;
mod transfer;

pub use dispatch::CompletionQueue;
pub use error::{CoreError, CoreResult};
pub use host::{Host, Module};
pub use registry::{ChannelRegistry, MAX_CHANNELS};
pub use transfer::{Direction, Transfer, TransferComplete, TransferContext, TransferStatus};
