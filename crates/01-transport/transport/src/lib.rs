//! Transport contract shared by the bus core and link-layer backends.
//!
//! This crate defines the foundational pieces every backend must provide:
//! * [`Transport`] – storage allocation and submission entry points the core calls down into.
//! * [`TransportEvents`] – completion/inbound entry points a backend calls back up into.
//! * [`TransferStorage`] – backend-allocated byte region handed to an outbound transfer.
//! * [`TransportError`] – lightweight error surface for allocation/submission failures.

mod contract;
mod error;
mod storage;

pub use contract::{
    ChannelId, ModuleId, SubmitRequest, Transport, TransportEvents, TransferOutcome, TransferTag,
};
pub use error::{TransportError, TransportResult};
pub use storage::TransferStorage;
