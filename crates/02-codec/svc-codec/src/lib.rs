//! Control-plane protocol between the host and the supervisory controller.
//!
//! The wire format is a fixed binary layout: a four-byte header (function id,
//! message type, little-endian payload length) followed by a payload whose
//! shape is keyed by the function id. [`wire`] holds the message model and
//! the byte-exact codec; [`session`] holds the host-side handling of decoded
//! controller traffic (handshake replies, hotplug forwarding, battery
//! bookkeeping).

mod session;
mod wire;

pub use session::{BatteryReading, ControlSender, ModuleEvents, SupervisorSession};
pub use wire::{
    BatteryState, ControlMessage, DdbOp, DecodeError, EncodeError, EpmCommand, Function,
    HandshakeType, HotplugEvent, ManagementEvent, MsgType, PowerOp, HEADER_LEN, VERSION_MAJOR,
    VERSION_MINOR,
};
