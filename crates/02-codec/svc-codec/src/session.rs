//! Host-side handling of inbound controller traffic.
//!
//! The host only ever receives a subset of the control protocol: the
//! controller's hello, hotplug notifications, and battery status reports.
//! Everything else arriving here is a peer bug, logged and dropped without
//! affecting the session.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::wire::{
    BatteryState, ControlMessage, DecodeError, Function, HandshakeType, HotplugEvent, MsgType,
    PowerOp, VERSION_MAJOR, VERSION_MINOR,
};

/// Sink for encoded frames the session wants to transmit.
///
/// The host wires this to `Transport::submit_control`; a failed send is the
/// implementation's problem to report, matching the fire-and-forget send of
/// the control plane.
pub trait ControlSender: Send + Sync {
    /// Transmits one encoded control frame to the controller.
    fn send_control(&self, frame: Vec<u8>);
}

/// Listener for module attach/detach events extracted from hotplug messages.
pub trait ModuleEvents: Send + Sync {
    /// A module appeared; `descriptor` is its raw descriptor blob.
    fn module_added(&self, module_id: u8, descriptor: &[u8]);

    /// A module went away.
    fn module_removed(&self, module_id: u8);
}

/// Latest battery status recorded for one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryReading {
    /// Design capacity.
    pub charge_full: u16,
    /// Current charge.
    pub charge_now: u16,
    /// Charge state.
    pub state: BatteryState,
}

/// Decodes and reacts to controller messages on behalf of the host.
pub struct SupervisorSession {
    sender: std::sync::Arc<dyn ControlSender>,
    modules: std::sync::Arc<dyn ModuleEvents>,
    battery: Mutex<HashMap<u8, BatteryReading>>,
}

impl SupervisorSession {
    /// Creates a session that replies through `sender` and reports module
    /// lifecycle through `modules`.
    pub fn new(
        sender: std::sync::Arc<dyn ControlSender>,
        modules: std::sync::Arc<dyn ModuleEvents>,
    ) -> Self {
        Self {
            sender,
            modules,
            battery: Mutex::new(HashMap::new()),
        }
    }

    /// Decodes one raw frame and handles it. Decode failures are logged and
    /// the frame is discarded; nothing here is fatal.
    pub fn ingest(&self, frame: &[u8]) {
        match ControlMessage::decode(frame) {
            Ok(msg) => self.handle(&msg),
            Err(DecodeError::UnknownFunction(id)) => {
                log::error!("controller sent unknown function id {id:#04x}");
            }
            Err(DecodeError::MalformedPayload(what)) => {
                log::error!("discarding malformed control frame: {what}");
            }
        }
    }

    /// Reacts to one decoded message.
    pub fn handle(&self, msg: &ControlMessage) {
        if msg.msg_type == MsgType::Error {
            log::error!(
                "controller reported an error for function {:#04x}",
                msg.function.id()
            );
            return;
        }

        match &msg.function {
            Function::Handshake {
                version_major,
                version_minor,
                handshake,
            } => self.handshake(*version_major, *version_minor, *handshake),
            Function::Hotplug(HotplugEvent::Plug {
                module_id,
                descriptor,
            }) => {
                log::debug!("module {module_id} added");
                self.modules.module_added(*module_id, descriptor);
            }
            Function::Hotplug(HotplugEvent::Unplug { module_id }) => {
                log::debug!("module {module_id} removed");
                self.modules.module_removed(*module_id);
            }
            Function::Power {
                module_id,
                op:
                    PowerOp::Status {
                        charge_full,
                        charge_now,
                        state,
                    },
            } => {
                log::debug!("battery status for module {module_id}: {state:?}");
                self.battery.lock().insert(
                    *module_id,
                    BatteryReading {
                        charge_full: *charge_full,
                        charge_now: *charge_now,
                        state: *state,
                    },
                );
            }
            Function::Power {
                module_id,
                op: PowerOp::StatusRequest,
            } => {
                // Status requests flow host -> controller, never back.
                log::error!("controller asked the host for battery status of module {module_id}");
            }
            Function::Management(_)
            | Function::Ddb(_)
            | Function::Epm { .. }
            | Function::Suspend { .. } => {
                log::error!(
                    "host received controller-bound function {:#04x}",
                    msg.function.id()
                );
            }
        }
    }

    /// Latest battery reading recorded for `module_id`, if any arrived.
    pub fn battery_status(&self, module_id: u8) -> Option<BatteryReading> {
        self.battery.lock().get(&module_id).copied()
    }

    fn handshake(&self, version_major: u8, version_minor: u8, handshake: HandshakeType) {
        if version_major != VERSION_MAJOR || version_minor != VERSION_MINOR {
            log::debug!("ignoring handshake with version {version_major}.{version_minor}");
            return;
        }
        if handshake != HandshakeType::ControllerHello {
            log::debug!("ignoring handshake of type {handshake:?}");
            return;
        }

        let reply = ControlMessage::data(Function::Handshake {
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            handshake: HandshakeType::HostHello,
        });
        match reply.encode() {
            Ok(frame) => self.sender.send_control(frame),
            Err(err) => log::error!("handshake reply did not encode: {err}"),
        }
    }
}
