//! Byte-exact codec for controller messages.
//!
//! Every multi-byte integer is little-endian and there is no padding anywhere
//! in the layout. Each function id fixes its own payload shape; length
//! validation happens per variant so a caller always learns which constraint
//! a malformed frame violated.

use thiserror::Error;

/// Protocol version advertised in handshake messages.
pub const VERSION_MAJOR: u8 = 0x00;
/// Minor half of the advertised protocol version.
pub const VERSION_MINOR: u8 = 0x01;

/// Fixed header size: function id, message type, payload length (LE).
pub const HEADER_LEN: usize = 4;

const FN_HANDSHAKE: u8 = 0x00;
const FN_MANAGEMENT: u8 = 0x01;
const FN_HOTPLUG: u8 = 0x02;
const FN_DDB: u8 = 0x03;
const FN_POWER: u8 = 0x04;
const FN_EPM: u8 = 0x05;
const FN_SUSPEND: u8 = 0x06;

const MSG_TYPE_DATA: u8 = 0x00;
const MSG_TYPE_ERROR: u8 = 0xFF;

/// Decode failures. Both kinds are recoverable; the frame is discarded.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The function id does not name a known payload layout.
    #[error("unknown control function id {0:#04x}")]
    UnknownFunction(u8),

    /// A header or payload constraint was violated.
    #[error("malformed control payload: {0}")]
    MalformedPayload(&'static str),
}

/// Encode failure: the message cannot be represented on the wire.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The payload does not fit the header's 16-bit length field. Only
    /// variants with variable descriptor bytes can get here.
    #[error("control payload of {len} bytes exceeds the 16-bit length field")]
    PayloadTooLarge {
        /// Encoded payload size that overflowed.
        len: usize,
    },
}

/// Whether a message carries data or signals a peer-side error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    /// Ordinary payload-bearing message (`0x00`).
    Data,
    /// Error indication from the peer (`0xFF`).
    Error,
}

impl MsgType {
    fn to_wire(self) -> u8 {
        match self {
            MsgType::Data => MSG_TYPE_DATA,
            MsgType::Error => MSG_TYPE_ERROR,
        }
    }

    fn from_wire(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            MSG_TYPE_DATA => Ok(MsgType::Data),
            MSG_TYPE_ERROR => Ok(MsgType::Error),
            _ => Err(DecodeError::MalformedPayload("message type")),
        }
    }
}

/// Who is saying hello during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeType {
    /// The supervisory controller announcing itself.
    ControllerHello,
    /// The host answering.
    HostHello,
    /// A module announcing itself.
    ModuleHello,
}

impl HandshakeType {
    fn to_wire(self) -> u8 {
        match self {
            HandshakeType::ControllerHello => 0x00,
            HandshakeType::HostHello => 0x01,
            HandshakeType::ModuleHello => 0x02,
        }
    }

    fn from_wire(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0x00 => Ok(HandshakeType::ControllerHello),
            0x01 => Ok(HandshakeType::HostHello),
            0x02 => Ok(HandshakeType::ModuleHello),
            _ => Err(DecodeError::MalformedPayload("handshake type")),
        }
    }
}

/// Network-management events on the inter-module link fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagementEvent {
    /// Installs a route between two module/channel pairs.
    SetRoute {
        /// Module the route starts at.
        source_module: u8,
        /// Channel on the source module.
        source_channel: u8,
        /// Module the route ends at.
        destination_module: u8,
        /// Channel on the destination module.
        destination_channel: u8,
    },
    /// A module's link came up.
    LinkUp {
        /// Module whose link is now established.
        module_id: u8,
    },
}

/// Module attach/detach notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotplugEvent {
    /// A module was plugged in; the descriptor bytes describe it.
    Plug {
        /// Newly attached module.
        module_id: u8,
        /// Raw descriptor blob, at least one byte.
        descriptor: Vec<u8>,
    },
    /// A module was removed.
    Unplug {
        /// Detached module.
        module_id: u8,
    },
}

/// Device-descriptor-bus request/response pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdbOp {
    /// Asks a module for a descriptor block.
    Get {
        /// Module being queried.
        module_id: u8,
        /// Correlates the eventual response.
        message_id: u8,
    },
    /// Returns a descriptor block.
    Response {
        /// Module that answered.
        module_id: u8,
        /// Matches the originating `Get`.
        message_id: u8,
        /// Descriptor bytes; the wire carries their length explicitly.
        descriptor: Vec<u8>,
    },
}

/// Battery charge state reported in a power status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryState {
    /// State could not be determined.
    Unknown,
    /// Battery is charging.
    Charging,
    /// Battery is discharging.
    Discharging,
    /// Connected but not charging.
    NotCharging,
    /// Fully charged.
    Full,
}

impl BatteryState {
    fn to_wire(self) -> u8 {
        match self {
            BatteryState::Unknown => 0x00,
            BatteryState::Charging => 0x01,
            BatteryState::Discharging => 0x02,
            BatteryState::NotCharging => 0x03,
            BatteryState::Full => 0x04,
        }
    }

    fn from_wire(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0x00 => Ok(BatteryState::Unknown),
            0x01 => Ok(BatteryState::Charging),
            0x02 => Ok(BatteryState::Discharging),
            0x03 => Ok(BatteryState::NotCharging),
            0x04 => Ok(BatteryState::Full),
            _ => Err(DecodeError::MalformedPayload("battery state")),
        }
    }
}

/// Power operations exchanged with the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOp {
    /// Battery status report.
    Status {
        /// Design capacity.
        charge_full: u16,
        /// Current charge.
        charge_now: u16,
        /// Charge state.
        state: BatteryState,
    },
    /// Request for a status report (empty body).
    StatusRequest,
}

/// Electro-permanent-magnet latch commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpmCommand {
    /// Energize the latch.
    Enable,
    /// Release the latch.
    Disable,
}

impl EpmCommand {
    fn to_wire(self) -> u8 {
        match self {
            EpmCommand::Enable => 0x00,
            EpmCommand::Disable => 0x01,
        }
    }

    fn from_wire(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0x00 => Ok(EpmCommand::Enable),
            0x01 => Ok(EpmCommand::Disable),
            _ => Err(DecodeError::MalformedPayload("epm command")),
        }
    }
}

/// Payload union keyed by the header's function id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Function {
    /// Version negotiation (`0x00`).
    Handshake {
        /// Sender's major protocol version.
        version_major: u8,
        /// Sender's minor protocol version.
        version_minor: u8,
        /// Which party is saying hello.
        handshake: HandshakeType,
    },
    /// Link-fabric management (`0x01`).
    Management(ManagementEvent),
    /// Module attach/detach (`0x02`).
    Hotplug(HotplugEvent),
    /// Device descriptor bus (`0x03`).
    Ddb(DdbOp),
    /// Battery status traffic (`0x04`).
    Power {
        /// Module the status concerns.
        module_id: u8,
        /// Status report or request.
        op: PowerOp,
    },
    /// Electro-permanent magnet control (`0x05`).
    Epm {
        /// Latch command.
        command: EpmCommand,
        /// Module whose latch is addressed.
        module_id: u8,
    },
    /// Suspend control (`0x06`). Command values are reserved upstream and
    /// carried through unvalidated.
    Suspend {
        /// Reserved command byte.
        command: u8,
        /// Module being suspended.
        module_id: u8,
    },
}

impl Function {
    /// Wire function id selecting this payload layout.
    pub fn id(&self) -> u8 {
        match self {
            Function::Handshake { .. } => FN_HANDSHAKE,
            Function::Management(_) => FN_MANAGEMENT,
            Function::Hotplug(_) => FN_HOTPLUG,
            Function::Ddb(_) => FN_DDB,
            Function::Power { .. } => FN_POWER,
            Function::Epm { .. } => FN_EPM,
            Function::Suspend { .. } => FN_SUSPEND,
        }
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        match self {
            Function::Handshake {
                version_major,
                version_minor,
                handshake,
            } => {
                out.push(*version_major);
                out.push(*version_minor);
                out.push(handshake.to_wire());
            }
            Function::Management(ManagementEvent::SetRoute {
                source_module,
                source_channel,
                destination_module,
                destination_channel,
            }) => {
                out.push(0x00);
                out.push(*source_module);
                out.push(*source_channel);
                out.push(*destination_module);
                out.push(*destination_channel);
            }
            Function::Management(ManagementEvent::LinkUp { module_id }) => {
                out.push(0x01);
                out.push(*module_id);
            }
            Function::Hotplug(HotplugEvent::Plug {
                module_id,
                descriptor,
            }) => {
                out.push(0x00);
                out.push(*module_id);
                out.extend_from_slice(descriptor);
            }
            Function::Hotplug(HotplugEvent::Unplug { module_id }) => {
                out.push(0x01);
                out.push(*module_id);
            }
            Function::Ddb(DdbOp::Get {
                module_id,
                message_id,
            }) => {
                out.push(0x00);
                out.push(*module_id);
                out.push(*message_id);
            }
            Function::Ddb(DdbOp::Response {
                module_id,
                message_id,
                descriptor,
            }) => {
                out.push(0x01);
                out.push(*module_id);
                out.push(*message_id);
                // A descriptor longer than the inner length field can name
                // also overflows the outer payload length; `encode` rejects
                // the frame before this truncated value could ever ship.
                out.extend_from_slice(&(descriptor.len() as u16).to_le_bytes());
                out.extend_from_slice(descriptor);
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
                out.push(0x00);
                out.push(*module_id);
                out.extend_from_slice(&charge_full.to_le_bytes());
                out.extend_from_slice(&charge_now.to_le_bytes());
                out.push(state.to_wire());
            }
            Function::Power {
                module_id,
                op: PowerOp::StatusRequest,
            } => {
                out.push(0x01);
                out.push(*module_id);
            }
            Function::Epm { command, module_id } => {
                out.push(command.to_wire());
                out.push(*module_id);
            }
            Function::Suspend { command, module_id } => {
                out.push(*command);
                out.push(*module_id);
            }
        }
    }
}

/// One controller message: header fields plus the function-keyed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    /// Data or error indication.
    pub msg_type: MsgType,
    /// Payload variant.
    pub function: Function,
}

impl ControlMessage {
    /// Builds an ordinary data message around `function`.
    pub fn data(function: Function) -> Self {
        Self {
            msg_type: MsgType::Data,
            function,
        }
    }

    /// Serializes header and payload into a fresh frame.
    ///
    /// Fails with [`EncodeError::PayloadTooLarge`] when a descriptor pushes
    /// the payload past what the length field can declare; fixed-layout
    /// variants always fit.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::with_capacity(HEADER_LEN + 8);
        out.push(self.function.id());
        out.push(self.msg_type.to_wire());
        out.extend_from_slice(&[0, 0]);
        self.function.encode_payload(&mut out);
        let payload_len = out.len() - HEADER_LEN;
        if payload_len > u16::MAX as usize {
            return Err(EncodeError::PayloadTooLarge { len: payload_len });
        }
        out[2..4].copy_from_slice(&(payload_len as u16).to_le_bytes());
        Ok(out)
    }

    /// Parses one frame. The declared payload length must match the bytes
    /// actually present; each function id then enforces its own layout.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        if frame.len() < HEADER_LEN {
            return Err(DecodeError::MalformedPayload("header truncated"));
        }
        let function_id = frame[0];
        let msg_type = MsgType::from_wire(frame[1])?;
        let declared = u16::from_le_bytes([frame[2], frame[3]]) as usize;
        let payload = &frame[HEADER_LEN..];
        if declared != payload.len() {
            return Err(DecodeError::MalformedPayload("payload length mismatch"));
        }

        let function = match function_id {
            FN_HANDSHAKE => decode_handshake(payload)?,
            FN_MANAGEMENT => decode_management(payload)?,
            FN_HOTPLUG => decode_hotplug(payload)?,
            FN_DDB => decode_ddb(payload)?,
            FN_POWER => decode_power(payload)?,
            FN_EPM => decode_epm(payload)?,
            FN_SUSPEND => decode_suspend(payload)?,
            other => return Err(DecodeError::UnknownFunction(other)),
        };

        Ok(Self { msg_type, function })
    }
}

fn decode_handshake(payload: &[u8]) -> Result<Function, DecodeError> {
    if payload.len() != 3 {
        return Err(DecodeError::MalformedPayload("handshake length"));
    }
    Ok(Function::Handshake {
        version_major: payload[0],
        version_minor: payload[1],
        handshake: HandshakeType::from_wire(payload[2])?,
    })
}

fn decode_management(payload: &[u8]) -> Result<Function, DecodeError> {
    let (&event, rest) = payload
        .split_first()
        .ok_or(DecodeError::MalformedPayload("management length"))?;
    let event = match event {
        0x00 => {
            if rest.len() != 4 {
                return Err(DecodeError::MalformedPayload("set-route length"));
            }
            ManagementEvent::SetRoute {
                source_module: rest[0],
                source_channel: rest[1],
                destination_module: rest[2],
                destination_channel: rest[3],
            }
        }
        0x01 => {
            if rest.len() != 1 {
                return Err(DecodeError::MalformedPayload("link-up length"));
            }
            ManagementEvent::LinkUp { module_id: rest[0] }
        }
        _ => return Err(DecodeError::MalformedPayload("management event")),
    };
    Ok(Function::Management(event))
}

fn decode_hotplug(payload: &[u8]) -> Result<Function, DecodeError> {
    if payload.len() < 2 {
        return Err(DecodeError::MalformedPayload("hotplug length"));
    }
    let module_id = payload[1];
    let event = match payload[0] {
        0x00 => {
            // A plug event always carries descriptor bytes after the module id.
            if payload.len() < 3 {
                return Err(DecodeError::MalformedPayload("hotplug descriptor missing"));
            }
            HotplugEvent::Plug {
                module_id,
                descriptor: payload[2..].to_vec(),
            }
        }
        0x01 => {
            if payload.len() != 2 {
                return Err(DecodeError::MalformedPayload("unplug length"));
            }
            HotplugEvent::Unplug { module_id }
        }
        _ => return Err(DecodeError::MalformedPayload("hotplug event")),
    };
    Ok(Function::Hotplug(event))
}

fn decode_ddb(payload: &[u8]) -> Result<Function, DecodeError> {
    let (&op, rest) = payload
        .split_first()
        .ok_or(DecodeError::MalformedPayload("ddb length"))?;
    let op = match op {
        0x00 => {
            if rest.len() != 2 {
                return Err(DecodeError::MalformedPayload("ddb get length"));
            }
            DdbOp::Get {
                module_id: rest[0],
                message_id: rest[1],
            }
        }
        0x01 => {
            if rest.len() < 4 {
                return Err(DecodeError::MalformedPayload("ddb response length"));
            }
            let descriptor_length = u16::from_le_bytes([rest[2], rest[3]]) as usize;
            let descriptor = &rest[4..];
            if descriptor.len() != descriptor_length {
                return Err(DecodeError::MalformedPayload("ddb descriptor length"));
            }
            DdbOp::Response {
                module_id: rest[0],
                message_id: rest[1],
                descriptor: descriptor.to_vec(),
            }
        }
        _ => return Err(DecodeError::MalformedPayload("ddb op")),
    };
    Ok(Function::Ddb(op))
}

fn decode_power(payload: &[u8]) -> Result<Function, DecodeError> {
    if payload.len() < 2 {
        return Err(DecodeError::MalformedPayload("power length"));
    }
    let module_id = payload[1];
    let op = match payload[0] {
        0x00 => {
            if payload.len() != 7 {
                return Err(DecodeError::MalformedPayload("power status length"));
            }
            PowerOp::Status {
                charge_full: u16::from_le_bytes([payload[2], payload[3]]),
                charge_now: u16::from_le_bytes([payload[4], payload[5]]),
                state: BatteryState::from_wire(payload[6])?,
            }
        }
        0x01 => {
            if payload.len() != 2 {
                return Err(DecodeError::MalformedPayload("power request length"));
            }
            PowerOp::StatusRequest
        }
        _ => return Err(DecodeError::MalformedPayload("power op")),
    };
    Ok(Function::Power { module_id, op })
}

fn decode_epm(payload: &[u8]) -> Result<Function, DecodeError> {
    if payload.len() != 2 {
        return Err(DecodeError::MalformedPayload("epm length"));
    }
    Ok(Function::Epm {
        command: EpmCommand::from_wire(payload[0])?,
        module_id: payload[1],
    })
}

fn decode_suspend(payload: &[u8]) -> Result<Function, DecodeError> {
    if payload.len() != 2 {
        return Err(DecodeError::MalformedPayload("suspend length"));
    }
    Ok(Function::Suspend {
        command: payload[0],
        module_id: payload[1],
    })
}
