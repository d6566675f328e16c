//! Control-plane flows between host and supervisory controller, driven
//! through the loopback wire so every assertion sees real frames.

use std::sync::Arc;

use anyhow::Context;
use bus_core::Host;
use parking_lot::Mutex;
use svc_codec::{
    BatteryReading, BatteryState, ControlMessage, Function, HandshakeType, HotplugEvent,
    ModuleEvents, PowerOp, VERSION_MAJOR, VERSION_MINOR,
};
use transport_loopback::LoopbackTransport;

use crate::support::rig;

#[derive(Default)]
struct RecordedModules {
    added: Mutex<Vec<(u8, Vec<u8>)>>,
    removed: Mutex<Vec<u8>>,
}

impl ModuleEvents for RecordedModules {
    fn module_added(&self, module_id: u8, descriptor: &[u8]) {
        self.added.lock().push((module_id, descriptor.to_vec()));
    }

    fn module_removed(&self, module_id: u8) {
        self.removed.lock().push(module_id);
    }
}

fn listening_rig() -> (Arc<LoopbackTransport>, Arc<Host>, Arc<RecordedModules>) {
    let transport = LoopbackTransport::new();
    let modules = Arc::new(RecordedModules::default());
    let host = Host::with_module_events(transport.clone(), modules.clone()).expect("start host");
    transport.bind(host.clone());
    (transport, host, modules)
}

#[test]
fn controller_hello_is_answered_with_the_exact_host_hello_frame() {
    let (transport, _host) = rig();

    let hello = ControlMessage::data(Function::Handshake {
        version_major: VERSION_MAJOR,
        version_minor: VERSION_MINOR,
        handshake: HandshakeType::ControllerHello,
    });
    transport.deliver_control(&hello.encode().expect("encode"));

    let sent = transport.sent_control_frames();
    assert_eq!(sent.len(), 1);
    // function 0x00, data type, 3-byte payload: version 0.1, host hello.
    assert_eq!(sent[0], vec![0x00, 0x00, 0x03, 0x00, 0x00, 0x01, 0x01]);
}

#[test]
fn hotplug_frames_drive_the_module_lifecycle_listener() {
    let (transport, _host, modules) = listening_rig();

    let plug = ControlMessage::data(Function::Hotplug(HotplugEvent::Plug {
        module_id: 3,
        descriptor: vec![0xDE, 0xAD, 0xBE],
    }));
    let unplug = ControlMessage::data(Function::Hotplug(HotplugEvent::Unplug { module_id: 3 }));
    transport.deliver_control(&plug.encode().expect("encode"));
    transport.deliver_control(&unplug.encode().expect("encode"));

    assert_eq!(
        modules.added.lock().as_slice(),
        &[(3, vec![0xDE, 0xAD, 0xBE])]
    );
    assert_eq!(modules.removed.lock().as_slice(), &[3]);
}

#[test]
fn battery_reports_are_queryable_through_the_host() {
    let (transport, host) = rig();

    let report = ControlMessage::data(Function::Power {
        module_id: 7,
        op: PowerOp::Status {
            charge_full: 1000,
            charge_now: 640,
            state: BatteryState::Charging,
        },
    });
    transport.deliver_control(&report.encode().expect("encode"));

    assert_eq!(
        host.battery_status(7),
        Some(BatteryReading {
            charge_full: 1000,
            charge_now: 640,
            state: BatteryState::Charging,
        })
    );
    assert_eq!(host.battery_status(8), None);
}

#[test]
fn host_sends_a_battery_status_request_on_the_wire() -> anyhow::Result<()> {
    let (transport, host) = rig();

    host.send_control(&ControlMessage::data(Function::Power {
        module_id: 5,
        op: PowerOp::StatusRequest,
    }))
    .context("send request")?;

    let sent = transport.sent_control_frames();
    assert_eq!(sent.len(), 1);
    // function 0x04, data type, 2-byte payload: request op, module 5.
    assert_eq!(sent[0], vec![0x04, 0x00, 0x02, 0x00, 0x01, 0x05]);
    Ok(())
}

#[test]
fn malformed_frames_do_not_poison_the_session() {
    let (transport, _host) = rig();

    transport.deliver_control(&[0x00, 0x00]);
    transport.deliver_control(&[0x99, 0x00, 0x00, 0x00]);
    assert!(transport.sent_control_frames().is_empty());

    let hello = ControlMessage::data(Function::Handshake {
        version_major: VERSION_MAJOR,
        version_minor: VERSION_MINOR,
        handshake: HandshakeType::ControllerHello,
    });
    transport.deliver_control(&hello.encode().expect("encode"));
    assert_eq!(transport.sent_control_frames().len(), 1);
}
