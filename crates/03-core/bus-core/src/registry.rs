//! Bounded channel-id → handler map feeding inbound dispatch.
//!
//! The registry is read on every inbound delivery and written only by
//! explicit register/deregister calls, so it sits behind a reader-writer
//! lock. Concurrent registration and dispatch is an expected scenario, not a
//! theoretical one.

use parking_lot::RwLock;
use transport::{ChannelId, ModuleId};

use crate::error::{CoreError, CoreResult};
use crate::transfer::{TransferComplete, TransferContext};

/// Size of the channel id space. Registration outside it fails.
pub const MAX_CHANNELS: usize = 1024;

#[derive(Clone)]
pub(crate) struct RegistryEntry {
    pub(crate) handler: TransferComplete,
    pub(crate) module: ModuleId,
    pub(crate) context: Option<TransferContext>,
}

/// Per-host registration table. At most one handler per channel.
pub struct ChannelRegistry {
    slots: RwLock<Box<[Option<RegistryEntry>]>>,
}

impl ChannelRegistry {
    pub(crate) fn new() -> Self {
        Self {
            slots: RwLock::new(vec![None; MAX_CHANNELS].into_boxed_slice()),
        }
    }

    /// Installs `handler` for `channel`.
    pub fn register(
        &self,
        channel: ChannelId,
        handler: TransferComplete,
        module: ModuleId,
        context: Option<TransferContext>,
    ) -> CoreResult<()> {
        let index = Self::index(channel)?;
        let mut slots = self.slots.write();
        if slots[index].is_some() {
            return Err(CoreError::AlreadyRegistered(channel));
        }
        slots[index] = Some(RegistryEntry {
            handler,
            module,
            context,
        });
        Ok(())
    }

    /// Removes the registration for `channel`. Removing an unregistered
    /// channel is a no-op.
    pub fn deregister(&self, channel: ChannelId) {
        if let Ok(index) = Self::index(channel) {
            self.slots.write()[index] = None;
        }
    }

    /// True when a handler is installed for `channel`.
    pub fn is_registered(&self, channel: ChannelId) -> bool {
        Self::index(channel)
            .map(|index| self.slots.read()[index].is_some())
            .unwrap_or(false)
    }

    /// Looks the handler up for an inbound delivery.
    pub(crate) fn resolve(&self, channel: ChannelId) -> CoreResult<RegistryEntry> {
        let index = Self::index(channel)?;
        self.slots.read()[index]
            .clone()
            .ok_or(CoreError::UnhandledChannel(channel))
    }

    fn index(channel: ChannelId) -> CoreResult<usize> {
        let index = channel as usize;
        if index < MAX_CHANNELS {
            Ok(index)
        } else {
            Err(CoreError::InvalidChannel(channel))
        }
    }
}
