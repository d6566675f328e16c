/// Backend-allocated byte region backing one outbound transfer.
///
/// Storage is created by [`Transport::alloc_storage`] and must be returned to
/// the same backend through [`Transport::free_storage`] when the owning
/// transfer is destroyed; the core never frees it any other way. The cookie
/// lets a backend find whatever bookkeeping it attached to the region
/// (a DMA mapping, a slot index, a pool entry).
///
/// [`Transport::alloc_storage`]: crate::Transport::alloc_storage
/// [`Transport::free_storage`]: crate::Transport::free_storage
#[derive(Debug)]
pub struct TransferStorage {
    bytes: Box<[u8]>,
    cookie: u64,
}

impl TransferStorage {
    /// Wraps a freshly allocated region together with its backend cookie.
    pub fn new(bytes: Box<[u8]>, cookie: u64) -> Self {
        Self { bytes, cookie }
    }

    /// Declared capacity of the region in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the region holds zero bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read view of the region.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Write view of the region.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Backend bookkeeping cookie recorded at allocation time.
    pub fn cookie(&self) -> u64 {
        self.cookie
    }
}
