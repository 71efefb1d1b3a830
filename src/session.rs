//! Session identity and the shared view workers use to reach a session
//!
//! Workers never own a session. They carry a [`SessionKey`] and resolve it
//! through the [`SessionDirectory`] when a report is decoded. Keys are never
//! reused, so a report queued for a detached session resolves to nothing.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use xpad360_protocol::GamepadEvent;

use crate::uinput::{DeviceDescriptor, VirtualInput, VirtualInputError};

/// Stable handle of one controller session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey(u64);

impl SessionKey {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session #{}", self.0)
    }
}

/// Allocator of never-reused session keys
#[derive(Debug, Default)]
pub struct KeyAllocator {
    next: AtomicU64,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> SessionKey {
        SessionKey(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

struct PortState<H> {
    handle: Option<H>,
    created: bool,
}

/// A session's virtual input device
///
/// Every operation runs under one lock, so destroying the device waits for
/// an emission in progress, and nothing is emitted once it is destroyed.
pub struct VirtualPort<V: VirtualInput> {
    backend: Arc<V>,
    state: Mutex<PortState<V::Handle>>,
}

impl<V: VirtualInput> VirtualPort<V> {
    /// Wrap an open virtual device handle
    pub fn new(backend: Arc<V>, handle: V::Handle) -> Self {
        Self {
            backend,
            state: Mutex::new(PortState {
                handle: Some(handle),
                created: false,
            }),
        }
    }

    pub(crate) fn register(
        &self,
        capability: crate::uinput::Capability,
    ) -> Result<(), VirtualInputError> {
        let mut state = self.state.lock();
        let handle = state.handle.as_mut().ok_or(VirtualInputError::NotOpen)?;
        self.backend.register(handle, capability)
    }

    pub(crate) fn create(&self, descriptor: &DeviceDescriptor) -> Result<(), VirtualInputError> {
        let mut state = self.state.lock();
        let handle = state.handle.as_mut().ok_or(VirtualInputError::NotOpen)?;
        self.backend.create(handle, descriptor)?;
        state.created = true;
        Ok(())
    }

    /// Emit one report's events if the device is live
    pub fn emit<I>(&self, events: I) -> Result<(), VirtualInputError>
    where
        I: IntoIterator<Item = GamepadEvent>,
    {
        let mut state = self.state.lock();
        if !state.created {
            return Err(VirtualInputError::NotCreated);
        }
        let handle = state.handle.as_mut().ok_or(VirtualInputError::NotOpen)?;
        self.backend.emit(handle, events)
    }

    /// Whether the device is created and not yet destroyed
    pub fn is_live(&self) -> bool {
        self.state.lock().created
    }

    /// Destroy the device if it was created
    pub(crate) fn destroy(&self) -> Option<Result<(), VirtualInputError>> {
        let mut state = self.state.lock();
        if !state.created {
            return None;
        }
        state.created = false;
        let handle = state.handle.as_mut()?;
        Some(self.backend.destroy(handle))
    }

    /// Close the handle if still open
    pub(crate) fn close(&self) -> bool {
        let handle = self.state.lock().handle.take();
        match handle {
            Some(handle) => {
                self.backend.close(handle);
                true
            }
            None => false,
        }
    }
}

/// Sessions reachable from worker threads
pub struct SessionDirectory<V: VirtualInput> {
    ports: RwLock<HashMap<SessionKey, Arc<VirtualPort<V>>>>,
}

impl<V: VirtualInput> Default for SessionDirectory<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: VirtualInput> SessionDirectory<V> {
    pub fn new() -> Self {
        Self {
            ports: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, key: SessionKey, port: Arc<VirtualPort<V>>) {
        self.ports.write().insert(key, port);
    }

    pub fn remove(&self, key: SessionKey) -> Option<Arc<VirtualPort<V>>> {
        self.ports.write().remove(&key)
    }

    pub fn get(&self, key: SessionKey) -> Option<Arc<VirtualPort<V>>> {
        self.ports.read().get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.ports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.read().is_empty()
    }
}
