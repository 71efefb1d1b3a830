//! Controller lifecycle management
//!
//! A controller is taken from hot-plug attach to streaming through a fixed
//! chain of resources:
//!
//! ```text
//! open device → allocate transfer → claim interface → open uinput
//!   → register capabilities → create input device → submit first read
//! ```
//!
//! Every acquired resource is recorded on the [`Session`]. Dropping a
//! session releases exactly what was recorded, newest first, so a failed
//! attach and a detach unwind through the same code.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use xpad360_protocol::{ENDPOINT_IN, INTERFACE, REPORT_LEN};

use crate::error::{AttachStep, DriverError};
use crate::pool::ReportDispatch;
use crate::session::{KeyAllocator, SessionDirectory, SessionKey, VirtualPort};
use crate::uinput::{DeviceDescriptor, VirtualInput, CAPABILITIES};
use crate::usb::UsbHost;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Detected,
    Opened,
    TransferAllocated,
    InterfaceClaimed,
    VirtualDeviceOpened,
    CapabilitiesRegistered,
    VirtualDeviceCreated,
    /// One read outstanding at all times
    Streaming,
    /// Transfer loop gave up; no read outstanding until detach
    Stopped,
    Detached,
}

/// Resources held for one attached controller
pub struct Session<U: UsbHost, V: VirtualInput> {
    pub(crate) key: SessionKey,
    pub(crate) state: SessionState,
    host: Arc<U>,
    pub(crate) handle: Option<U::Handle>,
    pub(crate) transfer: Option<U::Transfer>,
    interface_claimed: bool,
    port: Option<Arc<VirtualPort<V>>>,
}

impl<U: UsbHost, V: VirtualInput> Session<U, V> {
    fn new(key: SessionKey, host: Arc<U>) -> Self {
        Self {
            key,
            state: SessionState::Detected,
            host,
            handle: None,
            transfer: None,
            interface_claimed: false,
            port: None,
        }
    }

    /// Release every recorded resource, newest first
    ///
    /// Each step runs even if an earlier one failed.
    fn release(&mut self) {
        if let Some(port) = self.port.take() {
            match port.destroy() {
                Some(Err(e)) => warn!("{}: failed to destroy input device: {}", self.key, e),
                Some(Ok(())) => debug!("{}: destroyed input device", self.key),
                None => {}
            }
            if port.close() {
                debug!("{}: closed uinput handle", self.key);
            }
        }

        if self.interface_claimed {
            self.interface_claimed = false;
            if let Some(handle) = self.handle.as_mut() {
                if let Err(e) = self.host.release_interface(handle, INTERFACE) {
                    warn!("{}: failed to release interface: {}", self.key, e);
                }
            }
        }

        if let Some(transfer) = self.transfer.take() {
            self.host.free_transfer(transfer);
        }

        if let Some(handle) = self.handle.take() {
            self.host.close(handle);
        }

        self.state = SessionState::Detached;
    }
}

impl<U: UsbHost, V: VirtualInput> Drop for Session<U, V> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Owns every controller session and drives attach/detach
pub struct DeviceManager<U: UsbHost, V: VirtualInput, D: ReportDispatch> {
    pub(crate) host: Arc<U>,
    input: Arc<V>,
    pub(crate) dispatch: Arc<D>,
    directory: Arc<SessionDirectory<V>>,
    descriptor: DeviceDescriptor,
    keys: KeyAllocator,
    devices: HashMap<U::DeviceId, SessionKey>,
    pub(crate) sessions: HashMap<SessionKey, Session<U, V>>,
}

impl<U: UsbHost, V: VirtualInput, D: ReportDispatch> DeviceManager<U, V, D> {
    /// Create a manager
    ///
    /// `directory` must be the one the report workers resolve sessions in.
    pub fn new(
        host: Arc<U>,
        input: Arc<V>,
        dispatch: Arc<D>,
        directory: Arc<SessionDirectory<V>>,
        descriptor: DeviceDescriptor,
    ) -> Self {
        Self {
            host,
            input,
            dispatch,
            directory,
            descriptor,
            keys: KeyAllocator::new(),
            devices: HashMap::new(),
            sessions: HashMap::new(),
        }
    }

    /// Attach a hot-plugged controller and start streaming its reports
    ///
    /// On failure every resource acquired so far has been released and the
    /// device is left unmanaged.
    pub fn attach(&mut self, device: &U::Device) -> Result<SessionKey, DriverError> {
        let id = self.host.device_id(device);
        if self.devices.contains_key(&id) {
            warn!("Device {:?} is already attached", id);
            return Err(DriverError::AlreadyAttached);
        }

        let key = self.keys.allocate();
        let mut session = Session::new(key, Arc::clone(&self.host));

        if let Err(e) = self.acquire(&mut session, device) {
            error!("{}: attach failed: {}", key, e);
            drop(session);
            return Err(e);
        }

        if let Some(port) = session.port.as_ref() {
            self.directory.insert(key, Arc::clone(port));
        }
        self.devices.insert(id, key);
        self.sessions.insert(key, session);
        info!("{}: connected {:?}", key, id);
        Ok(key)
    }

    fn acquire(&self, session: &mut Session<U, V>, device: &U::Device) -> Result<(), DriverError> {
        let host = &self.host;
        let key = session.key;

        let handle = session.handle.insert(
            host.open(device)
                .map_err(|e| DriverError::acquisition(AttachStep::OpenDevice, e))?,
        );
        session.state = SessionState::Opened;

        let transfer = session.transfer.insert(
            host.alloc_transfer(REPORT_LEN)
                .map_err(|e| DriverError::acquisition(AttachStep::AllocateTransfer, e))?,
        );
        session.state = SessionState::TransferAllocated;

        host.claim_interface(handle, INTERFACE)
            .map_err(|e| DriverError::acquisition(AttachStep::ClaimInterface, e))?;
        session.interface_claimed = true;
        host.fill_interrupt_in(handle, transfer, ENDPOINT_IN, key);
        session.state = SessionState::InterfaceClaimed;

        let virtual_handle = self
            .input
            .open()
            .map_err(|e| DriverError::acquisition(AttachStep::OpenVirtualDevice, e))?;
        let port = session.port.insert(Arc::new(VirtualPort::new(
            Arc::clone(&self.input),
            virtual_handle,
        )));
        session.state = SessionState::VirtualDeviceOpened;

        for &capability in CAPABILITIES {
            if let Err(source) = port.register(capability) {
                let e = DriverError::CapabilityRegistration { capability, source };
                warn!("{}: {}", key, e);
            }
        }
        session.state = SessionState::CapabilitiesRegistered;

        port.create(&self.descriptor)
            .map_err(|e| DriverError::acquisition(AttachStep::CreateVirtualDevice, e))?;
        session.state = SessionState::VirtualDeviceCreated;

        host.submit(transfer)
            .map_err(|e| DriverError::acquisition(AttachStep::SubmitTransfer, e))?;
        session.state = SessionState::Streaming;
        Ok(())
    }

    /// Detach a controller, releasing its whole resource chain
    ///
    /// Returns the detached session, or `None` if the device was not
    /// managed.
    pub fn detach(&mut self, id: &U::DeviceId) -> Option<SessionKey> {
        let Some(key) = self.devices.remove(id) else {
            debug!("Ignoring detach of unmanaged device {:?}", id);
            return None;
        };

        // Workers stop resolving the session before its device goes away
        self.directory.remove(key);
        if let Some(session) = self.sessions.remove(&key) {
            drop(session);
        }
        info!("{}: disconnected", key);
        Some(key)
    }

    /// Detach every controller
    pub fn detach_all(&mut self) {
        let ids: Vec<_> = self.devices.keys().copied().collect();
        for id in ids {
            self.detach(&id);
        }
    }

    /// Session managing a device, if any
    pub fn session_for(&self, id: &U::DeviceId) -> Option<SessionKey> {
        self.devices.get(id).copied()
    }

    /// Current state of a session
    pub fn state(&self, key: SessionKey) -> Option<SessionState> {
        self.sessions.get(&key).map(|s| s.state)
    }

    /// Number of attached controllers
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn directory(&self) -> &Arc<SessionDirectory<V>> {
        &self.directory
    }
}

impl<U: UsbHost, V: VirtualInput, D: ReportDispatch> Drop for DeviceManager<U, V, D> {
    fn drop(&mut self) {
        self.detach_all();
    }
}
