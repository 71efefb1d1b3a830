//! USB host abstraction
//!
//! The lifecycle manager and transfer loop only talk to the USB stack
//! through [`UsbHost`]. The real implementation is [`NusbHost`]; tests
//! drive the core with scripted hosts.

use std::fmt;
use std::hash::Hash;

use thiserror::Error;

use crate::session::SessionKey;

pub mod nusb_host;

pub use nusb_host::{NusbHost, TransferCompletion};

/// Errors from the USB host
#[derive(Error, Debug)]
pub enum UsbError {
    #[error("USB I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interface {0} not claimed")]
    InterfaceNotClaimed(u8),

    #[error("Transfer not bound to an endpoint")]
    NotBound,

    #[error("Transfer closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Completion status of an asynchronous transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStatus {
    Completed,
    Error,
    TimedOut,
    Cancelled,
    Stall,
    NoDevice,
    Overflow,
    Unknown,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferStatus::Completed => "completed",
            TransferStatus::Error => "transfer error",
            TransferStatus::TimedOut => "timed out",
            TransferStatus::Cancelled => "cancelled",
            TransferStatus::Stall => "endpoint stalled",
            TransferStatus::NoDevice => "no device",
            TransferStatus::Overflow => "overflow",
            TransferStatus::Unknown => "unknown status",
        };
        f.write_str(name)
    }
}

/// USB operations needed to drive one controller
///
/// Completions of submitted transfers are not returned from these calls;
/// the host delivers them to the event-dispatch loop, which feeds them to
/// [`DeviceManager::on_transfer_complete`](crate::DeviceManager::on_transfer_complete).
pub trait UsbHost {
    /// Device as announced by hot-plug
    type Device;
    /// Stable identity of a device across attach/detach notifications
    type DeviceId: Copy + Eq + Hash + fmt::Debug;
    /// Open device handle
    type Handle;
    /// One asynchronous read request
    type Transfer;

    /// Identity of a hot-plugged device
    fn device_id(&self, device: &Self::Device) -> Self::DeviceId;

    /// Open a device handle
    fn open(&self, device: &Self::Device) -> Result<Self::Handle, UsbError>;

    /// Allocate a transfer object for reads of `length` bytes
    fn alloc_transfer(&self, length: usize) -> Result<Self::Transfer, UsbError>;

    /// Claim an interface on an open handle
    fn claim_interface(&self, handle: &mut Self::Handle, interface: u8) -> Result<(), UsbError>;

    /// Point a transfer at an interrupt IN endpoint
    ///
    /// Completions of the transfer are tagged with `session`.
    fn fill_interrupt_in(
        &self,
        handle: &Self::Handle,
        transfer: &mut Self::Transfer,
        endpoint: u8,
        session: SessionKey,
    );

    /// Submit a filled transfer; at most one may be outstanding
    fn submit(&self, transfer: &mut Self::Transfer) -> Result<(), UsbError>;

    /// Release a claimed interface
    fn release_interface(&self, handle: &mut Self::Handle, interface: u8)
        -> Result<(), UsbError>;

    /// Free a transfer object
    fn free_transfer(&self, transfer: Self::Transfer);

    /// Close a device handle
    fn close(&self, handle: Self::Handle);
}
