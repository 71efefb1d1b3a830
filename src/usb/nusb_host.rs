//! USB host backed by `nusb`
//!
//! Each transfer object is bound to its endpoint by a pump task that owns
//! the endpoint queue. A submit asks the pump for exactly one read; the
//! completed read is forwarded to the dispatch loop as a
//! [`TransferCompletion`].
//!
//! The pump's endpoint queue keeps its own reference to the claimed
//! interface. Releasing the interface and freeing the transfer therefore
//! only drop this side's references; the kernel claim, and with it the
//! device, is let go once the aborted pump task has been dropped by the
//! runtime. Any read still pending then completes as cancelled, and that
//! completion is stale by the time it reaches the dispatch loop.

use nusb::transfer::{Queue, RequestBuffer, TransferError};
use nusb::{Device, DeviceId, DeviceInfo, Interface};
use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{TransferStatus, UsbError, UsbHost};
use crate::session::SessionKey;

/// A finished read, tagged with the session that submitted it
#[derive(Debug)]
pub struct TransferCompletion {
    pub session: SessionKey,
    pub status: TransferStatus,
    pub data: Vec<u8>,
}

/// Open controller handle
pub struct NusbHandle {
    device: Device,
    interface: Option<Interface>,
}

/// Interrupt read request
pub struct NusbTransfer {
    length: usize,
    pump: Option<Pump>,
}

struct Pump {
    submit_tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

/// [`UsbHost`] over `nusb`
pub struct NusbHost {
    runtime: RuntimeHandle,
    completions: mpsc::UnboundedSender<TransferCompletion>,
}

impl NusbHost {
    /// Create a host whose pump tasks run on `runtime` and report to `completions`
    pub fn new(
        runtime: RuntimeHandle,
        completions: mpsc::UnboundedSender<TransferCompletion>,
    ) -> Self {
        Self {
            runtime,
            completions,
        }
    }
}

/// Map an `nusb` completion status onto [`TransferStatus`]
pub fn transfer_status(status: &Result<(), TransferError>) -> TransferStatus {
    match status {
        Ok(()) => TransferStatus::Completed,
        Err(TransferError::Cancelled) => TransferStatus::Cancelled,
        Err(TransferError::Stall) => TransferStatus::Stall,
        Err(TransferError::Disconnected) => TransferStatus::NoDevice,
        Err(TransferError::Fault) => TransferStatus::Error,
        Err(TransferError::Unknown) => TransferStatus::Unknown,
    }
}

async fn run_pump(
    mut queue: Queue<RequestBuffer>,
    mut submits: mpsc::UnboundedReceiver<()>,
    length: usize,
    session: SessionKey,
    completions: mpsc::UnboundedSender<TransferCompletion>,
) {
    while submits.recv().await.is_some() {
        queue.submit(RequestBuffer::new(length));
        let completion = queue.next_complete().await;
        let done = TransferCompletion {
            session,
            status: transfer_status(&completion.status),
            data: completion.data,
        };
        if completions.send(done).is_err() {
            // Dispatch loop is gone
            break;
        }
    }
    debug!("Transfer pump for {} exiting", session);
}

impl UsbHost for NusbHost {
    type Device = DeviceInfo;
    type DeviceId = DeviceId;
    type Handle = NusbHandle;
    type Transfer = NusbTransfer;

    fn device_id(&self, device: &DeviceInfo) -> DeviceId {
        device.id()
    }

    fn open(&self, device: &DeviceInfo) -> Result<NusbHandle, UsbError> {
        let device = device.open()?;
        Ok(NusbHandle {
            device,
            interface: None,
        })
    }

    fn alloc_transfer(&self, length: usize) -> Result<NusbTransfer, UsbError> {
        Ok(NusbTransfer { length, pump: None })
    }

    fn claim_interface(&self, handle: &mut NusbHandle, interface: u8) -> Result<(), UsbError> {
        // The in-kernel xpad driver usually owns interface 0
        let claimed = handle.device.detach_and_claim_interface(interface)?;
        handle.interface = Some(claimed);
        Ok(())
    }

    fn fill_interrupt_in(
        &self,
        handle: &NusbHandle,
        transfer: &mut NusbTransfer,
        endpoint: u8,
        session: SessionKey,
    ) {
        let Some(interface) = handle.interface.as_ref() else {
            warn!("Cannot bind transfer for {}: interface not claimed", session);
            return;
        };
        if let Some(old) = transfer.pump.take() {
            old.task.abort();
        }

        let queue = interface.interrupt_in_queue(endpoint);
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let task = self.runtime.spawn(run_pump(
            queue,
            submit_rx,
            transfer.length,
            session,
            self.completions.clone(),
        ));
        transfer.pump = Some(Pump { submit_tx, task });
    }

    fn submit(&self, transfer: &mut NusbTransfer) -> Result<(), UsbError> {
        let pump = transfer.pump.as_ref().ok_or(UsbError::NotBound)?;
        pump.submit_tx.send(()).map_err(|_| UsbError::Closed)
    }

    fn release_interface(&self, handle: &mut NusbHandle, interface: u8) -> Result<(), UsbError> {
        // The claim outlives this while a pump still holds the queue
        handle
            .interface
            .take()
            .map(drop)
            .ok_or(UsbError::InterfaceNotClaimed(interface))
    }

    fn free_transfer(&self, transfer: NusbTransfer) {
        if let Some(pump) = transfer.pump {
            // Dropping the queue cancels any pending read
            pump.task.abort();
        }
    }

    fn close(&self, handle: NusbHandle) {
        drop(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(transfer_status(&Ok(())), TransferStatus::Completed);
        assert_eq!(
            transfer_status(&Err(TransferError::Disconnected)),
            TransferStatus::NoDevice
        );
        assert_eq!(
            transfer_status(&Err(TransferError::Stall)),
            TransferStatus::Stall
        );
        assert_eq!(
            transfer_status(&Err(TransferError::Cancelled)),
            TransferStatus::Cancelled
        );
        assert_eq!(
            transfer_status(&Err(TransferError::Fault)),
            TransferStatus::Error
        );
    }
}
