//! Interrupt transfer completion handling
//!
//! Each streaming session keeps exactly one read outstanding. On a good
//! completion the report is handed to the worker pool and the same transfer
//! is resubmitted; anything else stops the session's loop until detach.
//! A failed resubmission counts as losing the device.

use tracing::{debug, trace, warn};
use xpad360_protocol::{ReportBuffer, REPORT_LEN};

use crate::error::DriverError;
use crate::lifecycle::{DeviceManager, SessionState};
use crate::pool::ReportDispatch;
use crate::session::SessionKey;
use crate::uinput::VirtualInput;
use crate::usb::{TransferStatus, UsbHost};

/// How a completion status is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferClass {
    Success,
    /// Error status; the device may still be present
    Recoverable,
    DeviceLost,
}

/// Classify a completion status
pub fn classify(status: TransferStatus) -> TransferClass {
    match status {
        TransferStatus::Completed => TransferClass::Success,
        TransferStatus::NoDevice => TransferClass::DeviceLost,
        TransferStatus::Error
        | TransferStatus::TimedOut
        | TransferStatus::Cancelled
        | TransferStatus::Stall
        | TransferStatus::Overflow
        | TransferStatus::Unknown => TransferClass::Recoverable,
    }
}

/// Result of handling one completion
#[derive(Debug)]
pub enum TransferOutcome {
    /// Report dispatched and the read resubmitted
    Resubmitted,
    /// The loop stopped; the session waits for detach
    Stopped(DriverError),
    /// Completion for a session that is gone or already stopped
    Stale,
}

/// Copy a completed payload into a report buffer, zero-padding short reads
pub fn report_from_payload(payload: &[u8]) -> ReportBuffer {
    let mut report = [0u8; REPORT_LEN];
    let len = payload.len().min(REPORT_LEN);
    report[..len].copy_from_slice(&payload[..len]);
    report
}

impl<U: UsbHost, V: VirtualInput, D: ReportDispatch> DeviceManager<U, V, D> {
    /// Handle the completion of a session's outstanding read
    pub fn on_transfer_complete(
        &mut self,
        key: SessionKey,
        status: TransferStatus,
        payload: &[u8],
    ) -> TransferOutcome {
        let Some(session) = self.sessions.get_mut(&key) else {
            debug!("Completion for {} which is no longer attached", key);
            return TransferOutcome::Stale;
        };
        let Some(transfer) = session.transfer.as_mut() else {
            trace!("{}: completion after the transfer loop stopped", key);
            return TransferOutcome::Stale;
        };

        let error = match classify(status) {
            TransferClass::Success => {
                if payload.len() < REPORT_LEN {
                    trace!("{}: short report of {} bytes", key, payload.len());
                }
                self.dispatch.dispatch(&report_from_payload(payload), key);
                match self.host.submit(transfer) {
                    Ok(()) => return TransferOutcome::Resubmitted,
                    Err(e) => {
                        warn!(
                            "{}: failed to resubmit transfer, try to replug the device: {}",
                            key, e
                        );
                        DriverError::FatalDeviceLoss
                    }
                }
            }
            TransferClass::Recoverable => {
                if status == TransferStatus::Unknown {
                    warn!("{}: transfer completed with an unknown status", key);
                } else {
                    warn!("{}: transfer failed: {}", key, status);
                }
                DriverError::TransferFailure(status)
            }
            TransferClass::DeviceLost => {
                warn!("{}: device lost", key);
                DriverError::FatalDeviceLoss
            }
        };

        debug!("{}: skipping transfer submission", key);
        if let Some(transfer) = session.transfer.take() {
            self.host.free_transfer(transfer);
        }
        session.state = SessionState::Stopped;
        TransferOutcome::Stopped(error)
    }
}
