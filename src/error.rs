//! Driver error types

use std::fmt;

use thiserror::Error;

use crate::pool::PoolError;
use crate::uinput::{Capability, VirtualInputError};
use crate::usb::{TransferStatus, UsbError};

/// Steps of the attach sequence that can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachStep {
    OpenDevice,
    AllocateTransfer,
    ClaimInterface,
    OpenVirtualDevice,
    CreateVirtualDevice,
    SubmitTransfer,
}

impl fmt::Display for AttachStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttachStep::OpenDevice => "open device",
            AttachStep::AllocateTransfer => "allocate transfer",
            AttachStep::ClaimInterface => "claim interface",
            AttachStep::OpenVirtualDevice => "open uinput",
            AttachStep::CreateVirtualDevice => "create input device",
            AttachStep::SubmitTransfer => "submit transfer",
        };
        f.write_str(name)
    }
}

/// Error from either resource provider
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error(transparent)]
    Usb(#[from] UsbError),

    #[error(transparent)]
    VirtualInput(#[from] VirtualInputError),
}

/// Errors raised while driving controllers
#[derive(Error, Debug)]
pub enum DriverError {
    /// An attach step failed; acquired resources were released
    #[error("Failed to {step}: {source}")]
    ResourceAcquisition {
        step: AttachStep,
        #[source]
        source: ResourceError,
    },

    /// Transfer completed with a recoverable error status
    #[error("Transfer error: {0}")]
    TransferFailure(TransferStatus),

    /// The controller went away
    #[error("Device lost")]
    FatalDeviceLoss,

    /// A single capability could not be registered (non-fatal)
    #[error("Failed to register {capability:?}: {source}")]
    CapabilityRegistration {
        capability: Capability,
        #[source]
        source: VirtualInputError,
    },

    /// Worker pool could not start (fatal at startup)
    #[error("Failed to initialize worker threads: {0}")]
    PoolInitialization(#[from] PoolError),

    /// The device is already managed by a session
    #[error("Device already attached")]
    AlreadyAttached,
}

impl DriverError {
    pub(crate) fn acquisition(step: AttachStep, source: impl Into<ResourceError>) -> Self {
        DriverError::ResourceAcquisition {
            step,
            source: source.into(),
        }
    }

    /// Attach step that failed, if this is an acquisition failure
    pub fn failed_step(&self) -> Option<AttachStep> {
        match self {
            DriverError::ResourceAcquisition { step, .. } => Some(*step),
            _ => None,
        }
    }
}
