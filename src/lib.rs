//! Userspace driver for wired Xbox 360 controllers
//!
//! Reads interrupt reports from the controller over USB, decodes them on a
//! pool of worker threads and replays them through a uinput virtual
//! gamepad.

pub mod config;
pub mod cpu;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod pool;
pub mod session;
pub mod sink;
pub mod transfer;
pub mod uinput;
pub mod usb;

pub use config::DriverConfig;
pub use error::{AttachStep, DriverError, ResourceError};
pub use lifecycle::{DeviceManager, SessionState};
pub use pool::{
    PoolError, ReportDispatch, ReportHandler, WorkerPool, WorkerStats, DEFAULT_QUEUE_DEPTH,
};
pub use session::{KeyAllocator, SessionDirectory, SessionKey, VirtualPort};
pub use sink::ReportSink;
pub use transfer::{classify, TransferClass, TransferOutcome};
pub use uinput::{Capability, DeviceDescriptor, EvdevInput, VirtualInput, VirtualInputError};
pub use usb::{NusbHost, TransferCompletion, TransferStatus, UsbError, UsbHost};
