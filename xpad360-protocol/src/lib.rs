//! Wire format for wired Xbox 360 controllers
//!
//! This crate is pure data handling: device identifiers, the interrupt
//! report layout and the decoder that turns a report into typed input
//! events. It performs no I/O.

pub mod device;
pub mod event;
pub mod packet;

pub use device::{
    is_supported, ReportBuffer, DEVICE_NAME, DEVICE_VERSION, ENDPOINT_IN, INTERFACE, PRODUCT_ID,
    REPORT_LEN, VENDOR_ID,
};
pub use event::{Axis, Button, EventClass, FfEffect, GamepadEvent};
pub use packet::{decode, header, InputReport, Packet};
