//! Device registry - identifiers and endpoint layout of the wired controller

/// Microsoft vendor ID
pub const VENDOR_ID: u16 = 0x045E;

/// Xbox 360 wired controller product ID
pub const PRODUCT_ID: u16 = 0x028E;

/// Interface carrying the input endpoint
pub const INTERFACE: u8 = 0;

/// Interrupt IN endpoint (endpoint 1, direction IN)
pub const ENDPOINT_IN: u8 = 0x81;

/// Size of every interrupt report read from the controller
pub const REPORT_LEN: usize = 32;

/// Name given to the virtual input device
pub const DEVICE_NAME: &str = "Xbox 360 Wired Controller";

/// Version reported by the virtual input device (arbitrary, fixed)
pub const DEVICE_VERSION: u16 = 1;

/// One raw interrupt report
pub type ReportBuffer = [u8; REPORT_LEN];

/// Check if a VID/PID pair is a supported controller
#[inline]
pub fn is_supported(vid: u16, pid: u16) -> bool {
    vid == VENDOR_ID && pid == PRODUCT_ID
}
