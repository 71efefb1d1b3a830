//! Virtual input device abstraction
//!
//! Declares what the virtual controller looks like (capabilities, identity
//! and axis calibration) and the [`VirtualInput`] operations the lifecycle
//! manager needs. [`EvdevInput`] is the uinput-backed implementation.

use thiserror::Error;
use xpad360_protocol::{Axis, Button, EventClass, FfEffect, GamepadEvent};

pub mod evdev_input;

pub use evdev_input::EvdevInput;

/// `BUS_USB` from `linux/input.h`
pub const BUS_USB: u16 = 0x03;

/// Errors from virtual input operations
#[derive(Error, Debug)]
pub enum VirtualInputError {
    #[error("uinput I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Capability not supported: {0:?}")]
    UnsupportedCapability(Capability),

    #[error("Virtual device handle is not open")]
    NotOpen,

    #[error("Virtual device not created")]
    NotCreated,

    #[error("Virtual device already created")]
    AlreadyCreated,
}

/// One capability bit declared before device creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    EventClass(EventClass),
    Key(Button),
    Absolute(Axis),
    ForceFeedback(FfEffect),
}

/// Capabilities of the virtual controller, in registration order
pub const CAPABILITIES: &[Capability] = &[
    Capability::EventClass(EventClass::Key),
    Capability::EventClass(EventClass::Absolute),
    Capability::EventClass(EventClass::ForceFeedback),
    Capability::Key(Button::A),
    Capability::Key(Button::B),
    Capability::Key(Button::X),
    Capability::Key(Button::Y),
    Capability::Key(Button::Start),
    Capability::Key(Button::Select),
    Capability::Key(Button::ThumbL),
    Capability::Key(Button::ThumbR),
    Capability::Key(Button::ShoulderL),
    Capability::Key(Button::ShoulderR),
    Capability::Key(Button::Mode),
    Capability::Absolute(Axis::X),
    Capability::Absolute(Axis::Y),
    Capability::Absolute(Axis::Z),
    Capability::Absolute(Axis::RX),
    Capability::Absolute(Axis::RY),
    Capability::Absolute(Axis::RZ),
    Capability::Absolute(Axis::Hat0X),
    Capability::Absolute(Axis::Hat0Y),
    Capability::ForceFeedback(FfEffect::Rumble),
];

/// Range and noise filtering of one absolute axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisCalibration {
    pub axis: Axis,
    pub min: i32,
    pub max: i32,
    pub fuzz: i32,
    pub flat: i32,
}

impl AxisCalibration {
    const fn stick(axis: Axis) -> Self {
        Self {
            axis,
            min: -32768,
            max: 32768,
            fuzz: 16,
            flat: 128,
        }
    }

    const fn hat(axis: Axis) -> Self {
        Self {
            axis,
            min: -1,
            max: 1,
            fuzz: 0,
            flat: 0,
        }
    }

    const fn trigger(axis: Axis) -> Self {
        Self {
            axis,
            min: 0,
            max: 255,
            fuzz: 0,
            flat: 0,
        }
    }
}

/// Calibration of every axis the controller reports
pub const CALIBRATION: &[AxisCalibration] = &[
    AxisCalibration::stick(Axis::X),
    AxisCalibration::stick(Axis::RX),
    AxisCalibration::stick(Axis::Y),
    AxisCalibration::stick(Axis::RY),
    AxisCalibration::hat(Axis::Hat0X),
    AxisCalibration::hat(Axis::Hat0Y),
    AxisCalibration::trigger(Axis::Z),
    AxisCalibration::trigger(Axis::RZ),
];

/// Identity and calibration of the virtual device
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    pub name: &'static str,
    pub bus_type: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
    pub calibration: &'static [AxisCalibration],
}

impl DeviceDescriptor {
    /// Descriptor of a wired Xbox 360 controller with the given USB identity
    pub fn xpad360(vendor: u16, product: u16) -> Self {
        Self {
            name: xpad360_protocol::DEVICE_NAME,
            bus_type: BUS_USB,
            vendor,
            product,
            version: xpad360_protocol::DEVICE_VERSION,
            calibration: CALIBRATION,
        }
    }

    pub fn calibration_for(&self, axis: Axis) -> Option<&AxisCalibration> {
        self.calibration.iter().find(|c| c.axis == axis)
    }
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self::xpad360(xpad360_protocol::VENDOR_ID, xpad360_protocol::PRODUCT_ID)
    }
}

/// Kernel virtual input device operations
///
/// Implementations must be shareable: worker threads emit through the
/// backend while the dispatch thread creates and destroys devices.
pub trait VirtualInput: Send + Sync + 'static {
    /// Handle to one virtual device, from open to close
    type Handle: Send + 'static;

    /// Open a new virtual device handle
    fn open(&self) -> Result<Self::Handle, VirtualInputError>;

    /// Declare one capability; must precede [`create`](Self::create)
    fn register(
        &self,
        handle: &mut Self::Handle,
        capability: Capability,
    ) -> Result<(), VirtualInputError>;

    /// Create the device so it becomes visible to the system
    fn create(
        &self,
        handle: &mut Self::Handle,
        descriptor: &DeviceDescriptor,
    ) -> Result<(), VirtualInputError>;

    /// Emit one report's events, terminated by a sync report
    fn emit<I>(&self, handle: &mut Self::Handle, events: I) -> Result<(), VirtualInputError>
    where
        I: IntoIterator<Item = GamepadEvent>;

    /// Destroy a created device
    fn destroy(&self, handle: &mut Self::Handle) -> Result<(), VirtualInputError>;

    /// Close the handle
    fn close(&self, handle: Self::Handle);
}
