//! Interrupt report decoding
//!
//! Every report starts with a 16-bit little-endian message header. Only
//! input reports (`0x1400`) carry controller state; the other recognized
//! headers are status notifications from the controller.
//!
//! Input report layout (offsets relative to the payload, i.e. byte 2 of
//! the report):
//!
//! ```text
//! 0      d-pad (bits 0-3), start/back/thumbs (bits 4-7)
//! 1      shoulders, guide, A/B/X/Y
//! 2      left trigger  (0-255)
//! 3      right trigger (0-255)
//! 4..6   left stick X  (i16 LE)
//! 6..8   left stick Y  (i16 LE, inverted)
//! 8..10  right stick X (i16 LE)
//! 10..12 right stick Y (i16 LE, inverted)
//! 12..20 reserved
//! ```

use zerocopy::byteorder::little_endian::I16;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::device::ReportBuffer;
use crate::event::{Axis, Button, GamepadEvent};

/// Message header constants
pub mod header {
    /// LED status notification
    pub const LED_STATUS: u16 = 0x0301;
    /// Rumble (or otherwise unspecified) status notification
    pub const RUMBLE_STATUS: u16 = 0x0303;
    /// An attachment (headset, chatpad) was plugged into the controller
    pub const ATTACHMENT: u16 = 0x0308;
    /// Controller input state
    pub const INPUT_REPORT: u16 = 0x1400;
}

/// D-pad bits in payload byte 0
mod dpad {
    pub const UP: u16 = 0x01;
    pub const DOWN: u16 = 0x02;
    pub const LEFT: u16 = 0x04;
    pub const RIGHT: u16 = 0x08;
}

/// Raw 20-byte input payload
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct RawInputReport {
    buttons: [u8; 2],
    left_trigger: u8,
    right_trigger: u8,
    left_x: I16,
    left_y: I16,
    right_x: I16,
    right_y: I16,
    _reserved: [u8; 8],
}

/// Decoded controller state from one input report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputReport {
    buttons: u16,
    left_trigger: u8,
    right_trigger: u8,
    left_x: i16,
    left_y: i16,
    right_x: i16,
    right_y: i16,
}

/// Emission order of the controls in one input report
#[derive(Clone, Copy)]
enum Control {
    Axis(Axis),
    Button(Button),
}

const EVENT_ORDER: [Control; 19] = [
    Control::Axis(Axis::Hat0X),
    Control::Axis(Axis::Hat0Y),
    Control::Button(Button::Start),
    Control::Button(Button::Select),
    Control::Button(Button::ThumbL),
    Control::Button(Button::ThumbR),
    Control::Button(Button::ShoulderL),
    Control::Button(Button::ShoulderR),
    Control::Button(Button::Mode),
    Control::Button(Button::A),
    Control::Button(Button::B),
    Control::Button(Button::X),
    Control::Button(Button::Y),
    Control::Axis(Axis::Z),
    Control::Axis(Axis::RZ),
    Control::Axis(Axis::X),
    Control::Axis(Axis::Y),
    Control::Axis(Axis::RX),
    Control::Axis(Axis::RY),
];

impl InputReport {
    fn from_raw(raw: &RawInputReport) -> Self {
        Self {
            buttons: u16::from_le_bytes(raw.buttons),
            left_trigger: raw.left_trigger,
            right_trigger: raw.right_trigger,
            left_x: raw.left_x.get(),
            left_y: raw.left_y.get(),
            right_x: raw.right_x.get(),
            right_y: raw.right_y.get(),
        }
    }

    /// Whether a button is held
    pub fn pressed(&self, button: Button) -> bool {
        self.buttons & button.mask() != 0
    }

    /// Current value of an axis
    ///
    /// Stick Y axes are the bitwise complement of the raw value, not its
    /// negation: raw `0` reads as `-1` and raw `0x7FFF` as `-32768`.
    pub fn axis(&self, axis: Axis) -> i32 {
        match axis {
            Axis::Hat0X => self.bit(dpad::RIGHT) - self.bit(dpad::LEFT),
            Axis::Hat0Y => self.bit(dpad::DOWN) - self.bit(dpad::UP),
            Axis::Z => i32::from(self.left_trigger),
            Axis::RZ => i32::from(self.right_trigger),
            Axis::X => i32::from(self.left_x),
            Axis::Y => i32::from(!self.left_y),
            Axis::RX => i32::from(self.right_x),
            Axis::RY => i32::from(!self.right_y),
        }
    }

    fn bit(&self, mask: u16) -> i32 {
        i32::from(self.buttons & mask != 0)
    }

    fn event_for(&self, control: Control) -> GamepadEvent {
        match control {
            Control::Axis(axis) => GamepadEvent::Axis {
                axis,
                value: self.axis(axis),
            },
            Control::Button(button) => GamepadEvent::Button {
                button,
                pressed: self.pressed(button),
            },
        }
    }

    /// Events for this report, in emission order
    ///
    /// The sequence is lazy and finite; every control is reported on every
    /// report, whether or not it changed.
    pub fn events(&self) -> impl Iterator<Item = GamepadEvent> {
        let report = *self;
        EVENT_ORDER
            .into_iter()
            .map(move |control| report.event_for(control))
    }
}

/// A decoded interrupt report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet {
    /// LED ring status
    LedStatus { pattern: u8 },
    /// Rumble / unspecified status
    RumbleStatus { value: u8 },
    /// An attachment was detected (none are supported)
    AttachmentDetected,
    /// Controller input state
    Input(InputReport),
    /// Unrecognized header; not an error
    Ignored { header: u16 },
}

impl Packet {
    /// Message header the packet was decoded from
    pub fn header(&self) -> u16 {
        match self {
            Packet::LedStatus { .. } => header::LED_STATUS,
            Packet::RumbleStatus { .. } => header::RUMBLE_STATUS,
            Packet::AttachmentDetected => header::ATTACHMENT,
            Packet::Input(_) => header::INPUT_REPORT,
            Packet::Ignored { header } => *header,
        }
    }

    /// Input events carried by this packet (empty for anything but input)
    pub fn events(&self) -> impl Iterator<Item = GamepadEvent> {
        let input = match self {
            Packet::Input(report) => Some(*report),
            _ => None,
        };
        input.into_iter().flat_map(|report| report.events())
    }
}

/// Decode one interrupt report
///
/// Pure: identical input always yields identical output.
pub fn decode(buffer: &ReportBuffer) -> Packet {
    let header = u16::from_le_bytes([buffer[0], buffer[1]]);
    let payload = &buffer[2..];

    match header {
        header::LED_STATUS => Packet::LedStatus {
            pattern: payload[0],
        },
        header::RUMBLE_STATUS => Packet::RumbleStatus { value: payload[0] },
        header::ATTACHMENT => Packet::AttachmentDetected,
        header::INPUT_REPORT => match RawInputReport::read_from_prefix(payload) {
            Ok((raw, _)) => Packet::Input(InputReport::from_raw(&raw)),
            Err(_) => Packet::Ignored { header },
        },
        _ => Packet::Ignored { header },
    }
}
