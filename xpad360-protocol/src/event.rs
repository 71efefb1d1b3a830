//! Input event vocabulary
//!
//! Codes follow `linux/input-event-codes.h` so that backends can pass them
//! straight to the kernel.

/// Event classes (`EV_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    /// EV_KEY
    Key,
    /// EV_ABS
    Absolute,
    /// EV_FF
    ForceFeedback,
}

impl EventClass {
    pub const fn code(self) -> u16 {
        match self {
            EventClass::Key => 0x01,
            EventClass::Absolute => 0x03,
            EventClass::ForceFeedback => 0x15,
        }
    }
}

/// Discrete controller buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    A,
    B,
    X,
    Y,
    Start,
    /// "Back" on the controller face
    Select,
    ThumbL,
    ThumbR,
    ShoulderL,
    ShoulderR,
    /// Guide button
    Mode,
}

impl Button {
    /// All buttons, in capability declaration order
    pub const ALL: &'static [Button] = &[
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::Start,
        Button::Select,
        Button::ThumbL,
        Button::ThumbR,
        Button::ShoulderL,
        Button::ShoulderR,
        Button::Mode,
    ];

    /// `BTN_*` code
    pub const fn code(self) -> u16 {
        match self {
            Button::A => 0x130,
            Button::B => 0x131,
            Button::X => 0x133,
            Button::Y => 0x134,
            Button::ShoulderL => 0x136,
            Button::ShoulderR => 0x137,
            Button::Select => 0x13A,
            Button::Start => 0x13B,
            Button::Mode => 0x13C,
            Button::ThumbL => 0x13D,
            Button::ThumbR => 0x13E,
        }
    }

    /// Mask of this button in the 16-bit little-endian button word
    pub(crate) const fn mask(self) -> u16 {
        match self {
            Button::Start => 0x0010,
            Button::Select => 0x0020,
            Button::ThumbL => 0x0040,
            Button::ThumbR => 0x0080,
            Button::ShoulderL => 0x0100,
            Button::ShoulderR => 0x0200,
            Button::Mode => 0x0400,
            // 0x0800 is unused by the controller
            Button::A => 0x1000,
            Button::B => 0x2000,
            Button::X => 0x4000,
            Button::Y => 0x8000,
        }
    }
}

/// Absolute axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Left stick horizontal
    X,
    /// Left stick vertical
    Y,
    /// Left trigger
    Z,
    /// Right stick horizontal
    RX,
    /// Right stick vertical
    RY,
    /// Right trigger
    RZ,
    /// Directional pad horizontal
    Hat0X,
    /// Directional pad vertical
    Hat0Y,
}

impl Axis {
    /// All axes, in capability declaration order
    pub const ALL: &'static [Axis] = &[
        Axis::X,
        Axis::Y,
        Axis::Z,
        Axis::RX,
        Axis::RY,
        Axis::RZ,
        Axis::Hat0X,
        Axis::Hat0Y,
    ];

    /// `ABS_*` code
    pub const fn code(self) -> u16 {
        match self {
            Axis::X => 0x00,
            Axis::Y => 0x01,
            Axis::Z => 0x02,
            Axis::RX => 0x03,
            Axis::RY => 0x04,
            Axis::RZ => 0x05,
            Axis::Hat0X => 0x10,
            Axis::Hat0Y => 0x11,
        }
    }
}

/// Force-feedback effect types (`FF_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfEffect {
    Rumble,
}

impl FfEffect {
    pub const fn code(self) -> u16 {
        match self {
            FfEffect::Rumble => 0x50,
        }
    }
}

/// One decoded input event: an (event class, code, value) triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamepadEvent {
    Button { button: Button, pressed: bool },
    Axis { axis: Axis, value: i32 },
}

impl GamepadEvent {
    pub fn class(&self) -> EventClass {
        match self {
            GamepadEvent::Button { .. } => EventClass::Key,
            GamepadEvent::Axis { .. } => EventClass::Absolute,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            GamepadEvent::Button { button, .. } => button.code(),
            GamepadEvent::Axis { axis, .. } => axis.code(),
        }
    }

    pub fn value(&self) -> i32 {
        match self {
            GamepadEvent::Button { pressed, .. } => i32::from(*pressed),
            GamepadEvent::Axis { value, .. } => *value,
        }
    }
}
