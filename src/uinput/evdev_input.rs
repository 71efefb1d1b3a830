//! Virtual controller device using evdev/uinput
//!
//! Opening a handle opens `/dev/uinput`. Capabilities are collected on the
//! handle and applied together when the device is created, since the
//! evdev builder consumes itself on every capability call.

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{
    AbsInfo, AbsoluteAxisType, AttributeSet, BusType, EventType, FFEffectType, InputEvent,
    InputId, Key, UinputAbsSetup,
};
use tracing::{debug, warn};
use xpad360_protocol::{Axis, EventClass, GamepadEvent};

use super::{Capability, DeviceDescriptor, VirtualInput, VirtualInputError};

const KEY_MAX: u16 = 0x2FF;
const ABS_MAX: u16 = 0x3F;
const FF_MAX: u16 = 0x7F;

/// Effect slots offered when force feedback is declared
///
/// uinput refuses to create a device with `EV_FF` set and no slots.
pub const FF_EFFECTS_MAX: u32 = 16;

/// Per-device uinput state
pub struct EvdevHandle {
    builder: Option<VirtualDeviceBuilder<'static>>,
    classes: Vec<EventClass>,
    keys: AttributeSet<Key>,
    axes: Vec<Axis>,
    effects: AttributeSet<FFEffectType>,
    device: Option<VirtualDevice>,
}

impl EvdevHandle {
    fn new(builder: Option<VirtualDeviceBuilder<'static>>) -> Self {
        Self {
            builder,
            classes: Vec::new(),
            keys: AttributeSet::new(),
            axes: Vec::new(),
            effects: AttributeSet::new(),
            device: None,
        }
    }

    fn has_class(&self, class: EventClass) -> bool {
        self.classes.contains(&class)
    }

    fn record(&mut self, capability: Capability) -> Result<(), VirtualInputError> {
        match capability {
            Capability::EventClass(class) => {
                if !self.has_class(class) {
                    self.classes.push(class);
                }
            }
            Capability::Key(button) if button.code() <= KEY_MAX => {
                self.keys.insert(Key::new(button.code()));
            }
            Capability::Absolute(axis) if axis.code() <= ABS_MAX => {
                if !self.axes.contains(&axis) {
                    self.axes.push(axis);
                }
            }
            Capability::ForceFeedback(effect) if effect.code() <= FF_MAX => {
                self.effects.insert(FFEffectType(effect.code()));
            }
            other => return Err(VirtualInputError::UnsupportedCapability(other)),
        }
        Ok(())
    }

    /// Effect slots to request, if force feedback is declared
    fn ff_effects_max(&self) -> Option<u32> {
        let declared = self.has_class(EventClass::ForceFeedback)
            && self.effects.iter().next().is_some();
        declared.then_some(FF_EFFECTS_MAX)
    }
}

/// [`VirtualInput`] over the kernel's uinput module
#[derive(Debug, Default)]
pub struct EvdevInput;

impl EvdevInput {
    pub fn new() -> Self {
        Self
    }
}

impl VirtualInput for EvdevInput {
    type Handle = EvdevHandle;

    fn open(&self) -> Result<EvdevHandle, VirtualInputError> {
        let builder = VirtualDeviceBuilder::new()?;
        Ok(EvdevHandle::new(Some(builder)))
    }

    fn register(
        &self,
        handle: &mut EvdevHandle,
        capability: Capability,
    ) -> Result<(), VirtualInputError> {
        if handle.builder.is_none() {
            return Err(VirtualInputError::AlreadyCreated);
        }
        handle.record(capability)
    }

    fn create(
        &self,
        handle: &mut EvdevHandle,
        descriptor: &DeviceDescriptor,
    ) -> Result<(), VirtualInputError> {
        let builder = handle
            .builder
            .take()
            .ok_or(VirtualInputError::AlreadyCreated)?;

        let mut builder = builder.name(descriptor.name).input_id(InputId::new(
            BusType(descriptor.bus_type),
            descriptor.vendor,
            descriptor.product,
            descriptor.version,
        ));

        if handle.has_class(EventClass::Key) {
            builder = builder.with_keys(&handle.keys)?;
        } else if handle.keys.iter().next().is_some() {
            warn!("Keys declared without EV_KEY, skipping");
        }

        if handle.has_class(EventClass::Absolute) {
            for &axis in &handle.axes {
                let Some(cal) = descriptor.calibration_for(axis) else {
                    warn!("No calibration for {:?}, skipping axis", axis);
                    continue;
                };
                let setup = UinputAbsSetup::new(
                    AbsoluteAxisType(axis.code()),
                    AbsInfo::new(0, cal.min, cal.max, cal.fuzz, cal.flat, 0),
                );
                builder = builder.with_absolute_axis(&setup)?;
            }
        }

        if let Some(slots) = handle.ff_effects_max() {
            builder = builder
                .with_ff(&handle.effects)?
                .with_ff_effects_max(slots);
        } else if handle.has_class(EventClass::ForceFeedback) {
            warn!("EV_FF declared without effects, skipping force feedback");
        }

        let device = builder.build()?;
        debug!("Created uinput device \"{}\"", descriptor.name);
        handle.device = Some(device);
        Ok(())
    }

    fn emit<I>(&self, handle: &mut EvdevHandle, events: I) -> Result<(), VirtualInputError>
    where
        I: IntoIterator<Item = GamepadEvent>,
    {
        let device = handle
            .device
            .as_mut()
            .ok_or(VirtualInputError::NotCreated)?;

        let batch: Vec<InputEvent> = events
            .into_iter()
            .map(|event| {
                let kind = match event.class() {
                    EventClass::Key => EventType::KEY,
                    EventClass::Absolute => EventType::ABSOLUTE,
                    EventClass::ForceFeedback => EventType::FORCEFEEDBACK,
                };
                InputEvent::new(kind, event.code(), event.value())
            })
            .collect();

        // emit() appends the SYN_REPORT
        device.emit(&batch)?;
        Ok(())
    }

    fn destroy(&self, handle: &mut EvdevHandle) -> Result<(), VirtualInputError> {
        // Dropping the device issues UI_DEV_DESTROY
        handle
            .device
            .take()
            .map(drop)
            .ok_or(VirtualInputError::NotCreated)
    }

    fn close(&self, handle: EvdevHandle) {
        drop(handle);
    }
}
