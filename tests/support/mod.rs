//! Scripted in-memory USB host and virtual input backend
//!
//! Both record every call into a shared journal so tests can check the
//! exact acquisition and release order. Failures are injected one-shot per
//! step.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use xpad360_driver::{
    Capability, DeviceDescriptor, DeviceManager, ReportDispatch, SessionDirectory, SessionKey,
    UsbError, UsbHost, VirtualInput, VirtualInputError,
};
use xpad360_protocol::{GamepadEvent, ReportBuffer};

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open,
    AllocTransfer,
    Claim,
    Fill,
    Submit,
    UinputOpen,
    Register(Capability),
    Create,
    Emit(Vec<GamepadEvent>),
    Destroy,
    UinputClose,
    Release,
    FreeTransfer,
    Close,
}

impl Call {
    /// Whether this is a capability registration
    pub fn is_register(&self) -> bool {
        matches!(self, Call::Register(_))
    }
}

/// Operation that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Open,
    AllocTransfer,
    Claim,
    Submit,
    Release,
    UinputOpen,
    Register(Capability),
    Create,
    Destroy,
}

#[derive(Default)]
struct GateState {
    held: bool,
    entered: usize,
}

/// Holds emissions inside the backend until released
#[derive(Default)]
struct EmitGate {
    state: Mutex<GateState>,
    cond: Condvar,
}

#[derive(Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<Call>>>,
    failures: Arc<Mutex<HashSet<Step>>>,
    gate: Arc<EmitGate>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    /// Make the next call of `step` fail
    pub fn fail_next(&self, step: Step) {
        self.failures.lock().insert(step);
    }

    fn should_fail(&self, step: Step) -> bool {
        self.failures.lock().remove(&step)
    }

    /// Every call so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Calls so far, leaving out capability registrations
    pub fn lifecycle_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| !c.is_register()).collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn emits(&self) -> Vec<Vec<GamepadEvent>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Emit(events) => Some(events.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Block every emission inside the backend until [`release_emits`](Self::release_emits)
    pub fn hold_emits(&self) {
        self.gate.state.lock().held = true;
    }

    pub fn release_emits(&self) {
        self.gate.state.lock().held = false;
        self.gate.cond.notify_all();
    }

    /// Wait until an emission has entered the backend
    pub fn wait_for_emit_entered(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.gate.state.lock();
        while state.entered == 0 {
            if self.gate.cond.wait_until(&mut state, deadline).timed_out() {
                return state.entered > 0;
            }
        }
        true
    }

    fn pass_emit_gate(&self) {
        let mut state = self.gate.state.lock();
        state.entered += 1;
        self.gate.cond.notify_all();
        while state.held {
            self.gate.cond.wait(&mut state);
        }
    }
}

fn io_error(what: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("{} failed", what))
}

/// Hot-plugged controller
#[derive(Debug, Clone, Copy)]
pub struct FakeDevice {
    pub id: u32,
}

pub struct FakeHandle {
    pub device: u32,
}

pub struct FakeTransfer {
    pub bound: Option<SessionKey>,
}

pub struct ScriptedHost {
    journal: Journal,
}

impl ScriptedHost {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl UsbHost for ScriptedHost {
    type Device = FakeDevice;
    type DeviceId = u32;
    type Handle = FakeHandle;
    type Transfer = FakeTransfer;

    fn device_id(&self, device: &FakeDevice) -> u32 {
        device.id
    }

    fn open(&self, device: &FakeDevice) -> Result<FakeHandle, UsbError> {
        if self.journal.should_fail(Step::Open) {
            return Err(io_error("open").into());
        }
        self.journal.record(Call::Open);
        Ok(FakeHandle { device: device.id })
    }

    fn alloc_transfer(&self, _length: usize) -> Result<FakeTransfer, UsbError> {
        if self.journal.should_fail(Step::AllocTransfer) {
            return Err(UsbError::Other("out of memory".to_string()));
        }
        self.journal.record(Call::AllocTransfer);
        Ok(FakeTransfer { bound: None })
    }

    fn claim_interface(&self, _handle: &mut FakeHandle, interface: u8) -> Result<(), UsbError> {
        if self.journal.should_fail(Step::Claim) {
            return Err(UsbError::InterfaceNotClaimed(interface));
        }
        self.journal.record(Call::Claim);
        Ok(())
    }

    fn fill_interrupt_in(
        &self,
        _handle: &FakeHandle,
        transfer: &mut FakeTransfer,
        _endpoint: u8,
        session: SessionKey,
    ) {
        self.journal.record(Call::Fill);
        transfer.bound = Some(session);
    }

    fn submit(&self, transfer: &mut FakeTransfer) -> Result<(), UsbError> {
        if transfer.bound.is_none() {
            return Err(UsbError::NotBound);
        }
        if self.journal.should_fail(Step::Submit) {
            return Err(io_error("submit").into());
        }
        self.journal.record(Call::Submit);
        Ok(())
    }

    fn release_interface(&self, _handle: &mut FakeHandle, _interface: u8) -> Result<(), UsbError> {
        self.journal.record(Call::Release);
        if self.journal.should_fail(Step::Release) {
            return Err(io_error("release").into());
        }
        Ok(())
    }

    fn free_transfer(&self, _transfer: FakeTransfer) {
        self.journal.record(Call::FreeTransfer);
    }

    fn close(&self, _handle: FakeHandle) {
        self.journal.record(Call::Close);
    }
}

pub struct FakeUinput {
    created: bool,
}

pub struct ScriptedInput {
    journal: Journal,
}

impl ScriptedInput {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl VirtualInput for ScriptedInput {
    type Handle = FakeUinput;

    fn open(&self) -> Result<FakeUinput, VirtualInputError> {
        if self.journal.should_fail(Step::UinputOpen) {
            return Err(io_error("uinput open").into());
        }
        self.journal.record(Call::UinputOpen);
        Ok(FakeUinput { created: false })
    }

    fn register(
        &self,
        _handle: &mut FakeUinput,
        capability: Capability,
    ) -> Result<(), VirtualInputError> {
        if self.journal.should_fail(Step::Register(capability)) {
            return Err(VirtualInputError::UnsupportedCapability(capability));
        }
        self.journal.record(Call::Register(capability));
        Ok(())
    }

    fn create(
        &self,
        handle: &mut FakeUinput,
        _descriptor: &DeviceDescriptor,
    ) -> Result<(), VirtualInputError> {
        if self.journal.should_fail(Step::Create) {
            return Err(io_error("create").into());
        }
        self.journal.record(Call::Create);
        handle.created = true;
        Ok(())
    }

    fn emit<I>(&self, handle: &mut FakeUinput, events: I) -> Result<(), VirtualInputError>
    where
        I: IntoIterator<Item = GamepadEvent>,
    {
        if !handle.created {
            return Err(VirtualInputError::NotCreated);
        }
        let events = events.into_iter().collect();
        self.journal.pass_emit_gate();
        // Journaled when the emission returns
        self.journal.record(Call::Emit(events));
        Ok(())
    }

    fn destroy(&self, handle: &mut FakeUinput) -> Result<(), VirtualInputError> {
        self.journal.record(Call::Destroy);
        handle.created = false;
        if self.journal.should_fail(Step::Destroy) {
            return Err(io_error("destroy").into());
        }
        Ok(())
    }

    fn close(&self, _handle: FakeUinput) {
        self.journal.record(Call::UinputClose);
    }
}

/// Dispatcher that records reports instead of handing them to workers
#[derive(Default)]
pub struct RecordingDispatch {
    reports: Mutex<Vec<(ReportBuffer, SessionKey)>>,
}

impl RecordingDispatch {
    pub fn reports(&self) -> Vec<(ReportBuffer, SessionKey)> {
        self.reports.lock().clone()
    }
}

impl ReportDispatch for RecordingDispatch {
    fn dispatch(&self, report: &ReportBuffer, session: SessionKey) {
        self.reports.lock().push((*report, session));
    }
}

pub type TestManager<D = RecordingDispatch> = DeviceManager<ScriptedHost, ScriptedInput, D>;

/// Manager over scripted backends, with a recording dispatcher
pub fn manager(journal: &Journal) -> (TestManager, Arc<RecordingDispatch>) {
    let dispatch = Arc::new(RecordingDispatch::default());
    let manager = manager_with(journal, Arc::clone(&dispatch), Arc::new(SessionDirectory::new()));
    (manager, dispatch)
}

/// Manager over scripted backends with the given dispatcher and directory
pub fn manager_with<D: ReportDispatch>(
    journal: &Journal,
    dispatch: Arc<D>,
    directory: Arc<SessionDirectory<ScriptedInput>>,
) -> TestManager<D> {
    DeviceManager::new(
        Arc::new(ScriptedHost::new(journal.clone())),
        Arc::new(ScriptedInput::new(journal.clone())),
        dispatch,
        directory,
        DeviceDescriptor::default(),
    )
}

/// An input report with the given buttons held and everything else at rest
pub fn input_report(buttons: u16) -> Vec<u8> {
    let mut report = vec![0u8; 20];
    report[1] = 0x14;
    report[2..4].copy_from_slice(&buttons.to_le_bytes());
    report
}
