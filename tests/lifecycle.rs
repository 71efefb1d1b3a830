//! Attach and detach of controller sessions against scripted backends

mod support;

use support::{manager, Call, FakeDevice, Journal, Step};
use xpad360_driver::{AttachStep, Capability, DriverError, SessionState};
use xpad360_protocol::{Button, EventClass, FfEffect};

const ACQUIRE: [Call; 7] = [
    Call::Open,
    Call::AllocTransfer,
    Call::Claim,
    Call::Fill,
    Call::UinputOpen,
    Call::Create,
    Call::Submit,
];

const RELEASE: [Call; 5] = [
    Call::Destroy,
    Call::UinputClose,
    Call::Release,
    Call::FreeTransfer,
    Call::Close,
];

#[test]
fn test_attach_reaches_streaming() {
    let journal = Journal::new();
    let (mut manager, _) = manager(&journal);

    let key = manager.attach(&FakeDevice { id: 7 }).unwrap();

    assert_eq!(manager.state(key), Some(SessionState::Streaming));
    assert_eq!(manager.session_for(&7), Some(key));
    assert!(manager.directory().get(key).is_some());
    assert_eq!(journal.lifecycle_calls(), ACQUIRE.to_vec());
}

#[test]
fn test_attach_registers_every_capability_before_create() {
    let journal = Journal::new();
    let (mut manager, _) = manager(&journal);
    manager.attach(&FakeDevice { id: 1 }).unwrap();

    let calls = journal.calls();
    let create = calls.iter().position(|c| *c == Call::Create).unwrap();
    let registered: Vec<_> = calls[..create]
        .iter()
        .filter_map(|c| match c {
            Call::Register(cap) => Some(*cap),
            _ => None,
        })
        .collect();
    assert_eq!(registered, xpad360_driver::uinput::CAPABILITIES.to_vec());
}

#[test]
fn test_detach_releases_in_reverse_order() {
    let journal = Journal::new();
    let (mut manager, _) = manager(&journal);
    let key = manager.attach(&FakeDevice { id: 3 }).unwrap();
    journal.clear();

    assert_eq!(manager.detach(&3), Some(key));

    assert_eq!(journal.calls(), RELEASE.to_vec());
    assert!(manager.is_empty());
    assert_eq!(manager.state(key), None);
    assert!(manager.directory().is_empty());
}

#[test]
fn test_failed_attach_unwinds_acquired_resources() {
    let cases = [
        (Step::Open, AttachStep::OpenDevice, vec![]),
        (
            Step::AllocTransfer,
            AttachStep::AllocateTransfer,
            vec![Call::Open, Call::Close],
        ),
        (
            Step::Claim,
            AttachStep::ClaimInterface,
            vec![Call::Open, Call::AllocTransfer, Call::FreeTransfer, Call::Close],
        ),
        (
            Step::UinputOpen,
            AttachStep::OpenVirtualDevice,
            vec![
                Call::Open,
                Call::AllocTransfer,
                Call::Claim,
                Call::Fill,
                Call::Release,
                Call::FreeTransfer,
                Call::Close,
            ],
        ),
        (
            Step::Create,
            AttachStep::CreateVirtualDevice,
            vec![
                Call::Open,
                Call::AllocTransfer,
                Call::Claim,
                Call::Fill,
                Call::UinputOpen,
                Call::UinputClose,
                Call::Release,
                Call::FreeTransfer,
                Call::Close,
            ],
        ),
        (
            Step::Submit,
            AttachStep::SubmitTransfer,
            vec![
                Call::Open,
                Call::AllocTransfer,
                Call::Claim,
                Call::Fill,
                Call::UinputOpen,
                Call::Create,
                Call::Destroy,
                Call::UinputClose,
                Call::Release,
                Call::FreeTransfer,
                Call::Close,
            ],
        ),
    ];

    for (step, expected_step, expected_calls) in cases {
        let journal = Journal::new();
        let (mut manager, _) = manager(&journal);
        journal.fail_next(step);

        let err = manager.attach(&FakeDevice { id: 1 }).unwrap_err();

        assert_eq!(err.failed_step(), Some(expected_step), "{:?}", step);
        assert_eq!(journal.lifecycle_calls(), expected_calls, "{:?}", step);
        assert!(manager.is_empty(), "{:?}", step);
        assert_eq!(manager.session_for(&1), None, "{:?}", step);
        assert!(manager.directory().is_empty(), "{:?}", step);
    }
}

#[test]
fn test_device_attaches_after_failed_attempt() {
    let journal = Journal::new();
    let (mut manager, _) = manager(&journal);
    journal.fail_next(Step::Create);
    assert!(manager.attach(&FakeDevice { id: 1 }).is_err());

    let key = manager.attach(&FakeDevice { id: 1 }).unwrap();
    assert_eq!(manager.state(key), Some(SessionState::Streaming));
}

#[test]
fn test_capability_failure_is_not_fatal() {
    let journal = Journal::new();
    let (mut manager, _) = manager(&journal);
    journal.fail_next(Step::Register(Capability::Key(Button::Mode)));
    journal.fail_next(Step::Register(Capability::EventClass(EventClass::ForceFeedback)));
    journal.fail_next(Step::Register(Capability::ForceFeedback(FfEffect::Rumble)));

    let key = manager.attach(&FakeDevice { id: 1 }).unwrap();

    assert_eq!(manager.state(key), Some(SessionState::Streaming));
    assert_eq!(journal.count(&Call::Register(Capability::Key(Button::Mode))), 0);
    assert_eq!(journal.count(&Call::Register(Capability::Key(Button::A))), 1);
    assert_eq!(journal.count(&Call::Create), 1);
}

#[test]
fn test_duplicate_attach_rejected() {
    let journal = Journal::new();
    let (mut manager, _) = manager(&journal);
    let key = manager.attach(&FakeDevice { id: 5 }).unwrap();
    journal.clear();

    let err = manager.attach(&FakeDevice { id: 5 }).unwrap_err();

    assert!(matches!(err, DriverError::AlreadyAttached));
    assert!(journal.calls().is_empty());
    assert_eq!(manager.session_for(&5), Some(key));
    assert_eq!(manager.len(), 1);
}

#[test]
fn test_detach_unknown_device_ignored() {
    let journal = Journal::new();
    let (mut manager, _) = manager(&journal);
    manager.attach(&FakeDevice { id: 1 }).unwrap();
    journal.clear();

    assert_eq!(manager.detach(&99), None);
    assert!(journal.calls().is_empty());
    assert_eq!(manager.len(), 1);
}

#[test]
fn test_sessions_are_independent() {
    let journal = Journal::new();
    let (mut manager, _) = manager(&journal);
    let a = manager.attach(&FakeDevice { id: 1 }).unwrap();
    let b = manager.attach(&FakeDevice { id: 2 }).unwrap();
    assert_ne!(a, b);

    manager.detach(&1);

    assert_eq!(manager.state(a), None);
    assert_eq!(manager.state(b), Some(SessionState::Streaming));
    assert!(manager.directory().get(b).is_some_and(|port| port.is_live()));
}

#[test]
fn test_reattach_gets_fresh_key() {
    let journal = Journal::new();
    let (mut manager, _) = manager(&journal);
    let first = manager.attach(&FakeDevice { id: 1 }).unwrap();
    manager.detach(&1);
    let second = manager.attach(&FakeDevice { id: 1 }).unwrap();
    assert!(second > first);
}

#[test]
fn test_release_continues_after_step_failure() {
    let journal = Journal::new();
    let (mut manager, _) = manager(&journal);
    manager.attach(&FakeDevice { id: 1 }).unwrap();
    journal.clear();
    journal.fail_next(Step::Destroy);
    journal.fail_next(Step::Release);

    manager.detach(&1);

    assert_eq!(journal.calls(), RELEASE.to_vec());
}

#[test]
fn test_detach_all() {
    let journal = Journal::new();
    let (mut manager, _) = manager(&journal);
    for id in 0..3 {
        manager.attach(&FakeDevice { id }).unwrap();
    }
    journal.clear();

    manager.detach_all();

    assert!(manager.is_empty());
    assert_eq!(journal.count(&Call::Close), 3);
    assert_eq!(journal.count(&Call::Destroy), 3);
}

#[test]
fn test_dropping_manager_detaches_sessions() {
    let journal = Journal::new();
    let (mut manager, _) = manager(&journal);
    manager.attach(&FakeDevice { id: 1 }).unwrap();
    journal.clear();

    drop(manager);

    assert_eq!(journal.calls(), RELEASE.to_vec());
}
