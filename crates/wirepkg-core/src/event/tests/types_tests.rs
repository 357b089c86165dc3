use crate::event::Event;
use crate::event::types::{PackageEvent, SystemEvent};
use crate::package_system::reconciler::PassReport;

#[test]
fn test_system_event_names() {
    assert_eq!(SystemEvent::ApplicationStart.name(), "application.start");
    assert_eq!(SystemEvent::ApplicationShutdown.name(), "application.shutdown");
}

#[test]
fn test_package_event_names() {
    let events = vec![
        (
            PackageEvent::ReconciliationComplete { pass: 1, report: PassReport::default() },
            "package.reconciled",
        ),
        (PackageEvent::Enabled { package_id: "builtin/eth".to_string() }, "package.enabled"),
        (PackageEvent::Disabled { package_id: "builtin/eth".to_string() }, "package.disabled"),
        (PackageEvent::Uninstalled { package_id: "tcp".to_string() }, "package.uninstalled"),
    ];

    for (event, name) in events {
        assert_eq!(event.name(), name);
    }
}

#[test]
fn test_package_event_clone_and_downcast() {
    let mut report = PassReport::default();
    report.added.push("builtin/eth".to_string());
    let event = PackageEvent::ReconciliationComplete { pass: 3, report };

    let cloned = event.clone_event();
    assert_eq!(cloned.name(), PackageEvent::RECONCILED);

    match cloned.as_any().downcast_ref::<PackageEvent>() {
        Some(PackageEvent::ReconciliationComplete { pass, report }) => {
            assert_eq!(*pass, 3);
            assert_eq!(report.added, vec!["builtin/eth".to_string()]);
        }
        other => panic!("Unexpected downcast result: {:?}", other),
    }
    assert!(cloned.as_any().downcast_ref::<SystemEvent>().is_none());
}
