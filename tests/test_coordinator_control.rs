mod common;
use common::*;

use indevolt_bridge::prelude::*;
use serde_json::json;

fn validation_error(result: Result<CommandOutcome>) -> ValidationError {
    result
        .unwrap_err()
        .downcast::<ValidationError>()
        .expect("expected a validation error")
}

#[tokio::test]
async fn discharge_below_floor_is_rejected_without_write() {
    common_setup();

    let (coordinator, transport) =
        Factory::polled(Factory::gen2("garage"), json!({"6002": 9})).await;

    let outcome = coordinator.discharge(500, None).await.unwrap();

    assert_eq!(
        outcome,
        CommandOutcome::Rejected(Rejection::SocFloor {
            soc: 9.0,
            virtual_min_soc: 10.0
        })
    );
    assert!(transport.writes().is_empty());
}

#[tokio::test]
async fn charge_is_clamped_to_ceiling() {
    common_setup();

    let (coordinator, transport) =
        Factory::polled(Factory::gen2("garage"), json!({"6002": 50})).await;

    let outcome = coordinator.charge(1500, None).await.unwrap();

    assert!(matches!(outcome, CommandOutcome::Applied(_)));
    assert_eq!(transport.writes(), vec![(16, 47015, vec![1, 1200, 100])]);
}

#[tokio::test]
async fn discharge_uses_default_soc_limit() {
    common_setup();

    let (coordinator, transport) =
        Factory::polled(Factory::gen1("garage"), json!({"6002": 80})).await;

    coordinator.discharge(500, None).await.unwrap();
    coordinator.discharge(500, Some(30)).await.unwrap();

    assert_eq!(
        transport.writes(),
        vec![(16, 47015, vec![2, 500, 5]), (16, 47015, vec![2, 500, 30])]
    );
}

#[tokio::test]
async fn unknown_soc_does_not_block() {
    common_setup();

    let transport = MockTransport::new();
    let coordinator = Factory::coordinator(Factory::gen2("garage"), transport.clone());

    let outcome = coordinator.discharge(400, None).await.unwrap();
    assert!(matches!(outcome, CommandOutcome::Applied(_)));
    assert_eq!(transport.writes(), vec![(16, 47015, vec![2, 400, 5])]);
}

#[tokio::test]
async fn out_of_range_power_is_a_validation_error() {
    common_setup();

    let (coordinator, transport) =
        Factory::polled(Factory::gen2("garage"), json!({"6002": 50})).await;

    assert_eq!(
        validation_error(coordinator.charge(3000, None).await),
        ValidationError::OutOfRange {
            field: "power",
            value: 3000,
            min: 0,
            max: 2400
        }
    );
    assert!(matches!(
        validation_error(coordinator.discharge(500, Some(101)).await),
        ValidationError::OutOfRange { field: "soc_limit", .. }
    ));
    assert!(transport.writes().is_empty());
}

#[tokio::test]
async fn stop_is_never_blocked_by_the_floor() {
    common_setup();

    let (coordinator, transport) =
        Factory::polled(Factory::gen2("garage"), json!({"6002": 3})).await;

    coordinator.stop().await.unwrap();
    assert_eq!(transport.writes(), vec![(16, 47015, vec![0, 0, 0])]);
}

#[tokio::test]
async fn set_mode() {
    common_setup();

    let transport = MockTransport::new();
    let coordinator = Factory::coordinator(Factory::gen1("garage"), transport.clone());

    coordinator.set_mode(4).await.unwrap();
    assert_eq!(transport.writes(), vec![(16, 47005, vec![4])]);

    assert_eq!(
        validation_error(coordinator.set_mode(3).await),
        ValidationError::InvalidMode(3)
    );
}

#[tokio::test]
async fn gen2_setters() {
    common_setup();

    let transport = MockTransport::new();
    let coordinator = Factory::coordinator(Factory::gen2("garage"), transport.clone());

    coordinator.set_backup_soc(20).await.unwrap();
    coordinator.set_ac_output_power(800).await.unwrap();
    coordinator.set_feed_in_limit(600).await.unwrap();
    coordinator.set_grid_charging(true).await.unwrap();
    coordinator.set_inverter_input_limit(2400).await.unwrap();
    coordinator.set_bypass_socket(false).await.unwrap();
    coordinator.set_led_light(true).await.unwrap();

    assert_eq!(
        transport.writes(),
        vec![
            (16, 1142, vec![20]),
            (16, 1147, vec![800]),
            (16, 1146, vec![600]),
            (16, 1143, vec![1]),
            (16, 1138, vec![2400]),
            (16, 7266, vec![0]),
            (16, 7265, vec![1]),
        ]
    );
}

#[tokio::test]
async fn setter_ranges() {
    common_setup();

    let transport = MockTransport::new();
    let coordinator = Factory::coordinator(Factory::gen2("garage"), transport.clone());

    assert!(matches!(
        validation_error(coordinator.set_backup_soc(4).await),
        ValidationError::OutOfRange { field: "backup_soc", min: 5, .. }
    ));
    assert!(coordinator.set_feed_in_limit(2401).await.is_err());
    assert!(coordinator.set_ac_output_power(-1).await.is_err());
    assert!(transport.writes().is_empty());
}

#[tokio::test]
async fn gen2_setters_refused_on_gen1() {
    common_setup();

    let transport = MockTransport::new();
    let coordinator = Factory::coordinator(Factory::gen1("garage"), transport.clone());

    assert_eq!(
        validation_error(coordinator.set_feed_in_limit(600).await),
        ValidationError::UnsupportedGeneration {
            command: "set_feed_in_limit",
            device: "garage".to_string()
        }
    );
    assert!(coordinator.set_led_light(true).await.is_err());
    assert!(transport.writes().is_empty());
}

#[tokio::test]
async fn read_only_device_refuses_writes() {
    common_setup();

    let device = Factory::device_with("garage", "SolidFlex/PowerFlex2000", "read_only: true\n");
    let transport = MockTransport::new();
    let coordinator = Factory::coordinator(device, transport.clone());

    assert_eq!(
        validation_error(coordinator.stop().await),
        ValidationError::ReadOnly("garage".to_string())
    );
    assert!(coordinator.set_mode(1).await.is_err());
    assert!(transport.writes().is_empty());
}

#[tokio::test]
async fn write_failure_surfaces_to_caller() {
    common_setup();

    let transport = MockTransport::new();
    transport.fail_writes();
    let coordinator = Factory::coordinator(Factory::gen2("garage"), transport.clone());

    let err = coordinator.charge(500, None).await.unwrap_err();
    assert!(err.downcast_ref::<ValidationError>().is_none());
    assert!(err.to_string().contains("connection refused"), "{}", err);
}
