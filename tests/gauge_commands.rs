use std::time::Duration;

use maxigauge_lib::serial::mock::{MockPort, Reply};
use maxigauge_lib::serial::mnemonic::{self, Command};
use maxigauge_lib::serial::{ErrorTable, SerialError, SerialInterface};
use maxigauge_lib::{DeviceError, MaxiGauge, PressureStatus};

fn connect(port: &MockPort) -> MaxiGauge {
    let interface = SerialInterface::from_io(Box::new(port.clone()), Duration::from_millis(20));
    MaxiGauge::from_interface(interface)
}

fn all_pressures(port: &MockPort) {
    for sensor in 1..=6 {
        port.set_pressure(sensor, 0, &format!("{}.000E-03", sensor));
    }
}

#[tokio::test]
async fn test_out_of_range_sensor_sends_nothing() {
    let port = MockPort::new();
    let gauge = connect(&port);

    for sensor in [0, 7, 255] {
        let result = gauge.pressure(sensor).await;
        assert!(matches!(result, Err(DeviceError::Validation(_))), "sensor {}", sensor);
    }
    assert!(port.writes().is_empty(), "no bytes may be written for invalid ids");
}

#[tokio::test]
async fn test_pressure_decodes_reading() {
    let port = MockPort::new();
    port.set_pressure(1, 0, "1.053E-06");
    let gauge = connect(&port);

    let reading = gauge.pressure(1).await.unwrap();
    assert_eq!(reading.sensor_id(), 1);
    assert_eq!(reading.status(), PressureStatus::Ok);
    assert_eq!(reading.pressure(), 1.053e-6);
    assert_eq!(reading.status_message(), "Measurement data okay");

    assert_eq!(port.commands(), vec!["PR1".to_string()]);
    assert_eq!(port.enquiries(), 1);
    assert_eq!(port.writes()[0], b"PR1\r\n".to_vec());
}

#[tokio::test]
async fn test_nak_is_decoded_from_tables() {
    let port = MockPort::new();
    port.set_reply("PR2", Reply::Nak { system: 4096, gauge: 0 });
    let gauge = connect(&port);

    match gauge.pressure(2).await {
        Err(DeviceError::SerialError(SerialError::NegativeAcknowledgement(report))) => {
            assert_eq!(report.system, "Syntax error");
            assert_eq!(report.gauge, "No error");
        }
        other => panic!("expected NAK, got {:?}", other),
    }
    // the error pair costs exactly one enquiry
    assert_eq!(port.enquiries(), 1);
}

#[tokio::test]
async fn test_nak_with_unknown_code() {
    let port = MockPort::new();
    port.set_reply("DCC", Reply::Nak { system: 3, gauge: 0 });
    let gauge = connect(&port);

    let result = gauge.display_contrast(None).await;
    assert!(matches!(
        result,
        Err(DeviceError::SerialError(SerialError::UnknownErrorCode {
            table: ErrorTable::System,
            code: 3
        }))
    ));
}

#[tokio::test]
async fn test_pressures_reads_all_in_order() {
    let port = MockPort::new();
    all_pressures(&port);
    port.set_pressure(4, 5, "0.0000E+00");
    let gauge = connect(&port);

    let first = gauge.pressures().await.unwrap();
    let second = gauge.pressures().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 6);
    assert_eq!(first[2].pressure(), 3e-3);
    assert_eq!(first[3].status(), PressureStatus::NoSensor);
    assert_eq!(first[3].value(), None);

    let expected: Vec<String> = (1..=6).chain(1..=6).map(|i| format!("PR{}", i)).collect();
    assert_eq!(port.commands(), expected);
}

#[tokio::test]
async fn test_pressures_fails_whole_on_one_error() {
    let port = MockPort::new();
    all_pressures(&port);
    port.set_reply("PR5", Reply::Nak { system: 0, gauge: 16 });
    let gauge = connect(&port);

    assert!(gauge.pressures().await.is_err());
    // reading stops at the failing gauge
    assert_eq!(port.commands().last().map(String::as_str), Some("PR5"));
}

#[tokio::test]
async fn test_display_contrast_get_and_set() {
    let port = MockPort::new();
    port.set_reply("DCC", Reply::value("10"));
    port.set_reply("DCC,15", Reply::value("15"));
    let gauge = connect(&port);

    assert_eq!(gauge.display_contrast(None).await.unwrap(), 10);
    assert_eq!(gauge.display_contrast(Some(15)).await.unwrap(), 15);
    assert_eq!(port.commands(), vec!["DCC", "DCC,15"]);
}

#[tokio::test]
async fn test_display_contrast_out_of_range_goes_to_controller() {
    let port = MockPort::new();
    port.set_reply("DCC,42", Reply::Nak { system: 8192, gauge: 0 });
    let gauge = connect(&port);

    let result = gauge.display_contrast(Some(42)).await;
    assert!(matches!(
        result,
        Err(DeviceError::SerialError(SerialError::NegativeAcknowledgement(_)))
    ));
    assert_eq!(port.commands(), vec!["DCC,42"]);
}

#[tokio::test]
async fn test_pressed_keys_and_check_device() {
    let port = MockPort::new();
    port.set_reply("DCC", Reply::value("10"));
    port.set_reply("TKB", Reply::value("19"));
    let gauge = connect(&port);

    assert_eq!(gauge.pressed_keys().await.unwrap(), vec![1, 2, 5]);
    let text = gauge.check_device().await.unwrap();
    assert_eq!(
        text,
        "The Display Contrast is currently set to 10 (out of 20).\n\
         Keys since MaxiGauge was switched on: 1, 2, 5 (out of 1,2,3,4,5).\n"
    );
}

#[tokio::test]
async fn test_malformed_payload() {
    let port = MockPort::new();
    port.set_reply("TKB", Reply::value("lots"));
    let gauge = connect(&port);

    match gauge.pressed_keys().await {
        Err(DeviceError::MalformedResponse { command, response }) => {
            assert_eq!(command, "TKB");
            assert_eq!(response, "lots");
        }
        other => panic!("expected malformed response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_status() {
    let port = MockPort::new();
    port.set_reply("ERR", Reply::value("0,2"));
    let gauge = connect(&port);

    let report = gauge.error_status().await.unwrap();
    assert_eq!(report.system, "No error");
    assert_eq!(report.gauge, "Sensor 2: Measurement error");
    assert!(!report.is_clear());
}

#[tokio::test]
async fn test_missing_handshake_is_tolerated() {
    let port = MockPort::new();
    port.set_reply("PR3", Reply::MissingHandshake("1,2.000E+02".into()));
    let gauge = connect(&port);

    let reading = gauge.pressure(3).await.unwrap();
    assert_eq!(reading.status(), PressureStatus::Underrange);
    assert_eq!(reading.pressure(), 200.0);
    assert_eq!(gauge.gauge().anomaly_count().await, 1);
}

#[tokio::test]
async fn test_raw_query_by_mnemonic() {
    let port = MockPort::new();
    port.set_reply("PNR", Reply::value("BG 805 950 -T"));
    let gauge = connect(&port);

    let command = Command::new(mnemonic::lookup("pnr").unwrap());
    let response = gauge.gauge().query(&command).await.unwrap();
    assert_eq!(response, vec!["BG 805 950 -T".to_string()]);
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let port = MockPort::new();
    port.set_pressure(1, 0, "1.000E-03");
    let gauge = connect(&port);

    gauge.disconnect().await.unwrap();
    gauge.disconnect().await.unwrap();
    assert!(!gauge.gauge().is_connected().await);
    assert!(matches!(
        gauge.pressure(1).await,
        Err(DeviceError::SerialError(SerialError::NotConnected))
    ));
}
