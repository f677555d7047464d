//! Integration test for log export
//!
//! Initializes telemetry with a log endpoint pointing at a local UDP socket
//! standing in for the collector. Lives in its own binary since it installs
//! the global subscriber.

use std::net::UdpSocket;
use std::time::Duration;

use meterline_domain::TelemetryConfig;
use meterline_infra::Telemetry;
use serde_json::Value;

#[test]
fn test_event_reaches_collector_on_flush() {
    let collector = UdpSocket::bind("127.0.0.1:0").unwrap();
    collector.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    let config = TelemetryConfig {
        app_name: "billing-api".to_string(),
        version: "3.1.0".to_string(),
        env: "prod".to_string(),
        host_name: Some("web-04".to_string()),
        log_endpoint: collector.local_addr().unwrap().to_string(),
        use_logger: true,
        ..Default::default()
    };
    let telemetry = Telemetry::init(config).unwrap();

    tracing::info!(order_id = 42_i64, "Order settled");
    telemetry.flush();

    let mut buf = vec![0_u8; 16 * 1024];
    let len = collector.recv(&mut buf).unwrap();
    let payload = String::from_utf8(buf[..len].to_vec()).unwrap();
    let lines: Vec<Value> =
        payload.lines().map(|line| serde_json::from_str(line).unwrap()).collect();

    let settled = lines
        .iter()
        .find(|line| line["body"] == "Order settled")
        .unwrap_or_else(|| panic!("no settled record in {payload}"));
    assert_eq!(settled["severity"], "INFO");
    assert_eq!(settled["attributes"]["order_id"], 42);
    assert_eq!(settled["attributes"]["env"], "prod");
    assert_eq!(settled["attributes"]["service.name"], "billing_api");
}
