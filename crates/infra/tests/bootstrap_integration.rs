//! Integration tests for process bootstrap
//!
//! Loads a configuration file, initializes telemetry against a local UDP
//! socket standing in for the DogStatsD agent, and checks the lines that
//! adapters put on the wire.

use std::io::Write;
use std::net::UdpSocket;
use std::time::Duration;

use meterline_core::EmitContext;
use meterline_domain::TelemetryError;
use meterline_infra::instrumentation::tcp::TcpMetrics;
use meterline_infra::{config, KvMetrics, Telemetry};

fn agent() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    socket
}

fn recv_line(socket: &UdpSocket) -> String {
    let mut buf = [0_u8; 2048];
    let len = socket.recv(&mut buf).unwrap();
    String::from_utf8(buf[..len].to_vec()).unwrap()
}

fn write_config(agent: &UdpSocket) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
app_name = "billing-api"
version = "3.1.0"
env = "prod"
metrics_endpoint = "{}"
use_metrics = true
use_logger = false
host_name = "web-04"
"#,
        agent.local_addr().unwrap()
    )
    .unwrap();
    file
}

#[test]
fn test_config_file_to_wire() {
    let agent = agent();
    let file = write_config(&agent);

    let config = config::load_from_file(Some(file.path().to_path_buf())).unwrap();
    let telemetry = Telemetry::init(config).unwrap();
    assert!(telemetry.metrics().is_enabled());

    let kv = KvMetrics::new(telemetry.metrics());
    let ctx = EmitContext::background();
    kv.after_process(&ctx, Some(kv.before_process()), "get");

    let tags = "cmd:get,env:prod,version:3.1.0,host:web-04,service.name:billing_api";

    let timing = recv_line(&agent);
    assert!(timing.starts_with("billing_api_kv.duration_ms:"), "{timing}");
    assert!(timing.ends_with(&format!("|h|#{tags}")), "{timing}");

    let count = recv_line(&agent);
    assert_eq!(count, format!("billing_api_kv.count:1|c|#{tags}"));
}

#[test]
fn test_gauge_lines_follow_connection_level() {
    let agent = agent();
    let file = write_config(&agent);

    let config = config::load_from_file(Some(file.path().to_path_buf())).unwrap();
    let telemetry = Telemetry::init(config).unwrap();
    let tcp = TcpMetrics::new(telemetry.metrics());
    let ctx = EmitContext::background();

    tcp.on_connect(&ctx);
    tcp.on_connect(&ctx);
    tcp.on_disconnect(&ctx);

    let levels: Vec<String> = (0..3)
        .map(|_| {
            let line = recv_line(&agent);
            line.split('|').next().unwrap().to_owned()
        })
        .collect();
    assert_eq!(
        levels,
        ["billing_api_tcp_live:1", "billing_api_tcp_live:2", "billing_api_tcp_live:1"]
    );
}

#[test]
fn test_expired_context_is_not_sent() {
    let agent = agent();
    agent.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    let file = write_config(&agent);

    let config = config::load_from_file(Some(file.path().to_path_buf())).unwrap();
    let telemetry = Telemetry::init(config).unwrap();

    let expired = EmitContext::with_timeout(Duration::ZERO);
    telemetry.metrics().emit_count(&expired, "jobs", 1, &[]);

    let mut buf = [0_u8; 256];
    assert!(agent.recv(&mut buf).is_err());
}

#[test]
fn test_customized_app_name_prefixes_metrics() {
    let agent = agent();
    let file = write_config(&agent);

    let config = config::load_from_file(Some(file.path().to_path_buf())).unwrap();
    let telemetry = Telemetry::init_with(config, |config| {
        config.app_name = "billing.worker".to_string();
    })
    .unwrap();

    telemetry.metrics().emit_count(&EmitContext::background(), "jobs", 3, &[]);
    let line = recv_line(&agent);
    assert!(line.starts_with("billing_worker_jobs.count:3|c|#"), "{line}");
}

#[test]
fn test_missing_agent_address_fails_startup() {
    let config = meterline_domain::TelemetryConfig {
        app_name: "billing-api".to_string(),
        metrics_endpoint: String::new(),
        use_metrics: true,
        ..Default::default()
    };

    let err = Telemetry::init(config).unwrap_err();
    assert!(matches!(err, TelemetryError::SinkUnavailable(_)));
}
