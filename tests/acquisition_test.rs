//! End-to-end acquisition over real telnet sockets.

use awc_logger::config::Settings;
use awc_logger::link::TelnetConnector;
use awc_logger::recorder::latest_segment;
use awc_logger::{shutdown, ConnectionState, DeviceId, Orchestrator, TaskExit};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

const IAC: u8 = 255;
const DO: u8 = 253;

fn settings(output_dir: &Path, live_port: u16, dead_port: u16) -> Settings {
    Settings::from_toml_str(&format!(
        r#"
        [storage]
        output_dir = '{}'

        [link]
        connect_timeout_secs = 2
        read_timeout_secs = 30

        [backoff]
        initial_secs = 0.05
        max_secs = 0.2

        [devices.AWC1]
        host = "127.0.0.1"
        port = {live_port}

        [devices.AWC2]
        host = "127.0.0.1"
        port = {dead_port}
        "#,
        output_dir.display()
    ))
    .unwrap()
}

async fn wait_for_content(settings: &Settings, device: &DeviceId, expected: &str) -> String {
    let namer = settings.namer();
    let mut content = String::new();
    for _ in 0..250 {
        if let Some(entry) = latest_segment(&namer, device).unwrap() {
            content = std::fs::read_to_string(&entry.path).unwrap();
            if content == expected {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    content
}

#[tokio::test]
async fn test_records_telnet_stream_next_to_unreachable_device() {
    let dir = tempfile::tempdir().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let live_port = listener.local_addr().unwrap().port();
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_port = dead.local_addr().unwrap().port();
    drop(dead);

    let _controller = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(&[IAC, DO, 1]).await.unwrap();
        socket.write_all(b"Time;T1;T2\r\n10:00;20.1;20.3\r\n").await.unwrap();
        socket.write_all(b"10:01;20.2;20.4\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let settings = settings(dir.path(), live_port, dead_port);
    let connector = TelnetConnector::from_config(&settings.link);
    let (trigger, signal) = shutdown::channel();
    let fleet = Orchestrator::new(settings.clone(), connector).spawn(&signal);

    let awc1 = DeviceId::from("AWC1");
    let expected = "Time;T1;T2\n10:00;20.1;20.3\n10:01;20.2;20.4\n";
    assert_eq!(wait_for_content(&settings, &awc1, expected).await, expected);
    assert_eq!(fleet.state(&awc1), Some(ConnectionState::Connected));
    assert_ne!(fleet.state(&"AWC2".into()), Some(ConnectionState::Connected));

    trigger.trigger();
    let exits = fleet.join().await;
    assert!(exits.iter().all(|(_, exit)| matches!(exit, TaskExit::Stopped)));
    assert!(latest_segment(&settings.namer(), &"AWC2".into()).unwrap().is_none());
}

#[tokio::test]
async fn test_reconnect_opens_new_segment_with_new_header() {
    let dir = tempfile::tempdir().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let live_port = listener.local_addr().unwrap().port();
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_port = dead.local_addr().unwrap().port();
    drop(dead);

    let _controller = tokio::spawn(async move {
        let (mut first, _) = listener.accept().await.unwrap();
        first.write_all(b"A;B\r\n1;2\r\n").await.unwrap();
        first.shutdown().await.unwrap();
        drop(first);

        let (mut second, _) = listener.accept().await.unwrap();
        second.write_all(b"A;B;C\r\n3;4;5\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let settings = settings(dir.path(), live_port, dead_port);
    let connector = TelnetConnector::from_config(&settings.link);
    let (trigger, signal) = shutdown::channel();
    let fleet = Orchestrator::new(settings.clone(), connector).spawn(&signal);

    let awc1 = DeviceId::from("AWC1");
    let expected = "A;B;C\n3;4;5\n";
    assert_eq!(wait_for_content(&settings, &awc1, expected).await, expected);

    trigger.trigger();
    fleet.join().await;

    let segments = awc_logger::recorder::list_segments(&settings.namer(), &awc1).unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(std::fs::read_to_string(&segments[0].path).unwrap(), "A;B\n1;2\n");
}
