//! Client operations exercised against a live emulator.

use std::sync::Arc;
use std::time::Duration;

use pmd401_client::{ClientConfig, ClientError, Pmd401Client, TransportError};
use pmd401_emu::{Emulator, EmulatorConfig};
use pmd401_proto::ReplyError;

async fn emulator(channels: u32, tick_ms: u64) -> Emulator {
    let config = EmulatorConfig {
        host: "127.0.0.1".into(),
        port: 0,
        channels,
        tick_ms,
    };
    Emulator::start(&config).await.unwrap()
}

fn client_for(emu: &Emulator, idle_timeout_ms: u64) -> Pmd401Client {
    Pmd401Client::new(&ClientConfig {
        host: "127.0.0.1".into(),
        port: emu.local_addr().port(),
        idle_timeout_ms,
        reply_timeout_ms: 1_000,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn driver_operations() {
    let emu = emulator(3, 60_000).await;
    let client = client_for(&emu, 10_000);

    assert_eq!(client.get_channel_numbers().await.unwrap(), vec![0, 1, 2]);

    assert_eq!(client.get_target_position(1).await.unwrap(), 0);
    assert_eq!(client.set_target_position(1, 1500).await.unwrap(), 0);
    assert_eq!(client.set_target_position(1, -20).await.unwrap(), 1500);
    assert_eq!(client.get_target_position(1).await.unwrap(), -20);
    assert_eq!(client.get_encoder_position(1).await.unwrap(), 0);

    client.configure_encoder(0).await.unwrap();
    assert_eq!(client.get_encoder_config(0).await.unwrap(), "1, Quad_32");

    assert_eq!(client.raw_ask("X?").await.unwrap(), "X?:PMD401 V18-emu");
    client.raw_send("X2T7;").await.unwrap();
    assert_eq!(client.get_target_position(2).await.unwrap(), 7);

    client.teardown().await;
    emu.shutdown().await.unwrap();
}

#[tokio::test]
async fn rejections_become_unexpected_replies() {
    let emu = emulator(2, 60_000).await;
    let client = client_for(&emu, 10_000);

    let err = client.get_encoder_position(9).await.unwrap_err();
    assert!(
        matches!(&err, ClientError::UnexpectedReply(ReplyError::Rejected(r)) if r == "bad channel"),
        "{err:?}"
    );

    assert_eq!(client.raw_ask("garbage").await.unwrap(), "parse error");
    assert_eq!(client.raw_ask("X0Q").await.unwrap(), "wat?");

    // the client stays usable after a rejection
    assert_eq!(client.get_target_position(0).await.unwrap(), 0);

    client.teardown().await;
    emu.shutdown().await.unwrap();
}

#[tokio::test]
async fn stop_freezes_motor_at_encoder() {
    let emu = emulator(1, 20).await;
    let client = client_for(&emu, 10_000);

    client.set_target_position(0, 1_000_000).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stopped = client.stop(0).await.unwrap();
    assert!(stopped > 0 && stopped < 1_000_000, "stopped at {stopped}");
    assert_eq!(client.get_target_position(0).await.unwrap(), stopped);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.get_encoder_position(0).await.unwrap(), stopped);

    client.teardown().await;
    emu.shutdown().await.unwrap();
}

#[tokio::test]
async fn reconnects_after_idle_disconnect() {
    let emu = emulator(1, 60_000).await;
    let client = client_for(&emu, 100);

    client.set_target_position(0, 42).await.unwrap();
    assert!(client.transport().is_connected().await);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!client.transport().is_connected().await);

    // state lives in the emulator, not the connection
    assert_eq!(client.get_target_position(0).await.unwrap(), 42);
    assert!(client.transport().is_connected().await);

    client.teardown().await;
    emu.shutdown().await.unwrap();
}

#[tokio::test]
async fn suppressed_reply_times_out() {
    let emu = emulator(1, 60_000).await;
    let client = Pmd401Client::new(&ClientConfig {
        port: emu.local_addr().port(),
        reply_timeout_ms: 100,
        ..Default::default()
    })
    .unwrap();

    let err = client.raw_ask("X0T5;").await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)), "{err:?}");
    assert_eq!(client.get_target_position(0).await.unwrap(), 5);

    client.teardown().await;
    emu.shutdown().await.unwrap();
}

#[tokio::test]
async fn refused_connection_and_teardown() {
    let emu = emulator(1, 60_000).await;
    let port = emu.local_addr().port();
    emu.shutdown().await.unwrap();

    let client = Pmd401Client::new(&ClientConfig {
        port,
        ..Default::default()
    })
    .unwrap();
    let err = client.get_target_position(0).await.unwrap_err();
    assert!(
        matches!(err, ClientError::Transport(TransportError::Connect { .. })),
        "{err:?}"
    );

    client.teardown().await;
    client.teardown().await;
    let err = client.get_target_position(0).await.unwrap_err();
    assert!(
        matches!(err, ClientError::Transport(TransportError::TornDown)),
        "{err:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_client() {
    let emu = emulator(4, 60_000).await;
    let client = Arc::new(client_for(&emu, 10_000));

    let tasks: Vec<_> = (0..4u32)
        .map(|channel| {
            let client = client.clone();
            tokio::spawn(async move {
                let mut previous = 0;
                for step in 1..=25i64 {
                    let value = i64::from(channel) * 100 + step;
                    assert_eq!(
                        client.set_target_position(channel, value).await.unwrap(),
                        previous
                    );
                    previous = value;
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    for channel in 0..4u32 {
        assert_eq!(
            client.get_target_position(channel).await.unwrap(),
            i64::from(channel) * 100 + 25
        );
    }
    client.teardown().await;
    emu.shutdown().await.unwrap();
}
