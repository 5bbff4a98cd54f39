//! Integration tests for the full relay flow, run against an in-memory
//! serial transport.

use std::sync::Arc;
use std::time::Duration;

use bluer::Address;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

use obd2_bt_bridge::{
    BridgeRouter, BridgeState, CommandInterceptor, MemorySink, PeripheralChannels, PeripheralLink,
    PeripheralState, SerialLink, SerialState,
};

fn central() -> Address {
    Address::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06])
}

fn adapter() -> Address {
    Address::new([0xA0, 0xB0, 0xC0, 0xD0, 0xE0, 0xF0])
}

struct Bridge {
    router: BridgeRouter,
    peripheral: Arc<PeripheralLink>,
    serial: Arc<SerialLink>,
    notifications: mpsc::Receiver<Vec<u8>>,
    sink: Arc<MemorySink>,
}

/// Bridge with both links constructed and the router running; the serial
/// side is not yet attached to a stream.
fn bridge() -> Bridge {
    let sink = Arc::new(MemorySink::new());
    let (peripheral, channels) = PeripheralLink::new(CommandInterceptor::elm327(), sink.clone());
    let PeripheralChannels {
        inbound,
        notifications,
    } = channels;
    let (serial, serial_inbound) = SerialLink::new(sink.clone());
    let router = BridgeRouter::start(peripheral.clone(), serial.clone(), inbound, serial_inbound);

    Bridge {
        router,
        peripheral,
        serial,
        notifications,
        sink,
    }
}

/// Bridge with the serial side attached and a central connected.
async fn connected_bridge() -> (Bridge, DuplexStream) {
    let bridge = bridge();
    let (local, remote) = duplex(256);
    let _read_loop = bridge.serial.attach(local, adapter()).await;
    bridge.peripheral.advertising_started();
    bridge.peripheral.peer_connected(central());
    (bridge, remote)
}

/// Wait until the sink records a message with the given prefix.
async fn wait_for_log(sink: &MemorySink, prefix: &str) {
    for _ in 0..1000 {
        if sink.messages().iter().any(|m| m.starts_with(prefix)) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("no log message starting with {:?}", prefix);
}

#[tokio::test]
async fn test_request_response_round_trip() {
    let (mut bridge, mut remote) = connected_bridge().await;

    // Central writes a mode-01 PID request.
    bridge
        .peripheral
        .characteristic_written(b"01 0C\r".to_vec())
        .await;

    let mut buf = [0u8; 32];
    let n = remote.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"01 0C\r");

    // The adapter answers; the response surfaces as one notification.
    remote.write_all(b"41 0C 1A F8\r").await.unwrap();
    assert_eq!(
        bridge.notifications.recv().await.unwrap(),
        b"41 0C 1A F8\r"
    );

    // Both relay directions were reported as hex + ASCII pairs, in order.
    let messages = bridge.sink.messages();
    let gatt_rx = messages
        .iter()
        .position(|m| m == "GATT RX: 30312030430D='01 0C\r'")
        .expect("GATT RX entry");
    let rfcm_tx = messages
        .iter()
        .position(|m| m == "RFCM TX: 30312030430D='01 0C\r'")
        .expect("RFCM TX entry");
    let rfcm_rx = messages
        .iter()
        .position(|m| m == "RFCM RX: 34312030432031412046380D='41 0C 1A F8\r'")
        .expect("RFCM RX entry");
    let gatt_tx = messages
        .iter()
        .position(|m| m == "GATT TX: 34312030432031412046380D='41 0C 1A F8\r'")
        .expect("GATT TX entry");
    assert!(gatt_rx < rfcm_tx);
    assert!(rfcm_rx < gatt_tx);
}

#[tokio::test(start_paused = true)]
async fn test_reset_delays_ack_without_delaying_forward() {
    let (bridge, mut remote) = connected_bridge().await;

    let start = tokio::time::Instant::now();
    let peripheral = bridge.peripheral.clone();
    let ack = tokio::spawn(async move {
        peripheral.characteristic_written(b"ATZ\r".to_vec()).await;
    });

    // The payload reaches the serial side without waiting out the delay.
    let mut buf = [0u8; 32];
    let n = remote.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"ATZ\r");
    assert!(start.elapsed() < Duration::from_millis(500));

    // The acknowledgement path does wait it out.
    ack.await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_non_reset_ack_is_not_delayed() {
    let (bridge, mut remote) = connected_bridge().await;

    let start = tokio::time::Instant::now();
    bridge
        .peripheral
        .characteristic_written(b"AT SP 0\r".to_vec())
        .await;
    assert!(start.elapsed() < Duration::from_millis(500));

    let mut buf = [0u8; 32];
    let n = remote.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"AT SP 0\r");
}

#[tokio::test(start_paused = true)]
async fn test_frames_dropped_while_serial_down_are_not_replayed() {
    let bridge = bridge();
    bridge.peripheral.advertising_started();
    bridge.peripheral.peer_connected(central());

    // No serial connection: the frame is dropped, not queued.
    bridge
        .peripheral
        .characteristic_written(b"01 05\r".to_vec())
        .await;
    wait_for_log(&bridge.sink, "DROPPING RFCM TX:").await;

    // A later connect must not see the dropped frame.
    let (local, mut remote) = duplex(256);
    let _read_loop = bridge.serial.attach(local, adapter()).await;
    bridge
        .peripheral
        .characteristic_written(b"01 0C\r".to_vec())
        .await;

    let mut buf = [0u8; 32];
    let n = remote.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"01 0C\r", "only the post-connect frame arrives");
}

#[tokio::test(start_paused = true)]
async fn test_frames_dropped_while_central_down_are_not_replayed() {
    let mut bridge = bridge();
    let (local, mut remote) = duplex(256);
    let _read_loop = bridge.serial.attach(local, adapter()).await;
    bridge.peripheral.advertising_started();

    // Adapter chatters while no central is connected: dropped.
    remote.write_all(b"SEARCHING...\r").await.unwrap();
    wait_for_log(&bridge.sink, "DROPPING GATT TX:").await;

    // Central connects; only new frames are notified.
    bridge.peripheral.peer_connected(central());
    remote.write_all(b"41 05 5A\r").await.unwrap();
    assert_eq!(bridge.notifications.recv().await.unwrap(), b"41 05 5A\r");
    assert!(bridge.notifications.try_recv().is_err());
}

#[tokio::test]
async fn test_peer_handle_tracks_connected_state() {
    let (bridge, _remote) = connected_bridge().await;

    assert_eq!(bridge.peripheral.peer(), Some(central()));
    assert_eq!(bridge.serial.peer(), Some(adapter()));

    bridge.peripheral.peer_disconnected();
    assert_eq!(bridge.peripheral.state(), PeripheralState::Advertising);
    assert!(bridge.peripheral.peer().is_none());

    bridge.serial.close().await;
    assert_eq!(bridge.serial.state(), SerialState::Disconnected);
    assert!(bridge.serial.peer().is_none());
}

#[tokio::test]
async fn test_shutdown_tears_both_links_down() {
    let (mut bridge, _remote) = connected_bridge().await;

    bridge.router.shutdown().await;

    assert_eq!(
        bridge.router.bridge_state(),
        BridgeState {
            peripheral: PeripheralState::Idle,
            serial: SerialState::Disconnected,
        }
    );
}

#[tokio::test]
async fn test_read_loop_fault_does_not_stop_the_bridge() {
    let (bridge, remote) = connected_bridge().await;

    // Remote side vanishes: the read loop ends and the serial link
    // reports Disconnected, but the peripheral keeps serving.
    drop(remote);
    for _ in 0..1000 {
        if bridge.serial.state() == SerialState::Disconnected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(bridge.serial.state(), SerialState::Disconnected);
    assert_eq!(bridge.peripheral.state(), PeripheralState::Connected);

    // Inbound frames are now dropped, not errors.
    bridge
        .peripheral
        .characteristic_written(b"01 0C\r".to_vec())
        .await;
    wait_for_log(&bridge.sink, "DROPPING RFCM TX:").await;
}
