mod common;
use common::*;

use goodwe_bridge::error::Error;
use goodwe_bridge::goodwe::{DeviceFamily, Inverter, Value};

#[tokio::test]
async fn polls_over_loopback() {
    common_setup();

    let fake = FakeInverter::spawn(Factory::et(), false).await;
    let mut inverter = Inverter::connect("127.0.0.1", fake.addr.port(), Some(DeviceFamily::ET), quick_policy(3))
        .await
        .unwrap();

    let reading = inverter.poll().await.unwrap();
    assert_eq!(reading.get("vpv1"), Some(&Value::Number(30.0)));
    assert_eq!(reading.get("battery_soh"), Some(&Value::Integer(100)));
    assert_eq!(fake.requests(), 2);
}

#[tokio::test]
async fn ignores_datagrams_from_other_peers() {
    common_setup();

    let fake = FakeInverter::spawn(Factory::aa55("GW5048D-ES"), true).await;
    // no retries, so a single accepted decoy would fail the test
    let mut inverter = Inverter::connect("127.0.0.1", fake.addr.port(), None, quick_policy(0))
        .await
        .unwrap();

    let info = inverter.read_device_info().await.unwrap();
    assert_eq!(info.model, "GW5048D-ES");

    let reading = inverter.poll().await.unwrap();
    // the decoys carry 0x11 everywhere
    assert_eq!(reading.get("vpv1"), Some(&Value::Number(300.0)));
    assert_eq!(reading.get("battery_soc"), Some(&Value::Integer(55)));
    // ET probe, ES probe (which doubles as device info), running data
    assert_eq!(fake.requests(), 3);
}

#[tokio::test]
async fn recovers_from_a_lost_datagram() {
    common_setup();

    let fake = FakeInverter::spawn(Factory::lossy(1, Factory::aa55("GW5048D-ES")), false).await;
    let mut inverter = Inverter::connect("127.0.0.1", fake.addr.port(), Some(DeviceFamily::ES), quick_policy(1))
        .await
        .unwrap();

    assert!(inverter.poll().await.is_ok());
    assert_eq!(fake.requests(), 2);
}

#[tokio::test]
async fn nobody_home() {
    common_setup();

    let fake = FakeInverter::spawn(Factory::silent(), false).await;
    let mut inverter = Inverter::connect("127.0.0.1", fake.addr.port(), Some(DeviceFamily::ET), quick_policy(1))
        .await
        .unwrap();

    assert!(matches!(inverter.poll().await, Err(Error::Unreachable { attempts: 2 })));
    assert_eq!(fake.requests(), 2);
}
