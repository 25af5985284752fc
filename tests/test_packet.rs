use goodwe_bridge::error::Error;
use goodwe_bridge::goodwe::packet::{self, FrameKind};
use goodwe_bridge::goodwe::registry::{lookup, DeviceFamily};

#[test]
fn et_requests_match_firmware() {
    let et = lookup(DeviceFamily::ET).unwrap();
    assert_eq!(
        et.device_info.bytes(),
        vec![0xF7, 0x03, 0x88, 0xB8, 0x00, 0x21, 0x3A, 0xC1]
    );
    assert_eq!(
        et.runtime[0].request.bytes(),
        vec![0xF7, 0x03, 0x89, 0x1C, 0x00, 0x7D, 0x7A, 0xE7]
    );
    assert_eq!(
        et.runtime[1].request.bytes(),
        vec![0xF7, 0x03, 0x90, 0x88, 0x00, 0x0B, 0xBD, 0xB1]
    );
}

#[test]
fn aa55_requests_match_firmware() {
    for family in [DeviceFamily::ES, DeviceFamily::EM] {
        let p = lookup(family).unwrap();
        assert_eq!(
            p.device_info.bytes(),
            vec![0xAA, 0x55, 0xC0, 0x7F, 0x01, 0x02, 0x00, 0x02, 0x41]
        );
        assert_eq!(
            p.runtime[0].request.bytes(),
            vec![0xAA, 0x55, 0xC0, 0x7F, 0x01, 0x06, 0x00, 0x02, 0x45]
        );
    }
}

#[test]
fn full_size_replies_validate() {
    // device info and running data replies as the inverters send them
    for (kind, command, payload_len, frame_len) in [
        (FrameKind::Modbus, 0xF703, 66, 73),
        (FrameKind::Modbus, 0xF703, 250, 257),
        (FrameKind::Modbus, 0xF703, 22, 29),
        (FrameKind::Aa55, 0x0182, 76, 85),
        (FrameKind::Aa55, 0x0186, 133, 142),
        (FrameKind::Aa55, 0x0186, 140, 149),
    ] {
        let payload = vec![0x5A; payload_len];
        let frame = packet::build_response(kind, command, &payload);
        assert_eq!(frame.len(), frame_len);

        let r = packet::validate_response(&frame).unwrap();
        assert_eq!(r.kind, kind);
        assert_eq!(r.command, command);
        assert_eq!(r.payload.len(), payload_len);
    }
}

#[test]
fn truncated_reply() {
    let frame = packet::build_response(FrameKind::Aa55, 0x0186, &[0u8; 133]);
    assert!(matches!(
        packet::validate_response(&frame[..100]),
        Err(Error::ChecksumMismatch { .. })
    ));
    assert!(matches!(
        packet::validate_response(&frame[..4]),
        Err(Error::TooShort { .. })
    ));
}
