use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{Error, Result};

/// Every response starts with this, whichever protocol produced it.
pub const RESPONSE_PREFIX: [u8; 2] = [0xAA, 0x55];

// AA55 requests go from the host (0xC0) to the inverter (0x7F); replies swap them.
const AA55_HOST: u8 = 0xC0;
const AA55_INVERTER: u8 = 0x7F;

// prefix + address + function + length byte + crc
const MODBUS_MIN_FRAME: usize = 7;
// prefix + src + dst + control + function + length byte + sum
const AA55_MIN_FRAME: usize = 9;

/// Smallest datagram that could be a valid response from any family.
pub const MIN_FRAME: usize = MODBUS_MIN_FRAME;

// {{{ Checksum
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Checksum {
    /// 16-bit additive sum of every preceding byte, big-endian.
    Sum16,
    /// CRC-16/MODBUS over the modbus part of the frame, little-endian.
    Crc16Modbus,
}

impl Checksum {
    pub fn width(&self) -> usize {
        2
    }

    pub fn compute(&self, data: &[u8]) -> u16 {
        match self {
            Checksum::Sum16 => data
                .iter()
                .fold(0u16, |acc, b| acc.wrapping_add(*b as u16)),
            Checksum::Crc16Modbus => crc16::State::<crc16::MODBUS>::calculate(data),
        }
    }

    pub fn to_bytes(&self, value: u16) -> [u8; 2] {
        match self {
            Checksum::Sum16 => value.to_be_bytes(),
            Checksum::Crc16Modbus => value.to_le_bytes(),
        }
    }

    pub fn from_bytes(&self, bytes: [u8; 2]) -> u16 {
        match self {
            Checksum::Sum16 => u16::from_be_bytes(bytes),
            Checksum::Crc16Modbus => u16::from_le_bytes(bytes),
        }
    }
} // }}}

// {{{ ModbusFunction
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ModbusFunction {
    ReadHolding = 3,
    ReadInput = 4,
} // }}}

// {{{ Request
/// A request the inverter understands, fully determined by family and kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Request {
    /// Modbus RTU read, carried raw inside the UDP datagram (ET family).
    Modbus {
        address: u8,
        function: ModbusFunction,
        register: u16,
        count: u16,
    },
    /// GoodWe's own AA55 framing (ES and EM families).
    Aa55 {
        control: u8,
        function: u8,
        payload: &'static [u8],
        /// Payload lengths a reply may carry; firmware revisions differ.
        reply_lens: &'static [usize],
    },
}

impl Request {
    pub fn checksum(&self) -> Checksum {
        match self {
            Request::Modbus { .. } => Checksum::Crc16Modbus,
            Request::Aa55 { .. } => Checksum::Sum16,
        }
    }

    /// Command code a valid reply to this request echoes back.
    pub fn expected_command(&self) -> u16 {
        match *self {
            Request::Modbus {
                address, function, ..
            } => u16::from_be_bytes([address, function.into()]),
            // replies set the high bit of the function code
            Request::Aa55 {
                control, function, ..
            } => u16::from_be_bytes([control, function | 0x80]),
        }
    }

    /// Whether a reply payload of `len` bytes can answer this request.
    /// ET blocks all echo the same command, so this is what tells their
    /// replies apart.
    pub fn accepts_reply_len(&self, len: usize) -> bool {
        match *self {
            Request::Modbus { count, .. } => len == count as usize * 2,
            Request::Aa55 { reply_lens, .. } => reply_lens.contains(&len),
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        build_request(self)
    }
} // }}}

/// Encodes `request` including its trailing checksum.
pub fn build_request(request: &Request) -> Vec<u8> {
    let mut frame = match *request {
        Request::Modbus {
            address,
            function,
            register,
            count,
        } => {
            let mut r = vec![address, function.into()];
            r.extend_from_slice(&register.to_be_bytes());
            r.extend_from_slice(&count.to_be_bytes());
            r
        }
        Request::Aa55 {
            control,
            function,
            payload,
            ..
        } => {
            let mut r = vec![
                RESPONSE_PREFIX[0],
                RESPONSE_PREFIX[1],
                AA55_HOST,
                AA55_INVERTER,
                control,
                function,
                payload.len() as u8,
            ];
            r.extend_from_slice(payload);
            r
        }
    };

    let checksum = request.checksum();
    let value = checksum.compute(&frame);
    frame.extend_from_slice(&checksum.to_bytes(value));
    frame
}

// {{{ ResponseFrame
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FrameKind {
    Modbus,
    Aa55,
}

impl FrameKind {
    fn detect(input: &[u8]) -> Self {
        if input[2..4] == [AA55_INVERTER, AA55_HOST] {
            FrameKind::Aa55
        } else {
            FrameKind::Modbus
        }
    }

    fn checksum(&self) -> Checksum {
        match self {
            FrameKind::Modbus => Checksum::Crc16Modbus,
            FrameKind::Aa55 => Checksum::Sum16,
        }
    }

    fn min_len(&self) -> usize {
        match self {
            FrameKind::Modbus => MODBUS_MIN_FRAME,
            FrameKind::Aa55 => AA55_MIN_FRAME,
        }
    }

    fn header_len(&self) -> usize {
        match self {
            FrameKind::Modbus => 5,
            FrameKind::Aa55 => 7,
        }
    }

    // first byte covered by the checksum; modbus excludes the AA55 prefix
    fn checksum_start(&self) -> usize {
        match self {
            FrameKind::Modbus => 2,
            FrameKind::Aa55 => 0,
        }
    }
}

/// A response that passed validation, with header and checksum stripped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResponseFrame {
    pub kind: FrameKind,
    pub command: u16,
    pub payload: Bytes,
}

/// Checks `input` is a complete, uncorrupted response and strips it down to
/// its payload.
pub fn validate_response(input: &[u8]) -> Result<ResponseFrame> {
    let len = input.len();
    if len < MIN_FRAME {
        return Err(Error::TooShort {
            len,
            min: MIN_FRAME,
        });
    }

    let kind = FrameKind::detect(input);
    let prefix_ok = input[0..2] == RESPONSE_PREFIX;

    // the modbus CRC does not cover the prefix, so it is checked up front;
    // AA55 sums include it and corruption there is a checksum failure
    if !prefix_ok && kind.checksum_start() > 0 {
        return Err(Error::InvalidHeader(input[0..4].to_vec()));
    }

    if len < kind.min_len() {
        return Err(Error::TooShort {
            len,
            min: kind.min_len(),
        });
    }

    let checksum = kind.checksum();
    let body = &input[kind.checksum_start()..len - 2];
    let expected = checksum.compute(body);
    let got = checksum.from_bytes([input[len - 2], input[len - 1]]);
    if got != expected {
        return Err(Error::ChecksumMismatch { got, expected });
    }

    if !prefix_ok {
        return Err(Error::InvalidHeader(input[0..4].to_vec()));
    }

    let header_len = kind.header_len();
    let declared = input[header_len - 1] as usize;
    let actual = len - header_len - 2;
    if declared != actual {
        return Err(Error::LengthMismatch { declared, actual });
    }

    let command = match kind {
        FrameKind::Modbus => u16::from_be_bytes([input[2], input[3]]),
        FrameKind::Aa55 => u16::from_be_bytes([input[4], input[5]]),
    };

    Ok(ResponseFrame {
        kind,
        command,
        payload: Bytes::copy_from_slice(&input[header_len..len - 2]),
    })
}

/// Wraps `payload` the way the inverter would, for the given reply command.
pub fn build_response(kind: FrameKind, command: u16, payload: &[u8]) -> Vec<u8> {
    let [hi, lo] = command.to_be_bytes();
    let mut frame = RESPONSE_PREFIX.to_vec();
    match kind {
        FrameKind::Modbus => frame.extend_from_slice(&[hi, lo]),
        FrameKind::Aa55 => frame.extend_from_slice(&[AA55_INVERTER, AA55_HOST, hi, lo]),
    }
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);

    let checksum = kind.checksum();
    let value = checksum.compute(&frame[kind.checksum_start()..]);
    frame.extend_from_slice(&checksum.to_bytes(value));
    frame
}
// }}}

#[cfg(test)]
mod tests {
    use super::*;

    const ES_RUNNING_DATA: Request = Request::Aa55 {
        control: 0x01,
        function: 0x06,
        payload: &[],
        reply_lens: &[133, 140],
    };

    const ET_RUNNING_DATA: Request = Request::Modbus {
        address: 0xF7,
        function: ModbusFunction::ReadHolding,
        register: 0x891C,
        count: 0x7D,
    };

    #[test]
    fn modbus_request_bytes() {
        assert_eq!(
            build_request(&ET_RUNNING_DATA),
            vec![0xF7, 0x03, 0x89, 0x1C, 0x00, 0x7D, 0x7A, 0xE7]
        );
    }

    #[test]
    fn aa55_request_bytes() {
        assert_eq!(
            build_request(&ES_RUNNING_DATA),
            vec![0xAA, 0x55, 0xC0, 0x7F, 0x01, 0x06, 0x00, 0x02, 0x45]
        );
    }

    #[test]
    fn expected_commands() {
        assert_eq!(ET_RUNNING_DATA.expected_command(), 0xF703);
        assert_eq!(ES_RUNNING_DATA.expected_command(), 0x0186);
    }

    #[test]
    fn reply_lengths() {
        assert!(ET_RUNNING_DATA.accepts_reply_len(250));
        assert!(!ET_RUNNING_DATA.accepts_reply_len(22));
        assert!(ES_RUNNING_DATA.accepts_reply_len(133));
        assert!(ES_RUNNING_DATA.accepts_reply_len(140));
        assert!(!ES_RUNNING_DATA.accepts_reply_len(76));
    }

    #[test]
    fn sum16_wraps() {
        let data = vec![0xFF; 300];
        assert_eq!(Checksum::Sum16.compute(&data), ((0xFF * 300) % 0x10000) as u16);
    }

    #[test]
    fn too_short() {
        assert!(matches!(
            validate_response(&[0xAA, 0x55, 0xF7]),
            Err(Error::TooShort { len: 3, .. })
        ));
        // looks like AA55 but cannot hold its header
        assert!(matches!(
            validate_response(&[0xAA, 0x55, 0x7F, 0xC0, 0x01, 0x86, 0x00, 0x00]),
            Err(Error::TooShort { len: 8, min: 9 })
        ));
    }

    #[test]
    fn bad_prefix() {
        let mut frame = build_response(FrameKind::Modbus, 0xF703, &[1, 2]);
        frame[0] = 0x55;
        assert!(matches!(
            validate_response(&frame),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn aa55_prefix_is_checked_after_the_sum() {
        // a frame whose sum was computed over a wrong prefix
        let mut frame = vec![0xAB, 0x55, 0x7F, 0xC0, 0x01, 0x86, 0x01, 0x09];
        let sum = Checksum::Sum16.compute(&frame);
        frame.extend_from_slice(&sum.to_be_bytes());

        assert!(matches!(
            validate_response(&frame),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn modbus_round_trip() {
        let payload = [0x01, 0x2C, 0xFF, 0xFF];
        let frame = build_response(FrameKind::Modbus, 0xF703, &payload);
        assert_eq!(frame.len(), payload.len() + 7);

        let r = validate_response(&frame).unwrap();
        assert_eq!(r.kind, FrameKind::Modbus);
        assert_eq!(r.command, 0xF703);
        assert_eq!(&r.payload[..], &payload);
    }

    #[test]
    fn aa55_round_trip() {
        let payload: Vec<u8> = (0..133).collect();
        let frame = build_response(FrameKind::Aa55, 0x0186, &payload);
        assert_eq!(frame.len(), payload.len() + 9);

        let r = validate_response(&frame).unwrap();
        assert_eq!(r.kind, FrameKind::Aa55);
        assert_eq!(r.command, 0x0186);
        assert_eq!(&r.payload[..], &payload[..]);
    }

    #[test]
    fn any_single_byte_corruption_is_caught() {
        let payload: Vec<u8> = (0..40u32).map(|i| (i * 7) as u8).collect();

        for kind in [FrameKind::Modbus, FrameKind::Aa55] {
            let frame = build_response(kind, 0x0186, &payload);
            // the AA55 sum covers the prefix too, the modbus CRC starts after it
            let first = match kind {
                FrameKind::Modbus => 2,
                FrameKind::Aa55 => 0,
            };
            for i in first..frame.len() - 2 {
                for flip in [0x01, 0x80, 0xFF] {
                    let mut corrupt = frame.clone();
                    corrupt[i] ^= flip;
                    assert!(
                        matches!(
                            validate_response(&corrupt),
                            Err(Error::ChecksumMismatch { .. })
                        ),
                        "{:?} corruption at {} (^{:#x}) not detected",
                        kind,
                        i,
                        flip
                    );
                }
            }
        }
    }

    #[test]
    fn length_byte_must_agree() {
        // well-formed checksum but a lying length byte
        let mut frame = RESPONSE_PREFIX.to_vec();
        frame.extend_from_slice(&[0xF7, 0x03, 0x04, 0x00, 0x01]);
        let crc = Checksum::Crc16Modbus.compute(&frame[2..]);
        frame.extend_from_slice(&crc.to_le_bytes());

        assert!(matches!(
            validate_response(&frame),
            Err(Error::LengthMismatch {
                declared: 4,
                actual: 2
            })
        ));
    }
}
