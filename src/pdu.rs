//! Advertising-channel PDU header and payload decoding.
//!
//! Layout follows the Link Layer advertising channel PDU format: a 2-byte
//! header (4-bit PDU type, `TxAdd`/`RxAdd`, 6-bit payload length) followed by
//! a type-dependent payload of up to 37 bytes.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::Error;

/// Maximum payload length a header's 6-bit length field can express.
pub const MAX_PAYLOAD_LEN: usize = 37;

macro_rules! enum_with_unknown {
    (
        $(#[$attr:meta])*
        pub enum $name:ident($ty:ty) {
            $($(#[$variant_attr:meta])* $variant:ident = $value:expr),+ $(,)?
        }
    ) => {
        $(#[$attr])*
        pub enum $name {
            $($(#[$variant_attr])* $variant),+,
            /// A value not named by any known variant.
            Unknown($ty),
        }

        impl ::std::convert::From<$ty> for $name {
            fn from(value: $ty) -> Self {
                match value {
                    $($value => $name::$variant),+,
                    other => $name::Unknown(other),
                }
            }
        }

        impl ::std::convert::From<$name> for $ty {
            fn from(value: $name) -> Self {
                match value {
                    $($name::$variant => $value),+,
                    $name::Unknown(other) => other,
                }
            }
        }
    };
}

enum_with_unknown! {
    /// The four-bit PDU type field of an advertising-channel header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum PduType(u8) {
        AdvInd = 0,
        AdvDirectInd = 1,
        AdvNonconnInd = 2,
        ScanReq = 3,
        ScanRsp = 4,
        ConnectReq = 5,
        AdvScanInd = 6,
    }
}

/// The fixed 16-entry name table the reference sniffer prints PDU types
/// from: the seven named variants followed by `RESERVED0..RESERVED8` for
/// the nine unused type codes.
const PDU_TYPE_NAMES: [&str; 16] = [
    "ADV_IND",
    "ADV_DIRECT_IND",
    "ADV_NONCONN_IND",
    "SCAN_REQ",
    "SCAN_RSP",
    "CONNECT_REQ",
    "ADV_SCAN_IND",
    "RESERVED0",
    "RESERVED1",
    "RESERVED2",
    "RESERVED3",
    "RESERVED4",
    "RESERVED5",
    "RESERVED6",
    "RESERVED7",
    "RESERVED8",
];

impl fmt::Display for PduType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: u8 = (*self).into();
        f.write_str(PDU_TYPE_NAMES[value as usize & 0x0F])
    }
}

/// A decoded 2-byte advertising-channel PDU header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub pdu_type: PduType,
    pub tx_add_random: bool,
    pub rx_add_random: bool,
    pub length: u8,
}

impl Header {
    /// Decodes a header from its 2-byte wire representation.
    pub fn parse(bytes: [u8; 2]) -> Self {
        Header {
            pdu_type: PduType::from(bytes[0] & 0x0F),
            tx_add_random: bytes[0] & 0x40 != 0,
            rx_add_random: bytes[0] & 0x80 != 0,
            length: bytes[1] & 0x3F,
        }
    }
}

/// A 6-byte Link Layer device address, stored in the wire byte order
/// (least-significant byte first) but displayed most-significant-byte-first
/// as is conventional for MAC-style addresses.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DeviceAddress {
    bytes: [u8; 6],
    random: bool,
}

impl DeviceAddress {
    pub fn new(bytes: [u8; 6], random: bool) -> Self {
        DeviceAddress { bytes, random }
    }

    pub fn is_random(&self) -> bool {
        self.random
    }

    /// Renders the address as lowercase hex, most-significant-byte first
    /// (the reference sniffer's plain, separator-less address format).
    pub fn hex(&self) -> String {
        use std::fmt::Write as _;
        let mut s = String::with_capacity(12);
        for byte in self.bytes.iter().rev() {
            let _ = write!(s, "{:02x}", byte);
        }
        s
    }
}

impl fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.bytes.iter().rev().enumerate() {
            if i != 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        write!(f, " ({})", if self.random { "random" } else { "public" })
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The decoded body of an advertising-channel PDU, dispatched on PDU type.
#[derive(Debug)]
pub enum Payload<'a> {
    /// `ADV_IND` / `ADV_NONCONN_IND` / `ADV_SCAN_IND`: advertiser address
    /// plus arbitrary advertising data (AD structures, not decoded further).
    Adv { adv_a: DeviceAddress, adv_data: &'a [u8] },

    /// `ADV_DIRECT_IND`: advertiser address and the peer it targets.
    AdvDirect { adv_a: DeviceAddress, init_a: DeviceAddress },

    /// `SCAN_REQ`: scanner address and the advertiser being scanned.
    ScanReq { scan_a: DeviceAddress, adv_a: DeviceAddress },

    /// `SCAN_RSP`: advertiser address plus scan response data.
    ScanRsp { adv_a: DeviceAddress, scan_rsp_data: &'a [u8] },

    /// `CONNECT_REQ`: the full connection-setup parameter block.
    ConnectReq {
        init_a: DeviceAddress,
        adv_a: DeviceAddress,
        access_address: u32,
        crc_init: u32,
        win_size: u8,
        win_offset: u16,
        interval: u16,
        latency: u16,
        timeout: u16,
        channel_map: [u8; 5],
        hop: u8,
        sca: u8,
    },

    /// Any other PDU type: the undecoded payload bytes.
    Raw(&'a [u8]),
}

fn addr6(bytes: &[u8]) -> [u8; 6] {
    let mut a = [0u8; 6];
    a.copy_from_slice(&bytes[..6]);
    a
}

/// Parses `payload` (the bytes following the 2-byte header, `header.length`
/// long) according to `header.pdu_type`.
pub fn parse_payload<'a>(header: &Header, payload: &'a [u8]) -> Result<Payload<'a>, Error> {
    if payload.len() != header.length as usize {
        return Err(Error::Pdu(format!(
            "pdu length mismatch: header says {}, got {} bytes",
            header.length,
            payload.len()
        )));
    }

    match header.pdu_type {
        PduType::AdvInd | PduType::AdvNonconnInd | PduType::AdvScanInd => {
            if payload.len() < 6 {
                return Err(Error::Pdu("adv pdu shorter than AdvA".into()));
            }
            Ok(Payload::Adv {
                adv_a: DeviceAddress::new(addr6(payload), header.tx_add_random),
                adv_data: &payload[6..],
            })
        }
        PduType::AdvDirectInd => {
            if payload.len() != 12 {
                return Err(Error::Pdu("ADV_DIRECT_IND must be exactly 12 bytes".into()));
            }
            Ok(Payload::AdvDirect {
                adv_a: DeviceAddress::new(addr6(&payload[0..6]), header.tx_add_random),
                init_a: DeviceAddress::new(addr6(&payload[6..12]), header.rx_add_random),
            })
        }
        PduType::ScanReq => {
            if payload.len() != 12 {
                return Err(Error::Pdu("SCAN_REQ must be exactly 12 bytes".into()));
            }
            Ok(Payload::ScanReq {
                scan_a: DeviceAddress::new(addr6(&payload[0..6]), header.tx_add_random),
                adv_a: DeviceAddress::new(addr6(&payload[6..12]), header.rx_add_random),
            })
        }
        PduType::ScanRsp => {
            if payload.len() < 6 {
                return Err(Error::Pdu("SCAN_RSP shorter than AdvA".into()));
            }
            Ok(Payload::ScanRsp {
                adv_a: DeviceAddress::new(addr6(payload), header.tx_add_random),
                scan_rsp_data: &payload[6..],
            })
        }
        PduType::ConnectReq => {
            if payload.len() != 34 {
                return Err(Error::Pdu("CONNECT_REQ must be exactly 34 bytes".into()));
            }
            let init_a = DeviceAddress::new(addr6(&payload[0..6]), header.tx_add_random);
            let adv_a = DeviceAddress::new(addr6(&payload[6..12]), header.rx_add_random);
            let ll = &payload[12..34];
            let access_address = LittleEndian::read_u32(&ll[0..4]);
            // CRCInit is folded in wire order with the earliest byte ending
            // up most significant, unlike the little-endian WinOffset/
            // Interval/Latency/Timeout fields that follow it.
            let crc_init = u32::from(ll[4]) << 16 | u32::from(ll[5]) << 8 | u32::from(ll[6]);
            let win_size = ll[7];
            let win_offset = LittleEndian::read_u16(&ll[8..10]);
            let interval = LittleEndian::read_u16(&ll[10..12]);
            let latency = LittleEndian::read_u16(&ll[12..14]);
            let timeout = LittleEndian::read_u16(&ll[14..16]);
            let mut channel_map = [0u8; 5];
            channel_map.copy_from_slice(&ll[16..21]);
            channel_map.reverse();
            let hop_sca = ll[21];

            Ok(Payload::ConnectReq {
                init_a,
                adv_a,
                access_address,
                crc_init,
                win_size,
                win_offset,
                interval,
                latency,
                timeout,
                channel_map,
                hop: hop_sca & 0x1F,
                sca: hop_sca >> 5,
            })
        }
        PduType::Unknown(_) => Ok(Payload::Raw(payload)),
    }
}

/// Renders a decoded PDU as the single console line the reference sniffer
/// prints per packet:
///
/// ```text
/// <time_diff_us>us Pkt<n> Ch<c> AA:8E89BED6 PDU_t<t>:<NAME> T<tx> R<rx> PloadL<len> <fields> CRC<0|1>
/// ```
///
/// `time_diff_us` is the microsecond gap since the previous printed packet
/// (0 for the first), `pkt_num` a 1-based running count, and `crc_ok` gates
/// only the trailing `CRC0`/`CRC1` marker — an invalid CRC is still printed.
pub fn format_line(
    time_diff_us: i64,
    pkt_num: u64,
    channel: u8,
    header: &Header,
    payload: &Payload<'_>,
    crc_ok: bool,
) -> String {
    use std::fmt::Write;

    let pdu_type: u8 = header.pdu_type.into();
    let mut out = String::new();
    let _ = write!(
        out,
        "{}us Pkt{} Ch{} AA:8E89BED6 PDU_t{}:{} T{} R{} PloadL{} ",
        time_diff_us,
        pkt_num,
        channel,
        pdu_type,
        header.pdu_type,
        header.tx_add_random as u8,
        header.rx_add_random as u8,
        header.length,
    );

    match payload {
        Payload::Adv { adv_a, adv_data } => {
            let _ = write!(out, "AdvA:{} Data:{}", adv_a.hex(), HexSlice(adv_data));
        }
        Payload::AdvDirect { adv_a, init_a } => {
            let _ = write!(out, "A0:{} A1:{}", adv_a.hex(), init_a.hex());
        }
        Payload::ScanReq { scan_a, adv_a } => {
            let _ = write!(out, "A0:{} A1:{}", scan_a.hex(), adv_a.hex());
        }
        Payload::ScanRsp { adv_a, scan_rsp_data } => {
            let _ = write!(out, "AdvA:{} Data:{}", adv_a.hex(), HexSlice(scan_rsp_data));
        }
        Payload::ConnectReq {
            init_a,
            adv_a,
            access_address,
            crc_init,
            win_size,
            win_offset,
            interval,
            latency,
            timeout,
            channel_map,
            hop,
            sca,
        } => {
            let _ = write!(
                out,
                "InitA:{} AdvA:{} AA:{:08x} CRCInit:{:06x} WSize:{} WOffset:{} \
                 Interval:{} Latency:{} Timeout:{} ChM:{} Hop:{} SCA:{}",
                init_a.hex(),
                adv_a.hex(),
                access_address,
                crc_init,
                win_size,
                win_offset,
                interval,
                latency,
                timeout,
                HexSlice(channel_map),
                hop,
                sca
            );
        }
        Payload::Raw(bytes) => {
            let _ = write!(out, "Byte:{}", HexSlice(bytes));
        }
    }

    let _ = write!(out, " CRC{}", if crc_ok { 0 } else { 1 });
    out
}

struct HexSlice<'a>(&'a [u8]);

impl fmt::Display for HexSlice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_parses_type_and_length() {
        // type=0 (ADV_IND), TxAdd=1, RxAdd=0, length=9
        let header = Header::parse([0b0100_0000, 9]);
        assert_eq!(header.pdu_type, PduType::AdvInd);
        assert!(header.tx_add_random);
        assert!(!header.rx_add_random);
        assert_eq!(header.length, 9);
    }

    #[test]
    fn unknown_pdu_type_round_trips() {
        let header = Header::parse([0x0F, 0]);
        assert_eq!(header.pdu_type, PduType::Unknown(0x0F));
        assert_eq!(format!("{}", header.pdu_type), "RESERVED8");
    }

    #[test]
    fn adv_ind_payload_splits_address_and_data() {
        let header = Header::parse([0x00, 9]);
        let payload = [1, 2, 3, 4, 5, 6, 0xAA, 0xBB, 0xCC];
        let decoded = parse_payload(&header, &payload).unwrap();
        match decoded {
            Payload::Adv { adv_data, .. } => assert_eq!(adv_data, &[0xAA, 0xBB, 0xCC]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn connect_req_splits_hop_and_sca() {
        let header = Header::parse([0x05, 34]);
        let mut payload = [0u8; 34];
        payload[12..16].copy_from_slice(&0x8E89BED6u32.to_le_bytes());
        payload[33] = 0b101_00011; // SCA=5, Hop=3
        let decoded = parse_payload(&header, &payload).unwrap();
        match decoded {
            Payload::ConnectReq { hop, sca, access_address, .. } => {
                assert_eq!(hop, 3);
                assert_eq!(sca, 5);
                assert_eq!(access_address, 0x8E89BED6);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let header = Header::parse([0x00, 10]);
        assert!(parse_payload(&header, &[0u8; 9]).is_err());
    }

    #[test]
    fn connect_req_full_field_round_trip() {
        // Round-trip scenario 6 from the specification.
        let header = Header::parse([0x05, 34]);
        let mut payload = [0u8; 34];
        payload[12..16].copy_from_slice(&0x50655DABu32.to_le_bytes());
        payload[16] = 0x12; // CRCInit 0x123456, earliest byte most significant
        payload[17] = 0x34;
        payload[18] = 0x56;
        payload[19] = 3; // WinSize
        payload[20..22].copy_from_slice(&5u16.to_le_bytes()); // WinOffset
        payload[22..24].copy_from_slice(&40u16.to_le_bytes()); // Interval
        payload[24..26].copy_from_slice(&0u16.to_le_bytes()); // Latency
        payload[26..28].copy_from_slice(&500u16.to_le_bytes()); // Timeout
        payload[28..33].copy_from_slice(&[0x1F, 0xFF, 0xFF, 0xFF, 0xFF]); // ChM, earliest byte last printed
        payload[33] = 0x49; // SCA=2, Hop=9

        let decoded = parse_payload(&header, &payload).unwrap();
        match decoded {
            Payload::ConnectReq {
                access_address,
                crc_init,
                win_size,
                win_offset,
                interval,
                latency,
                timeout,
                channel_map,
                hop,
                sca,
                ..
            } => {
                assert_eq!(access_address, 0x50655DAB);
                assert_eq!(crc_init, 0x123456);
                assert_eq!(win_size, 3);
                assert_eq!(win_offset, 5);
                assert_eq!(interval, 40);
                assert_eq!(latency, 0);
                assert_eq!(timeout, 500);
                assert_eq!(channel_map, [0xFF, 0xFF, 0xFF, 0xFF, 0x1F]);
                assert_eq!(hop, 9);
                assert_eq!(sca, 2);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn format_line_matches_reference_adv_ind_output() {
        // Round-trip scenario 5 from the specification.
        let header = Header::parse([0x00, 6]);
        let payload: [u8; 6] = [0xAB, 0x89, 0x67, 0x45, 0x23, 0x01];
        let decoded = parse_payload(&header, &payload).unwrap();
        let line = format_line(0, 1, 37, &header, &decoded, true);
        assert_eq!(
            line,
            "0us Pkt1 Ch37 AA:8E89BED6 PDU_t0:ADV_IND T0 R0 PloadL6 AdvA:0123456789ab Data: CRC0"
        );
    }
}
