//! CRC-24 validation for BLE advertising-channel PDUs.
//!
//! The CRC polynomial is `x^24 + x^10 + x^9 + x^6 + x^4 + x^3 + x + 1`, the
//! one used throughout the Link Layer (see `rubble::link::CRC_POLY` for the
//! bit-indexed form of the same polynomial). Advertising-channel packets seed
//! the CRC with the wire value `0x555555`, which after BLE's LSb-first byte
//! order becomes `0xAAAAAA` in the byte order this table-driven
//! implementation operates on.

/// Seed value for CRC-24 over advertising-channel PDUs.
pub const ADV_CRC_INIT: u32 = 0xAAAAAA;

// Ported byte-for-byte from the reference receiver's `crc_table[256]`
// literal, which encodes the BLE-specific reflected form of the CRC-24
// polynomial in the byte order `crc_update` operates on.
static CRC_TABLE: [u32; 256] = [
    0x000000, 0x01b4c0, 0x036980, 0x02dd40, 0x06d300, 0x0767c0, 0x05ba80, 0x040e40, 0x0da600,
    0x0c12c0, 0x0ecf80, 0x0f7b40, 0x0b7500, 0x0ac1c0, 0x081c80, 0x09a840, 0x1b4c00, 0x1af8c0,
    0x182580, 0x199140, 0x1d9f00, 0x1c2bc0, 0x1ef680, 0x1f4240, 0x16ea00, 0x175ec0, 0x158380,
    0x143740, 0x103900, 0x118dc0, 0x135080, 0x12e440, 0x369800, 0x372cc0, 0x35f180, 0x344540,
    0x304b00, 0x31ffc0, 0x332280, 0x329640, 0x3b3e00, 0x3a8ac0, 0x385780, 0x39e340, 0x3ded00,
    0x3c59c0, 0x3e8480, 0x3f3040, 0x2dd400, 0x2c60c0, 0x2ebd80, 0x2f0940, 0x2b0700, 0x2ab3c0,
    0x286e80, 0x29da40, 0x207200, 0x21c6c0, 0x231b80, 0x22af40, 0x26a100, 0x2715c0, 0x25c880,
    0x247c40, 0x6d3000, 0x6c84c0, 0x6e5980, 0x6fed40, 0x6be300, 0x6a57c0, 0x688a80, 0x693e40,
    0x609600, 0x6122c0, 0x63ff80, 0x624b40, 0x664500, 0x67f1c0, 0x652c80, 0x649840, 0x767c00,
    0x77c8c0, 0x751580, 0x74a140, 0x70af00, 0x711bc0, 0x73c680, 0x727240, 0x7bda00, 0x7a6ec0,
    0x78b380, 0x790740, 0x7d0900, 0x7cbdc0, 0x7e6080, 0x7fd440, 0x5ba800, 0x5a1cc0, 0x58c180,
    0x597540, 0x5d7b00, 0x5ccfc0, 0x5e1280, 0x5fa640, 0x560e00, 0x57bac0, 0x556780, 0x54d340,
    0x50dd00, 0x5169c0, 0x53b480, 0x520040, 0x40e400, 0x4150c0, 0x438d80, 0x423940, 0x463700,
    0x4783c0, 0x455e80, 0x44ea40, 0x4d4200, 0x4cf6c0, 0x4e2b80, 0x4f9f40, 0x4b9100, 0x4a25c0,
    0x48f880, 0x494c40, 0xda6000, 0xdbd4c0, 0xd90980, 0xd8bd40, 0xdcb300, 0xdd07c0, 0xdfda80,
    0xde6e40, 0xd7c600, 0xd672c0, 0xd4af80, 0xd51b40, 0xd11500, 0xd0a1c0, 0xd27c80, 0xd3c840,
    0xc12c00, 0xc098c0, 0xc24580, 0xc3f140, 0xc7ff00, 0xc64bc0, 0xc49680, 0xc52240, 0xcc8a00,
    0xcd3ec0, 0xcfe380, 0xce5740, 0xca5900, 0xcbedc0, 0xc93080, 0xc88440, 0xecf800, 0xed4cc0,
    0xef9180, 0xee2540, 0xea2b00, 0xeb9fc0, 0xe94280, 0xe8f640, 0xe15e00, 0xe0eac0, 0xe23780,
    0xe38340, 0xe78d00, 0xe639c0, 0xe4e480, 0xe55040, 0xf7b400, 0xf600c0, 0xf4dd80, 0xf56940,
    0xf16700, 0xf0d3c0, 0xf20e80, 0xf3ba40, 0xfa1200, 0xfba6c0, 0xf97b80, 0xf8cf40, 0xfcc100,
    0xfd75c0, 0xffa880, 0xfe1c40, 0xb75000, 0xb6e4c0, 0xb43980, 0xb58d40, 0xb18300, 0xb037c0,
    0xb2ea80, 0xb35e40, 0xbaf600, 0xbb42c0, 0xb99f80, 0xb82b40, 0xbc2500, 0xbd91c0, 0xbf4c80,
    0xbef840, 0xac1c00, 0xada8c0, 0xaf7580, 0xaec140, 0xaacf00, 0xab7bc0, 0xa9a680, 0xa81240,
    0xa1ba00, 0xa00ec0, 0xa2d380, 0xa36740, 0xa76900, 0xa6ddc0, 0xa40080, 0xa5b440, 0x81c800,
    0x807cc0, 0x82a180, 0x831540, 0x871b00, 0x86afc0, 0x847280, 0x85c640, 0x8c6e00, 0x8ddac0,
    0x8f0780, 0x8eb340, 0x8abd00, 0x8b09c0, 0x89d480, 0x886040, 0x9a8400, 0x9b30c0, 0x99ed80,
    0x985940, 0x9c5700, 0x9de3c0, 0x9f3e80, 0x9e8a40, 0x972200, 0x9696c0, 0x944b80, 0x95ff40,
    0x91f100, 0x9045c0, 0x929880, 0x932c40,
];

/// Updates a running CRC-24 value with the bytes in `data`.
///
/// Splitting a message into multiple `crc_update` calls with the running
/// value threaded through produces the same result as one call over the
/// concatenated bytes, since the table-driven update only ever looks at the
/// low byte of `crc` and the next input byte.
pub fn crc_update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        let idx = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (CRC_TABLE[idx] ^ (crc >> 8)) & 0xFF_FFFF;
    }
    crc
}

/// Computes the CRC-24 of `data`, seeded with `init`.
pub fn crc24(data: &[u8], init: u32) -> u32 {
    crc_update(init, data)
}

/// Returns whether `header_and_payload` (2-byte header + payload, *not*
/// including the CRC trailer) matches the little-endian 3-byte CRC in
/// `crc_trailer`.
pub fn check(header_and_payload: &[u8], crc_trailer: [u8; 3]) -> bool {
    let computed = crc24(header_and_payload, ADV_CRC_INIT);
    let received =
        u32::from(crc_trailer[0]) | u32::from(crc_trailer[1]) << 8 | u32::from(crc_trailer[2]) << 16;
    computed == received
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_header_crc() {
        // Round-trip scenario 1 from the specification.
        let crc = crc24(&[0x00, 0x00], ADV_CRC_INIT);
        assert_eq!(crc, 0xC6_8A_5C);
        assert!(check(&[0x00, 0x00], [0x5C, 0x8A, 0xC6]));
    }

    #[test]
    fn mismatch_is_detected() {
        assert!(!check(&[0x00, 0x00], [0x00, 0x00, 0x00]));
    }

    #[test]
    fn split_call_matches_single_call() {
        let whole = crc24(&[0xAA, 0xBB, 0xCC, 0xDD], ADV_CRC_INIT);
        let split = crc_update(
            crc_update(ADV_CRC_INIT, &[0xAA, 0xBB]),
            &[0xCC, 0xDD],
        );
        assert_eq!(whole, split);
    }
}
