//! Advertising-channel numbering and per-back-end gain ranges.

use crate::error::Error;

/// Number of BLE advertising + data channels (0..=39).
pub const NUM_CHANNELS: u8 = 40;

/// Maps a BLE RF channel number (0..=39) to its center frequency in Hz.
///
/// Channels 0..=10 sit at 2404..2424 MHz in 2 MHz steps; channel 11 jumps to
/// 2428 MHz; channels 12..=36 continue the 2 MHz progression up to 2478 MHz;
/// channels 37..=39 are the three advertising channels at 2402, 2426 and
/// 2480 MHz. The advertising channels are interleaved with the data channel
/// numbering this way so that, read in RF-channel order, channel 37 precedes
/// the first data block, 38 sits in the middle, and 39 follows the last.
pub fn freq_for_channel(channel: u8) -> Result<u64, Error> {
    if channel >= NUM_CHANNELS {
        return Err(Error::InvalidChannel(i64::from(channel)));
    }

    let mhz: u16 = match channel {
        37 => 2402,
        0..=10 => 2404 + 2 * u16::from(channel),
        38 => 2426,
        11..=36 => 2428 + 2 * (u16::from(channel) - 11),
        39 => 2480,
        _ => unreachable!(),
    };

    Ok(u64::from(mhz) * 1_000_000)
}

/// Validates `gain` against the back-end's supported VGA gain range and
/// returns it as `u8` on success.
pub fn validate_gain(gain: i64, max: u8) -> Result<u8, Error> {
    if gain < 0 || gain > i64::from(max) {
        return Err(Error::InvalidGain { gain, max });
    }
    Ok(gain as u8)
}

/// Validates a channel number supplied on the command line.
pub fn validate_channel(channel: i64) -> Result<u8, Error> {
    if channel < 0 || channel >= i64::from(NUM_CHANNELS) {
        return Err(Error::InvalidChannel(channel));
    }
    Ok(channel as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertising_channels_at_expected_frequencies() {
        assert_eq!(freq_for_channel(37).unwrap(), 2_402_000_000);
        assert_eq!(freq_for_channel(38).unwrap(), 2_426_000_000);
        assert_eq!(freq_for_channel(39).unwrap(), 2_480_000_000);
    }

    #[test]
    fn data_channels_step_by_two_mhz() {
        assert_eq!(freq_for_channel(0).unwrap(), 2_404_000_000);
        assert_eq!(freq_for_channel(10).unwrap(), 2_424_000_000);
        assert_eq!(freq_for_channel(11).unwrap(), 2_428_000_000);
        assert_eq!(freq_for_channel(36).unwrap(), 2_478_000_000);
    }

    #[test]
    fn out_of_range_channel_is_rejected() {
        assert!(freq_for_channel(40).is_err());
    }

    #[test]
    fn gain_validation() {
        assert_eq!(validate_gain(10, 62).unwrap(), 10);
        assert!(validate_gain(-1, 62).is_err());
        assert!(validate_gain(63, 62).is_err());
    }
}
