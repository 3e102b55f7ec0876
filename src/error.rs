use std::fmt;

/// Errors produced by the receiver pipeline and its radio back-ends.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Channel number outside `0..=39`.
    InvalidChannel(i64),

    /// Gain value outside the back-end's supported range.
    InvalidGain { gain: i64, max: u8 },

    /// The configured radio device could not be found or opened.
    DeviceInit(String),

    /// A call into the radio back-end failed after the device was opened.
    Radio(String),

    /// A PDU's header or payload failed to parse or validate.
    Pdu(String),

    /// An I/O error occurred while reading or writing a capture file.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidChannel(ch) => {
                write!(f, "channel number must be within 0~39, got {}", ch)
            }
            Error::InvalidGain { gain, max } => {
                write!(f, "rx gain must be within 0~{}, got {}", max, gain)
            }
            Error::DeviceInit(msg) => write!(f, "failed to initialize radio device: {}", msg),
            Error::Radio(msg) => write!(f, "radio error: {}", msg),
            Error::Pdu(msg) => write!(f, "pdu error: {}", msg),
            Error::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
