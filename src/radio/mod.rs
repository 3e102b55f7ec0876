//! Radio back-end abstraction: what the receiver loop needs from a physical
//! or simulated IQ source, independent of the vendor SDK driving it.

#[cfg(feature = "hackrf")]
pub mod hackrf;

#[cfg(feature = "bladerf")]
pub mod bladerf;

pub mod replay;

use crate::error::Error;
use crate::ring::IqScalar;

/// A source of interleaved IQ samples tuned to a fixed advertising-channel
/// frequency.
///
/// `start` hands ownership of the callback to the back-end: depending on the
/// underlying SDK this may mean spawning a polling thread (as the `hackrf`
/// back-end does, since `hackrfone` exposes a pull-style API) or registering
/// a genuine vendor callback (as `bladerf`'s synchronous RX API does). Either
/// way, the callback's only side effect should be appending to a
/// [`crate::ring::Producer`].
pub trait RadioBackend {
    /// The back-end's native sample width.
    type Sample: IqScalar;

    /// Tunes to `freq_hz` and sets the receive gain. Back-ends interpret
    /// `gain` within their own supported range; validate with
    /// [`crate::phy::validate_gain`] before calling this.
    fn configure(&mut self, freq_hz: u64, gain: u8) -> Result<(), Error>;

    /// Starts streaming, invoking `on_samples` with each batch of newly
    /// captured samples until [`RadioBackend::stop`] is called.
    fn start(
        &mut self,
        on_samples: Box<dyn FnMut(&[Self::Sample]) + Send + 'static>,
    ) -> Result<(), Error>;

    /// Stops streaming and releases the device.
    fn stop(&mut self) -> Result<(), Error>;

    /// The maximum gain value `configure` accepts, for CLI validation.
    fn max_gain() -> u8
    where
        Self: Sized;
}
