//! A file-backed "radio" that replays a capture instead of streaming from
//! hardware, so the receive pipeline can be exercised deterministically
//! without an SDR attached. Drives the exact same [`RadioBackend`] contract
//! real back-ends do; `configure` is a no-op beyond remembering the channel,
//! since a capture file has no tunable frequency or gain.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::capture;
use crate::error::Error;
use crate::radio::RadioBackend;
use crate::ring::IqScalar;

/// Scalars handed to the callback per chunk; arbitrary, chosen to match a
/// real back-end's typical USB transfer size.
const CHUNK_LEN: usize = 8 * 4096 * 2;

/// Replays a previously captured sample file as if it were a live radio.
pub struct Replay<S: IqScalar> {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    _sample: std::marker::PhantomData<S>,
}

impl<S: IqScalar> Replay<S> {
    pub fn new(path: PathBuf) -> Self {
        Replay {
            path,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            _sample: std::marker::PhantomData,
        }
    }
}

impl<S: IqScalar> RadioBackend for Replay<S> {
    type Sample = S;

    /// No-op: a capture file has no frequency or gain to set.
    fn configure(&mut self, _freq_hz: u64, _gain: u8) -> Result<(), Error> {
        Ok(())
    }

    fn start(
        &mut self,
        mut on_samples: Box<dyn FnMut(&[Self::Sample]) + Send + 'static>,
    ) -> Result<(), Error> {
        let path = self.path.clone();
        let stop = Arc::clone(&self.stop);
        stop.store(false, Ordering::Relaxed);

        self.worker = Some(std::thread::spawn(move || {
            let result = capture::replay_file::<S>(&path, CHUNK_LEN, |chunk| {
                if !stop.load(Ordering::Relaxed) {
                    on_samples(chunk);
                }
            });
            if let Err(e) = result {
                log::error!("replay of {} failed: {}", path.display(), e);
            }
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
        u8::MAX
    }
}
