//! Lock-free single-producer/single-consumer ring buffer for raw IQ samples.
//!
//! The producer (radio callback thread) appends samples and advances a
//! shared write offset; the consumer (receiver loop) reads contiguous slices
//! out of the buffer, including a trailing overlap region so that a read
//! window spanning the logical end of the buffer never has to wrap mid-slice.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Number of samples the main region of the ring buffer holds.
pub const LEN_BUF_IN_SAMPLE: usize = 8 * 4096;

/// Total number of IQ scalars (I and Q interleaved) the main region holds.
pub const LEN_BUF: usize = LEN_BUF_IN_SAMPLE * 2;

/// Maximum number of PHY bytes in one packet (preamble, access address,
/// header, payload up to 37 bytes, CRC).
pub const MAX_NUM_PHY_BYTE: usize = 47;

/// Scalars needed to hold `MAX_NUM_PHY_BYTE` bytes at 4 samples/symbol, IQ
/// interleaved.
pub const MAX_NUM_PHY_SAMPLE: usize = MAX_NUM_PHY_BYTE * 8 * 4;

/// Size of the trailing overlap region: twice the largest packet's sample
/// count, so a read window starting anywhere in the main region can always
/// read one full packet without wrapping.
pub const LEN_BUF_MAX_NUM_PHY_SAMPLE: usize = 2 * MAX_NUM_PHY_SAMPLE;

/// A scalar IQ sample type a radio back-end can produce.
pub trait IqScalar: Copy + Send + Sync + 'static {
    /// Widens this sample to a type large enough to hold cross-products
    /// without overflow.
    fn to_wide(self) -> i32;

    /// The additive identity, used to zero-fill buffers.
    fn zero() -> Self;

    /// Narrows a widened value back down, saturating at the type's range.
    /// Used by capture/replay, which store samples as plain decimal text
    /// regardless of back-end width.
    fn from_wide(value: i32) -> Self;
}

impl IqScalar for i8 {
    #[inline]
    fn to_wide(self) -> i32 {
        i32::from(self)
    }

    #[inline]
    fn zero() -> Self {
        0
    }

    #[inline]
    fn from_wide(value: i32) -> Self {
        value.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8
    }
}

impl IqScalar for i16 {
    #[inline]
    fn to_wide(self) -> i32 {
        i32::from(self)
    }

    #[inline]
    fn zero() -> Self {
        0
    }

    #[inline]
    fn from_wide(value: i32) -> Self {
        value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
    }
}

/// Which half of the main region the consumer is currently draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    FirstHalf,
    SecondHalf,
}

struct Shared<S: IqScalar> {
    buf: Box<[UnsafeCell<S>]>,
    write_offset: AtomicUsize,
}

// SAFETY: the producer only ever writes through `Producer::push`, the
// consumer only ever reads through `Consumer::slice_at`/`contiguous_len`, and
// the two never overlap in the region each is allowed to touch at a given
// `write_offset` value (the consumer never reads past the published offset).
unsafe impl<S: IqScalar> Sync for Shared<S> {}

/// Creates a linked producer/consumer pair over a freshly allocated ring of
/// `LEN_BUF + LEN_BUF_MAX_NUM_PHY_SAMPLE` scalars.
pub fn channel<S: IqScalar>() -> (Producer<S>, Consumer<S>) {
    let total = LEN_BUF + LEN_BUF_MAX_NUM_PHY_SAMPLE;
    let buf: Box<[UnsafeCell<S>]> = (0..total).map(|_| UnsafeCell::new(S::zero())).collect();
    let shared = Arc::new(Shared {
        buf,
        write_offset: AtomicUsize::new(0),
    });
    (
        Producer {
            shared: shared.clone(),
        },
        Consumer { shared },
    )
}

/// The radio callback's handle: appends samples and publishes the new write
/// offset with release ordering.
pub struct Producer<S: IqScalar> {
    shared: Arc<Shared<S>>,
}

// SAFETY: `Producer` never reads through the shared buffer, only writes to
// the region ahead of the published `write_offset`; sending it to a radio
// callback thread is sound.
unsafe impl<S: IqScalar> Send for Producer<S> {}

impl<S: IqScalar> Producer<S> {
    /// Appends `samples` to the ring, wrapping the write cursor within
    /// `LEN_BUF`. The callback this runs in must stay non-blocking, so this
    /// only ever copies `samples` itself; refreshing the trailing overlap
    /// mirror is the consumer's job (see [`Consumer::refresh_overlap`]),
    /// done once per half-buffer crossing rather than on every callback.
    ///
    /// `samples.len()` must not exceed `LEN_BUF`.
    pub fn push(&self, samples: &[S]) {
        debug_assert!(samples.len() <= LEN_BUF);

        let offset = self.shared.write_offset.load(Ordering::Relaxed);
        let start = offset % LEN_BUF;

        let first_len = samples.len().min(LEN_BUF - start);
        self.write_at(start, &samples[..first_len]);

        if first_len < samples.len() {
            self.write_at(0, &samples[first_len..]);
        }

        let new_offset = offset + samples.len();
        self.shared
            .write_offset
            .store(new_offset, Ordering::Release);
    }

    fn write_at(&self, start: usize, samples: &[S]) {
        for (i, &s) in samples.iter().enumerate() {
            // SAFETY: each index in `start..start+samples.len()` is written
            // by exactly one producer, never concurrently with a consumer
            // read of the same index (the consumer only reads behind the
            // previously published offset).
            unsafe {
                *self.shared.buf[start + i].get() = s;
            }
        }
    }
}

/// The receiver loop's handle: reads contiguous windows behind the published
/// write offset.
pub struct Consumer<S: IqScalar> {
    shared: Arc<Shared<S>>,
}

impl<S: IqScalar> Consumer<S> {
    /// The number of scalars the producer has published so far (monotonic,
    /// not wrapped).
    pub fn written(&self) -> usize {
        self.shared.write_offset.load(Ordering::Acquire)
    }

    /// Mirrors the first `LEN_BUF_MAX_NUM_PHY_SAMPLE` scalars of the main
    /// region into the trailing overlap slot, so a read window starting at
    /// `LEN_BUF / 2` can run past `LEN_BUF` without wrapping.
    ///
    /// Callers must invoke this exactly once per `SecondHalf -> FirstHalf`
    /// transition (see `receiver::run`), at which point the producer has
    /// already advanced well past this prefix for the current lap, so the
    /// bytes being mirrored are not concurrently written.
    pub fn refresh_overlap(&self) {
        for i in 0..LEN_BUF_MAX_NUM_PHY_SAMPLE {
            // SAFETY: the caller only invokes this once the producer has
            // moved past this prefix for the current lap (see above), and
            // the consumer is the only party that ever writes to the
            // overlap region `[LEN_BUF..LEN_BUF+LEN_BUF_MAX_NUM_PHY_SAMPLE)`.
            unsafe {
                let v = *self.shared.buf[i].get();
                *self.shared.buf[LEN_BUF + i].get() = v;
            }
        }
    }

    /// Returns a contiguous slice of `len` scalars starting at ring position
    /// `pos` (`0..LEN_BUF`), reading into the overlap region transparently
    /// when the window would otherwise wrap.
    ///
    /// Callers must ensure `pos + len` has already been published (i.e. is
    /// `<= written()` once un-wrapped), that the portion of the window past
    /// `LEN_BUF` does not exceed the `LEN_BUF_MAX_NUM_PHY_SAMPLE`-long
    /// overlap mirror, and that `pos < LEN_BUF`.
    pub fn slice_at(&self, pos: usize, len: usize) -> &[S] {
        debug_assert!(pos < LEN_BUF);
        debug_assert!(pos + len <= LEN_BUF + LEN_BUF_MAX_NUM_PHY_SAMPLE);

        // SAFETY: the caller guarantees `pos..pos+len` lies behind the
        // published write offset, so the producer will not write there
        // again until the consumer has moved past it; the overlap region
        // mirrors the wrapped-around prefix so this stays in-bounds and
        // contiguous even when `pos + len > LEN_BUF`.
        unsafe {
            let ptr = self.shared.buf.as_ptr().add(pos) as *const S;
            std::slice::from_raw_parts(ptr, len)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_read_back() {
        let (p, c) = channel::<i8>();
        let data: Vec<i8> = (0..64).map(|i| i as i8).collect();
        p.push(&data);
        assert_eq!(c.written(), 64);
        assert_eq!(c.slice_at(0, 64), &data[..]);
    }

    #[test]
    fn overlap_mirrors_wrapped_prefix() {
        let (p, c) = channel::<i8>();
        // Fill right up to the boundary, then push a little more so the
        // write wraps and the start of the main region holds new data.
        let prefix: Vec<i8> = (0..LEN_BUF).map(|i| (i % 7) as i8).collect();
        p.push(&prefix);
        let extra: Vec<i8> = (0..16).map(|i| (100 + i) as i8).collect();
        p.push(&extra);

        // Refreshing the overlap is the consumer's job, done once per
        // half-buffer crossing rather than on every `push`.
        c.refresh_overlap();

        // A read window straddling the LEN_BUF boundary should see the
        // wrapped-around new data contiguously via the overlap mirror.
        let window = c.slice_at(LEN_BUF - 8, 16);
        assert_eq!(&window[..8], &prefix[LEN_BUF - 8..]);
        assert_eq!(&window[8..], &extra[..8]);
    }
}
