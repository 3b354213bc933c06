//! Bounded, ordered frame hand-off between parallel producers and one consumer.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::foundation::core::FrameIndex;
use crate::foundation::error::{MontageError, MontageResult};
use crate::render::FramePayload;

/// Frame producer. Must be idempotent per index and must not touch the timeline clock.
pub trait FramePull: Fn(FrameIndex) -> MontageResult<FramePayload> + Send + Sync {}

impl<F> FramePull for F where F: Fn(FrameIndex) -> MontageResult<FramePayload> + Send + Sync {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameStreamOpts {
    /// Maximum produced-but-unconsumed frames, in flight ones included.
    pub size: usize,
    /// Maximum concurrent producer calls.
    pub parallel: usize,
}

impl FrameStreamOpts {
    pub fn validate(&self) -> MontageResult<()> {
        if self.size == 0 {
            return Err(MontageError::validation("frame stream size must be >= 1"));
        }
        if self.parallel == 0 {
            return Err(MontageError::validation(
                "frame stream parallel must be >= 1",
            ));
        }
        Ok(())
    }
}

/// Peak occupancy observed by a [`FrameStream`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub delivered: u64,
    pub peak_in_flight: usize,
    pub peak_buffered: usize,
}

#[derive(Default)]
struct State {
    total: u64,
    next_claim: u64,
    next_deliver: u64,
    buffered: BTreeMap<u64, FramePayload>,
    in_flight: usize,
    workers: usize,
    closed: bool,
    error: Option<MontageError>,
    failed: bool,
    stats: StreamStats,
}

impl State {
    fn outstanding(&self) -> usize {
        self.buffered.len() + self.in_flight
    }
}

struct Shared {
    state: Mutex<State>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Workers never panic while holding the lock; producer panics are caught outside it.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        self.changed.wait(guard).unwrap_or_else(|p| p.into_inner())
    }
}

/// Backpressured frame pipeline.
///
/// Up to `parallel` workers claim frame indices in order and call the pull function. A worker
/// only claims when fewer than `size` frames are buffered or in flight. [`FrameStream::next_frame`]
/// hands frames out strictly in index order. A producer error is fatal: it is returned by the
/// next `next_frame` call and stops further claims.
pub struct FrameStream {
    opts: FrameStreamOpts,
    pull: Option<Arc<dyn FramePull>>,
    shared: Arc<Shared>,
    pool: Option<rayon::ThreadPool>,
}

impl FrameStream {
    pub fn new(opts: FrameStreamOpts) -> MontageResult<Self> {
        opts.validate()?;
        Ok(Self {
            opts,
            pull: None,
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                changed: Condvar::new(),
            }),
            pool: None,
        })
    }

    pub fn opts(&self) -> FrameStreamOpts {
        self.opts
    }

    pub fn add_pull_func<F>(&mut self, pull: F)
    where
        F: Fn(FrameIndex) -> MontageResult<FramePayload> + Send + Sync + 'static,
    {
        self.pull = Some(Arc::new(pull));
    }

    /// Spawn the workers for frames `0..total`.
    pub fn start(&mut self, total: u64) -> MontageResult<()> {
        if self.pool.is_some() {
            return Err(MontageError::state("frame stream already started"));
        }
        let pull = self
            .pull
            .clone()
            .ok_or_else(|| MontageError::state("frame stream has no pull function"))?;

        let workers = self.opts.parallel.min(total.max(1) as usize);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("montage-frame-{i}"))
            .build()
            .map_err(|e| MontageError::synthesis(format!("failed to build frame pool: {e}")))?;

        {
            let mut st = self.shared.lock();
            st.total = total;
            st.workers = workers;
        }
        for _ in 0..workers {
            let shared = self.shared.clone();
            let pull = pull.clone();
            let size = self.opts.size;
            pool.spawn(move || worker_loop(&shared, pull.as_ref(), size));
        }
        tracing::debug!(total, workers, size = self.opts.size, "frame stream started");
        self.pool = Some(pool);
        Ok(())
    }

    /// Next frame in index order, `None` once all frames were delivered or the stream was
    /// closed.
    pub fn next_frame(&self) -> MontageResult<Option<FramePayload>> {
        let mut st = self.shared.lock();
        loop {
            if let Some(err) = st.error.take() {
                st.closed = true;
                self.shared.changed.notify_all();
                return Err(err);
            }
            if st.failed {
                return Err(MontageError::synthesis("frame stream failed"));
            }
            if st.next_deliver >= st.total && self.pool.is_some() {
                return Ok(None);
            }
            let next = st.next_deliver;
            if let Some(frame) = st.buffered.remove(&next) {
                st.next_deliver += 1;
                st.stats.delivered += 1;
                self.shared.changed.notify_all();
                return Ok(Some(frame));
            }
            if st.closed {
                return Ok(None);
            }
            if self.pool.is_none() {
                return Err(MontageError::state("frame stream not started"));
            }
            st = self.shared.wait(st);
        }
    }

    /// Stop claiming new frames and wait for in-flight producers to return.
    pub fn close(&mut self) {
        let mut st = self.shared.lock();
        st.closed = true;
        self.shared.changed.notify_all();
        while st.workers > 0 {
            st = self.shared.wait(st);
        }
        st.buffered.clear();
        drop(st);
        self.pool = None;
    }

    pub fn stats(&self) -> StreamStats {
        self.shared.lock().stats
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        if self.pool.is_some() {
            self.close();
        }
    }
}

fn worker_loop(shared: &Shared, pull: &dyn FramePull, size: usize) {
    loop {
        let idx = {
            let mut st = shared.lock();
            loop {
                if st.closed || st.failed || st.next_claim >= st.total {
                    st.workers -= 1;
                    shared.changed.notify_all();
                    return;
                }
                if st.outstanding() < size {
                    break;
                }
                st = shared.wait(st);
            }
            let idx = st.next_claim;
            st.next_claim += 1;
            st.in_flight += 1;
            st.stats.peak_in_flight = st.stats.peak_in_flight.max(st.in_flight);
            idx
        };

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| pull(FrameIndex(idx))))
            .unwrap_or_else(|_| {
                Err(MontageError::synthesis(format!(
                    "frame producer panicked at frame {idx}"
                )))
            });

        let mut st = shared.lock();
        st.in_flight -= 1;
        match result {
            Ok(frame) => {
                st.buffered.insert(idx, frame);
                st.stats.peak_buffered = st.stats.peak_buffered.max(st.buffered.len());
            }
            Err(err) => {
                if !st.failed {
                    tracing::warn!(frame = idx, error = %err, "frame producer failed");
                    st.failed = true;
                    st.error = Some(err);
                }
            }
        }
        shared.changed.notify_all();
    }
}

impl crate::encode::synthesis::FrameSource for FrameStream {
    fn next_frame(&mut self) -> MontageResult<Option<FramePayload>> {
        FrameStream::next_frame(self)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/stream.rs"]
mod tests;
