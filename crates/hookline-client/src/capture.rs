//! Capture buffer: local mirror of a source-side capture log
//!
//! The source (a CAN bridge) assigns sequence numbers and evaluates filters.
//! The buffer keeps the highest seq it has seen as a cursor and asks only for
//! newer items, so the mirror never holds a seq twice.
//!
//! States: `Stopped → Running ⇄ Paused → Stopped`. Only a running buffer
//! polls.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hookline_core::{Filter, MailboxItem};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};
use crate::export::CaptureExport;
use crate::poll::PollTask;
use crate::report::Reporter;

/// Default number of items kept in the mirror
pub const DEFAULT_MAX_HISTORY: usize = 4096;

/// Default poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The side that owns the capture log
#[async_trait]
pub trait CaptureSource: Send + Sync {
    async fn set_log_enabled(&self, enabled: bool) -> ClientResult<()>;

    /// Empty the source-side log
    async fn clear(&self) -> ClientResult<()>;

    /// Items with seq greater than `seq`, oldest first
    async fn read_after(&self, seq: u64) -> ClientResult<Vec<MailboxItem>>;

    async fn set_filters(&self, filters: Vec<Filter>) -> ClientResult<()>;
}

#[async_trait]
impl<S: CaptureSource + ?Sized> CaptureSource for Arc<S> {
    async fn set_log_enabled(&self, enabled: bool) -> ClientResult<()> {
        (**self).set_log_enabled(enabled).await
    }

    async fn clear(&self) -> ClientResult<()> {
        (**self).clear().await
    }

    async fn read_after(&self, seq: u64) -> ClientResult<Vec<MailboxItem>> {
        (**self).read_after(seq).await
    }

    async fn set_filters(&self, filters: Vec<Filter>) -> ClientResult<()> {
        (**self).set_filters(filters).await
    }
}

/// Capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Stopped,
    Running,
    Paused,
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::Stopped => write!(f, "stopped"),
            CaptureState::Running => write!(f, "running"),
            CaptureState::Paused => write!(f, "paused"),
        }
    }
}

/// Construction-time capture settings
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Items kept in the mirror; oldest are dropped beyond this
    pub max_history: usize,
    pub poll_interval: Duration,
    /// When false, the buffer refuses to start
    pub enabled: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            enabled: true,
        }
    }
}

/// Local mirror of one capture source
pub struct CaptureBuffer<S> {
    source: S,
    options: CaptureOptions,
    state: CaptureState,
    /// Highest seq merged so far (0 before any)
    last_seq: u64,
    /// Most recent first
    history: VecDeque<MailboxItem>,
    total_captured: u64,
    filters: Vec<Filter>,
}

impl<S: CaptureSource> CaptureBuffer<S> {
    pub fn new(source: S, options: CaptureOptions) -> Self {
        Self {
            source,
            options,
            state: CaptureState::Stopped,
            last_seq: 0,
            history: VecDeque::new(),
            total_captured: 0,
            filters: Vec::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Items merged since the last `clear()`, including evicted ones
    pub fn total_captured(&self) -> u64 {
        self.total_captured
    }

    /// Filter set last accepted by the source
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Mirror, most recent first
    pub fn history(&self) -> &VecDeque<MailboxItem> {
        &self.history
    }

    /// Mirror, oldest first
    pub fn chronological(&self) -> impl Iterator<Item = &MailboxItem> {
        self.history.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Enable logging at the source and start polling
    pub async fn start(&mut self) -> ClientResult<()> {
        if !self.options.enabled {
            return Err(ClientError::validation("Capture is disabled by configuration"));
        }
        self.source.set_log_enabled(true).await?;
        self.state = CaptureState::Running;
        info!(cursor = self.last_seq, "Capture started");
        Ok(())
    }

    /// Disable logging at the source
    ///
    /// The cursor is kept: the source's seq never goes backwards, so a later
    /// `start()` continues after the last merged item.
    pub async fn stop(&mut self) -> ClientResult<()> {
        self.source.set_log_enabled(false).await?;
        self.state = CaptureState::Stopped;
        info!(cursor = self.last_seq, "Capture stopped");
        Ok(())
    }

    /// Stop polling without touching the source
    pub fn pause(&mut self) {
        if self.state == CaptureState::Running {
            self.state = CaptureState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == CaptureState::Paused {
            self.state = CaptureState::Running;
        }
    }

    /// Fetch and merge new items. Returns how many were added.
    ///
    /// Does nothing unless running.
    pub async fn poll(&mut self) -> ClientResult<usize> {
        if self.state != CaptureState::Running {
            return Ok(0);
        }
        let batch = self.source.read_after(self.last_seq).await?;
        Ok(self.merge(batch))
    }

    fn merge(&mut self, mut batch: Vec<MailboxItem>) -> usize {
        batch.sort_by_key(|item| item.seq);
        let mut added = 0;
        for item in batch {
            if item.seq <= self.last_seq {
                continue;
            }
            self.last_seq = item.seq;
            self.history.push_front(item);
            added += 1;
        }
        if added > 0 {
            self.total_captured += added as u64;
            self.truncate();
            debug!(added, cursor = self.last_seq, total = self.total_captured, "Merged capture batch");
        }
        added
    }

    fn truncate(&mut self) {
        self.history.truncate(self.options.max_history);
    }

    /// Empty the source and the mirror
    ///
    /// The mirror is only cleared once the source has confirmed.
    pub async fn clear(&mut self) -> ClientResult<()> {
        self.source.clear().await?;
        self.history.clear();
        self.last_seq = 0;
        self.total_captured = 0;
        info!("Capture cleared");
        Ok(())
    }

    /// Push a filter set to the source
    pub async fn set_filters(&mut self, filters: Vec<Filter>) -> ClientResult<()> {
        self.source.set_filters(filters.clone()).await?;
        self.filters = filters;
        Ok(())
    }

    /// Change the retention bound, dropping the oldest items now if needed
    pub fn set_max_history(&mut self, max_history: usize) {
        self.options.max_history = max_history;
        self.truncate();
    }

    /// Snapshot for export: active filters and the mirror, oldest first
    pub fn export(&self) -> CaptureExport {
        CaptureExport {
            filters: self.filters.clone(),
            packets: self.chronological().cloned().collect(),
        }
    }
}

/// Background poller for a shared capture buffer
///
/// Holds the buffer lock across each round trip, so merges never interleave
/// with `clear()` or `stop()` issued through the same lock. A failed poll is
/// reported and the next tick runs as usual. Dropping the monitor cancels
/// the timer.
pub struct CaptureMonitor {
    _task: PollTask,
}

impl CaptureMonitor {
    pub fn spawn<S>(buffer: Arc<Mutex<CaptureBuffer<S>>>, interval: Duration, reporter: Arc<dyn Reporter>) -> Self
    where
        S: CaptureSource + 'static,
    {
        let task = PollTask::spawn(interval, move || {
            let buffer = buffer.clone();
            let reporter = reporter.clone();
            async move {
                let mut buffer = buffer.lock().await;
                if let Err(e) = buffer.poll().await {
                    reporter.report("capture poll", &e);
                }
                true
            }
        });
        Self { _task: task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CollectingReporter;
    use hookline_core::{CanFrame, FrameId, RpcError};
    use parking_lot::Mutex as SyncMutex;
    use pretty_assertions::assert_eq;

    /// In-memory source with a scriptable failure switch
    #[derive(Default)]
    struct FakeSource {
        log: SyncMutex<Vec<MailboxItem>>,
        enabled: SyncMutex<Option<bool>>,
        fail: SyncMutex<bool>,
        reads: SyncMutex<Vec<u64>>,
        filters: SyncMutex<Vec<Filter>>,
    }

    impl FakeSource {
        fn push(&self, seq: u64) {
            self.log.lock().push(item(seq));
        }

        fn check(&self) -> ClientResult<()> {
            if *self.fail.lock() {
                Err(RpcError::Transport("bridge unplugged".into()).into())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CaptureSource for FakeSource {
        async fn set_log_enabled(&self, enabled: bool) -> ClientResult<()> {
            self.check()?;
            *self.enabled.lock() = Some(enabled);
            Ok(())
        }

        async fn clear(&self) -> ClientResult<()> {
            self.check()?;
            self.log.lock().clear();
            Ok(())
        }

        async fn read_after(&self, seq: u64) -> ClientResult<Vec<MailboxItem>> {
            self.check()?;
            self.reads.lock().push(seq);
            Ok(self.log.lock().iter().filter(|i| i.seq > seq).cloned().collect())
        }

        async fn set_filters(&self, filters: Vec<Filter>) -> ClientResult<()> {
            self.check()?;
            *self.filters.lock() = filters;
            Ok(())
        }
    }

    fn item(seq: u64) -> MailboxItem {
        MailboxItem {
            seq,
            raw: CanFrame::new(FrameId::new(6, 6, 1, 0, 1), seq as u32, vec![seq as u8]),
            decoded: None,
        }
    }

    fn buffer(max_history: usize) -> CaptureBuffer<Arc<FakeSource>> {
        CaptureBuffer::new(
            Arc::new(FakeSource::default()),
            CaptureOptions {
                max_history,
                ..Default::default()
            },
        )
    }

    fn seqs<S: CaptureSource>(buffer: &CaptureBuffer<S>) -> Vec<u64> {
        buffer.history().iter().map(|i| i.seq).collect()
    }

    #[tokio::test]
    async fn test_poll_merges_most_recent_first() {
        let mut buf = buffer(16);
        buf.start().await.unwrap();
        assert_eq!(*buf.source().enabled.lock(), Some(true));

        for seq in 1..=3 {
            buf.source().push(seq);
        }
        assert_eq!(buf.poll().await.unwrap(), 3);
        buf.source().push(4);
        assert_eq!(buf.poll().await.unwrap(), 1);
        assert_eq!(buf.poll().await.unwrap(), 0);

        assert_eq!(seqs(&buf), vec![4, 3, 2, 1]);
        assert_eq!(buf.total_captured(), 4);
        assert_eq!(*buf.source().reads.lock(), vec![0, 3, 4]);
        assert_eq!(buf.chronological().map(|i| i.seq).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_no_duplicates_from_overlapping_batches() {
        struct Overlapping;

        #[async_trait]
        impl CaptureSource for Overlapping {
            async fn set_log_enabled(&self, _: bool) -> ClientResult<()> {
                Ok(())
            }
            async fn clear(&self) -> ClientResult<()> {
                Ok(())
            }
            async fn read_after(&self, seq: u64) -> ClientResult<Vec<MailboxItem>> {
                // Misbehaving source: returns the cursor item again, out of order
                Ok(vec![item(seq + 2), item(seq), item(seq + 1)])
            }
            async fn set_filters(&self, _: Vec<Filter>) -> ClientResult<()> {
                Ok(())
            }
        }

        let mut buf = CaptureBuffer::new(Overlapping, CaptureOptions::default());
        buf.start().await.unwrap();
        for _ in 0..3 {
            buf.poll().await.unwrap();
        }
        let got: Vec<u64> = buf.chronological().map(|i| i.seq).collect();
        assert_eq!(got, vec![1, 2, 3, 4, 5, 6]);
        assert!(got.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_eviction_drops_oldest() {
        let mut buf = buffer(3);
        buf.start().await.unwrap();
        for seq in 1..=5 {
            buf.source().push(seq);
        }
        buf.poll().await.unwrap();

        assert_eq!(seqs(&buf), vec![5, 4, 3]);
        assert_eq!(buf.total_captured(), 5);

        buf.set_max_history(2);
        assert_eq!(seqs(&buf), vec![5, 4]);
        assert_eq!(buf.total_captured(), 5);
    }

    #[tokio::test]
    async fn test_pause_keeps_cursor_and_skips_polls() {
        let mut buf = buffer(16);
        buf.start().await.unwrap();
        buf.source().push(1);
        buf.poll().await.unwrap();

        buf.pause();
        assert_eq!(buf.state(), CaptureState::Paused);
        buf.source().push(2);
        assert_eq!(buf.poll().await.unwrap(), 0);
        assert_eq!(buf.source().reads.lock().len(), 1);

        buf.resume();
        assert_eq!(buf.poll().await.unwrap(), 1);
        assert_eq!(buf.last_seq(), 2);
    }

    #[tokio::test]
    async fn test_stop_then_restart_does_not_reread() {
        let mut buf = buffer(16);
        buf.start().await.unwrap();
        buf.source().push(1);
        buf.poll().await.unwrap();

        buf.stop().await.unwrap();
        assert_eq!(buf.state(), CaptureState::Stopped);
        assert_eq!(*buf.source().enabled.lock(), Some(false));
        assert_eq!(buf.poll().await.unwrap(), 0);

        buf.start().await.unwrap();
        buf.source().push(2);
        buf.poll().await.unwrap();
        assert_eq!(seqs(&buf), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_clear_resets_everything_together() {
        let mut buf = buffer(16);
        buf.start().await.unwrap();
        for seq in 1..=3 {
            buf.source().push(seq);
        }
        buf.poll().await.unwrap();

        buf.clear().await.unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.total_captured(), 0);
        assert_eq!(buf.last_seq(), 0);
        assert!(buf.source().log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_clear_keeps_local_state() {
        let mut buf = buffer(16);
        buf.start().await.unwrap();
        buf.source().push(1);
        buf.poll().await.unwrap();

        *buf.source().fail.lock() = true;
        assert!(buf.clear().await.is_err());
        assert_eq!(seqs(&buf), vec![1]);
        assert_eq!(buf.total_captured(), 1);
        assert_eq!(buf.last_seq(), 1);
    }

    #[tokio::test]
    async fn test_filters_recorded_only_on_success() {
        let mut buf = buffer(16);
        buf.set_filters(vec![Filter::DecodedOnly]).await.unwrap();
        assert_eq!(buf.filters(), &[Filter::DecodedOnly]);
        assert_eq!(*buf.source().filters.lock(), vec![Filter::DecodedOnly]);

        *buf.source().fail.lock() = true;
        assert!(buf.set_filters(vec![]).await.is_err());
        assert_eq!(buf.filters(), &[Filter::DecodedOnly]);
    }

    #[tokio::test]
    async fn test_disabled_capture_refuses_to_start() {
        let mut buf = CaptureBuffer::new(
            Arc::new(FakeSource::default()),
            CaptureOptions {
                enabled: false,
                ..Default::default()
            },
        );
        assert!(matches!(buf.start().await, Err(ClientError::Validation(_))));
        assert_eq!(*buf.source().enabled.lock(), None);
        assert_eq!(buf.state(), CaptureState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_survives_failed_polls() {
        let source = Arc::new(FakeSource::default());
        let shared = Arc::new(Mutex::new(CaptureBuffer::new(source.clone(), CaptureOptions::default())));
        shared.lock().await.start().await.unwrap();

        let reporter = Arc::new(CollectingReporter::new());
        let monitor = CaptureMonitor::spawn(shared.clone(), Duration::from_millis(50), reporter.clone());

        source.push(1);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(shared.lock().await.last_seq(), 1);

        *source.fail.lock() = true;
        tokio::time::sleep(Duration::from_millis(110)).await;
        assert!(reporter.len() >= 2);

        *source.fail.lock() = false;
        source.push(2);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(shared.lock().await.last_seq(), 2);

        drop(monitor);
        let reads = source.reads.lock().len();
        source.push(3);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(source.reads.lock().len(), reads);
    }
}
