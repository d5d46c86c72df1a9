use bytes::Bytes;
use futures_util::stream::Stream;
use spin::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// One byte-level observation of an in-flight submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub loaded: u64,
    pub total: u64,
}

impl ProgressEvent {
    /// Completion percentage, rounded down; `0` when the total is unknown.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            0
        } else {
            (self.loaded.min(self.total) * 100 / self.total) as u8
        }
    }
}

/// The terminal `{status, body}` of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatus {
    pub status: u16,
    pub body: String,
}

/// Receives byte-level progress and the terminal result of one submission.
pub trait ProgressObserver: Send {
    fn transfer_progress(&mut self, event: ProgressEvent);
    fn transfer_complete(&mut self, status: &TransferStatus);
}

/// Fans transport send-progress out to subscribed observers.
///
/// One channel covers one submission; a concurrent submission gets its own,
/// unrelated channel. `loaded` only ever grows, so the derived percentage is
/// monotonically non-decreasing. Everything runs on the submitting task; the
/// surrounding lock exists only to satisfy the transport's `Send` bounds.
#[derive(Default)]
pub struct ProgressChannel {
    total: u64,
    loaded: u64,
    percent: u8,
    next_subscription: usize,
    observers: Vec<(usize, Box<dyn ProgressObserver>)>,
    last_status: Option<TransferStatus>,
}

impl ProgressChannel {
    pub fn new(total: u64) -> ProgressChannel {
        ProgressChannel {
            total,
            ..ProgressChannel::default()
        }
    }

    /// Registers an observer; returns a token for [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let subscription = self.next_subscription;
        self.next_subscription += 1;
        self.observers.push((subscription, observer));
        subscription
    }

    pub fn unsubscribe(&mut self, subscription: usize) {
        self.observers.retain(|(token, _)| *token != subscription);
    }

    /// Restarts the channel for a submission of `total` bytes.
    pub fn set_total(&mut self, total: u64) {
        self.total = total;
        self.loaded = 0;
        self.percent = 0;
        self.last_status = None;
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn status(&self) -> Option<&TransferStatus> {
        self.last_status.as_ref()
    }

    /// Accounts `bytes` more sent and notifies observers.
    pub fn record(&mut self, bytes: u64) {
        self.loaded = self.loaded.saturating_add(bytes);

        let event = ProgressEvent {
            loaded: self.loaded,
            total: self.total,
        };

        let percent = event.percent();
        if percent > self.percent {
            self.percent = percent;
        }

        for (_, observer) in &mut self.observers {
            observer.transfer_progress(event);
        }
    }

    /// Surfaces the terminal response to observers.
    pub fn complete(&mut self, status: TransferStatus) {
        for (_, observer) in &mut self.observers {
            observer.transfer_complete(&status);
        }
        self.last_status = Some(status);
    }
}

/// Wraps a body stream and records every chunk the transport pulls from it
/// into a [`ProgressChannel`].
pub struct TrackedStream<S> {
    inner: S,
    channel: Arc<Mutex<ProgressChannel>>,
}

impl<S> TrackedStream<S> {
    pub fn new(inner: S, channel: Arc<Mutex<ProgressChannel>>) -> TrackedStream<S> {
        TrackedStream { inner, channel }
    }
}

impl<S, E> Stream for TrackedStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.channel.lock().record(chunk.len() as u64);
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream::{self, StreamExt};

    #[derive(Default)]
    struct Recorder {
        percents: Arc<Mutex<Vec<u8>>>,
        terminal: Arc<Mutex<Option<TransferStatus>>>,
    }

    impl ProgressObserver for Recorder {
        fn transfer_progress(&mut self, event: ProgressEvent) {
            self.percents.lock().push(event.percent());
        }

        fn transfer_complete(&mut self, status: &TransferStatus) {
            *self.terminal.lock() = Some(status.clone());
        }
    }

    #[test]
    fn test_percent_is_monotonic() {
        let percents = Arc::new(Mutex::new(Vec::new()));
        let mut channel = ProgressChannel::new(10);
        channel.subscribe(Box::new(Recorder {
            percents: Arc::clone(&percents),
            ..Recorder::default()
        }));

        channel.record(3);
        channel.record(3);
        channel.record(4);

        let seen = percents.lock().clone();
        assert_eq!(seen, vec![30, 60, 100]);
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(channel.percent(), 100);
    }

    #[test]
    fn test_zero_total_reports_zero_percent() {
        let mut channel = ProgressChannel::new(0);
        channel.record(42);
        assert_eq!(channel.percent(), 0);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let mut channel = ProgressChannel::new(4);
        let token = channel.subscribe(Box::new(Recorder {
            percents: Arc::clone(&first),
            ..Recorder::default()
        }));
        channel.subscribe(Box::new(Recorder {
            percents: Arc::clone(&second),
            ..Recorder::default()
        }));

        channel.record(2);
        channel.unsubscribe(token);
        channel.record(2);

        assert_eq!(first.lock().len(), 1);
        assert_eq!(second.lock().len(), 2);
    }

    #[test]
    fn test_complete_reaches_observers() {
        let terminal = Arc::new(Mutex::new(None));
        let mut channel = ProgressChannel::new(1);
        channel.subscribe(Box::new(Recorder {
            terminal: Arc::clone(&terminal),
            ..Recorder::default()
        }));

        channel.complete(TransferStatus {
            status: 201,
            body: "1 file(s) uploaded".to_owned(),
        });

        assert_eq!(terminal.lock().as_ref().map(|status| status.status), Some(201));
        assert_eq!(channel.status().map(|status| status.status), Some(201));
    }

    #[tokio::test]
    async fn test_tracked_stream_records_pulled_chunks() {
        let channel = Arc::new(Mutex::new(ProgressChannel::new(9)));
        let chunks: Vec<Result<Bytes, std::convert::Infallible>> =
            vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"defghi"))];

        let mut tracked = TrackedStream::new(stream::iter(chunks), Arc::clone(&channel));

        assert_eq!(tracked.next().await.unwrap().unwrap().len(), 3);
        assert_eq!(channel.lock().percent(), 33);
        assert_eq!(tracked.next().await.unwrap().unwrap().len(), 6);
        assert_eq!(channel.lock().percent(), 100);
        assert!(tracked.next().await.is_none());
    }
}
