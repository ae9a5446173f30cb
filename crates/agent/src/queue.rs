//! Event queue between a running turn and whoever streams it out.
//!
//! The producer side never blocks. The consumer waits on the channel and
//! stops at the first `Done`, when every sender is gone, or when its
//! cancellation token fires.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::Stream;
use kbchat_core::stream::{StreamEvent, TokenFragment};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Create a connected sender/receiver pair.
pub fn event_queue() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = EventSender {
        tx,
        done: Arc::new(AtomicBool::new(false)),
    };
    let receiver = EventReceiver {
        rx,
        cancel: None,
        saw_done: false,
    };
    (sender, receiver)
}

/// Producer end. Clones share the same `Done` latch.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<StreamEvent>,
    done: Arc<AtomicBool>,
}

impl EventSender {
    /// Enqueue an event. Returns false when it was not delivered: the turn is
    /// already done or the consumer has gone away.
    pub fn push(&self, event: StreamEvent) -> bool {
        if self.done.load(Ordering::Acquire) {
            return false;
        }
        if matches!(event, StreamEvent::Done) && self.done.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    pub fn token(&self, fragment: TokenFragment) -> bool {
        self.push(StreamEvent::Token(fragment))
    }

    pub fn step_end(&self) -> bool {
        self.push(StreamEvent::StepEnd)
    }

    pub fn done(&self) -> bool {
        self.push(StreamEvent::Done)
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// True once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer end.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    cancel: Option<CancellationToken>,
    saw_done: bool,
}

impl EventReceiver {
    /// Stop waiting as soon as `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Next token or `StepEnd`. `None` marks the end of the stream.
    ///
    /// Events already queued are drained before cancellation is honoured.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        if self.saw_done {
            return None;
        }

        let event = match &self.cancel {
            Some(cancel) => {
                tokio::select! {
                    biased;
                    event = self.rx.recv() => event,
                    _ = cancel.cancelled() => None,
                }
            }
            None => self.rx.recv().await,
        };

        match event {
            Some(StreamEvent::Done) => {
                self.saw_done = true;
                self.rx.close();
                None
            }
            other => other,
        }
    }

    /// Whether the stream ended on a `Done` rather than a dropped producer.
    pub fn saw_done(&self) -> bool {
        self.saw_done
    }

    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send {
        futures::stream::unfold(self, |mut receiver| async move {
            let event = receiver.next().await?;
            Some((event, receiver))
        })
    }
}
