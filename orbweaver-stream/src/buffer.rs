use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use orbweaver_core::Database;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::classifier::{Classifier, argmax};
use crate::error::Result;
use crate::event::{ParsedLine, StreamEvent};
use crate::reduce;

/// Batches incoming events and runs the classifier once per full batch.
/// Events whose top label is interesting and strictly above the
/// probability threshold are folded into the store; the rest are
/// discarded with the batch.
pub struct ClassificationBuffer {
    classifier: Arc<dyn Classifier>,
    batch_size: usize,
    capacity: usize,
    classes_of_interest: HashSet<String>,
    probability_threshold: f64,
    classify_timeout: Duration,
    buffer: Mutex<VecDeque<StreamEvent>>,
    flush_lock: AsyncMutex<()>,
    dispatched: AtomicUsize,
    dropped: AtomicUsize,
}

impl ClassificationBuffer {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier,
            batch_size: 100,
            capacity: 1000,
            classes_of_interest: HashSet::new(),
            probability_threshold: 0.9,
            classify_timeout: Duration::from_secs(30),
            buffer: Mutex::new(VecDeque::new()),
            flush_lock: AsyncMutex::new(()),
            dispatched: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_classes_of_interest<I>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.classes_of_interest = classes.into_iter().collect();
        self
    }

    pub fn with_probability_threshold(mut self, threshold: f64) -> Self {
        self.probability_threshold = threshold;
        self
    }

    pub fn with_classify_timeout(mut self, timeout: Duration) -> Self {
        self.classify_timeout = timeout;
        self
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events dispatched to the store so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Events dropped because the buffer hit capacity.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Parses and buffers one raw line. Returns the number of events
    /// dispatched, which is nonzero only when this line filled a batch
    /// and triggered a flush.
    pub async fn ingest(&self, raw: &str, db: &Database) -> Result<usize> {
        let event = match StreamEvent::parse(raw) {
            Some(ParsedLine::Event(event)) => event,
            Some(ParsedLine::Retraction) => {
                debug!("Dropping retraction notice");
                return Ok(0);
            }
            None => {
                warn!("Skipping unparseable line: {}", preview(raw));
                return Ok(0);
            }
        };

        let should_flush = {
            let mut buffer = self.buffer.lock().unwrap();
            if buffer.len() >= self.capacity {
                buffer.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Buffer at capacity ({}), dropped oldest event", self.capacity);
            }
            buffer.push_back(event);
            buffer.len() >= self.batch_size
        };

        if should_flush {
            return self.flush(db).await;
        }
        Ok(0)
    }

    /// Classifies everything currently buffered and dispatches the
    /// qualifying events. When the classifier fails or times out, the
    /// batch goes back to the front of the buffer for a later retry.
    pub async fn flush(&self, db: &Database) -> Result<usize> {
        let _guard = self.flush_lock.lock().await;

        // Snapshot and clear: lines arriving while the classifier runs
        // belong to the next batch.
        let batch: Vec<StreamEvent> = {
            let mut buffer = self.buffer.lock().unwrap();
            buffer.drain(..).collect()
        };
        if batch.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = batch.iter().map(|event| event.text.clone()).collect();
        let distributions =
            match tokio::time::timeout(self.classify_timeout, self.classifier.predict_proba(&texts))
                .await
            {
                Ok(Ok(distributions)) => distributions,
                Ok(Err(e)) => {
                    warn!("Classifier failed, retaining batch: {}", e);
                    self.requeue(batch);
                    return Ok(0);
                }
                Err(_) => {
                    warn!(
                        "Classifier timed out after {:?}, retaining batch",
                        self.classify_timeout
                    );
                    self.requeue(batch);
                    return Ok(0);
                }
            };

        let labels = self.classifier.labels();
        let mut count = 0;
        for (event, probs) in batch.iter().zip(distributions.iter()) {
            let Some((index, prob)) = argmax(probs) else {
                continue;
            };
            let Some(label) = labels.get(index) else {
                continue;
            };
            // Strictly above the threshold; an exact tie stays out.
            if prob > self.probability_threshold && self.classes_of_interest.contains(label) {
                debug!("Dispatching event from {} as {} ({:.3})", event.account, label, prob);
                reduce::apply(event, db)?;
                count += 1;
            }
        }
        self.dispatched.fetch_add(count, Ordering::Relaxed);
        Ok(count)
    }

    /// Puts a failed batch back at the front of the buffer, oldest
    /// first, dropping whatever no longer fits.
    fn requeue(&self, batch: Vec<StreamEvent>) {
        let mut buffer = self.buffer.lock().unwrap();
        let mut lost = 0;
        for event in batch.into_iter().rev() {
            if buffer.len() >= self.capacity {
                lost += 1;
                continue;
            }
            buffer.push_front(event);
        }
        if lost > 0 {
            warn!("Requeue overflowed capacity, dropped {} events", lost);
            self.dropped.fetch_add(lost, Ordering::Relaxed);
        }
    }
}

fn preview(raw: &str) -> &str {
    match raw.char_indices().nth(80) {
        Some((cut, _)) => &raw[..cut],
        None => raw,
    }
}
