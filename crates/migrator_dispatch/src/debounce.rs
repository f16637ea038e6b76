//! Debounce actor for filesystem events.
//!
//! Copying a project or running `git clone` produces a burst of create
//! events for the same top-level name. The actor owns one deadline per
//! name, pushes it back on every event, and emits the name once the
//! deadline passes with no further events.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Pending names and their quiet-period deadlines.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: HashMap<String, Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    /// Record an event at `now`, restarting the name's timer.
    pub fn record(&mut self, name: String, now: Instant) {
        if name.is_empty() {
            return;
        }
        self.pending.insert(name, now + self.delay);
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return every name whose deadline is at or before `now`, sorted.
    pub fn take_ready(&mut self, now: Instant) -> Vec<String> {
        let mut ready: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &ready {
            self.pending.remove(name);
        }
        ready.sort();
        ready
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Run until the input closes, forwarding settled names to `ready`.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<String>,
        ready: mpsc::UnboundedSender<String>,
    ) {
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(name) => {
                        trace!(name = %name, "Debouncing event");
                        self.record(name, Instant::now());
                    }
                    None => return,
                },
                _ = wait_for(deadline) => {
                    for name in self.take_ready(Instant::now()) {
                        if ready.send(name).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Spawn the actor on the current runtime.
    pub fn spawn(
        self,
        events: mpsc::UnboundedReceiver<String>,
        ready: mpsc::UnboundedSender<String>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(events, ready))
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_resets_deadline() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();
        debouncer.record("NewProj".to_string(), start);
        debouncer.record("NewProj".to_string(), start + Duration::from_millis(80));

        assert!(debouncer.take_ready(start + Duration::from_millis(120)).is_empty());
        assert_eq!(
            debouncer.take_ready(start + Duration::from_millis(180)),
            vec!["NewProj".to_string()]
        );
        assert_eq!(debouncer.pending_len(), 0);
    }

    #[test]
    fn test_empty_names_ignored() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.record(String::new(), Instant::now());
        assert_eq!(debouncer.pending_len(), 0);
        assert!(debouncer.next_deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_emits_once() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (ready_tx, mut ready_rx) = mpsc::unbounded_channel();
        let handle = Debouncer::new(Duration::from_secs(1)).spawn(event_rx, ready_tx);

        for _ in 0..5 {
            event_tx.send("NewProj".to_string()).unwrap();
            tokio::time::sleep(Duration::from_millis(40)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(ready_rx.try_recv().is_err(), "still inside quiet period");

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(ready_rx.try_recv().unwrap(), "NewProj");
        assert!(ready_rx.try_recv().is_err());

        drop(event_tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_names_each_emitted() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (ready_tx, mut ready_rx) = mpsc::unbounded_channel();
        let handle = Debouncer::new(Duration::from_millis(200)).spawn(event_rx, ready_tx);

        event_tx.send("Alpha".to_string()).unwrap();
        event_tx.send("Beta".to_string()).unwrap();
        event_tx.send("Alpha".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let mut got = vec![ready_rx.try_recv().unwrap(), ready_rx.try_recv().unwrap()];
        got.sort();
        assert_eq!(got, vec!["Alpha", "Beta"]);
        assert!(ready_rx.try_recv().is_err());

        drop(event_tx);
        handle.await.unwrap();
    }
}
