//! Input source observer
//!
//! Subscribes to the system "selected keyboard input source changed"
//! notification through an [`InputSourceFeed`] and reports changes of the
//! resolved display name.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::lifecycle::Mailbox;

use super::names::{resolve_display_name, InputSourceInfo};

/// Subscribes to input source changes
pub trait InputSourceFeed: Send + 'static {
    /// Dropping the subscription unsubscribes
    type Subscription: Send + 'static;

    /// Start delivering snapshots into `sink`. Implementations deliver one
    /// baseline snapshot first, then one snapshot per change notification.
    fn subscribe(&mut self, sink: SourceSink) -> Result<Self::Subscription, SubscribeError>;
}

/// Errors that can occur while subscribing
#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    #[error("input source notifications unavailable: {0}")]
    Unavailable(String),
}

/// Messages processed by the observer task
#[derive(Debug)]
pub(crate) enum LocaleMsg {
    Start,
    Stop,
    Shutdown,
    /// Current source when the subscription was made (`None`: no source)
    Baseline {
        session: u64,
        info: Option<InputSourceInfo>,
    },
    /// Current source after a change notification
    Changed {
        session: u64,
        info: Option<InputSourceInfo>,
    },
}

/// Hand-off point from the notification callback into the observer
///
/// Each sink is bound to one subscription session so deliveries from a
/// subscription that has since been dropped are ignored.
#[derive(Debug, Clone)]
pub struct SourceSink {
    tx: mpsc::UnboundedSender<LocaleMsg>,
    session: u64,
}

impl SourceSink {
    /// Deliver the snapshot taken when the subscription was installed
    pub fn baseline(&self, info: Option<InputSourceInfo>) {
        let _ = self.tx.send(LocaleMsg::Baseline {
            session: self.session,
            info,
        });
    }

    /// Deliver the snapshot taken after a change notification
    pub fn changed(&self, info: Option<InputSourceInfo>) {
        let _ = self.tx.send(LocaleMsg::Changed {
            session: self.session,
            info,
        });
    }
}

/// Last resolved display name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSourceIdentity {
    pub last_resolved_name: String,
}

/// Callback invoked with every surfaced input source name
pub type InputSourceCallback = Box<dyn FnMut(String) + Send>;

/// Input source observer state, driven by [`LocaleSourceObserver::run`]
pub struct LocaleSourceObserver<F: InputSourceFeed> {
    feed: F,
    subscription: Option<F::Subscription>,
    running: bool,
    /// `None` until the baseline of the current session arrived
    identity: Option<InputSourceIdentity>,
    session: u64,
    mailbox: Mailbox<LocaleMsg>,
    on_change: InputSourceCallback,
}

impl<F: InputSourceFeed> LocaleSourceObserver<F> {
    fn new(feed: F, mailbox: Mailbox<LocaleMsg>, on_change: InputSourceCallback) -> Self {
        Self {
            feed,
            subscription: None,
            running: false,
            identity: None,
            session: 0,
            mailbox,
            on_change,
        }
    }

    /// Subscribe and wait for the baseline. No-op when already running.
    pub fn start(&mut self) {
        if self.running {
            debug!("input source observer already started");
            return;
        }

        self.running = true;
        self.session += 1;
        self.identity = None;

        let sink = SourceSink {
            tx: self.mailbox.sender(),
            session: self.session,
        };
        match self.feed.subscribe(sink) {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                info!("input source observer started");
            }
            Err(e) => {
                warn!(error = %e, "input source observer disabled");
            }
        }
    }

    /// Unsubscribe. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }

        self.running = false;
        self.session += 1;
        self.subscription = None;
        info!("input source observer stopped");
    }

    fn handle_message(&mut self, msg: LocaleMsg) {
        match msg {
            LocaleMsg::Start => self.start(),
            LocaleMsg::Stop => self.stop(),
            LocaleMsg::Shutdown => {}
            LocaleMsg::Baseline { session, info } => self.handle_snapshot(session, info, true),
            LocaleMsg::Changed { session, info } => self.handle_snapshot(session, info, false),
        }
    }

    fn handle_snapshot(&mut self, session: u64, info: Option<InputSourceInfo>, baseline: bool) {
        if !self.running || session != self.session {
            trace!("stale input source snapshot dropped");
            return;
        }

        let name = info
            .as_ref()
            .map(resolve_display_name)
            .unwrap_or_default();

        // A change that beats the baseline is treated as the baseline
        let Some(identity) = self.identity.as_mut().filter(|_| !baseline) else {
            debug!(%name, "input source baseline recorded");
            self.identity = Some(InputSourceIdentity {
                last_resolved_name: name,
            });
            return;
        };

        if name.is_empty() || name == identity.last_resolved_name {
            trace!(%name, "input source unchanged");
            return;
        }

        identity.last_resolved_name = name.clone();
        debug!(%name, "input source changed");
        (self.on_change)(name);
    }

    /// Process messages until shut down
    pub(crate) async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<LocaleMsg>) {
        while let Some(msg) = inbox.recv().await {
            if matches!(msg, LocaleMsg::Shutdown) {
                break;
            }
            self.handle_message(msg);
        }

        self.stop();
        debug!("input source observer task exited");
    }
}

/// Control surface for a spawned observer
#[derive(Clone)]
pub struct LocaleHandle {
    mailbox: Mailbox<LocaleMsg>,
}

impl LocaleHandle {
    /// Subscribe and record the baseline (idempotent)
    pub fn start(&self) {
        self.mailbox.post(LocaleMsg::Start);
    }

    /// Unsubscribe (idempotent)
    pub fn stop(&self) {
        self.mailbox.post(LocaleMsg::Stop);
    }

    /// Stop and end the observer task
    pub fn shutdown(&self) {
        self.mailbox.post(LocaleMsg::Shutdown);
    }
}

/// Spawn an observer on the current runtime
pub fn spawn<F, C>(feed: F, on_change: C) -> (LocaleHandle, JoinHandle<()>)
where
    F: InputSourceFeed,
    C: FnMut(String) + Send + 'static,
{
    let (mailbox, inbox) = Mailbox::channel();
    let observer = LocaleSourceObserver::new(feed, mailbox.clone(), Box::new(on_change));
    let task = tokio::spawn(observer.run(inbox));

    (LocaleHandle { mailbox }, task)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct FeedLog {
        subscriptions: usize,
        live: usize,
        sink: Option<SourceSink>,
        current: Option<InputSourceInfo>,
        unavailable: bool,
    }

    #[derive(Clone, Default)]
    struct FakeFeed(Arc<Mutex<FeedLog>>);

    impl FakeFeed {
        fn with_current(id: &str) -> Self {
            let feed = Self::default();
            feed.0.lock().unwrap().current = Some(InputSourceInfo::from_id(id));
            feed
        }

        /// Switch the current source and fire the notification through the old sink
        fn switch_to(&self, info: Option<InputSourceInfo>) {
            let sink = {
                let mut log = self.0.lock().unwrap();
                log.current = info.clone();
                log.sink.clone()
            };
            if let Some(sink) = sink {
                sink.changed(info);
            }
        }

        fn switch_to_id(&self, id: &str) {
            self.switch_to(Some(InputSourceInfo::from_id(id)));
        }
    }

    struct FakeSubscription(Arc<Mutex<FeedLog>>);

    impl Drop for FakeSubscription {
        fn drop(&mut self) {
            let mut log = self.0.lock().unwrap();
            log.live -= 1;
        }
    }

    impl InputSourceFeed for FakeFeed {
        type Subscription = FakeSubscription;

        fn subscribe(&mut self, sink: SourceSink) -> Result<FakeSubscription, SubscribeError> {
            let mut log = self.0.lock().unwrap();
            if log.unavailable {
                return Err(SubscribeError::Unavailable("no session".to_string()));
            }
            log.subscriptions += 1;
            log.live += 1;
            sink.baseline(log.current.clone());
            log.sink = Some(sink);
            Ok(FakeSubscription(Arc::clone(&self.0)))
        }
    }

    fn spawn_observer(feed: &FakeFeed) -> (LocaleHandle, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let (handle, _task) = spawn(feed.clone(), move |name| record.lock().unwrap().push(name));
        (handle, seen)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_baseline_is_not_reported() {
        let feed = FakeFeed::with_current("com.apple.keylayout.US");
        let (observer, seen) = spawn_observer(&feed);
        observer.start();
        settle().await;

        assert!(seen.lock().unwrap().is_empty());

        feed.switch_to_id("com.apple.keylayout.German");
        settle().await;
        assert_eq!(*seen.lock().unwrap(), vec!["German".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_distinct_names_are_reported() {
        let feed = FakeFeed::with_current("com.apple.keylayout.ABC");
        let (observer, seen) = spawn_observer(&feed);
        observer.start();
        settle().await;

        feed.switch_to_id("com.apple.keylayout.ABC");
        feed.switch_to_id("com.apple.keylayout.French");
        feed.switch_to_id("com.apple.keylayout.French");
        feed.switch_to_id("com.apple.keylayout.ABC");
        settle().await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["French".to_string(), "ABC".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_ids_with_same_name_are_unchanged() {
        let feed = FakeFeed::with_current("com.apple.keylayout.US");
        let (observer, seen) = spawn_observer(&feed);
        observer.start();
        settle().await;

        // Localized name equal to the mapped name of the baseline id
        feed.switch_to(Some(InputSourceInfo {
            localized_name: Some("English (US)".to_string()),
            source_id: Some("com.example.inputmethod.english".to_string()),
        }));
        settle().await;

        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_source_is_ignored() {
        let feed = FakeFeed::with_current("com.apple.keylayout.US");
        let (observer, seen) = spawn_observer(&feed);
        observer.start();
        settle().await;

        feed.switch_to(None);
        settle().await;
        assert!(seen.lock().unwrap().is_empty());

        // Unresolvable but present source still counts as a change
        feed.switch_to(Some(InputSourceInfo::default()));
        settle().await;
        assert_eq!(*seen.lock().unwrap(), vec!["Unknown".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_unsubscribes_and_ignores_late_snapshots() {
        let feed = FakeFeed::with_current("com.apple.keylayout.US");
        let (observer, seen) = spawn_observer(&feed);
        observer.start();
        settle().await;

        let stale_sink = feed.0.lock().unwrap().sink.clone().unwrap();

        observer.stop();
        observer.stop();
        settle().await;
        assert_eq!(feed.0.lock().unwrap().live, 0);

        observer.start();
        settle().await;
        {
            let log = feed.0.lock().unwrap();
            assert_eq!(log.subscriptions, 2);
            assert_eq!(log.live, 1);
        }

        // A notification queued by the first subscription arrives late
        stale_sink.changed(Some(InputSourceInfo::from_id("com.apple.keylayout.Korean")));
        settle().await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_failure_is_not_fatal() {
        let feed = FakeFeed::default();
        feed.0.lock().unwrap().unavailable = true;
        let (observer, seen) = spawn_observer(&feed);
        observer.start();
        settle().await;

        observer.stop();
        settle().await;
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(feed.0.lock().unwrap().live, 0);
    }
}
