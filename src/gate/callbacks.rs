//! Host notification channel

use std::sync::Mutex;

/// Receives the outcome of an acceptance attempt
///
/// `on_error` may be called more than once per attempt: a geolocation
/// failure is reported without ending the attempt.
pub trait SigningCallbacks: Send + Sync {
    /// The contract was accepted, now or previously
    fn on_success(&self);

    /// Something went wrong or acceptance was refused
    fn on_error(&self, message: &str);
}

/// Callbacks built from two closures
pub struct FnCallbacks<S, E> {
    on_success: S,
    on_error: E,
}

impl<S, E> FnCallbacks<S, E>
where
    S: Fn() + Send + Sync,
    E: Fn(&str) + Send + Sync,
{
    /// Wrap a success and an error closure
    pub fn new(on_success: S, on_error: E) -> Self {
        FnCallbacks {
            on_success,
            on_error,
        }
    }
}

impl<S, E> SigningCallbacks for FnCallbacks<S, E>
where
    S: Fn() + Send + Sync,
    E: Fn(&str) + Send + Sync,
{
    fn on_success(&self) {
        (self.on_success)()
    }

    fn on_error(&self, message: &str) {
        (self.on_error)(message)
    }
}

/// A notification delivered to the host
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackEvent {
    /// `on_success` was called
    Success,
    /// `on_error` was called with this message
    Error(String),
}

/// Callbacks that remember every notification, in order
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    events: Mutex<Vec<CallbackEvent>>,
}

impl RecordingCallbacks {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications so far
    pub fn events(&self) -> Vec<CallbackEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Error messages so far
    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                CallbackEvent::Error(message) => Some(message),
                CallbackEvent::Success => None,
            })
            .collect()
    }

    /// Number of successes so far
    pub fn successes(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == CallbackEvent::Success)
            .count()
    }

    fn push(&self, event: CallbackEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl SigningCallbacks for RecordingCallbacks {
    fn on_success(&self) {
        self.push(CallbackEvent::Success);
    }

    fn on_error(&self, message: &str) {
        self.push(CallbackEvent::Error(message.to_string()));
    }
}
