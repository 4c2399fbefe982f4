use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("duckchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("duckchat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("duckchat.client.request_duration_seconds");

pub(crate) static STREAM_LINES: Counter = Counter::new("duckchat.stream.lines");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("duckchat.stream.errors");
pub(crate) static STREAM_DURATION: Moments = Moments::new("duckchat.stream.duration_seconds");

pub(crate) static SESSION_INITIALIZED: Counter = Counter::new("duckchat.session.initialized");
pub(crate) static SESSION_PROMPTS: Counter = Counter::new("duckchat.session.prompts");
pub(crate) static SESSION_TOKEN_ROTATIONS: Counter =
    Counter::new("duckchat.session.token_rotations");
pub(crate) static SESSION_AUTH_FAILURES: Counter = Counter::new("duckchat.session.auth_failures");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_LINES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSION_INITIALIZED);
    collector.register_counter(&SESSION_PROMPTS);
    collector.register_counter(&SESSION_TOKEN_ROTATIONS);
    collector.register_counter(&SESSION_AUTH_FAILURES);
}
