use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("agentchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("agentchat.client.request_errors");
pub(crate) static CLIENT_UNAUTHORIZED: Counter = Counter::new("agentchat.client.unauthorized");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("agentchat.client.request_duration_seconds");

pub(crate) static STREAM_BYTES: Counter = Counter::new("agentchat.stream.bytes");
pub(crate) static STREAM_FRAMES: Counter = Counter::new("agentchat.stream.frames");
pub(crate) static STREAM_EVENTS: Counter = Counter::new("agentchat.stream.events");
pub(crate) static STREAM_MALFORMED: Counter = Counter::new("agentchat.stream.malformed_payloads");
pub(crate) static STREAM_IGNORED: Counter = Counter::new("agentchat.stream.ignored_events");
pub(crate) static STREAM_ABORTS: Counter = Counter::new("agentchat.stream.aborts");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("agentchat.stream.errors");
pub(crate) static STREAM_DURATION: Moments = Moments::new("agentchat.stream.duration_seconds");

pub(crate) static SESSIONS_CREATED: Counter = Counter::new("agentchat.sessions.created");
pub(crate) static SESSION_SWITCHES: Counter = Counter::new("agentchat.sessions.switches");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_UNAUTHORIZED);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_MALFORMED);
    collector.register_counter(&STREAM_IGNORED);
    collector.register_counter(&STREAM_ABORTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSIONS_CREATED);
    collector.register_counter(&SESSION_SWITCHES);
}
