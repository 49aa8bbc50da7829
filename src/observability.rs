use biometrics::{Collector, Counter, Moments};

pub(crate) static STORE_READS: Counter = Counter::new("talkie.store.reads");
pub(crate) static STORE_WRITES: Counter = Counter::new("talkie.store.writes");
pub(crate) static STORE_MASKED_LOAD_FAILURES: Counter =
    Counter::new("talkie.store.masked_load_failures");

pub(crate) static REGISTRY_REGISTRATIONS: Counter = Counter::new("talkie.registry.registrations");

pub(crate) static SESSION_RESTORED: Counter = Counter::new("talkie.session.restored");
pub(crate) static SESSION_FRESH: Counter = Counter::new("talkie.session.fresh");

pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("talkie.stream.fragments");
pub(crate) static STREAM_BYTES: Counter = Counter::new("talkie.stream.bytes");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("talkie.stream.errors");
pub(crate) static STREAM_TTFB: Moments = Moments::new("talkie.stream.ttfb_seconds");

pub(crate) static EXCHANGES: Counter = Counter::new("talkie.exchange.started");
pub(crate) static EXCHANGE_ERRORS: Counter = Counter::new("talkie.exchange.errors");
pub(crate) static EXCHANGE_DURATION: Moments =
    Moments::new("talkie.exchange.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&STORE_READS);
    collector.register_counter(&STORE_WRITES);
    collector.register_counter(&STORE_MASKED_LOAD_FAILURES);

    collector.register_counter(&REGISTRY_REGISTRATIONS);

    collector.register_counter(&SESSION_RESTORED);
    collector.register_counter(&SESSION_FRESH);

    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_moments(&STREAM_TTFB);

    collector.register_counter(&EXCHANGES);
    collector.register_counter(&EXCHANGE_ERRORS);
    collector.register_moments(&EXCHANGE_DURATION);
}
