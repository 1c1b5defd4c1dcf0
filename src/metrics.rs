use tracing::trace;

// Counters are emitted as trace events; the Prometheus recorder installed in
// main only renders what the exporter itself tracks.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "podbulk.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn listing_created(elapsed_ms: u128) {
    trace!(
        target = "podbulk.metrics",
        elapsed_ms = elapsed_ms as u64,
        "listing_created"
    );
}

pub fn provider_fallback(provider: &'static str, field: &'static str) {
    trace!(
        target = "podbulk.metrics",
        provider = provider,
        field = field,
        "provider_fallback_total_inc"
    );
}
