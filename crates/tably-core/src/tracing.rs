use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured stdout tracing for a payment service. Call once at
/// startup, before any other work.
///
/// JSON format, filtered by `RUST_LOG` with an `info` default so a service
/// deployed without the var still emits its processing trail. Safe to call
/// more than once; later calls are ignored (tests share one process).
pub fn init_tracing(service: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let initialized = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json())
        .try_init()
        .is_ok();
    if initialized {
        tracing::info!(service, "tracing initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_twice_does_not_panic() {
        init_tracing("tably-test");
        init_tracing("tably-test");
    }
}
