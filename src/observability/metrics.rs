use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounter,
    pub orders_tracked: IntGauge,
    pub bids_total: IntCounterVec,
    pub attempts_total: IntCounterVec,
    pub negotiations_total: IntCounterVec,
    pub lock_timeouts_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("orders_created_total", "Total orders created")
                .expect("valid orders_created_total metric");

        let orders_tracked = IntGauge::new("orders_tracked", "Orders currently held in state")
            .expect("valid orders_tracked metric");

        let bids_total = IntCounterVec::new(
            Opts::new("bids_total", "Bid operations by outcome"),
            &["outcome"],
        )
        .expect("valid bids_total metric");

        let attempts_total = IntCounterVec::new(
            Opts::new("attempts_total", "Delivery attempts by outcome"),
            &["outcome"],
        )
        .expect("valid attempts_total metric");

        let negotiations_total = IntCounterVec::new(
            Opts::new("negotiations_total", "Negotiation operations by outcome"),
            &["outcome"],
        )
        .expect("valid negotiations_total metric");

        let lock_timeouts_total = IntCounter::new(
            "lock_timeouts_total",
            "Aggregate lock acquisitions that timed out",
        )
        .expect("valid lock_timeouts_total metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(orders_tracked.clone()))
            .expect("register orders_tracked");
        registry
            .register(Box::new(bids_total.clone()))
            .expect("register bids_total");
        registry
            .register(Box::new(attempts_total.clone()))
            .expect("register attempts_total");
        registry
            .register(Box::new(negotiations_total.clone()))
            .expect("register negotiations_total");
        registry
            .register(Box::new(lock_timeouts_total.clone()))
            .expect("register lock_timeouts_total");

        Self {
            registry,
            orders_created_total,
            orders_tracked,
            bids_total,
            attempts_total,
            negotiations_total,
            lock_timeouts_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
