use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::error;

use elastic_log_sink::config::{ConfigExpr, HostConfigSource, TransportSettings};
use elastic_log_sink::init::{init_tracing_with_config, LayerConfig};
use elastic_log_sink::logger::ElasticLogger;
use elastic_log_sink::noop_sink::NoopTransportFactory;

#[tokio::main]
async fn main() {
    let literal = |v: &str| ConfigExpr::Literal(v.to_string());
    let settings = TransportSettings::new(
        literal("http://localhost:9200"),
        literal("elastic"),
        literal("changeme"),
        literal("load-test"),
    );

    let logger = ElasticLogger::start(
        settings,
        Arc::new(HostConfigSource::new()),
        Arc::new(NoopTransportFactory),
    )
    .await;

    let layer_config = LayerConfig {
        channel_buffer: 50_000,
        enable_stdout: false,
        ..LayerConfig::default()
    };
    init_tracing_with_config(logger.clone(), layer_config).expect("set global subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "load test error {{iteration}}");
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Give background task a little time to drain the channel
    sleep(Duration::from_secs(2)).await;
    logger.shutdown().await;
}
