use std::sync::Arc;

use elastic_log_sink::{
    backend::ElasticTransportFactory,
    config::{HostConfigSource, TransportSettings},
    logger::ElasticLogger,
    record::{LogRecord, Severity},
};

#[tokio::main]
async fn main() {
    // Reads ELASTIC_LOG_URL, ELASTIC_LOG_USERNAME, ELASTIC_LOG_PASSWORD and
    // ELASTIC_LOG_INDEX; changing them at runtime swaps the transport.
    let settings = TransportSettings::from_env();
    let factory = ElasticTransportFactory::new(settings.request_timeout());

    let logger = ElasticLogger::start(
        settings,
        Arc::new(HostConfigSource::new()),
        Arc::new(factory),
    )
    .await;

    let record = LogRecord::new(Severity::Information, "User {id} logged in from {ip}")
        .with_value("7c9e6679-7425-40de-944b-e07fc1f90ae7")
        .with_value("10.0.0.5")
        .with_meta("trace.id", "4bf92f3577b34da6");

    match logger.deliver(record, Some("Information")).await {
        Ok(result) => println!("indexed: {:?}", result),
        Err(e) => eprintln!("delivery failed: {}", e),
    }

    logger.shutdown().await;
}
