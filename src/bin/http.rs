#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;

    use timetable::{Timetable, TimetableConfig, http_api, persistence};
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = TimetableConfig::load(None)?;
    let addr: SocketAddr = config.http.addr.parse()?;
    let store = persistence::open_store(&config.storage)?;
    let timetable = Timetable::open(store, &config.semester.current)?;

    tracing::info!(
        %addr,
        backend = config.storage.backend.as_str(),
        data_dir = %config.storage.data_dir.display(),
        "timetable HTTP API listening"
    );
    http_api::serve(addr, timetable).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
