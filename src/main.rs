use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use frontend_bind::{Backend, BusEvent, BusListener, Frontend, FrontendConfig, Page};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let mut args = std::env::args().skip(1);
    let page_uri = args.next().unwrap_or_default();
    let config = match args.next() {
        Some(path) => FrontendConfig::load(Some(PathBuf::from(path))),
        None => FrontendConfig::from_env(),
    }
    .context("failed to load frontend configuration")?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, run(page_uri, config))
}

async fn run(page_uri: String, config: FrontendConfig) -> Result<()> {
    let html = Backend::new(&config)
        .context("failed to build HTTP client")?
        .fetch_uri(&page_uri)
        .await
        .with_context(|| format!("failed to load page '{page_uri}'"))?;

    let frontend = Frontend::builder(Page::from_html(&html), config)
        .build()
        .context("failed to build frontend runtime")?;

    for event in [BusEvent::Start, BusEvent::Success, BusEvent::Error, BusEvent::Reload] {
        let listener: BusListener = Rc::new(move |data| {
            info!(target: "bus", %event, %data, "bus event");
        });
        frontend.bus().add_event_listener(event, listener);
    }

    frontend.bind_events();
    info!(root = %frontend.config().root, page = %page_uri, "page bound; press ctrl-c to exit");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");
    Ok(())
}
