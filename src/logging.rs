// SPDX-License-Identifier: Apache-2.0
use std::env;
use tracing::subscriber::{set_global_default, SetGlobalDefaultError};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Registry,
};

/// `json` selects Bunyan output, anything else the console format
pub const LOG_FORMAT_ENV: &str = "SEQGATE_LOG_FORMAT";

fn env_filter(default_directives: String) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Initialize the Bunyan (JSON) subscriber for the application
pub fn init_tracing<Sink>(name: &str, sink: Sink) -> Result<(), SetGlobalDefaultError>
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    // Skip setting LogTracer if it's already been set
    let _ = LogTracer::init();

    let formatting_layer = BunyanFormattingLayer::new(name.into(), sink);

    let subscriber = Registry::default()
        .with(env_filter(format!("{}=info,actix_web=info", name)))
        .with(JsonStorageLayer)
        .with(formatting_layer);

    set_global_default(subscriber)?;
    tracing::info!("Tracing initialized with Bunyan formatter");
    Ok(())
}

/// Initialize a more readable console logger for development
pub fn init_console_tracing() -> Result<(), SetGlobalDefaultError> {
    let _ = LogTracer::init();

    let subscriber = tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(env_filter("seqgate=debug,actix_web=info".into()))
        .finish();

    set_global_default(subscriber)?;
    tracing::info!("Console tracing initialized");
    Ok(())
}

/// Pick the subscriber from `SEQGATE_LOG_FORMAT`
pub fn init_from_env() -> Result<(), SetGlobalDefaultError> {
    match env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => init_tracing("seqgate", std::io::stdout),
        _ => init_console_tracing(),
    }
}
