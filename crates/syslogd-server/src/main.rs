// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use anyhow::Context;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use syslogd::{config::Config, daemon::Syslogd};

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let config = Config::new();

    let log_level = config
        .as_ref()
        .map(|config| config.log_level.as_str())
        .unwrap_or("info");
    init_logging(log_level)?;

    let config = config.context("reading syslogd configuration")?;

    let handle = Syslogd::start(&config)
        .await
        .with_context(|| format!("listening on udp://{}", config.listen_addr))?;

    wait_for_signal().await;
    info!(
        "Shutting down syslog collector, {} messages were dropped on a full queue, {} error lines were rate limited",
        handle.dropped_messages(),
        handle.suppressed_faults()
    );
    handle.shutdown();
    handle.wait().await;
    Ok(())
}

fn init_logging(log_level: &str) -> anyhow::Result<()> {
    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).context("could not parse log level in configuration")?,
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    debug!("Logging subsystem enabled");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            error!("Unable to listen for SIGTERM: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
            return;
        }
    };
    tokio::select! {
        _ = terminate.recv() => debug!("Received SIGTERM"),
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!("Unable to listen for ctrl-c: {}", e);
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
