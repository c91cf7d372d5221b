// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use syslog_web::{config::Config, web_server::SyslogWeb};

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let config = Config::new();

    let log_level = config
        .as_ref()
        .map(|config| config.log_level.as_str())
        .unwrap_or("info");
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

    let config = config.context("reading syslog-web configuration")?;
    info!("listening on {:?}", config.listen_addrs);
    let web = SyslogWeb::bind(&config).await?;

    let cancel_token = CancellationToken::new();
    let server = tokio::spawn(web.serve(cancel_token.clone()));

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!("Unable to listen for ctrl-c: {}", e);
            }
            cancel_token.cancel();
        }
        _ = cancel_token.cancelled() => {}
    }

    server.await.context("HTTP server task failed")??;
    Ok(())
}
