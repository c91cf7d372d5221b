// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wires the collector together: UDP listener, ingestion pipeline, retention worker and the
//! fault rate-limit reset.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::compactor::RetentionWorker;
use crate::config::Config;
use crate::constants::FAULT_RESET_INTERVAL;
use crate::fault::FaultReporter;
use crate::listener::{SyslogListener, SyslogListenerConfig};
use crate::pipeline::IngestPipeline;

pub struct Syslogd;

impl Syslogd {
    /// Binds the listener and spawns every task of the collector.
    ///
    /// Only a bind failure is returned. Everything after that is best effort and reported
    /// through logs.
    pub async fn start(config: &Config) -> std::io::Result<SyslogdHandle> {
        let cancel_token = CancellationToken::new();
        let fault = Arc::new(FaultReporter::new());
        let (tx, rx) = mpsc::channel(config.queue_capacity);

        let listener = SyslogListener::bind(
            &SyslogListenerConfig {
                listen_addr: config.listen_addr.clone(),
            },
            tx,
            Arc::clone(&fault),
            cancel_token.clone(),
        )
        .await?;
        let local_addr = listener.local_addr()?;
        let dropped = listener.dropped_counter();
        info!(
            "Syslog collector listening on udp://{}, writing to {}",
            local_addr,
            config.outdir.display()
        );

        let fault_reset = tokio::spawn(
            Arc::clone(&fault).run_reset_loop(FAULT_RESET_INTERVAL, cancel_token.clone()),
        );
        let listener = tokio::spawn(listener.spin());
        let pipeline = IngestPipeline::new(config.outdir.clone(), Arc::clone(&fault));
        let consumer = tokio::task::spawn_blocking(move || pipeline.run_blocking(rx));
        let retention =
            tokio::spawn(RetentionWorker::new(config.outdir.clone()).spin(cancel_token.clone()));

        Ok(SyslogdHandle {
            local_addr,
            cancel_token,
            dropped,
            fault,
            tasks: vec![fault_reset, listener, consumer, retention],
        })
    }
}

pub struct SyslogdHandle {
    local_addr: SocketAddr,
    cancel_token: CancellationToken,
    dropped: Arc<AtomicU64>,
    fault: Arc<FaultReporter>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyslogdHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Messages dropped so far because the queue to the writer was full.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Error lines swallowed by the fault rate limit so far.
    pub fn suppressed_faults(&self) -> u64 {
        self.fault.suppressed()
    }

    /// Stops receiving. Messages already queued are still written before the writer exits.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Waits for every task to finish.
    pub async fn wait(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Syslog collector task failed: {}", e);
            }
        }
    }
}
