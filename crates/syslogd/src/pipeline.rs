// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The single consumer of decoded messages: validates each one, routes it to the file of its
//! host and day, and appends one record line.
//!
//! Delivery is best effort. A message that fails validation or I/O is dropped for good; the
//! next message for the same file implicitly retries the open.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, TimeDelta};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::constants::{ACCEPTANCE_WINDOW_HOURS, EVICTION_STRIDE, IDLE_HANDLE_TIMEOUT};
use crate::errors::IngestError;
use crate::fault::FaultReporter;
use crate::file_cache::FileHandleCache;
use crate::layout::{is_valid_hostname, FileKey};
use crate::message::{format_record, LogMessage};
use crate::report_fault;

pub struct IngestPipeline {
    cache: FileHandleCache,
    fault: Arc<FaultReporter>,
    until_sweep: usize,
}

impl IngestPipeline {
    pub fn new(root: impl Into<PathBuf>, fault: Arc<FaultReporter>) -> Self {
        Self {
            cache: FileHandleCache::new(root, Arc::clone(&fault)),
            fault,
            until_sweep: EVICTION_STRIDE,
        }
    }

    /// Consumes messages in delivery order until every sender is gone. File I/O blocks, so this
    /// belongs on a dedicated thread (`spawn_blocking`), never on the async executor.
    pub fn run_blocking(mut self, mut rx: mpsc::Receiver<LogMessage>) {
        debug!("Ingestion pipeline started");
        while let Some(message) = rx.blocking_recv() {
            // failures are already reported inside process
            let _ = self.process(&message);
        }
        debug!(
            "Ingestion pipeline stopped, closing {} open log files",
            self.cache.len()
        );
    }

    pub fn process(&mut self, message: &LogMessage) -> Result<(), IngestError> {
        self.process_at(message, Local::now())
    }

    /// Processes one message as if received at `now`. Every call, accepted or not, counts toward
    /// the idle-handle sweep stride.
    pub fn process_at(
        &mut self,
        message: &LogMessage,
        now: DateTime<Local>,
    ) -> Result<(), IngestError> {
        let result = self.write(message, now);

        self.until_sweep -= 1;
        if self.until_sweep == 0 {
            self.until_sweep = EVICTION_STRIDE;
            let closed = self.cache.evict_idle(IDLE_HANDLE_TIMEOUT);
            if closed > 0 {
                debug!("Closed {} idle log files, {} still open", closed, self.cache.len());
            }
        }

        result
    }

    fn write(&mut self, message: &LogMessage, now: DateTime<Local>) -> Result<(), IngestError> {
        let Some(timestamp) = message.complete_timestamp() else {
            trace!("Dropping incomplete message: {:?}", message);
            return Err(IngestError::Incomplete);
        };
        if !is_valid_hostname(&message.hostname) {
            let err = IngestError::InvalidHostname(message.hostname.clone());
            report_fault!(self.fault, "{}", err);
            return Err(err);
        }

        // Rejecting stale timestamps keeps yesterday's file the oldest one that can still be
        // written to, which is what makes compressing older files safe.
        if now.fixed_offset() - timestamp > TimeDelta::hours(ACCEPTANCE_WINDOW_HOURS) {
            let err = IngestError::ClockDrift(timestamp);
            report_fault!(self.fault, "{}", err);
            return Err(err);
        }

        let key = FileKey::for_message(&message.hostname, &timestamp);
        let open = match self.cache.get_or_open(key) {
            Ok(open) => open,
            Err(e) => {
                let err = IngestError::Open(e);
                report_fault!(self.fault, "{}", err);
                return Err(err);
            }
        };

        let record = format_record(&timestamp, &message.tag, &message.content);
        open.append(record.as_bytes()).map_err(|e| {
            let err = IngestError::Write(e);
            report_fault!(self.fault, "{}", err);
            err
        })
    }

    pub fn cache(&self) -> &FileHandleCache {
        &self.cache
    }
}
