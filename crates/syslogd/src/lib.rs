// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Remote syslog collector.
//!
//! Messages pushed by remote hosts over UDP are decoded, validated and appended to one file per
//! host and calendar day (`<root>/<host>/<YYYY-MM-DD>.log`). A background retention task
//! compresses files that can no longer receive writes into `<YYYY-MM-DD>.log.zst` and deletes
//! archives once they fall out of the retention window.
//!
//! The write path ([`pipeline`], which owns the [`file_cache`]) and the retention path
//! ([`retention`], [`compactor`]) share no in-memory state. They are kept apart purely by
//! disjoint time windows: a file is only eligible for compression once no acceptable message
//! timestamp can map to it any more.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod compactor;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod errors;
pub mod fault;
pub mod file_cache;
pub mod layout;
pub mod listener;
pub mod message;
pub mod pipeline;
pub mod retention;
pub mod rfc3164;
