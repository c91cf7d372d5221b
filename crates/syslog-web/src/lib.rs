// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Read-only HTTP access to the log tree written by `syslogd`.
//!
//! `GET /` lists the known hosts and `GET /grep/<host>?q=<regex>&range=<range>` streams every
//! matching line of that host's logs, decompressing archives on the fly.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod errors;
pub mod http_utils;
pub mod search;
pub mod web_server;
