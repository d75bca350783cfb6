// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod logging;
pub mod middleware;
pub mod nonce;
pub mod payload;
pub mod proxy;
pub mod render;
pub mod routes;
pub mod settings;
