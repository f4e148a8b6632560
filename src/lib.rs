#![warn(missing_docs)]

//! <div class="warning">
//!
//! Note: API is unstable, and may change in `0.x` versions.
//!
//! </div>
//!
//! Collect the images of Yandex Disk folders into a JSON manifest and a static gallery page.
//!
//! # As a library
//!
//! Usually you build a [`config::Config`], an authorized client with [`api::api_client`],
//! then hand both to [`pipeline::Pipeline`].
//!
//! See [`pipeline::Pipeline#example`] for example.
//!
//! # As a binary
//!
//! In addition to the above, you also need [`cli`] to build the command line.
//!
//! See `main.rs` to know how to assemble these modules as a binary.

#[cfg(feature = "cli")]
pub mod cli;
pub mod pipeline;

pub mod api;
pub mod config;
pub mod download;
pub mod filter;
pub mod integrity;
pub mod manifest;
pub mod page;
pub mod resolver;

#[cfg(test)]
pub(crate) mod test_helpers;
