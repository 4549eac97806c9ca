#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod connections;
pub mod entities;
pub mod framework;
pub mod ingest;
pub mod schema;
