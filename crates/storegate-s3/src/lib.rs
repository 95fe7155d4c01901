//! storegate-s3 - S3 storage client for one MinIO backend
//!
//! [`S3Client`] implements [`ObjectStore`](storegate_core::ObjectStore) with
//! path-style requests presigned with `rusty-s3`. [`S3Connector`] creates a
//! client per discovered backend, sharing one connection pool.
//!
//! # Usage
//!
//! ```rust,ignore
//! use storegate_core::StoreConnector;
//! use storegate_s3::{S3Connector, S3Options};
//!
//! let connector = S3Connector::new(S3Options::default())?;
//! let store = connector.connect(&node)?;
//! store.put(&ctx, "abc", bytes::Bytes::from_static(b"hello")).await?;
//! ```

pub mod client;
pub mod connector;
pub mod error;

pub use client::S3Client;
pub use connector::{S3Connector, S3Options};
pub use error::{Result, S3Error};
