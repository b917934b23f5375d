//! phoenixstore
//!
//! A document-database façade with a Firestore-style programming model: hierarchical
//! collections of JSON documents, a composable query builder, live queries over a
//! websocket channel, an object-storage façade for blobs, and a token-based auth core.
//!
//! The crate is organized around the components in the design: [`query`] (the immutable
//! query value, its URL codec, and its translation into native filters), [`store`] (the
//! document store façade and its in-memory reference implementation), [`auth`] (user
//! lifecycle, password policy, lockout, and the access/refresh token scheme),
//! [`multiplexer`] (the live-query websocket channel manager), and [`http`] (the thin
//! request surface wiring the above into an axum router).

#![warn(clippy::all)]

pub mod auth;
pub mod blob;
pub mod config;
pub mod error;
pub mod http;
pub mod multiplexer;
pub mod query;
pub mod store;

pub use error::{ApiError, AuthError, MultiplexerError, QueryError, StoreError};
