//! HTTP adapters for the sync engine's remote contracts.
//!
//! Implements [`hearth_core::remote::TableApi`], [`ObjectStorage`] and
//! [`CompatRpc`] against a PostgREST-style table API with companion storage
//! and RPC endpoints. The realtime socket is not implemented here; hosts
//! supply their own [`hearth_core::remote::RealtimeTransport`].
//!
//! [`ObjectStorage`]: hearth_core::remote::ObjectStorage
//! [`CompatRpc`]: hearth_core::remote::CompatRpc

mod client;
mod compat;
mod storage;

pub use client::RestClient;
