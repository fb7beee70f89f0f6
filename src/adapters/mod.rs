// Copyright (c) 2025 - Cowboy AI, Inc.

//! Adapters for external systems

pub mod awx;

pub use awx::{AwxClient, AwxConfig};
