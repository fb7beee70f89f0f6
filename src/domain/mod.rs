// Copyright (c) 2025 - Cowboy AI, Inc.

//! Domain value objects for the synchronization engine

pub mod notification;
pub mod vm;

pub use notification::{ChangeKind, ChangeNotification};
pub use vm::{HostVariables, VmRecord};
