// Copyright (c) 2025 - Cowboy AI, Inc.

//! Observed virtual machine state

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Snapshot of one virtual machine at the moment of a notification.
///
/// Decoded from a watch payload; immutable once constructed and discarded
/// after the notification is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRecord {
    pub name: String,
    pub namespace: String,
    /// Address assigned to the machine, if any. An empty string in the
    /// source object decodes to `None`.
    pub address: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl VmRecord {
    /// Decode a record from a watch object body.
    ///
    /// Returns `None` when the object carries no name or namespace — such
    /// objects cannot be keyed and are dropped by the watcher.
    pub fn from_object(object: &Value) -> Option<Self> {
        let name = object.pointer("/metadata/name")?.as_str()?.to_string();
        let namespace = object.pointer("/metadata/namespace")?.as_str()?.to_string();

        let address = object
            .pointer("/status/ipAddress")
            .and_then(Value::as_str)
            .filter(|addr| !addr.is_empty())
            .map(str::to_string);

        let labels = object
            .pointer("/metadata/labels")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(key, value)| {
                        value.as_str().map(|s| (key.clone(), s.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            name,
            namespace,
            address,
            labels,
        })
    }

    /// The assigned address, if one is present and non-empty.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref().filter(|addr| !addr.is_empty())
    }
}

/// Host-variable document published for one reachable virtual machine.
///
/// This is the typed shape used throughout the engine. It is serialized to
/// the gateway's on-the-wire representation only at the adapter boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostVariables {
    pub vm_name: String,
    pub vm_namespace: String,
    pub labels: BTreeMap<String, String>,
    pub ansible_host: String,
}

impl HostVariables {
    /// Build the variable document for a record with an assigned address.
    ///
    /// Returns `None` when the record has no address — such records are
    /// never published.
    pub fn from_record(record: &VmRecord) -> Option<Self> {
        let address = record.address()?;
        Some(Self {
            vm_name: record.name.clone(),
            vm_namespace: record.namespace.clone(),
            labels: record.labels.clone(),
            ansible_host: address.to_string(),
        })
    }
}
