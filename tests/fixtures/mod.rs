// Copyright (c) 2025 - Cowboy AI, Inc.

//! Shared test fixtures: an in-memory inventory gateway that records every
//! call, and a watcher that replays scripted notification batches.

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use vm_inventory_sync::domain::{ChangeNotification, HostVariables, VmRecord};
use vm_inventory_sync::gateway::{GatewayError, GatewayResult, InventoryGateway};
use vm_inventory_sync::watch::{VmStream, VmWatcher, WatchError, WatchResult};

/// One recorded gateway call, in invocation order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Ping,
    FindOrganization(String),
    FindInventory(String),
    CreateInventory(String, i64),
    FindHost(i64, String),
    UpsertHost(i64, String, HostVariables),
    DeleteHost(i64, String),
    FindOrCreateGroup(i64, String),
    AddHostToGroup(i64, i64),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateInventory(..)
                | Call::UpsertHost(..)
                | Call::DeleteHost(..)
                | Call::FindOrCreateGroup(..)
                | Call::AddHostToGroup(..)
        )
    }
}

/// In-memory remote state owned by the mock gateway
#[derive(Debug, Default)]
struct RemoteState {
    organizations: HashMap<String, i64>,
    /// inventory name -> (id, organization id)
    inventories: HashMap<String, (i64, i64)>,
    /// (inventory id, host name) -> (host id, variables)
    hosts: HashMap<(i64, String), (i64, HostVariables)>,
    /// (inventory id, group name) -> group id
    groups: HashMap<(i64, String), i64>,
    group_members: Vec<(i64, i64)>,
    next_id: i64,
}

impl RemoteState {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// In-memory inventory gateway.
///
/// Ids are allocated deterministically in invocation order, so two runs fed
/// the same notification sequence produce identical remote state.
pub struct MockGateway {
    state: Mutex<RemoteState>,
    calls: Mutex<Vec<Call>>,
    /// Host names whose upserts fail with an injected server error
    failing_hosts: Mutex<Vec<String>>,
}

impl MockGateway {
    /// Gateway with one known organization; created entities get ids from 42
    pub fn with_organization(name: &str, id: i64) -> Self {
        let mut state = RemoteState {
            next_id: 42,
            ..RemoteState::default()
        };
        state.organizations.insert(name.to_string(), id);

        Self {
            state: Mutex::new(state),
            calls: Mutex::new(Vec::new()),
            failing_hosts: Mutex::new(Vec::new()),
        }
    }

    /// Pre-seed an inventory, as if created by a previous process lifetime
    pub fn seed_inventory(&self, name: &str, org_id: i64) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.inventories.insert(name.to_string(), (id, org_id));
        id
    }

    /// Pre-seed a host inside an inventory
    pub fn seed_host(&self, inventory_id: i64, name: &str, variables: HostVariables) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state
            .hosts
            .insert((inventory_id, name.to_string()), (id, variables));
        id
    }

    /// Make upserts for a host name fail with an injected server error
    pub fn fail_upserts_for(&self, name: &str) {
        self.failing_hosts.lock().unwrap().push(name.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutation_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn create_inventory_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::CreateInventory(..)))
            .count()
    }

    pub fn find_organization_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::FindOrganization(..)))
            .count()
    }

    /// Sorted snapshot of all hosts for convergence comparisons
    pub fn hosts(&self) -> Vec<(i64, String, HostVariables)> {
        let state = self.state.lock().unwrap();
        let mut hosts: Vec<_> = state
            .hosts
            .iter()
            .map(|((inventory_id, name), (_, variables))| {
                (*inventory_id, name.clone(), variables.clone())
            })
            .collect();
        hosts.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        hosts
    }

    pub fn inventory_id(&self, name: &str) -> Option<i64> {
        self.state
            .lock()
            .unwrap()
            .inventories
            .get(name)
            .map(|(id, _)| *id)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl InventoryGateway for MockGateway {
    async fn ping(&self) -> GatewayResult<()> {
        self.record(Call::Ping);
        Ok(())
    }

    async fn find_organization(&self, name: &str) -> GatewayResult<Option<i64>> {
        self.record(Call::FindOrganization(name.to_string()));
        Ok(self.state.lock().unwrap().organizations.get(name).copied())
    }

    async fn find_inventory(&self, name: &str) -> GatewayResult<Option<i64>> {
        self.record(Call::FindInventory(name.to_string()));
        Ok(self
            .state
            .lock()
            .unwrap()
            .inventories
            .get(name)
            .map(|(id, _)| *id))
    }

    async fn create_inventory(&self, name: &str, org_id: i64) -> GatewayResult<i64> {
        self.record(Call::CreateInventory(name.to_string(), org_id));
        let mut state = self.state.lock().unwrap();
        // conflict resolves to the existing inventory, like the real gateway
        if let Some((id, _)) = state.inventories.get(name) {
            return Ok(*id);
        }
        let id = state.allocate_id();
        state.inventories.insert(name.to_string(), (id, org_id));
        Ok(id)
    }

    async fn find_host(&self, inventory_id: i64, name: &str) -> GatewayResult<Option<i64>> {
        self.record(Call::FindHost(inventory_id, name.to_string()));
        Ok(self
            .state
            .lock()
            .unwrap()
            .hosts
            .get(&(inventory_id, name.to_string()))
            .map(|(id, _)| *id))
    }

    async fn upsert_host(
        &self,
        inventory_id: i64,
        name: &str,
        variables: &HostVariables,
    ) -> GatewayResult<()> {
        self.record(Call::UpsertHost(
            inventory_id,
            name.to_string(),
            variables.clone(),
        ));

        if self.failing_hosts.lock().unwrap().iter().any(|h| h == name) {
            return Err(GatewayError::Api {
                status: 500,
                body: "injected failure".to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        let key = (inventory_id, name.to_string());
        match state.hosts.get(&key).map(|(id, _)| *id) {
            Some(id) => {
                state.hosts.insert(key, (id, variables.clone()));
            }
            None => {
                let id = state.allocate_id();
                state.hosts.insert(key, (id, variables.clone()));
            }
        }
        Ok(())
    }

    async fn delete_host(&self, inventory_id: i64, name: &str) -> GatewayResult<()> {
        self.record(Call::DeleteHost(inventory_id, name.to_string()));
        self.state
            .lock()
            .unwrap()
            .hosts
            .remove(&(inventory_id, name.to_string()));
        Ok(())
    }

    async fn find_or_create_group(&self, inventory_id: i64, name: &str) -> GatewayResult<i64> {
        self.record(Call::FindOrCreateGroup(inventory_id, name.to_string()));
        let mut state = self.state.lock().unwrap();
        let key = (inventory_id, name.to_string());
        if let Some(id) = state.groups.get(&key) {
            return Ok(*id);
        }
        let id = state.allocate_id();
        state.groups.insert(key, id);
        Ok(id)
    }

    async fn add_host_to_group(&self, group_id: i64, host_id: i64) -> GatewayResult<()> {
        self.record(Call::AddHostToGroup(group_id, host_id));
        let mut state = self.state.lock().unwrap();
        if !state.group_members.contains(&(group_id, host_id)) {
            state.group_members.push((group_id, host_id));
        }
        Ok(())
    }
}

/// Watcher that replays scripted batches, one batch per subscription.
///
/// Once the script is exhausted, `subscribe` fails so the engine's run loop
/// returns instead of reconnecting forever.
pub struct ScriptedWatcher {
    batches: Mutex<VecDeque<Vec<ChangeNotification>>>,
}

impl ScriptedWatcher {
    pub fn new(batches: Vec<Vec<ChangeNotification>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
        }
    }
}

#[async_trait]
impl VmWatcher for ScriptedWatcher {
    async fn subscribe(&self) -> WatchResult<VmStream> {
        match self.batches.lock().unwrap().pop_front() {
            Some(batch) => Ok(stream::iter(batch).boxed()),
            None => Err(WatchError::Connect("script exhausted".to_string())),
        }
    }
}

/// Build a record for tests
pub fn vm(
    namespace: &str,
    name: &str,
    address: Option<&str>,
    labels: &[(&str, &str)],
) -> VmRecord {
    VmRecord {
        name: name.to_string(),
        namespace: namespace.to_string(),
        address: address.map(str::to_string),
        labels: labels
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

pub fn added(
    namespace: &str,
    name: &str,
    address: Option<&str>,
    labels: &[(&str, &str)],
) -> ChangeNotification {
    ChangeNotification::added(vm(namespace, name, address, labels))
}

pub fn modified(
    namespace: &str,
    name: &str,
    address: Option<&str>,
    labels: &[(&str, &str)],
) -> ChangeNotification {
    ChangeNotification::modified(vm(namespace, name, address, labels))
}

pub fn removed(namespace: &str, name: &str) -> ChangeNotification {
    ChangeNotification::removed(namespace, name)
}
