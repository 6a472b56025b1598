//! In-process remote store, for tests and offline runs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock, mpsc};

use super::{ChildEvent, PathUpdates, RemoteError, RemoteStore, split_path};

struct Subscriber {
    path: Vec<String>,
    tx: mpsc::UnboundedSender<ChildEvent>,
}

/// Remote store backed by a JSON tree in memory.
///
/// Updates are applied under one write lock, so readers never see half of a
/// multi-path update.
#[derive(Default)]
pub struct MemoryRemoteStore {
    tree: RwLock<Value>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_key: AtomicU64,
}

impl std::fmt::Debug for MemoryRemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRemoteStore").finish_non_exhaustive()
    }
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing tree.
    #[must_use]
    pub fn with_tree(tree: Value) -> Self {
        Self {
            tree: RwLock::new(tree),
            ..Self::default()
        }
    }

    /// Copy of the whole tree.
    pub async fn snapshot(&self) -> Value {
        self.tree.read().await.clone()
    }

    fn generate_key(&self) -> String {
        let n = self.next_key.fetch_add(1, Ordering::Relaxed);
        format!("-M{n:016x}")
    }
}

fn lookup<'a, S: AsRef<str>>(tree: &'a Value, segments: &[S]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(tree, |node, segment| node.get(segment.as_ref()))
        .filter(|value| !value.is_null())
}

fn child_keys(tree: &Value, segments: &[String]) -> BTreeSet<String> {
    lookup(tree, segments)
        .and_then(Value::as_object)
        .map(|children| children.keys().cloned().collect())
        .unwrap_or_default()
}

fn set_path(tree: &mut Value, segments: &[&str], value: Value) {
    let mut node = tree;
    for segment in segments {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(children) = node else {
            return;
        };
        node = children
            .entry((*segment).to_owned())
            .or_insert(Value::Null);
    }
    *node = value;
}

/// Remove the node at `segments` and any parents left empty.
fn remove_path(node: &mut Value, segments: &[&str]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let Value::Object(children) = node else {
        return;
    };

    if rest.is_empty() {
        children.remove(*first);
    } else if let Some(child) = children.get_mut(*first) {
        remove_path(child, rest);
        if child.as_object().is_some_and(Map::is_empty) {
            children.remove(*first);
        }
    }
}

fn matches_equal(candidate: &Value, child: &str, value: &Value) -> bool {
    candidate.get(child).is_some_and(|field| field == value)
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError> {
        let segments = split_path(path)?;
        Ok(lookup(&*self.tree.read().await, &segments).cloned())
    }

    async fn query_equal(
        &self,
        path: &str,
        child: &str,
        value: &Value,
    ) -> Result<BTreeMap<String, Value>, RemoteError> {
        let segments = split_path(path)?;
        let tree = self.tree.read().await;
        let Some(Value::Object(children)) = lookup(&tree, &segments) else {
            return Ok(BTreeMap::new());
        };

        Ok(children
            .iter()
            .filter(|(_, candidate)| matches_equal(candidate, child, value))
            .map(|(key, candidate)| (key.clone(), candidate.clone()))
            .collect())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, RemoteError> {
        split_path(path)?;
        let key = self.generate_key();
        let mut updates = PathUpdates::new();
        updates.insert(format!("{}/{key}", path.trim_matches('/')), Some(value));
        self.update(updates).await?;
        Ok(key)
    }

    async fn update(&self, updates: PathUpdates) -> Result<(), RemoteError> {
        let parsed = updates
            .iter()
            .map(|(path, value)| Ok((split_path(path)?, value)))
            .collect::<Result<Vec<_>, RemoteError>>()?;

        let mut subscribers = self.subscribers.lock().await;
        let mut tree = self.tree.write().await;

        let before: Vec<BTreeSet<String>> = subscribers
            .iter()
            .map(|sub| child_keys(&tree, &sub.path))
            .collect();

        for (segments, value) in parsed {
            match value {
                Some(value) if !value.is_null() => set_path(&mut tree, &segments, value.clone()),
                _ => remove_path(&mut tree, &segments),
            }
        }

        for (sub, known) in subscribers.iter().zip(before) {
            for key in child_keys(&tree, &sub.path).difference(&known) {
                let mut path = sub.path.clone();
                path.push(key.clone());
                if let Some(value) = lookup(&tree, &path) {
                    // A closed receiver is pruned below.
                    let _ = sub.tx.send(ChildEvent {
                        key: key.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
        subscribers.retain(|sub| !sub.tx.is_closed());

        Ok(())
    }

    async fn subscribe_child_added(
        &self,
        path: &str,
    ) -> Result<mpsc::UnboundedReceiver<ChildEvent>, RemoteError> {
        let segments: Vec<String> = split_path(path)?.into_iter().map(str::to_owned).collect();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut subscribers = self.subscribers.lock().await;
        let tree = self.tree.read().await;
        if let Some(Value::Object(children)) = lookup(&tree, &segments) {
            for (key, value) in children {
                let _ = tx.send(ChildEvent {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        subscribers.push(Subscriber { path: segments, tx });

        Ok(rx)
    }
}
