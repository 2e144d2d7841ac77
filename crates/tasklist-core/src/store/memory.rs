//! In-memory storage backend.
//!
//! All state lives in ordered maps so iteration is deterministic. Transactions
//! snapshot the whole state before running the unit of work and restore it on
//! failure, which makes nesting free.

use anyhow::{Result, bail};
use std::collections::BTreeMap;

use super::Store;
use crate::model::{
    DependencyEdge, Item, ItemId, ItemUpdate, ListId, NewItem, NewList, Status, TaskList,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct MemoryState {
    lists: BTreeMap<ListId, TaskList>,
    items: BTreeMap<ItemId, Item>,
    /// Keyed by `(dependent, required)`.
    edges: BTreeMap<(ItemId, ItemId), DependencyEdge>,
    next_list_id: i64,
    next_item_id: i64,
}

/// Ephemeral [`Store`] implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    state: MemoryState,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored dependency edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.state.edges.len()
    }

    fn sorted(mut items: Vec<Item>) -> Vec<Item> {
        items.sort_by_key(|item| (item.position, item.id));
        items
    }

    fn ensure_position_free(
        &self,
        list_id: ListId,
        parent_id: Option<ItemId>,
        position: u32,
        except: Option<ItemId>,
    ) -> Result<()> {
        let taken = self.state.items.values().any(|item| {
            item.list_id == list_id
                && item.parent_id == parent_id
                && item.position == position
                && Some(item.id) != except
        });
        if taken {
            bail!("position {position} already used among siblings in list {list_id}");
        }
        Ok(())
    }

    fn descendants_and_self(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = vec![id];
        let mut cursor = 0;
        while cursor < out.len() {
            let current = out[cursor];
            out.extend(
                self.state
                    .items
                    .values()
                    .filter(|item| item.parent_id == Some(current))
                    .map(|item| item.id),
            );
            cursor += 1;
        }
        out
    }
}

impl Store for MemoryStore {
    fn insert_list(&mut self, new: &NewList) -> Result<TaskList> {
        if self.state.lists.values().any(|list| list.key == new.key) {
            bail!("list key '{}' already exists", new.key);
        }
        self.state.next_list_id += 1;
        let list = TaskList {
            id: ListId(self.state.next_list_id),
            key: new.key.clone(),
            title: new.title.clone(),
            list_type: new.list_type,
            created_at_us: new.created_at_us,
            updated_at_us: new.created_at_us,
        };
        self.state.lists.insert(list.id, list.clone());
        Ok(list)
    }

    fn get_list(&self, key: &str) -> Result<Option<TaskList>> {
        Ok(self
            .state
            .lists
            .values()
            .find(|list| list.key == key)
            .cloned())
    }

    fn get_list_by_id(&self, id: ListId) -> Result<Option<TaskList>> {
        Ok(self.state.lists.get(&id).cloned())
    }

    fn all_lists(&self) -> Result<Vec<TaskList>> {
        let mut lists: Vec<TaskList> = self.state.lists.values().cloned().collect();
        lists.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(lists)
    }

    fn delete_list(&mut self, id: ListId) -> Result<()> {
        if self.state.lists.remove(&id).is_none() {
            bail!("list {id} does not exist");
        }
        let doomed: Vec<ItemId> = self
            .state
            .items
            .values()
            .filter(|item| item.list_id == id)
            .map(|item| item.id)
            .collect();
        for item_id in &doomed {
            self.state.items.remove(item_id);
        }
        self.state
            .edges
            .retain(|(dependent, required), _| {
                !doomed.contains(dependent) && !doomed.contains(required)
            });
        Ok(())
    }

    fn insert_item(&mut self, new: &NewItem) -> Result<Item> {
        if !self.state.lists.contains_key(&new.list_id) {
            bail!("list {} does not exist", new.list_id);
        }
        if self.get_item(new.list_id, &new.key)?.is_some() {
            bail!("item key '{}' already exists in list {}", new.key, new.list_id);
        }
        if let Some(parent_id) = new.parent_id
            && !self.state.items.contains_key(&parent_id)
        {
            bail!("parent item {parent_id} does not exist");
        }
        self.ensure_position_free(new.list_id, new.parent_id, new.position, None)?;

        self.state.next_item_id += 1;
        let item = Item {
            id: ItemId(self.state.next_item_id),
            list_id: new.list_id,
            key: new.key.clone(),
            content: new.content.clone(),
            position: new.position,
            status: Status::Pending,
            parent_id: new.parent_id,
            completion_states: BTreeMap::new(),
            started_at_us: None,
            completed_at_us: None,
            created_at_us: new.created_at_us,
            updated_at_us: new.created_at_us,
        };
        self.state.items.insert(item.id, item.clone());
        Ok(item)
    }

    fn get_item(&self, list_id: ListId, key: &str) -> Result<Option<Item>> {
        Ok(self
            .state
            .items
            .values()
            .find(|item| item.list_id == list_id && item.key == key)
            .cloned())
    }

    fn get_item_by_id(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.state.items.get(&id).cloned())
    }

    fn list_items(&self, list_id: ListId) -> Result<Vec<Item>> {
        Ok(Self::sorted(
            self.state
                .items
                .values()
                .filter(|item| item.list_id == list_id)
                .cloned()
                .collect(),
        ))
    }

    fn children_of(&self, parent_id: ItemId) -> Result<Vec<Item>> {
        Ok(Self::sorted(
            self.state
                .items
                .values()
                .filter(|item| item.parent_id == Some(parent_id))
                .cloned()
                .collect(),
        ))
    }

    fn root_items(&self, list_id: ListId) -> Result<Vec<Item>> {
        Ok(Self::sorted(
            self.state
                .items
                .values()
                .filter(|item| item.list_id == list_id && item.parent_id.is_none())
                .cloned()
                .collect(),
        ))
    }

    fn update_item(&mut self, id: ItemId, update: &ItemUpdate) -> Result<Item> {
        let Some(current) = self.state.items.get(&id) else {
            bail!("item {id} does not exist");
        };
        let mut next = current.clone();
        update.apply_to(&mut next);

        if let Some(parent_id) = next.parent_id
            && !self.state.items.contains_key(&parent_id)
        {
            bail!("parent item {parent_id} does not exist");
        }
        if update.parent_id.is_some() || update.position.is_some() {
            self.ensure_position_free(next.list_id, next.parent_id, next.position, Some(id))?;
        }

        self.state.items.insert(id, next.clone());
        Ok(next)
    }

    fn delete_item(&mut self, id: ItemId) -> Result<()> {
        if !self.state.items.contains_key(&id) {
            bail!("item {id} does not exist");
        }
        let doomed = self.descendants_and_self(id);
        for item_id in &doomed {
            self.state.items.remove(item_id);
        }
        self.state
            .edges
            .retain(|(dependent, required), _| {
                !doomed.contains(dependent) && !doomed.contains(required)
            });
        Ok(())
    }

    fn dependency_edges_for(&self, item_id: ItemId) -> Result<Vec<DependencyEdge>> {
        Ok(self
            .state
            .edges
            .values()
            .filter(|edge| edge.dependent == item_id || edge.required == item_id)
            .copied()
            .collect())
    }

    fn all_dependency_edges(&self) -> Result<Vec<DependencyEdge>> {
        Ok(self.state.edges.values().copied().collect())
    }

    fn add_dependency_edge(&mut self, edge: &DependencyEdge) -> Result<()> {
        for endpoint in [edge.dependent, edge.required] {
            if !self.state.items.contains_key(&endpoint) {
                bail!("dependency endpoint {endpoint} does not exist");
            }
        }
        if edge.dependent == edge.required {
            bail!("item {} cannot depend on itself", edge.dependent);
        }
        self.state
            .edges
            .entry((edge.dependent, edge.required))
            .and_modify(|existing| existing.kind = edge.kind)
            .or_insert(*edge);
        Ok(())
    }

    fn remove_dependency_edge(&mut self, dependent: ItemId, required: ItemId) -> Result<bool> {
        Ok(self.state.edges.remove(&(dependent, required)).is_some())
    }

    fn within_transaction<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        let snapshot = self.state.clone();
        let result = f(self);
        if result.is_err() {
            self.state = snapshot;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DependencyKind, ListType};

    fn store_with_list() -> (MemoryStore, ListId) {
        let mut store = MemoryStore::new();
        let list = store
            .insert_list(&NewList {
                key: "work".into(),
                title: "Work".into(),
                list_type: ListType::Sequential,
                created_at_us: 1,
            })
            .expect("insert list");
        (store, list.id)
    }

    fn add(store: &mut MemoryStore, list_id: ListId, key: &str, pos: u32, parent: Option<ItemId>) -> Item {
        store
            .insert_item(&NewItem {
                list_id,
                key: key.into(),
                content: format!("content of {key}"),
                position: pos,
                parent_id: parent,
                created_at_us: 10,
            })
            .expect("insert item")
    }

    #[test]
    fn items_come_back_in_position_order() {
        let (mut store, list_id) = store_with_list();
        add(&mut store, list_id, "b", 2, None);
        add(&mut store, list_id, "a", 1, None);

        let keys: Vec<String> = store
            .root_items(list_id)
            .expect("roots")
            .into_iter()
            .map(|item| item.key)
            .collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn duplicate_keys_and_positions_are_rejected() {
        let (mut store, list_id) = store_with_list();
        add(&mut store, list_id, "a", 1, None);

        let dup_key = store.insert_item(&NewItem {
            list_id,
            key: "a".into(),
            content: String::new(),
            position: 2,
            parent_id: None,
            created_at_us: 10,
        });
        assert!(dup_key.is_err());

        let dup_pos = store.insert_item(&NewItem {
            list_id,
            key: "b".into(),
            content: String::new(),
            position: 1,
            parent_id: None,
            created_at_us: 10,
        });
        assert!(dup_pos.is_err());
    }

    #[test]
    fn delete_cascades_descendants_and_edges() {
        let (mut store, list_id) = store_with_list();
        let root = add(&mut store, list_id, "root", 1, None);
        let child = add(&mut store, list_id, "child", 1, Some(root.id));
        let grandchild = add(&mut store, list_id, "grandchild", 1, Some(child.id));
        let other = add(&mut store, list_id, "other", 2, None);

        store
            .add_dependency_edge(&DependencyEdge {
                dependent: other.id,
                required: grandchild.id,
                kind: DependencyKind::Requires,
                created_at_us: 11,
            })
            .expect("add edge");

        store.delete_item(root.id).expect("delete");

        assert!(store.get_item_by_id(child.id).expect("get").is_none());
        assert!(store.get_item_by_id(grandchild.id).expect("get").is_none());
        assert!(store.get_item_by_id(other.id).expect("get").is_some());
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn re_adding_an_edge_updates_kind() {
        let (mut store, list_id) = store_with_list();
        let a = add(&mut store, list_id, "a", 1, None);
        let b = add(&mut store, list_id, "b", 2, None);

        for kind in [DependencyKind::Requires, DependencyKind::Blocks] {
            store
                .add_dependency_edge(&DependencyEdge {
                    dependent: a.id,
                    required: b.id,
                    kind,
                    created_at_us: 1,
                })
                .expect("add edge");
        }

        let edges = store.all_dependency_edges().expect("edges");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, DependencyKind::Blocks);
        assert!(store.remove_dependency_edge(a.id, b.id).expect("remove"));
        assert!(!store.remove_dependency_edge(a.id, b.id).expect("remove again"));
    }

    #[test]
    fn failed_transaction_restores_snapshot() {
        let (mut store, list_id) = store_with_list();
        let before = store.clone();

        let result: std::result::Result<(), anyhow::Error> = store.within_transaction(|tx| {
            add(tx, list_id, "temp", 1, None);
            anyhow::bail!("abort");
        });

        assert!(result.is_err());
        assert_eq!(store, before);
    }

    #[test]
    fn nested_failure_only_rolls_back_inner_unit() {
        let (mut store, list_id) = store_with_list();

        let result: std::result::Result<(), anyhow::Error> = store.within_transaction(|tx| {
            add(tx, list_id, "kept", 1, None);
            let inner: std::result::Result<(), anyhow::Error> = tx.within_transaction(|inner| {
                add(inner, list_id, "dropped", 2, None);
                anyhow::bail!("inner abort");
            });
            assert!(inner.is_err());
            Ok(())
        });

        assert!(result.is_ok());
        assert!(store.get_item(list_id, "kept").expect("get").is_some());
        assert!(store.get_item(list_id, "dropped").expect("get").is_none());
    }
}
