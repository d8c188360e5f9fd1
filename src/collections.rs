//! Collection tree - flat node arrays with `parent_id` links
//!
//! Each collection owns a flat `Vec<Request>`; folders are nodes whose method
//! is `FOLDER`. The display hierarchy is rebuilt from the parent links on
//! demand instead of being stored twice.
//!
//! Structural operations never fail: an unknown id is a no-op, reported
//! through the `bool`/`Option` return value only.

use std::collections::{HashMap, HashSet};

use crate::models::{generate_id, Collection, HttpMethod, Request};

/// What kind of item an operation refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemKind {
    Collection,
    Folder,
    Request,
}

/// Where a moved item is dropped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveTarget {
    /// Root of the given collection
    Collection,
    /// Inside the given folder
    Folder,
}

/// One line of the rendered tree
#[derive(Clone, Debug, PartialEq)]
pub struct TreeRow {
    pub id: String,
    pub collection_id: String,
    pub kind: ItemKind,
    pub depth: usize,
    pub label: String,
    pub method: Option<HttpMethod>,
}

/// A node whose `parent_id` does not point at a folder of its collection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeViolation {
    pub collection_id: String,
    pub item_id: String,
    pub parent_id: String,
}

/// All collections of the workspace
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectionTree {
    collections: Vec<Collection>,
}

impl CollectionTree {
    pub fn new(collections: Vec<Collection>) -> Self {
        CollectionTree { collections }
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn get(&self, collection_id: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.id == collection_id)
    }

    fn get_mut(&mut self, collection_id: &str) -> Option<&mut Collection> {
        self.collections.iter_mut().find(|c| c.id == collection_id)
    }

    fn collection_index(&self, collection_id: &str) -> Option<usize> {
        self.collections.iter().position(|c| c.id == collection_id)
    }

    /// (collection index, node index) of a node
    fn locate(&self, item_id: &str) -> Option<(usize, usize)> {
        self.collections.iter().enumerate().find_map(|(ci, c)| {
            c.requests
                .iter()
                .position(|r| r.id == item_id)
                .map(|ni| (ci, ni))
        })
    }

    /// Find a node and the collection owning it
    pub fn find_item(&self, item_id: &str) -> Option<(&Collection, &Request)> {
        let (ci, ni) = self.locate(item_id)?;
        let collection = &self.collections[ci];
        Some((collection, &collection.requests[ni]))
    }

    /// Append an existing collection (imports, loads)
    pub fn push(&mut self, collection: Collection) {
        self.collections.push(collection);
    }

    pub fn add_collection(&mut self, name: impl Into<String>) -> String {
        let collection = Collection::new(name);
        let id = collection.id.clone();
        self.collections.push(collection);
        id
    }

    pub fn delete_collection(&mut self, collection_id: &str) -> bool {
        let before = self.collections.len();
        self.collections.retain(|c| c.id != collection_id);
        self.collections.len() != before
    }

    /// Append a folder named `New Folder N` at the collection root
    pub fn add_folder(&mut self, collection_id: &str) -> Option<String> {
        let collection = self.get_mut(collection_id)?;
        let count = collection.requests.iter().filter(|r| r.is_folder()).count();
        let folder = Request::folder(format!("New Folder {}", count + 1));
        let id = folder.id.clone();
        collection.requests.push(folder);
        collection.touch();
        Some(id)
    }

    /// Save a copy of `request` into a collection, optionally inside a folder
    pub fn add_request(
        &mut self,
        collection_id: &str,
        folder_id: Option<&str>,
        request: &Request,
    ) -> Option<String> {
        let collection = self.get_mut(collection_id)?;
        if let Some(folder) = folder_id {
            if !collection.has_folder(folder) {
                return None;
            }
        }

        let mut node = request.clone();
        node.id = generate_id();
        node.parent_id = folder_id.map(String::from);
        let id = node.id.clone();
        collection.requests.push(node);
        collection.touch();
        Some(id)
    }

    /// Overwrite a saved request with the editor contents, keeping its place
    pub fn update_request(&mut self, item_id: &str, request: &Request) -> bool {
        let Some((ci, ni)) = self.locate(item_id) else {
            return false;
        };
        let collection = &mut self.collections[ci];
        let node = &mut collection.requests[ni];
        if node.is_folder() || request.is_folder() {
            return false;
        }
        let parent_id = node.parent_id.take();
        *node = request.clone();
        node.id = item_id.to_string();
        node.parent_id = parent_id;
        collection.touch();
        true
    }

    /// Remove exactly one node. Children of a deleted folder are not touched.
    pub fn delete_item(&mut self, item_id: &str) -> bool {
        let Some((ci, ni)) = self.locate(item_id) else {
            return false;
        };
        let collection = &mut self.collections[ci];
        collection.requests.remove(ni);
        collection.touch();
        true
    }

    /// Rename a collection or a node
    pub fn rename_item(&mut self, item_id: &str, new_name: &str) -> bool {
        if let Some(collection) = self.get_mut(item_id) {
            collection.name = new_name.to_string();
            collection.touch();
            return true;
        }
        let Some((ci, ni)) = self.locate(item_id) else {
            return false;
        };
        let collection = &mut self.collections[ci];
        collection.requests[ni].name = new_name.to_string();
        collection.touch();
        true
    }

    /// Deep-clone an item with fresh ids and a ` (Copy)` suffix
    pub fn duplicate_item(&mut self, item_id: &str, kind: ItemKind) -> Option<String> {
        match kind {
            ItemKind::Collection => {
                let source = self.get(item_id)?;
                let mut copy = Collection::new(format!("{} (Copy)", source.name));
                copy.description = source.description.clone();
                copy.requests = clone_with_new_ids(&source.requests);
                let id = copy.id.clone();
                self.collections.push(copy);
                Some(id)
            }
            ItemKind::Folder | ItemKind::Request => {
                let (ci, ni) = self.locate(item_id)?;
                let collection = &mut self.collections[ci];
                if collection.requests[ni].is_folder() != (kind == ItemKind::Folder) {
                    return None;
                }

                let ids = subtree_ids(collection, item_id);
                let originals: Vec<Request> = collection
                    .requests
                    .iter()
                    .filter(|r| ids.contains(&r.id))
                    .cloned()
                    .collect();
                let root_index = originals.iter().position(|r| r.id == item_id)?;
                let mut copies = clone_with_new_ids(&originals);
                let root = &mut copies[root_index];
                root.name = format!("{} (Copy)", root.display_name());
                let root_id = root.id.clone();
                collection.requests.extend(copies);
                collection.touch();
                Some(root_id)
            }
        }
    }

    /// Move a node to a collection root or into a folder
    ///
    /// A folder moves together with its descendants. Dropping a folder into
    /// itself or one of its descendants is refused.
    pub fn move_item(&mut self, item_id: &str, target_id: &str, target: MoveTarget) -> bool {
        let Some((source_ci, _)) = self.locate(item_id) else {
            return false;
        };

        let (target_ci, new_parent) = match target {
            MoveTarget::Collection => match self.collection_index(target_id) {
                Some(ci) => (ci, None),
                None => return false,
            },
            MoveTarget::Folder => {
                if target_id == item_id {
                    return false;
                }
                match self.locate(target_id) {
                    Some((ci, fi)) if self.collections[ci].requests[fi].is_folder() => {
                        (ci, Some(target_id.to_string()))
                    }
                    _ => return false,
                }
            }
        };

        if source_ci == target_ci {
            let collection = &mut self.collections[source_ci];
            if new_parent.is_some() && subtree_ids(collection, item_id).contains(target_id) {
                return false;
            }
            if let Some(node) = collection.find_mut(item_id) {
                node.parent_id = new_parent;
            }
            collection.touch();
            return true;
        }

        let source = &mut self.collections[source_ci];
        let ids = subtree_ids(source, item_id);
        let mut moved = Vec::with_capacity(ids.len());
        let mut kept = Vec::with_capacity(source.requests.len());
        for node in source.requests.drain(..) {
            if ids.contains(&node.id) {
                moved.push(node);
            } else {
                kept.push(node);
            }
        }
        source.requests = kept;
        source.touch();

        for node in moved.iter_mut() {
            if node.id == item_id {
                node.parent_id = new_parent.clone();
            }
        }
        let target = &mut self.collections[target_ci];
        target.requests.extend(moved);
        target.touch();
        true
    }

    /// Display rows: each collection followed by its nodes depth-first
    ///
    /// Nodes with a dangling `parent_id` are shown at the collection root.
    pub fn tree_rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        for collection in &self.collections {
            rows.push(TreeRow {
                id: collection.id.clone(),
                collection_id: collection.id.clone(),
                kind: ItemKind::Collection,
                depth: 0,
                label: collection.name.clone(),
                method: None,
            });

            let mut children: HashMap<Option<&str>, Vec<&Request>> = HashMap::new();
            for node in &collection.requests {
                let parent = node
                    .parent_id
                    .as_deref()
                    .filter(|p| *p != node.id && collection.has_folder(p));
                children.entry(parent).or_default().push(node);
            }

            let mut visited = HashSet::new();
            let mut stack: Vec<(&Request, usize)> = children
                .get(&None)
                .map(|roots| roots.iter().rev().map(|r| (*r, 1)).collect())
                .unwrap_or_default();

            while let Some((node, depth)) = stack.pop() {
                if !visited.insert(node.id.as_str()) {
                    continue;
                }
                rows.push(row_for(collection, node, depth));
                if let Some(kids) = children.get(&Some(node.id.as_str())) {
                    stack.extend(kids.iter().rev().map(|k| (*k, depth + 1)));
                }
            }

            // Folder cycles loaded from disk are unreachable from the root
            for node in &collection.requests {
                if !visited.contains(node.id.as_str()) {
                    rows.push(row_for(collection, node, 1));
                }
            }
        }
        rows
    }

    /// Nodes breaking the "parent is a folder of the same collection" rule
    pub fn violations(&self) -> Vec<TreeViolation> {
        self.collections
            .iter()
            .flat_map(|c| {
                c.requests.iter().filter_map(move |node| {
                    let parent = node.parent_id.as_ref()?;
                    if c.has_folder(parent) {
                        None
                    } else {
                        Some(TreeViolation {
                            collection_id: c.id.clone(),
                            item_id: node.id.clone(),
                            parent_id: parent.clone(),
                        })
                    }
                })
            })
            .collect()
    }
}

fn row_for(collection: &Collection, node: &Request, depth: usize) -> TreeRow {
    TreeRow {
        id: node.id.clone(),
        collection_id: collection.id.clone(),
        kind: if node.is_folder() {
            ItemKind::Folder
        } else {
            ItemKind::Request
        },
        depth,
        label: node.display_name(),
        method: if node.is_folder() {
            None
        } else {
            Some(node.method.clone())
        },
    }
}

/// Ids of `root_id` and everything below it
fn subtree_ids(collection: &Collection, root_id: &str) -> HashSet<String> {
    let mut ids = HashSet::new();
    ids.insert(root_id.to_string());
    loop {
        let before = ids.len();
        for node in &collection.requests {
            if let Some(parent) = &node.parent_id {
                if ids.contains(parent) {
                    ids.insert(node.id.clone());
                }
            }
        }
        if ids.len() == before {
            return ids;
        }
    }
}

/// Clone nodes under fresh ids, remapping parent links inside the set
fn clone_with_new_ids(nodes: &[Request]) -> Vec<Request> {
    let mapping: HashMap<&str, String> = nodes
        .iter()
        .map(|n| (n.id.as_str(), generate_id()))
        .collect();

    nodes
        .iter()
        .map(|n| {
            let mut copy = n.clone();
            copy.id = mapping[n.id.as_str()].clone();
            copy.parent_id = n
                .parent_id
                .as_ref()
                .map(|p| mapping.get(p.as_str()).cloned().unwrap_or_else(|| p.clone()));
            copy
        })
        .collect()
}
