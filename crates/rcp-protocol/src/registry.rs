//! The parameter registry: id allocation, the parameter tree, and the
//! pending-change sets.
//!
//! Every server and client owns exactly one [`ParameterRegistry`]. It is
//! the only owner of [`Parameter`] values; groups and children refer to
//! each other by [`ParameterId`].
//!
//! # Pending changes
//!
//! Two sets accumulate local changes until the next sync tick:
//!
//! - **dirty**: parameters with unsent field changes. Mutating a parameter
//!   through a [`ParameterGuard`] adds it when the guard drops.
//! - **removed**: ids deleted locally whose removal has not been sent yet.
//!
//! An id is never in both sets. Removal evicts any dirty entry, and a
//! removed id cannot be dirtied or reallocated until the removed set is
//! drained.
//!
//! Changes merged from a peer never enter the dirty set, so they are not
//! echoed back.
//!
//! # Concurrency
//!
//! The registry is a plain single-threaded structure. The server or
//! client that owns it is driven from one task, the same way a session
//! manager is owned by a single accept loop.

use std::collections::{BTreeSet, HashMap};
use std::ops::{Deref, DerefMut};

use serde::Serialize;

use crate::packet::{encode_remove, encode_update, ValueUpdate};
use crate::{Datatype, Parameter, ParameterId, RegistryError, TypeDefinition};

/// How many levels below the root [`ParameterRegistry::hierarchy`]
/// descends. Snapshot consumers (`Debug`, `PartialEq`, serde) recurse, so
/// the snapshot stays shallow even when a peer builds a deep chain.
pub const MAX_HIERARCHY_DEPTH: usize = 64;

/// What [`ParameterRegistry::merge`] did with an incoming parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// The id was unknown; the parameter is now registered.
    Added,
    /// At least one field of the cached parameter changed.
    Updated,
    /// The incoming parameter matched the cached one.
    Unchanged,
}

/// Owns every parameter of one peer.
///
/// ## Lifecycle of an id
///
/// ```text
/// next_id() ──→ create() ──→ [live, dirty] ──→ encode_dirty() ──→ [live]
///                                  │                                 │
///                                  └───────────── remove() ──────────┘
///                                                    │
///                                                    ▼
///                                     [removed] ──→ encode_removed() ──→ free
/// ```
pub struct ParameterRegistry {
    /// Reserved ids, as unsigned slots.
    ids: BTreeSet<u16>,

    /// Live parameters, including the root group.
    parameters: HashMap<ParameterId, Parameter>,

    /// Ids with unsent local changes.
    dirty: BTreeSet<ParameterId>,

    /// Ids removed locally, pending a `REMOVE` broadcast.
    removed: BTreeSet<ParameterId>,
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterRegistry {
    /// Creates a registry holding only the root group.
    pub fn new() -> Self {
        let mut root = Parameter::new(ParameterId::ROOT, TypeDefinition::Group);
        root.set_label("root");
        root.mark_clean();

        let mut parameters = HashMap::new();
        parameters.insert(ParameterId::ROOT, root);

        Self {
            ids: BTreeSet::new(),
            parameters,
            dirty: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    // -- Ids -------------------------------------------------------------

    /// The first id, scanning 1..=65535 as unsigned, that is neither
    /// allocated nor waiting for its removal to be sent.
    pub fn next_id(&self) -> Option<ParameterId> {
        (1..=u16::MAX)
            .filter(|slot| !self.ids.contains(slot))
            .map(ParameterId::from_slot)
            .find(|id| !self.removed.contains(id))
    }

    // -- Lookup ----------------------------------------------------------

    pub fn root(&self) -> &Parameter {
        // The root is inserted at construction and never evicted.
        &self.parameters[&ParameterId::ROOT]
    }

    pub fn get(&self, id: ParameterId) -> Option<&Parameter> {
        self.parameters.get(&id)
    }

    pub fn contains(&self, id: ParameterId) -> bool {
        !id.is_root() && self.parameters.contains_key(&id)
    }

    /// Number of parameters, not counting the root.
    pub fn len(&self) -> usize {
        self.parameters.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of every parameter except the root, in ascending order.
    pub fn ids(&self) -> Vec<ParameterId> {
        let mut ids: Vec<_> = self
            .parameters
            .keys()
            .copied()
            .filter(|id| !id.is_root())
            .collect();
        ids.sort();
        ids
    }

    fn is_group(&self, id: ParameterId) -> bool {
        self.parameters.get(&id).is_some_and(Parameter::is_group)
    }

    /// Whether `node` is `ancestor` or lies somewhere below it.
    fn is_within(&self, node: ParameterId, ancestor: ParameterId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parameters.get(&id).and_then(Parameter::parent);
        }
        false
    }

    /// Checks that `parent` names a group. `None` and the root id both
    /// mean the root.
    fn resolve_group(
        &self,
        parent: Option<ParameterId>,
    ) -> Result<Option<ParameterId>, RegistryError> {
        match parent {
            None => Ok(None),
            Some(id) if id.is_root() => Ok(None),
            Some(id) => match self.parameters.get(&id) {
                None => Err(RegistryError::NotFound(id)),
                Some(parameter) if !parameter.is_group() => Err(RegistryError::NotAGroup(id)),
                Some(_) => Ok(Some(id)),
            },
        }
    }

    // -- Creation --------------------------------------------------------

    /// Creates a parameter under `parent` (the root when `None`) and marks
    /// it dirty so the next sync announces it.
    ///
    /// # Errors
    /// - [`RegistryError::IdSpaceExhausted`] when every id is taken
    /// - [`RegistryError::NotFound`] / [`RegistryError::NotAGroup`] for a
    ///   bad parent
    pub fn create(
        &mut self,
        definition: TypeDefinition,
        parent: Option<ParameterId>,
    ) -> Result<ParameterId, RegistryError> {
        let parent = self.resolve_group(parent)?;
        let id = self.next_id().ok_or(RegistryError::IdSpaceExhausted)?;

        let mut parameter = Parameter::new(id, definition);
        parameter.set_parent(parent);
        self.attach(parameter);
        self.dirty.insert(id);

        tracing::debug!(%id, parent = ?parent, "parameter created");
        Ok(id)
    }

    pub fn create_group(
        &mut self,
        parent: Option<ParameterId>,
    ) -> Result<ParameterId, RegistryError> {
        self.create(TypeDefinition::Group, parent)
    }

    /// Registers `parameter` and links it to its group. Returns `false`
    /// when the id is already registered.
    fn attach(&mut self, mut parameter: Parameter) -> bool {
        let id = parameter.id();
        if id.is_root() || self.parameters.contains_key(&id) {
            return false;
        }
        if !self.ids.insert(id.slot()) {
            tracing::warn!(%id, "id was reserved without a live parameter");
        }

        let parent = match parameter.parent() {
            Some(parent) if self.is_group(parent) => parent,
            Some(parent) => {
                tracing::warn!(%id, %parent, "parent group unknown, attaching to root");
                parameter.apply_parent(None);
                ParameterId::ROOT
            }
            None => {
                parameter.apply_parent(None);
                ParameterId::ROOT
            }
        };
        if let Some(group) = self.parameters.get_mut(&parent) {
            group.insert_child(id);
        }
        self.parameters.insert(id, parameter);
        true
    }

    // -- Mutation --------------------------------------------------------

    /// Borrows a parameter for local changes. The parameter joins the
    /// dirty set when the guard drops, if anything changed.
    pub fn parameter_mut(
        &mut self,
        id: ParameterId,
    ) -> Result<ParameterGuard<'_>, RegistryError> {
        if id.is_root() {
            return Err(RegistryError::RootImmutable);
        }
        let parameter = self
            .parameters
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;
        Ok(ParameterGuard {
            parameter,
            dirty: &mut self.dirty,
            removed: &self.removed,
        })
    }

    /// Adds `id` to the dirty set. Ignored for the root and for ids
    /// pending removal.
    pub fn set_dirty(&mut self, id: ParameterId) {
        if id.is_root() || self.removed.contains(&id) || !self.parameters.contains_key(&id) {
            return;
        }
        self.dirty.insert(id);
    }

    /// Moves a parameter into `parent` (the root when `None`).
    ///
    /// # Errors
    /// - [`RegistryError::RootImmutable`] for the root itself
    /// - [`RegistryError::Cycle`] when `parent` lies inside `id`'s subtree
    pub fn move_to(
        &mut self,
        id: ParameterId,
        parent: Option<ParameterId>,
    ) -> Result<(), RegistryError> {
        if id.is_root() {
            return Err(RegistryError::RootImmutable);
        }
        if !self.parameters.contains_key(&id) {
            return Err(RegistryError::NotFound(id));
        }
        let parent = self.resolve_group(parent)?;
        if parent.is_some_and(|target| self.is_within(target, id)) {
            return Err(RegistryError::Cycle(id));
        }
        if self.relink(id, parent, true) {
            self.set_dirty(id);
        }
        Ok(())
    }

    /// Updates both sides of the parent link. A local move marks the
    /// parent field changed; a remote one does not.
    fn relink(&mut self, id: ParameterId, parent: Option<ParameterId>, local: bool) -> bool {
        let Some(old) = self.parameters.get(&id).map(|p| p.parent().unwrap_or(ParameterId::ROOT))
        else {
            return false;
        };
        let new = parent.unwrap_or(ParameterId::ROOT);
        if old == new {
            return false;
        }
        if let Some(group) = self.parameters.get_mut(&old) {
            group.remove_child(id);
        }
        if let Some(group) = self.parameters.get_mut(&new) {
            group.insert_child(id);
        }
        if let Some(parameter) = self.parameters.get_mut(&id) {
            if local {
                parameter.set_parent(parent);
            } else {
                parameter.apply_parent(parent);
            }
        }
        true
    }

    // -- Removal ---------------------------------------------------------

    /// Removes a parameter and its whole subtree, queueing a removal
    /// notice for `id` alone. Peers evict the descendants themselves.
    ///
    /// Returns `Ok(false)` when `id` was already removed.
    pub fn remove(&mut self, id: ParameterId) -> Result<bool, RegistryError> {
        if id.is_root() {
            return Err(RegistryError::RootImmutable);
        }
        if !self.parameters.contains_key(&id) {
            if self.removed.contains(&id) {
                tracing::warn!(%id, "parameter already removed");
                return Ok(false);
            }
            return Err(RegistryError::NotFound(id));
        }
        let evicted = self.evict(id);
        self.removed.insert(id);
        tracing::debug!(%id, evicted = evicted.len(), "parameter removed");
        Ok(true)
    }

    /// Removes a parameter and its subtree without queueing a removal
    /// notice. Returns the evicted parameters, `id` first.
    pub fn remove_direct(&mut self, id: ParameterId) -> Vec<Parameter> {
        if id.is_root() {
            tracing::warn!("refusing to evict the root group");
            return Vec::new();
        }
        self.evict(id)
    }

    fn evict(&mut self, id: ParameterId) -> Vec<Parameter> {
        let mut evicted = Vec::new();
        let Some(parent) = self
            .parameters
            .get(&id)
            .map(|p| p.parent().unwrap_or(ParameterId::ROOT))
        else {
            return evicted;
        };
        if let Some(group) = self.parameters.get_mut(&parent) {
            group.remove_child(id);
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(mut parameter) = self.parameters.remove(&current) else {
                continue;
            };
            stack.extend(parameter.children());
            parameter.clear_callbacks();
            self.dirty.remove(&current);
            self.ids.remove(&current.slot());
            evicted.push(parameter);
        }
        evicted
    }

    /// Drops every parameter except the root and forgets pending changes.
    pub fn clear(&mut self) {
        let ids = self.ids();
        for id in ids {
            if let Some(mut parameter) = self.parameters.remove(&id) {
                parameter.clear_callbacks();
            }
        }
        if let Some(root) = self.parameters.get_mut(&ParameterId::ROOT) {
            for child in root.children().collect::<Vec<_>>() {
                root.remove_child(child);
            }
        }
        self.ids.clear();
        self.dirty.clear();
        self.removed.clear();
    }

    // -- Remote changes --------------------------------------------------

    /// Merges a parameter parsed from a peer.
    ///
    /// Known ids are updated field by field and re-parented when the
    /// incoming parameter names a different group. Unknown ids are
    /// registered. Nothing merged here becomes dirty.
    ///
    /// # Errors
    /// - [`RegistryError::RootImmutable`] for id 0
    /// - [`RegistryError::DatatypeMismatch`] when the cached parameter has
    ///   a different datatype
    pub fn merge(&mut self, incoming: Parameter) -> Result<Merge, RegistryError> {
        let id = incoming.id();
        if id.is_root() {
            return Err(RegistryError::RootImmutable);
        }

        let Some(existing) = self.parameters.get_mut(&id) else {
            self.attach(incoming);
            return Ok(Merge::Added);
        };
        if existing.datatype() != incoming.datatype() {
            return Err(RegistryError::DatatypeMismatch {
                id,
                expected: existing.datatype(),
                found: incoming.datatype(),
            });
        }
        let mut applied = existing.merge(&incoming);

        if let Some(reference) = incoming.parent_reference() {
            match self.resolve_group(Some(reference)) {
                Ok(target) if target.is_none_or(|t| !self.is_within(t, id)) => {
                    applied |= self.relink(id, target, false);
                }
                _ => {
                    tracing::warn!(%id, parent = %reference, "cannot move parameter into that group");
                }
            }
        }

        if !applied {
            return Ok(Merge::Unchanged);
        }
        if let Some(parameter) = self.parameters.get_mut(&id) {
            parameter.notify_updated();
        }
        Ok(Merge::Updated)
    }

    /// Applies a compact value update from a peer.
    pub fn apply_value(&mut self, update: &ValueUpdate) -> Result<bool, RegistryError> {
        let parameter = self
            .parameters
            .get_mut(&update.id)
            .filter(|p| !p.id().is_root())
            .ok_or(RegistryError::NotFound(update.id))?;
        if parameter.datatype() != update.datatype {
            return Err(RegistryError::DatatypeMismatch {
                id: update.id,
                expected: parameter.datatype(),
                found: update.datatype,
            });
        }
        let applied = parameter.apply_value(update.value.clone())?;
        if applied {
            parameter.notify_updated();
        }
        Ok(applied)
    }

    // -- Sync ------------------------------------------------------------

    pub fn dirty(&self) -> impl Iterator<Item = ParameterId> + '_ {
        self.dirty.iter().copied()
    }

    pub fn removed(&self) -> impl Iterator<Item = ParameterId> + '_ {
        self.removed.iter().copied()
    }

    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty() || !self.removed.is_empty()
    }

    /// Drains the dirty set into delta `UPDATE` packets.
    pub fn encode_dirty(&mut self) -> Vec<Vec<u8>> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty
            .into_iter()
            .filter_map(|id| self.parameters.get_mut(&id).map(|p| encode_update(p, false)))
            .collect()
    }

    /// Drains the removed set into `REMOVE` packets. The ids become
    /// available for reuse.
    pub fn encode_removed(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.removed)
            .into_iter()
            .map(encode_remove)
            .collect()
    }

    /// Full `UPDATE` packets for every parameter below the root, groups
    /// before their children. Change flags are left alone.
    pub fn encode_all(&mut self) -> Vec<Vec<u8>> {
        self.depth_first()
            .into_iter()
            .filter_map(|id| self.parameters.get_mut(&id).map(|p| encode_update(p, true)))
            .collect()
    }

    /// Ids below the root in pre-order, children ascending.
    pub fn depth_first(&self) -> Vec<ParameterId> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack: Vec<ParameterId> = self.root().children().rev().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(parameter) = self.parameters.get(&id) {
                stack.extend(parameter.children().rev());
            }
        }
        order
    }

    // -- Inspection ------------------------------------------------------

    /// A serializable snapshot of the tree, down to
    /// [`MAX_HIERARCHY_DEPTH`] levels below the root. Deeper subtrees are
    /// left out and a warning is logged.
    pub fn hierarchy(&self) -> HierarchyNode {
        let mut order = Vec::with_capacity(self.parameters.len());
        let mut stack = vec![(ParameterId::ROOT, 0)];
        let mut truncated = false;
        while let Some((id, depth)) = stack.pop() {
            order.push(id);
            let Some(parameter) = self.parameters.get(&id) else {
                continue;
            };
            if depth == MAX_HIERARCHY_DEPTH {
                truncated |= parameter.children().next().is_some();
                continue;
            }
            stack.extend(parameter.children().map(|child| (child, depth + 1)));
        }
        if truncated {
            tracing::warn!(limit = MAX_HIERARCHY_DEPTH, "hierarchy snapshot truncated");
        }

        // Pre-order puts every node before its descendants, so walking it
        // backwards finishes children first.
        let mut built: HashMap<ParameterId, HierarchyNode> = HashMap::with_capacity(order.len());
        for id in order.into_iter().rev() {
            let children = self
                .parameters
                .get(&id)
                .map(|p| p.children().filter_map(|child| built.remove(&child)).collect())
                .unwrap_or_default();
            built.insert(id, self.node(id, children));
        }
        built
            .remove(&ParameterId::ROOT)
            .unwrap_or_else(|| self.node(ParameterId::ROOT, Vec::new()))
    }

    fn node(&self, id: ParameterId, children: Vec<HierarchyNode>) -> HierarchyNode {
        let parameter = self.parameters.get(&id);
        HierarchyNode {
            id,
            datatype: parameter.map_or(Datatype::Group, Parameter::datatype),
            label: parameter.and_then(Parameter::label).map(str::to_string),
            value: parameter.and_then(Parameter::value).map(ToString::to_string),
            children,
        }
    }
}

/// One node of [`ParameterRegistry::hierarchy`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyNode {
    pub id: ParameterId,
    pub datatype: Datatype,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HierarchyNode>,
}

/// Mutable access to one registered parameter.
///
/// When the guard drops, a parameter with unsent changes is added to the
/// dirty set.
pub struct ParameterGuard<'a> {
    parameter: &'a mut Parameter,
    dirty: &'a mut BTreeSet<ParameterId>,
    removed: &'a BTreeSet<ParameterId>,
}

impl Deref for ParameterGuard<'_> {
    type Target = Parameter;

    fn deref(&self) -> &Parameter {
        self.parameter
    }
}

impl DerefMut for ParameterGuard<'_> {
    fn deref_mut(&mut self) -> &mut Parameter {
        self.parameter
    }
}

impl Drop for ParameterGuard<'_> {
    fn drop(&mut self) {
        let id = self.parameter.id();
        if self.parameter.has_changes() && !self.removed.contains(&id) {
            self.dirty.insert(id);
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::wire::WireReader;
    use crate::{Packet, PacketData, Value};

    fn boolean() -> TypeDefinition {
        TypeDefinition::for_datatype(Datatype::Boolean).unwrap()
    }

    /// Round-trips a parameter through a full write, like a peer would.
    fn proxy_of(registry: &mut ParameterRegistry, id: ParameterId) -> Parameter {
        let bytes = registry.parameters.get_mut(&id).unwrap().to_bytes(true);
        Parameter::parse(&mut WireReader::new(&bytes)).unwrap()
    }

    fn assert_tree_consistent(registry: &ParameterRegistry) {
        for (id, parameter) in &registry.parameters {
            if id.is_root() {
                continue;
            }
            let parent = parameter.parent().unwrap_or(ParameterId::ROOT);
            assert!(
                registry.parameters[&parent].has_child(*id),
                "{id} not listed under {parent}"
            );
            for child in parameter.children() {
                assert_eq!(registry.parameters[&child].parent(), Some(*id));
            }
        }
        assert!(registry.dirty.is_disjoint(&registry.removed));
    }

    // =====================================================================
    // ids
    // =====================================================================

    #[test]
    fn test_next_id_starts_at_one() {
        let registry = ParameterRegistry::new();
        assert_eq!(registry.next_id(), Some(ParameterId(1)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_next_id_skips_ids_pending_removal() {
        let mut registry = ParameterRegistry::new();
        let first = registry.create(boolean(), None).unwrap();
        registry.remove(first).unwrap();
        assert_eq!(registry.next_id(), Some(ParameterId(2)));

        registry.encode_removed();
        assert_eq!(registry.next_id(), Some(first));
    }

    #[test]
    fn test_next_id_wraps_into_negative_ids() {
        let mut registry = ParameterRegistry::new();
        registry.ids.extend(1..=0x7fff);
        assert_eq!(registry.next_id(), Some(ParameterId(i16::MIN)));
    }

    #[test]
    fn test_create_exhausted_returns_error() {
        let mut registry = ParameterRegistry::new();
        registry.ids.extend(1..=u16::MAX);
        assert!(matches!(
            registry.create(boolean(), None),
            Err(RegistryError::IdSpaceExhausted)
        ));
    }

    // =====================================================================
    // create / tree
    // =====================================================================

    #[test]
    fn test_create_marks_dirty_and_links_to_root() {
        let mut registry = ParameterRegistry::new();
        let id = registry.create(boolean(), None).unwrap();
        assert_eq!(registry.dirty().collect::<Vec<_>>(), vec![id]);
        assert!(registry.root().has_child(id));
        assert_eq!(registry.get(id).unwrap().parent(), None);
    }

    #[test]
    fn test_create_under_non_group_fails() {
        let mut registry = ParameterRegistry::new();
        let leaf = registry.create(boolean(), None).unwrap();
        assert!(matches!(
            registry.create(boolean(), Some(leaf)),
            Err(RegistryError::NotAGroup(id)) if id == leaf
        ));
        assert!(matches!(
            registry.create(boolean(), Some(ParameterId(99))),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_move_to_updates_both_sides() {
        let mut registry = ParameterRegistry::new();
        let group = registry.create_group(None).unwrap();
        let leaf = registry.create(boolean(), None).unwrap();
        registry.encode_dirty();

        registry.move_to(leaf, Some(group)).unwrap();
        assert!(registry.get(group).unwrap().has_child(leaf));
        assert!(!registry.root().has_child(leaf));
        assert_eq!(registry.dirty().collect::<Vec<_>>(), vec![leaf]);
        assert_tree_consistent(&registry);

        registry.move_to(leaf, None).unwrap();
        assert!(registry.root().has_child(leaf));
        assert_tree_consistent(&registry);
    }

    #[test]
    fn test_move_to_own_subtree_returns_cycle() {
        let mut registry = ParameterRegistry::new();
        let outer = registry.create_group(None).unwrap();
        let inner = registry.create_group(Some(outer)).unwrap();
        assert!(matches!(
            registry.move_to(outer, Some(inner)),
            Err(RegistryError::Cycle(_))
        ));
        assert!(matches!(
            registry.move_to(outer, Some(outer)),
            Err(RegistryError::Cycle(_))
        ));
    }

    // =====================================================================
    // guard
    // =====================================================================

    #[test]
    fn test_guard_dirties_only_on_change() {
        let mut registry = ParameterRegistry::new();
        let id = registry.create(boolean(), None).unwrap();
        registry.parameter_mut(id).unwrap().set_label("x");
        registry.encode_dirty();

        registry.parameter_mut(id).unwrap().set_label("x");
        assert_eq!(registry.dirty().count(), 0);

        registry.parameter_mut(id).unwrap().set_value(true).unwrap();
        assert_eq!(registry.dirty().collect::<Vec<_>>(), vec![id]);
    }

    #[test]
    fn test_guard_on_root_is_rejected() {
        let mut registry = ParameterRegistry::new();
        assert!(matches!(
            registry.parameter_mut(ParameterId::ROOT),
            Err(RegistryError::RootImmutable)
        ));
    }

    // =====================================================================
    // removal
    // =====================================================================

    #[test]
    fn test_remove_evicts_dirty_entry() {
        let mut registry = ParameterRegistry::new();
        let id = registry.create(boolean(), None).unwrap();
        assert!(registry.remove(id).unwrap());
        assert_eq!(registry.dirty().count(), 0);
        assert_eq!(registry.removed().collect::<Vec<_>>(), vec![id]);
        registry.set_dirty(id);
        assert_eq!(registry.dirty().count(), 0);
    }

    #[test]
    fn test_remove_twice_is_skipped() {
        let mut registry = ParameterRegistry::new();
        let id = registry.create(boolean(), None).unwrap();
        assert!(registry.remove(id).unwrap());
        assert!(!registry.remove(id).unwrap());
        assert!(matches!(
            registry.remove(ParameterId(77)),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_group_evicts_subtree_without_queueing_children() {
        let mut registry = ParameterRegistry::new();
        let group = registry.create_group(None).unwrap();
        let child = registry.create(boolean(), Some(group)).unwrap();
        let nested = registry.create_group(Some(group)).unwrap();
        let grandchild = registry.create(boolean(), Some(nested)).unwrap();

        registry.remove(group).unwrap();
        for id in [group, child, nested, grandchild] {
            assert!(!registry.contains(id));
        }
        assert_eq!(registry.removed().collect::<Vec<_>>(), vec![group]);
        assert_eq!(registry.dirty().count(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_direct_returns_evicted_and_queues_nothing() {
        let mut registry = ParameterRegistry::new();
        let group = registry.create_group(None).unwrap();
        let child = registry.create(boolean(), Some(group)).unwrap();

        let evicted = registry.remove_direct(group);
        let ids: Vec<_> = evicted.iter().map(Parameter::id).collect();
        assert_eq!(ids, vec![group, child]);
        assert_eq!(registry.removed().count(), 0);
        assert_eq!(registry.next_id(), Some(ParameterId(1)));
    }

    #[test]
    fn test_remove_root_is_rejected() {
        let mut registry = ParameterRegistry::new();
        assert!(matches!(
            registry.remove(ParameterId::ROOT),
            Err(RegistryError::RootImmutable)
        ));
    }

    // =====================================================================
    // merge
    // =====================================================================

    #[test]
    fn test_merge_unknown_id_registers_without_dirtying() {
        let mut source = ParameterRegistry::new();
        let group = source.create_group(None).unwrap();
        let leaf = source.create(boolean(), Some(group)).unwrap();

        let mut mirror = ParameterRegistry::new();
        let group_proxy = proxy_of(&mut source, group);
        let leaf_proxy = proxy_of(&mut source, leaf);
        assert_eq!(mirror.merge(group_proxy).unwrap(), Merge::Added);
        assert_eq!(mirror.merge(leaf_proxy).unwrap(), Merge::Added);

        assert!(mirror.get(group).unwrap().has_child(leaf));
        assert!(!mirror.has_pending());
        assert_tree_consistent(&mirror);
    }

    #[test]
    fn test_merge_missing_group_attaches_to_root() {
        let mut source = ParameterRegistry::new();
        let group = source.create_group(None).unwrap();
        let leaf = source.create(boolean(), Some(group)).unwrap();

        let mut mirror = ParameterRegistry::new();
        mirror.merge(proxy_of(&mut source, leaf)).unwrap();
        assert!(mirror.root().has_child(leaf));
        assert_eq!(mirror.get(leaf).unwrap().parent(), None);
        assert_tree_consistent(&mirror);
    }

    #[test]
    fn test_merge_existing_fires_update_callback_once() {
        let mut registry = ParameterRegistry::new();
        let id = registry.create(boolean(), None).unwrap();
        registry.encode_dirty();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry
            .parameter_mut(id)
            .unwrap()
            .set_on_updated(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let mut incoming = Parameter::new(id, boolean());
        incoming.set_value(true).unwrap();
        incoming.set_label("remote");
        assert_eq!(registry.merge(incoming).unwrap(), Merge::Updated);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.get(id).unwrap().value(), Some(&Value::Boolean(true)));
        assert!(!registry.has_pending());

        let mut same = Parameter::new(id, boolean());
        same.set_value(true).unwrap();
        assert_eq!(registry.merge(same).unwrap(), Merge::Unchanged);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_merge_parent_zero_moves_to_root() {
        let mut registry = ParameterRegistry::new();
        let group = registry.create_group(None).unwrap();
        let leaf = registry.create(boolean(), Some(group)).unwrap();

        let bytes = [0x00, leaf.0 as u8, 0x10, 0x00, 0x25, 0x00, 0x00, 0x00];
        let incoming = Parameter::parse(&mut WireReader::new(&bytes)).unwrap();
        assert_eq!(registry.merge(incoming).unwrap(), Merge::Updated);
        assert!(registry.root().has_child(leaf));
        assert_tree_consistent(&registry);
    }

    #[test]
    fn test_merge_datatype_mismatch_is_rejected() {
        let mut registry = ParameterRegistry::new();
        let id = registry.create(boolean(), None).unwrap();
        let incoming = Parameter::new(id, TypeDefinition::number::<i32>());
        assert!(matches!(
            registry.merge(incoming),
            Err(RegistryError::DatatypeMismatch { .. })
        ));
    }

    #[test]
    fn test_apply_value_updates_cached_parameter() {
        let mut registry = ParameterRegistry::new();
        let id = registry.create(TypeDefinition::number::<f32>(), None).unwrap();
        let update = ValueUpdate {
            id,
            datatype: Datatype::Float32,
            element: None,
            value: Value::Float32(0.5),
        };
        assert!(registry.apply_value(&update).unwrap());
        assert_eq!(registry.get(id).unwrap().value(), Some(&Value::Float32(0.5)));
    }

    // =====================================================================
    // sync
    // =====================================================================

    #[test]
    fn test_encode_dirty_clears_set_and_resets_flags() {
        let mut registry = ParameterRegistry::new();
        let id = registry.create(boolean(), None).unwrap();
        registry.parameter_mut(id).unwrap().set_label("BOOL");
        assert_eq!(registry.encode_dirty().len(), 1);
        assert!(!registry.has_pending());
        assert!(!registry.get(id).unwrap().has_changes());
    }

    #[test]
    fn test_encode_all_is_depth_first() {
        let mut registry = ParameterRegistry::new();
        let a = registry.create(TypeDefinition::number::<i32>(), None).unwrap();
        let g = registry.create_group(None).unwrap();
        let s = registry
            .create(TypeDefinition::for_datatype(Datatype::String).unwrap(), Some(g))
            .unwrap();
        let b = registry.create(boolean(), None).unwrap();
        assert_eq!(registry.depth_first(), vec![a, g, s, b]);

        let ids: Vec<_> = registry
            .encode_all()
            .iter()
            .map(|bytes| Packet::from_bytes(bytes).unwrap().unwrap())
            .map(|packet| match packet.data {
                Some(PacketData::Parameter(p)) => p.id(),
                other => panic!("unexpected data {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec![a, g, s, b]);
        assert_eq!(registry.dirty().count(), 4);
    }

    #[test]
    fn test_clear_keeps_only_root() {
        let mut registry = ParameterRegistry::new();
        let group = registry.create_group(None).unwrap();
        registry.create(boolean(), Some(group)).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.root().children().count(), 0);
        assert_eq!(registry.next_id(), Some(ParameterId(1)));
    }

    #[test]
    fn test_hierarchy_serializes_to_json() {
        let mut registry = ParameterRegistry::new();
        let id = registry.create(boolean(), None).unwrap();
        {
            let mut parameter = registry.parameter_mut(id).unwrap();
            parameter.set_label("on");
            parameter.set_value(true).unwrap();
        }
        let json = serde_json::to_value(registry.hierarchy()).unwrap();
        assert_eq!(json["label"], "root");
        assert_eq!(json["children"][0]["id"], 1);
        assert_eq!(json["children"][0]["datatype"], "boolean");
        assert_eq!(json["children"][0]["value"], "true");
    }

    #[test]
    fn test_hierarchy_of_deep_chain_is_capped() {
        let mut registry = ParameterRegistry::new();
        let mut parent = None;
        for _ in 0..2_000 {
            parent = Some(registry.create_group(parent).unwrap());
        }

        let root = registry.hierarchy();
        let mut depth = 0;
        let mut node = &root;
        while let Some(child) = node.children.first() {
            assert_eq!(node.children.len(), 1);
            node = child;
            depth += 1;
        }
        assert_eq!(depth, MAX_HIERARCHY_DEPTH);
        assert_eq!(node.id, ParameterId(MAX_HIERARCHY_DEPTH as i16));
    }
}
