// Ordered, name-unique collection of alerts.
//
// Alerts live in an arena of slots. Registry order is a doubly linked list
// threaded through the slots by index, and a case-folded name index points at
// the slots. Every mutation validates all of its inputs before touching either
// structure, so a rejected call changes nothing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::RegistryError;
use super::model::Alert;

static REGISTRY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifies one registry instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryId(u64);

impl RegistryId {
    pub(crate) fn next() -> Self {
        Self(REGISTRY_COUNTER.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Stable handle to an alert in a registry. Handles to removed alerts go
/// stale and are rejected with [`RegistryError::NotMember`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlertId {
    registry: RegistryId,
    slot: usize,
    generation: u64,
}

#[derive(Debug)]
struct Node {
    alert: Alert,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    node: Option<Node>,
}

/// Where to link a node relative to the list.
#[derive(Debug, Clone, Copy)]
enum Position {
    Before(Option<usize>),
    After(Option<usize>),
}

#[derive(Debug)]
pub struct AlertRegistry {
    id: RegistryId,
    slots: Vec<Slot>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl Default for AlertRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self {
            id: RegistryId::next(),
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    pub fn id(&self) -> RegistryId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.index.contains_key(&fold(name))
    }

    /// Look an alert up by name, ignoring case.
    pub fn find(&self, name: &str) -> Option<AlertId> {
        self.index.get(&fold(name)).map(|&slot| self.handle(slot))
    }

    pub fn get(&self, id: AlertId) -> Option<&Alert> {
        self.node(id).ok().map(|node| &node.alert)
    }

    /// Mutable access to an alert. Its name can only change through
    /// [`AlertRegistry::rename`].
    pub fn get_mut(&mut self, id: AlertId) -> Option<&mut Alert> {
        let slot = self.resolve(id).ok()?;
        self.slots[slot].node.as_mut().map(|node| &mut node.alert)
    }

    pub fn first(&self) -> Option<AlertId> {
        self.head.map(|slot| self.handle(slot))
    }

    pub fn last(&self) -> Option<AlertId> {
        self.tail.map(|slot| self.handle(slot))
    }

    /// The alert after `id` in registry order.
    pub fn next(&self, id: AlertId) -> Option<AlertId> {
        self.node(id).ok()?.next.map(|slot| self.handle(slot))
    }

    pub fn prev(&self, id: AlertId) -> Option<AlertId> {
        self.node(id).ok()?.prev.map(|slot| self.handle(slot))
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            registry: self,
            cursor: self.head,
            remaining: self.len(),
        }
    }

    pub fn ids(&self) -> Vec<AlertId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn append(&mut self, alert: Alert) -> Result<AlertId, RegistryError> {
        self.insert(alert, Position::Before(None))
    }

    pub fn prepend(&mut self, alert: Alert) -> Result<AlertId, RegistryError> {
        self.insert(alert, Position::After(None))
    }

    /// Insert before `anchor`, or at the end when `anchor` is `None`.
    pub fn insert_before(
        &mut self,
        alert: Alert,
        anchor: Option<AlertId>,
    ) -> Result<AlertId, RegistryError> {
        let anchor = self.resolve_anchor(anchor)?;
        self.insert(alert, Position::Before(anchor))
    }

    /// Insert after `anchor`, or at the start when `anchor` is `None`.
    pub fn insert_after(
        &mut self,
        alert: Alert,
        anchor: Option<AlertId>,
    ) -> Result<AlertId, RegistryError> {
        let anchor = self.resolve_anchor(anchor)?;
        self.insert(alert, Position::After(anchor))
    }

    pub fn remove(&mut self, id: AlertId) -> Result<Alert, RegistryError> {
        let slot = self.resolve(id)?;
        self.unlink(slot);
        let entry = &mut self.slots[slot];
        let mut node = entry.node.take().ok_or(RegistryError::NotMember)?;
        entry.generation += 1;
        self.free.push(slot);
        self.index.remove(&fold(node.alert.name()));
        node.alert.owner = None;
        Ok(node.alert)
    }

    /// Remove every alert, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let mut removed = 0;
        for id in self.ids() {
            match self.remove(id) {
                Ok(_) => removed += 1,
                Err(e) => log::warn!("Failed to remove alert during clear: {}", e),
            }
        }
        removed
    }

    /// Rename in place. A change of case only is a no-op.
    pub fn rename(&mut self, id: AlertId, new_name: &str) -> Result<(), RegistryError> {
        let slot = self.resolve(id)?;
        let old_key = fold(self.node_at(slot).alert.name());
        let new_key = fold(new_name);
        if old_key == new_key {
            return Ok(());
        }
        if self.index.contains_key(&new_key) {
            return Err(RegistryError::NameConflict(new_name.to_string()));
        }
        self.index.remove(&old_key);
        self.index.insert(new_key, slot);
        if let Some(node) = self.slots[slot].node.as_mut() {
            node.alert.set_name(new_name);
        }
        Ok(())
    }

    /// Move before `anchor`, or to the end when `anchor` is `None`.
    pub fn move_before(
        &mut self,
        id: AlertId,
        anchor: Option<AlertId>,
    ) -> Result<(), RegistryError> {
        let (slot, anchor) = self.resolve_move(id, anchor)?;
        self.unlink(slot);
        self.link(slot, Position::Before(anchor));
        Ok(())
    }

    /// Move after `anchor`, or to the start when `anchor` is `None`.
    pub fn move_after(&mut self, id: AlertId, anchor: Option<AlertId>) -> Result<(), RegistryError> {
        let (slot, anchor) = self.resolve_move(id, anchor)?;
        self.unlink(slot);
        self.link(slot, Position::After(anchor));
        Ok(())
    }

    /// Walk the list and cross-check it against the name index.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = 0usize;
        let mut prev: Option<usize> = None;
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            if seen == self.len() {
                return Err(format!("list longer than index ({} entries)", self.len()));
            }
            let node = self.slots[slot]
                .node
                .as_ref()
                .ok_or_else(|| format!("slot {slot} linked but empty"))?;
            if node.prev != prev {
                return Err(format!("slot {slot} has a broken back link"));
            }
            if self.index.get(&fold(node.alert.name())) != Some(&slot) {
                return Err(format!("'{}' missing from index", node.alert.name()));
            }
            if node.alert.owner != Some(self.id) {
                return Err(format!("'{}' not owned by this registry", node.alert.name()));
            }
            seen += 1;
            prev = Some(slot);
            cursor = node.next;
        }
        if prev != self.tail {
            return Err("tail does not end the list".to_string());
        }
        if seen != self.len() {
            return Err(format!("list has {seen} nodes, index has {}", self.len()));
        }
        Ok(())
    }

    fn insert(&mut self, mut alert: Alert, position: Position) -> Result<AlertId, RegistryError> {
        if alert.owner.is_some() {
            return Err(RegistryError::AlreadyMember);
        }
        let key = fold(alert.name());
        if self.index.contains_key(&key) {
            return Err(RegistryError::NameConflict(alert.name().to_string()));
        }

        alert.owner = Some(self.id);
        let node = Node {
            alert,
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot].node = Some(node);
                slot
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                self.slots.len() - 1
            }
        };
        self.index.insert(key, slot);
        self.link(slot, position);
        Ok(self.handle(slot))
    }

    fn handle(&self, slot: usize) -> AlertId {
        AlertId {
            registry: self.id,
            slot,
            generation: self.slots[slot].generation,
        }
    }

    fn resolve(&self, id: AlertId) -> Result<usize, RegistryError> {
        if id.registry != self.id {
            return Err(RegistryError::NotMember);
        }
        match self.slots.get(id.slot) {
            Some(entry) if entry.generation == id.generation && entry.node.is_some() => Ok(id.slot),
            _ => Err(RegistryError::NotMember),
        }
    }

    fn resolve_anchor(&self, anchor: Option<AlertId>) -> Result<Option<usize>, RegistryError> {
        anchor.map(|id| self.resolve(id)).transpose()
    }

    fn resolve_move(
        &self,
        id: AlertId,
        anchor: Option<AlertId>,
    ) -> Result<(usize, Option<usize>), RegistryError> {
        let slot = self.resolve(id)?;
        let anchor = self.resolve_anchor(anchor)?;
        if anchor == Some(slot) {
            return Err(RegistryError::InvalidOperation("cannot move an alert relative to itself"));
        }
        Ok((slot, anchor))
    }

    fn node(&self, id: AlertId) -> Result<&Node, RegistryError> {
        let slot = self.resolve(id)?;
        Ok(self.node_at(slot))
    }

    fn node_at(&self, slot: usize) -> &Node {
        match &self.slots[slot].node {
            Some(node) => node,
            None => unreachable!("slot {slot} resolved but empty"),
        }
    }

    fn node_at_mut(&mut self, slot: usize) -> &mut Node {
        match &mut self.slots[slot].node {
            Some(node) => node,
            None => unreachable!("slot {slot} resolved but empty"),
        }
    }

    /// Link an unlinked node. Touches only the node and its two new neighbours.
    fn link(&mut self, slot: usize, position: Position) {
        let (prev, next) = match position {
            Position::Before(Some(anchor)) => (self.node_at(anchor).prev, Some(anchor)),
            Position::Before(None) => (self.tail, None),
            Position::After(Some(anchor)) => (Some(anchor), self.node_at(anchor).next),
            Position::After(None) => (None, self.head),
        };
        {
            let node = self.node_at_mut(slot);
            node.prev = prev;
            node.next = next;
        }
        match prev {
            Some(p) => self.node_at_mut(p).next = Some(slot),
            None => self.head = Some(slot),
        }
        match next {
            Some(n) => self.node_at_mut(n).prev = Some(slot),
            None => self.tail = Some(slot),
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let node = self.node_at_mut(slot);
            (node.prev.take(), node.next.take())
        };
        match prev {
            Some(p) => self.node_at_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_at_mut(n).prev = prev,
            None => self.tail = prev,
        }
    }
}

/// Registry-order iterator. Bounded by the registry size.
pub struct Iter<'a> {
    registry: &'a AlertRegistry,
    cursor: Option<usize>,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (AlertId, &'a Alert);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.cursor?;
        let node = self.registry.node_at(slot);
        self.cursor = node.next;
        self.remaining -= 1;
        Some((self.registry.handle(slot), &node.alert))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alert(name: &str) -> Alert {
        Alert::new(name).unwrap()
    }

    fn names(registry: &AlertRegistry) -> Vec<String> {
        registry.iter().map(|(_, a)| a.name().to_string()).collect()
    }

    #[test]
    fn test_append_and_order() {
        let mut registry = AlertRegistry::new();
        registry.append(alert("a")).unwrap();
        registry.append(alert("b")).unwrap();
        registry.prepend(alert("c")).unwrap();
        assert_eq!(names(&registry), ["c", "a", "b"]);
        assert_eq!(registry.len(), 3);
        registry.check_invariants().unwrap();
    }

    #[test]
    fn test_name_conflict_is_case_insensitive() {
        let mut registry = AlertRegistry::new();
        registry.append(alert("Fire")).unwrap();
        let err = registry.append(alert("fIRE")).unwrap_err();
        assert_eq!(err, RegistryError::NameConflict("fIRE".into()));
        assert_eq!(registry.len(), 1);
        registry.check_invariants().unwrap();
    }

    #[test]
    fn test_already_member() {
        let mut first = AlertRegistry::new();
        let mut second = AlertRegistry::new();
        let id = first.append(alert("a")).unwrap();
        let stamped = first.get(id).unwrap().clone();
        assert_eq!(second.append(stamped).unwrap_err(), RegistryError::AlreadyMember);
        assert!(second.is_empty());
    }

    #[test]
    fn test_insert_relative_to_anchor() {
        let mut registry = AlertRegistry::new();
        let a = registry.append(alert("a")).unwrap();
        let c = registry.append(alert("c")).unwrap();
        registry.insert_before(alert("b"), Some(c)).unwrap();
        registry.insert_after(alert("a2"), Some(a)).unwrap();
        registry.insert_before(alert("z"), None).unwrap();
        registry.insert_after(alert("first"), None).unwrap();
        assert_eq!(names(&registry), ["first", "a", "a2", "b", "c", "z"]);
        registry.check_invariants().unwrap();
    }

    #[test]
    fn test_foreign_anchor_is_rejected() {
        let mut registry = AlertRegistry::new();
        let mut other = AlertRegistry::new();
        let foreign = other.append(alert("x")).unwrap();
        assert_eq!(
            registry.insert_before(alert("a"), Some(foreign)).unwrap_err(),
            RegistryError::NotMember
        );
        assert!(registry.is_empty());
        assert!(!registry.contains_name("a"));
    }

    #[test]
    fn test_remove_and_stale_handle() {
        let mut registry = AlertRegistry::new();
        let a = registry.append(alert("a")).unwrap();
        registry.append(alert("b")).unwrap();

        let removed = registry.remove(a).unwrap();
        assert_eq!(removed.name(), "a");
        assert!(!removed.is_member());
        assert_eq!(registry.remove(a).unwrap_err(), RegistryError::NotMember);

        // Slot reuse must not revive the old handle.
        let again = registry.append(alert("c")).unwrap();
        assert_ne!(again, a);
        assert!(registry.get(a).is_none());
        assert_eq!(names(&registry), ["b", "c"]);
        registry.check_invariants().unwrap();

        // A removed alert can join another registry.
        let mut other = AlertRegistry::new();
        other.append(removed).unwrap();
    }

    #[test]
    fn test_rename() {
        let mut registry = AlertRegistry::new();
        let a = registry.append(alert("a")).unwrap();
        registry.append(alert("b")).unwrap();

        registry.rename(a, "A").unwrap();
        assert_eq!(registry.get(a).unwrap().name(), "a");

        assert_eq!(
            registry.rename(a, "B").unwrap_err(),
            RegistryError::NameConflict("B".into())
        );

        registry.rename(a, "alpha").unwrap();
        assert_eq!(names(&registry), ["alpha", "b"]);
        assert_eq!(registry.find("ALPHA"), Some(a));
        assert!(registry.find("a").is_none());
        registry.check_invariants().unwrap();
    }

    #[test]
    fn test_move() {
        let mut registry = AlertRegistry::new();
        let a = registry.append(alert("a")).unwrap();
        let b = registry.append(alert("b")).unwrap();
        let c = registry.append(alert("c")).unwrap();

        registry.move_before(c, Some(a)).unwrap();
        assert_eq!(names(&registry), ["c", "a", "b"]);
        registry.move_after(c, Some(b)).unwrap();
        assert_eq!(names(&registry), ["a", "b", "c"]);
        registry.move_after(b, None).unwrap();
        assert_eq!(names(&registry), ["b", "a", "c"]);
        registry.move_before(b, None).unwrap();
        assert_eq!(names(&registry), ["a", "c", "b"]);

        assert!(matches!(
            registry.move_before(a, Some(a)),
            Err(RegistryError::InvalidOperation(_))
        ));
        assert_eq!(names(&registry), ["a", "c", "b"]);
        registry.check_invariants().unwrap();
    }

    #[test]
    fn test_navigation_and_clear() {
        let mut registry = AlertRegistry::new();
        let a = registry.append(alert("a")).unwrap();
        let b = registry.append(alert("b")).unwrap();
        assert_eq!(registry.first(), Some(a));
        assert_eq!(registry.last(), Some(b));
        assert_eq!(registry.next(a), Some(b));
        assert_eq!(registry.prev(b), Some(a));
        assert_eq!(registry.next(b), None);

        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
        assert!(registry.first().is_none());
        registry.check_invariants().unwrap();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Append(u8),
        Prepend(u8),
        InsertBefore(u8, u8),
        InsertAfter(u8, u8),
        Remove(u8),
        MoveBefore(u8, Option<u8>),
        MoveAfter(u8, Option<u8>),
        Rename(u8, u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let n = 0u8..12;
        prop_oneof![
            n.clone().prop_map(Op::Append),
            n.clone().prop_map(Op::Prepend),
            (n.clone(), n.clone()).prop_map(|(a, b)| Op::InsertBefore(a, b)),
            (n.clone(), n.clone()).prop_map(|(a, b)| Op::InsertAfter(a, b)),
            n.clone().prop_map(Op::Remove),
            (n.clone(), proptest::option::of(n.clone())).prop_map(|(a, b)| Op::MoveBefore(a, b)),
            (n.clone(), proptest::option::of(n.clone())).prop_map(|(a, b)| Op::MoveAfter(a, b)),
            (n.clone(), n).prop_map(|(a, b)| Op::Rename(a, b)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 200,
            .. ProptestConfig::default()
        })]

        /// Any interleaving of operations keeps list and index consistent,
        /// and failed operations leave the order untouched.
        #[test]
        fn prop_structure_survives_any_sequence(ops in proptest::collection::vec(op_strategy(), 1..60)) {
            let mut registry = AlertRegistry::new();
            let name = |n: u8| format!("alert{n}");
            let find = |r: &AlertRegistry, n: u8| r.find(&name(n));

            for op in ops {
                let before = names(&registry);
                let result = match op {
                    Op::Append(n) => registry.append(alert(&name(n))).map(|_| ()),
                    Op::Prepend(n) => registry.prepend(alert(&name(n))).map(|_| ()),
                    Op::InsertBefore(n, a) => {
                        let anchor = find(&registry, a);
                        registry.insert_before(alert(&name(n)), anchor).map(|_| ())
                    }
                    Op::InsertAfter(n, a) => {
                        let anchor = find(&registry, a);
                        registry.insert_after(alert(&name(n)), anchor).map(|_| ())
                    }
                    Op::Remove(n) => match find(&registry, n) {
                        Some(id) => registry.remove(id).map(|_| ()),
                        None => Err(RegistryError::NotMember),
                    },
                    Op::MoveBefore(n, a) => match find(&registry, n) {
                        Some(id) => {
                            let anchor = a.and_then(|a| find(&registry, a));
                            registry.move_before(id, anchor)
                        }
                        None => Err(RegistryError::NotMember),
                    },
                    Op::MoveAfter(n, a) => match find(&registry, n) {
                        Some(id) => {
                            let anchor = a.and_then(|a| find(&registry, a));
                            registry.move_after(id, anchor)
                        }
                        None => Err(RegistryError::NotMember),
                    },
                    Op::Rename(n, m) => match find(&registry, n) {
                        Some(id) => registry.rename(id, &name(m)),
                        None => Err(RegistryError::NotMember),
                    },
                };

                prop_assert!(registry.check_invariants().is_ok(), "{:?}", registry.check_invariants());
                prop_assert_eq!(registry.iter().count(), registry.len());
                if result.is_err() {
                    prop_assert_eq!(names(&registry), before);
                }
            }
        }
    }
}
