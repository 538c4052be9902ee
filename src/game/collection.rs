//! Observable slot collections
//!
//! Backing store for the inventory, spell, skill and equipment panes.
//! Slot indices are stable: removing an item leaves a hole, nothing is
//! compacted. Every successful mutation fires exactly one event to every
//! subscriber before it returns; a failed mutation fires none.

use std::fmt;

use crate::error::CollectionError;

/// Mutation notification
#[derive(Debug, PartialEq, Eq)]
pub enum CollectionEvent<'a, T> {
    Added { index: usize, item: &'a T },
    Removed { index: usize, item: &'a T },
}

impl<T> CollectionEvent<'_, T> {
    pub fn index(&self) -> usize {
        match self {
            CollectionEvent::Added { index, .. } | CollectionEvent::Removed { index, .. } => *index,
        }
    }
}

type Observer<T> = Box<dyn Fn(&CollectionEvent<'_, T>) + Send + Sync>;

/// Fixed-capacity slot list with synchronous change callbacks
pub struct ObservableList<T> {
    slots: Vec<Option<T>>,
    len: usize,
    observers: Vec<Observer<T>>,
}

impl<T> ObservableList<T> {
    /// Create an empty list with `capacity` slots
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            len: 0,
            observers: Vec::new(),
        }
    }

    /// Register a callback for every future mutation
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: Fn(&CollectionEvent<'_, T>) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    fn notify(&self, event: CollectionEvent<'_, T>) {
        for observer in &self.observers {
            observer(&event);
        }
    }

    /// Place an item in a specific empty slot
    pub fn insert(&mut self, index: usize, item: T) -> Result<(), CollectionError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(CollectionError::InvalidSlot(index))?;
        if slot.is_some() {
            return Err(CollectionError::SlotOccupied(index));
        }
        *slot = Some(item);
        self.len += 1;

        if let Some(item) = self.slots[index].as_ref() {
            self.notify(CollectionEvent::Added { index, item });
        }
        Ok(())
    }

    /// Place an item in the first free slot, returning its index
    pub fn push(&mut self, item: T) -> Result<usize, CollectionError> {
        let index = self.first_free().ok_or(CollectionError::Full)?;
        self.insert(index, item)?;
        Ok(index)
    }

    /// Take the item out of a slot
    pub fn remove_at(&mut self, index: usize) -> Result<T, CollectionError> {
        let item = self
            .slots
            .get_mut(index)
            .ok_or(CollectionError::InvalidSlot(index))?
            .take()
            .ok_or(CollectionError::SlotEmpty(index))?;
        self.len -= 1;

        self.notify(CollectionEvent::Removed { index, item: &item });
        Ok(item)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Occupied slots in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|item| (index, item)))
    }

    /// Lowest empty slot
    pub fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableList")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("observers", &self.observers.len())
            .field("items", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Seen {
        Added(usize, &'static str),
        Removed(usize, &'static str),
    }

    fn recorded(capacity: usize) -> (ObservableList<&'static str>, Arc<Mutex<Vec<Seen>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut list = ObservableList::with_capacity(capacity);
        let sink = seen.clone();
        list.subscribe(move |event| {
            let entry = match *event {
                CollectionEvent::Added { index, item } => Seen::Added(index, *item),
                CollectionEvent::Removed { index, item } => Seen::Removed(index, *item),
            };
            sink.lock().push(entry);
        });
        (list, seen)
    }

    #[test]
    fn test_insert_and_remove_notify() {
        let (mut list, seen) = recorded(4);
        list.insert(2, "sword").unwrap();
        assert_eq!(list.remove_at(2).unwrap(), "sword");

        assert_eq!(
            *seen.lock(),
            vec![Seen::Added(2, "sword"), Seen::Removed(2, "sword")]
        );
        assert!(list.is_empty());
    }

    #[test]
    fn test_slots_are_stable() {
        let (mut list, _) = recorded(4);
        list.push("a").unwrap();
        list.push("b").unwrap();
        list.push("c").unwrap();
        list.remove_at(1).unwrap();

        assert_eq!(list.get(2), Some(&"c"));
        assert_eq!(list.get(1), None);
        // Hole is reused first
        assert_eq!(list.push("d").unwrap(), 1);
    }

    #[test]
    fn test_failed_mutations_are_silent() {
        let (mut list, seen) = recorded(2);
        list.insert(0, "a").unwrap();

        assert_eq!(list.insert(0, "b"), Err(CollectionError::SlotOccupied(0)));
        assert_eq!(list.insert(5, "b"), Err(CollectionError::InvalidSlot(5)));
        assert_eq!(list.remove_at(1), Err(CollectionError::SlotEmpty(1)));
        assert_eq!(list.remove_at(9), Err(CollectionError::InvalidSlot(9)));

        list.insert(1, "c").unwrap();
        assert!(list.is_full());
        assert_eq!(list.push("d"), Err(CollectionError::Full));

        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_every_subscriber_sees_every_event() {
        let (mut list, first) = recorded(3);
        let second = Arc::new(Mutex::new(0usize));
        let counter = second.clone();
        list.subscribe(move |_| *counter.lock() += 1);

        list.push("a").unwrap();
        list.push("b").unwrap();
        list.remove_at(0).unwrap();

        assert_eq!(first.lock().len(), 3);
        assert_eq!(*second.lock(), 3);
    }

    #[test]
    fn test_iter_in_slot_order() {
        let (mut list, _) = recorded(5);
        list.insert(4, "z").unwrap();
        list.insert(1, "a").unwrap();

        let items: Vec<_> = list.iter().collect();
        assert_eq!(items, vec![(1, &"a"), (4, &"z")]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.capacity(), 5);
    }
}
