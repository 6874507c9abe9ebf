//! Undo/redo over per-page snapshots.
//!
//! Each entry holds a page's full annotation list as it was right before a
//! mutation. Undo swaps the page back to that list and moves the list it
//! replaced onto the redo stack; redo does the reverse. Entries remember
//! their page, so history works no matter which page is on screen.

use crate::store::AnnotationStore;
use doc_model::Annotation;
use std::collections::VecDeque;

pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub page: u32,
    pub snapshot: Vec<Annotation>,
}

#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<HistoryEntry>,
    redo: VecDeque<HistoryEntry>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        let limit = limit.max(1);
        Self { undo: VecDeque::with_capacity(limit), redo: VecDeque::with_capacity(limit), limit }
    }

    /// Records `page` as it is now, before a mutation. Invalidates redo.
    pub fn push_undo(&mut self, page: u32, store: &AnnotationStore) {
        let entry = HistoryEntry { page, snapshot: store.get(page).to_vec() };
        push_bounded(&mut self.undo, entry, self.limit);
        self.redo.clear();
        log::debug!("history: snapshot page {page} (undo depth {})", self.undo.len());
    }

    /// Restores the most recent snapshot. Returns the page it touched.
    pub fn undo(&mut self, store: &mut AnnotationStore) -> Option<u32> {
        let entry = self.undo.pop_back()?;
        let page = entry.page;
        let current = HistoryEntry { page, snapshot: store.get(page).to_vec() };
        push_bounded(&mut self.redo, current, self.limit);
        store.replace(page, entry.snapshot);
        log::debug!("history: undo on page {page}");
        Some(page)
    }

    pub fn redo(&mut self, store: &mut AnnotationStore) -> Option<u32> {
        let entry = self.redo.pop_back()?;
        let page = entry.page;
        let current = HistoryEntry { page, snapshot: store.get(page).to_vec() };
        push_bounded(&mut self.undo, current, self.limit);
        store.replace(page, entry.snapshot);
        log::debug!("history: redo on page {page}");
        Some(page)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Undo entries, oldest first.
    pub fn undo_entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.undo.iter()
    }
}

fn push_bounded(stack: &mut VecDeque<HistoryEntry>, entry: HistoryEntry, limit: usize) {
    if stack.len() == limit {
        stack.pop_front();
    }
    stack.push_back(entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{Shape, ToolStyle};

    fn rect(x: f32) -> Annotation {
        Annotation::new(Shape::Rectangle { x, y: 0.0, w: 5.0, h: 5.0 }, &ToolStyle::default())
    }

    fn mutate(history: &mut History, store: &mut AnnotationStore, page: u32, x: f32) {
        history.push_undo(page, store);
        store.append(page, rect(x));
    }

    #[test]
    fn undo_then_redo_is_an_inverse() {
        let mut store = AnnotationStore::new();
        let mut history = History::new();
        store.append(1, rect(-1.0));
        let initial = store.clone();

        for i in 0..7 {
            mutate(&mut history, &mut store, 1, i as f32);
        }
        let final_state = store.clone();

        for _ in 0..7 {
            assert_eq!(history.undo(&mut store), Some(1));
        }
        assert_eq!(store, initial);

        for _ in 0..7 {
            assert_eq!(history.redo(&mut store), Some(1));
        }
        assert_eq!(store, final_state);
    }

    #[test]
    fn new_mutation_discards_redo() {
        let mut store = AnnotationStore::new();
        let mut history = History::new();
        mutate(&mut history, &mut store, 1, 1.0);
        mutate(&mut history, &mut store, 1, 2.0);

        history.undo(&mut store);
        assert!(history.can_redo());

        mutate(&mut history, &mut store, 1, 3.0);
        let before = store.clone();
        assert_eq!(history.redo(&mut store), None);
        assert_eq!(store, before);
    }

    #[test]
    fn keeps_only_the_newest_fifty_entries() {
        let mut store = AnnotationStore::new();
        let mut history = History::new();
        for i in 0..60 {
            mutate(&mut history, &mut store, 1, i as f32);
        }

        assert_eq!(history.undo_len(), HISTORY_LIMIT);
        // The oldest surviving entry is the snapshot taken before mutation 10.
        let oldest = history.undo_entries().next().expect("entries");
        assert_eq!(oldest.snapshot.len(), 10);
    }

    #[test]
    fn redo_stack_is_bounded_too() {
        let mut store = AnnotationStore::new();
        let mut history = History::with_limit(3);
        for i in 0..5 {
            mutate(&mut history, &mut store, 1, i as f32);
        }
        while history.undo(&mut store).is_some() {}
        assert_eq!(history.redo_len(), 3);
    }

    #[test]
    fn empty_stacks_are_no_ops() {
        let mut store = AnnotationStore::new();
        let mut history = History::new();
        assert_eq!(history.undo(&mut store), None);
        assert_eq!(history.redo(&mut store), None);
        assert!(store.is_empty());
    }

    #[test]
    fn entries_restore_their_own_page() {
        let mut store = AnnotationStore::new();
        let mut history = History::new();
        mutate(&mut history, &mut store, 1, 1.0);
        mutate(&mut history, &mut store, 3, 2.0);

        assert_eq!(history.undo(&mut store), Some(3));
        assert!(store.get(3).is_empty());
        assert_eq!(store.get(1).len(), 1);
        assert_eq!(history.undo(&mut store), Some(1));
        assert!(store.is_empty());
    }
}
