//! Per-page annotation storage.

use doc_model::Annotation;
use std::collections::BTreeMap;

/// Committed annotations per page, in paint order.
///
/// Pages are 1-based and created lazily; an absent page reads as empty.
/// Lists only change wholesale or by appending, so a snapshot taken before
/// a mutation is enough to undo it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationStore {
    pages: BTreeMap<u32, Vec<Annotation>>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, page: u32) -> &[Annotation] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Adds on top of the page's z-order.
    pub fn append(&mut self, page: u32, annotation: Annotation) {
        self.pages.entry(page).or_default().push(annotation);
    }

    pub fn replace(&mut self, page: u32, snapshot: Vec<Annotation>) {
        if snapshot.is_empty() {
            self.pages.remove(&page);
        } else {
            self.pages.insert(page, snapshot);
        }
    }

    pub fn clear(&mut self, page: u32) {
        self.pages.remove(&page);
    }

    /// Pages that currently hold at least one annotation, ascending.
    pub fn pages(&self) -> impl Iterator<Item = (u32, &[Annotation])> {
        self.pages.iter().map(|(page, list)| (*page, list.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
