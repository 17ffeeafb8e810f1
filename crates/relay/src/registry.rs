//! In-memory topic catalog behind the discovery service.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::protocol::Category;
use crate::topic::Topic;

#[derive(Debug, Default)]
struct Catalog {
    signals: BTreeSet<Topic>,
    commands: BTreeSet<Topic>,
}

impl Catalog {
    fn set(&self, category: Category) -> &BTreeSet<Topic> {
        match category {
            Category::Signal => &self.signals,
            Category::Command => &self.commands,
        }
    }

    fn set_mut(&mut self, category: Category) -> &mut BTreeSet<Topic> {
        match category {
            Category::Signal => &mut self.signals,
            Category::Command => &mut self.commands,
        }
    }
}

/// Registry of known signal and command topics.
///
/// Entries are never removed. Every read and write goes through one lock,
/// so the registry can be shared across tasks even though the discovery
/// service drives it from a single serial loop.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    catalog: Mutex<Catalog>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Catalog> {
        // No operation can leave the sets half-updated, so a poisoned lock
        // still guards a consistent catalog.
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `topic` under `category`. Returns `false` if it was already there.
    pub fn register(&self, category: Category, topic: Topic) -> bool {
        let inserted = self.lock().set_mut(category).insert(topic.clone());
        debug!(
            category = category.register_token(),
            topic = %topic,
            inserted,
            "registry insert"
        );
        inserted
    }

    /// All topics in `category`, each once, in byte-lexicographic order.
    pub fn query(&self, category: Category) -> Vec<Topic> {
        self.lock().set(category).iter().cloned().collect()
    }

    pub fn contains(&self, category: Category, topic: &Topic) -> bool {
        self.lock().set(category).contains(topic)
    }

    pub fn len(&self, category: Category) -> usize {
        self.lock().set(category).len()
    }

    pub fn is_empty(&self) -> bool {
        let catalog = self.lock();
        catalog.signals.is_empty() && catalog.commands.is_empty()
    }
}
