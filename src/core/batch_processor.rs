//! Batch processing with footprint-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which replays batches of
//! commands concurrently while giving the same result as replaying them one by
//! one in file order.
//!
//! # Design
//!
//! Each command's footprint (the users, deals and queues it can touch, see
//! [`CommandDispatcher::footprint`]) links it to every other command in the
//! batch that shares a key. The connected groups run in parallel, one tokio
//! task each, and every group replays its commands in file order. Commands in
//! different groups touch disjoint state, so their interleaving cannot change
//! the outcome.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── Arc<CommandDispatcher>  (shared, thread-safe command routing)
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::dispatcher::{CommandDispatcher, StateKey};
use crate::types::{Command, EscrowError};
use tracing::{debug, error};

/// Outcome of one replayed command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub command: Command,
    pub result: Result<(), EscrowError>,
}

/// Batch processor with footprint-based partitioning
///
/// Cloneable and cheap to share across tasks.
#[derive(Clone)]
pub struct BatchProcessor {
    dispatcher: Arc<CommandDispatcher>,
}

impl BatchProcessor {
    pub fn new(dispatcher: Arc<CommandDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Split a batch into groups of commands that share state
    ///
    /// Every command lands in exactly one group, each group keeps the original
    /// relative order, and no key appears in the footprints of two groups.
    /// Groups are returned in order of their first command.
    pub fn partition_by_footprint(&self, batch: Vec<Command>) -> Vec<Vec<Command>> {
        let mut parent: Vec<usize> = (0..batch.len()).collect();
        let mut owners: HashMap<StateKey, usize> = HashMap::new();

        for (index, command) in batch.iter().enumerate() {
            for key in self.dispatcher.footprint(command) {
                match owners.entry(key) {
                    Entry::Occupied(owner) => union(&mut parent, *owner.get(), index),
                    Entry::Vacant(slot) => {
                        slot.insert(index);
                    }
                }
            }
        }

        let mut group_of_root: HashMap<usize, usize> = HashMap::new();
        let mut groups: Vec<Vec<Command>> = Vec::new();
        for (index, command) in batch.into_iter().enumerate() {
            let root = find(&mut parent, index);
            let group = *group_of_root.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[group].push(command);
        }

        groups
    }

    /// Run one group's commands in order
    ///
    /// A rejected command is recorded in its result and does not stop the
    /// commands after it.
    pub async fn process_group(&self, commands: Vec<Command>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(commands.len());

        for command in commands {
            let result = self.dispatcher.dispatch(&command);
            results.push(ProcessingResult { command, result });
        }

        results
    }

    /// Run a batch, one tokio task per group, and wait for all of them
    ///
    /// Results are grouped; within a group they follow file order.
    pub async fn process_batch(&self, batch: Vec<Command>) -> Vec<ProcessingResult> {
        let groups = self.partition_by_footprint(batch);
        debug!(groups = groups.len(), "Batch partitioned");

        let mut tasks = Vec::with_capacity(groups.len());
        for commands in groups {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move {
                processor.process_group(commands).await
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(group_results) => results.extend(group_results),
                Err(e) => error!("Batch task panicked: {:?}", e),
            }
        }

        results
    }
}

fn find(parent: &mut [usize], mut index: usize) -> usize {
    while parent[index] != index {
        parent[index] = parent[parent[index]];
        index = parent[index];
    }
    index
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (root_a, root_b) = (find(parent, a), find(parent, b));
    if root_a != root_b {
        // The earlier command stays the root
        parent[root_a.max(root_b)] = root_a.min(root_b);
    }
}
