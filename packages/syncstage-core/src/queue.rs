//! Per-room queue: an ordered collection of per-user stacks drained in
//! round-robin order.

use std::collections::VecDeque;

use serde::Serialize;

use crate::error::QueueError;
use crate::resolver::StreamDescriptor;

struct Stack {
    owner_id: String,
    items: VecDeque<StreamDescriptor>,
}

/// Wire view of one owner's stack, returned by `request_stacksync`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackStatus {
    pub owner_id: String,
    pub items: Vec<StreamDescriptor>,
}

/// Wire view of the full queue, returned by `request_queuesync`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub length: usize,
    pub stacks: Vec<StackStatus>,
}

/// An ordered collection of user-owned stacks, drained round-robin.
///
/// The round-robin order is the insertion order of owners. A stack that
/// empties mid-cycle is skipped (not removed) — a later `push` from the same
/// owner reuses its slot, preserving fairness history across empty/refill
/// cycles.
#[derive(Default)]
pub struct Queue {
    stacks: Vec<Stack>,
    cursor: usize,
}

impl Queue {
    pub fn new() -> Self {
        Self {
            stacks: Vec::new(),
            cursor: 0,
        }
    }

    fn index_of(&self, owner_id: &str) -> Option<usize> {
        self.stacks.iter().position(|s| s.owner_id == owner_id)
    }

    /// Appends `stream` to `owner_id`'s stack, creating it (and appending the
    /// owner to the round-robin order) if this is their first item.
    pub fn push(&mut self, owner_id: &str, stream: StreamDescriptor) {
        if let Some(idx) = self.index_of(owner_id) {
            self.stacks[idx].items.push_back(stream);
        } else {
            self.stacks.push(Stack {
                owner_id: owner_id.to_string(),
                items: VecDeque::from([stream]),
            });
        }
    }

    /// Removes and returns the head of the next non-empty stack in
    /// round-robin order. The cursor only advances on success.
    pub fn next(&mut self) -> Result<StreamDescriptor, QueueError> {
        let len = self.stacks.len();
        if len == 0 {
            return Err(QueueError::QueueEmpty);
        }
        for step in 0..len {
            let idx = (self.cursor + step) % len;
            if let Some(item) = self.stacks[idx].items.pop_front() {
                self.cursor = (idx + 1) % len;
                return Ok(item);
            }
        }
        Err(QueueError::QueueEmpty)
    }

    /// Total number of items across every stack.
    pub fn len(&self) -> usize {
        self.stacks.iter().map(|s| s.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stack_status(&self, owner_id: &str) -> Result<StackStatus, QueueError> {
        let idx = self.index_of(owner_id).ok_or(QueueError::NoSuchStack)?;
        Ok(StackStatus {
            owner_id: owner_id.to_string(),
            items: self.stacks[idx].items.iter().cloned().collect(),
        })
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            length: self.len(),
            stacks: self
                .stacks
                .iter()
                .map(|s| StackStatus {
                    owner_id: s.owner_id.clone(),
                    items: s.items.iter().cloned().collect(),
                })
                .collect(),
        }
    }
}
