// src/engine/matcher.rs

//! Match resolved entities to scheduled extract refresh tasks.
//!
//! The server lists tasks with target ids only. [`TaskIndex::build`] keeps
//! the tasks whose target is one of the resolved entities and groups them by
//! `(target kind, target id, refresh kind)`. Keying on the id keeps two
//! same-named entities from different projects apart.

use std::collections::BTreeMap;

use tracing::debug;

use crate::errors::{RefreshError, Result};
use crate::remote::{RefreshTask, RemoteEntity};
use crate::types::{EntityKind, RefreshKind};

type TaskKey = (EntityKind, String, RefreshKind);

#[derive(Debug, Default)]
pub struct TaskIndex {
    slots: BTreeMap<TaskKey, Vec<RefreshTask>>,
}

impl TaskIndex {
    /// Index `tasks` against the resolved entities.
    ///
    /// Tasks targeting entities outside `resolved` are dropped.
    pub fn build<'e, I>(tasks: &[RefreshTask], resolved: I) -> Self
    where
        I: IntoIterator<Item = (EntityKind, &'e RemoteEntity)>,
    {
        let known: Vec<(EntityKind, &str)> = resolved
            .into_iter()
            .map(|(kind, entity)| (kind, entity.id.as_str()))
            .collect();

        let mut slots: BTreeMap<TaskKey, Vec<RefreshTask>> = BTreeMap::new();
        let mut dropped = 0usize;

        for task in tasks {
            if !known.contains(&(task.target_kind, task.target_id.as_str())) {
                dropped += 1;
                continue;
            }
            slots
                .entry((task.target_kind, task.target_id.clone(), task.kind))
                .or_default()
                .push(task.clone());
        }

        debug!(
            indexed = tasks.len() - dropped,
            dropped, "built refresh task index"
        );
        Self { slots }
    }

    /// The single task of `kind` targeting `entity`.
    pub fn lookup(
        &self,
        target_kind: EntityKind,
        entity: &RemoteEntity,
        kind: RefreshKind,
    ) -> Result<&RefreshTask> {
        let key = (target_kind, entity.id.clone(), kind);
        match self.slots.get(&key).map(Vec::as_slice) {
            None | Some([]) => Err(RefreshError::TaskNotFound {
                target_kind,
                entity: entity.to_string(),
                kind,
            }),
            Some([task]) => Ok(task),
            Some(many) => Err(RefreshError::DuplicateTasks {
                target_kind,
                entity: entity.to_string(),
                kind,
                task_ids: many.iter().map(|t| t.id.clone()).collect(),
            }),
        }
    }

    /// Number of indexed tasks.
    pub fn len(&self) -> usize {
        self.slots.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
