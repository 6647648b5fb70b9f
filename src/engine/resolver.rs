// src/engine/resolver.rs

//! Resolve a [`RefreshSpec`] to exactly one remote entity.
//!
//! Rules:
//! - With an id (LUID): the entity with that id must exist. If a name is also
//!   configured it must equal the entity's name; the id never silently wins.
//! - With a name only: candidates matching the name (and the tag, when set)
//!   must be exactly one. Zero is [`RefreshError::NoMatch`], more than one is
//!   [`RefreshError::AmbiguousMatch`] listing every candidate.

use tracing::debug;

use crate::engine::RefreshSpec;
use crate::errors::{RefreshError, Result};
use crate::remote::{EntityFilter, RemoteEntity, RemoteService};
use crate::retry::RetryPolicy;

/// Server-side filter that narrows the candidate listing for `spec`.
pub fn entity_filter(spec: &RefreshSpec) -> EntityFilter {
    EntityFilter {
        name: spec.name.clone(),
        tag: spec.tag.clone(),
    }
}

/// Pick the single entity in `catalog` that `spec` designates.
///
/// The catalog may be wider than the server filter; matching is always
/// re-checked locally.
pub fn resolve(spec: &RefreshSpec, catalog: &[RemoteEntity]) -> Result<RemoteEntity> {
    let kind = spec.entity_kind;

    if let Some(id) = &spec.id {
        let entity = catalog
            .iter()
            .find(|e| &e.id == id)
            .ok_or_else(|| RefreshError::NotFound {
                kind,
                id: id.clone(),
            })?;

        return match &spec.name {
            Some(name) if name != &entity.name => Err(RefreshError::IdentityMismatch {
                kind,
                id: id.clone(),
                configured: name.clone(),
                retrieved: entity.name.clone(),
            }),
            _ => Ok(entity.clone()),
        };
    }

    let Some(name) = spec.name.as_deref() else {
        return Err(RefreshError::Config(format!(
            "{spec} has neither a name nor a LUID"
        )));
    };

    let candidates: Vec<&RemoteEntity> = catalog
        .iter()
        .filter(|e| e.name == name)
        .filter(|e| spec.tag.as_deref().is_none_or(|tag| e.has_tag(tag)))
        .collect();

    match candidates.as_slice() {
        [] => Err(RefreshError::NoMatch {
            kind,
            name: name.to_string(),
            tag: spec.tag.clone(),
        }),
        [single] => Ok((*single).clone()),
        _ => Err(RefreshError::AmbiguousMatch {
            kind,
            name: name.to_string(),
            tag: spec.tag.clone(),
            candidates: candidates.into_iter().cloned().collect(),
        }),
    }
}

/// Fetch candidates for `spec` from the server and resolve them.
pub async fn fetch_and_resolve<S>(
    service: &S,
    retry: &RetryPolicy,
    spec: &RefreshSpec,
) -> Result<RemoteEntity>
where
    S: RemoteService + ?Sized,
{
    let kind = spec.entity_kind;

    let catalog: Vec<RemoteEntity> = match spec.id.as_deref() {
        Some(id) => retry
            .execute(&format!("get {} {id}", kind.element()), move || {
                service.get_entity_by_id(kind, id)
            })
            .await?
            .into_iter()
            .collect(),
        None => {
            let filter = entity_filter(spec);
            let filter = &filter;
            retry
                .execute(&format!("list {}", kind.collection()), move || {
                    service.list_entities(kind, filter)
                })
                .await?
        }
    };

    debug!(spec = %spec, candidates = catalog.len(), "fetched candidates");
    resolve(spec, &catalog)
}
