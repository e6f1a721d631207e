use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use supersave_core::{BaseEntity, EntityDefinition, HookError};

/// The point in the CRUD lifecycle a [`Hook`] fires at: create and update
/// each get a before/after pair, delete gets a before/after pair. List and
/// get are pure reads and carry no hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    CreateBefore,
    CreateAfter,
    UpdateBefore,
    UpdateAfter,
    DeleteBefore,
    DeleteAfter,
}

/// Shared context passed to every hook invocation: the external HTTP
/// collaborator's request shape, reduced to the fields a hook can actually
/// inspect (params, query, body, headers). Route parsing, verb dispatch and
/// wire framing stay with the collaborator; this is the narrow surface it
/// hands down.
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
    pub headers: HashMap<String, String>,
}

type HookFuture = Pin<Box<dyn Future<Output = Result<BaseEntity, HookError>> + Send>>;

/// One entry of a collection's hook chain: fires at `kind`, receives an
/// owned clone of the shared [`HookContext`] plus the entity value flowing
/// through the pipeline, and either returns a (possibly transformed) value
/// or a [`HookError`] that short-circuits the request. The context is
/// handed over by value (it is
/// cheap to clone) rather than borrowed, so a hook's future is free to hold
/// onto it across an await point without tying `Hook`'s type to a caller's
/// lifetime.
#[derive(Clone)]
pub struct Hook {
    pub kind: HookKind,
    call: Arc<dyn Fn(HookContext, BaseEntity) -> HookFuture + Send + Sync>,
}

impl Hook {
    pub fn new<F, Fut>(kind: HookKind, call: F) -> Self
    where
        F: Fn(HookContext, BaseEntity) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BaseEntity, HookError>> + Send + 'static,
    {
        Self { kind, call: Arc::new(move |ctx, value| Box::pin(call(ctx, value))) }
    }

    pub async fn call(&self, ctx: HookContext, value: BaseEntity) -> Result<BaseEntity, HookError> {
        (self.call)(ctx, value).await
    }
}

/// Runs every hook of `kind`, in registration order, threading the entity
/// value through each one: each hook returns the transformed value, and the
/// runner threads it on to the next. The first
/// [`HookError`] stops the chain and propagates.
pub async fn run_hooks(
    hooks: &[Hook],
    kind: HookKind,
    ctx: &HookContext,
    mut value: BaseEntity,
) -> Result<BaseEntity, HookError> {
    for hook in hooks.iter().filter(|h| h.kind == kind) {
        value = hook.call(ctx.clone(), value).await?;
    }
    Ok(value)
}

/// An entity exposed over HTTP: an `EntityDefinition` plus an optional
/// description, `additionalProperties` flag, and hook list. The manager
/// converts
/// this into `(entity, hooks)` on `register`, and makes the result
/// available to any attached external HTTP router.
#[derive(Clone)]
pub struct Collection {
    pub entity: EntityDefinition,
    pub description: Option<String>,
    pub additional_properties: Option<bool>,
    pub hooks: Vec<Hook>,
}

impl Collection {
    pub fn new(entity: EntityDefinition) -> Self {
        Self { entity, description: None, additional_properties: None, hooks: Vec::new() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_additional_properties(mut self, allowed: bool) -> Self {
        self.additional_properties = Some(allowed);
        self
    }

    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    /// The path an external router should mount this collection at:
    /// `"/" + namespace? + "/" + pluralize(name).lower().replace(" ", "-")`.
    pub fn route_name(&self) -> String {
        let plural = pluralize(&self.entity.name).to_lowercase().replace(' ', "-");
        match &self.entity.namespace {
            Some(ns) => format!("/{ns}/{plural}"),
            None => format!("/{plural}"),
        }
    }
}

/// Thin English pluralization heuristic, not a full linguistic pluralizer —
/// that stays with the external HTTP collaborator. Handles the common
/// cases: a
/// trailing consonant + `y` -> `ies`, a sibilant ending -> `es`, else a
/// plain `+s`.
fn pluralize(name: &str) -> String {
    let lower = name.to_lowercase();
    if let Some(stem) = lower.strip_suffix('y') {
        let prev_is_vowel = stem.chars().last().map(|c| "aeiou".contains(c)).unwrap_or(false);
        if !prev_is_vowel {
            return format!("{stem}ies");
        }
    }
    for suffix in ["s", "x", "ch", "sh"] {
        if lower.ends_with(suffix) {
            return format!("{name}es");
        }
    }
    format!("{name}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, namespace: Option<&str>) -> EntityDefinition {
        EntityDefinition {
            name: name.to_owned(),
            namespace: namespace.map(str::to_owned),
            template: Default::default(),
            relations: Vec::new(),
            filter_sort_fields: Default::default(),
        }
    }

    #[test]
    fn route_name_pluralizes_and_lowercases() {
        let c = Collection::new(entity("Planet", None));
        assert_eq!(c.route_name(), "/planets");
    }

    #[test]
    fn route_name_includes_namespace() {
        let c = Collection::new(entity("Galaxy", Some("space")));
        assert_eq!(c.route_name(), "/space/galaxies");
    }

    #[test]
    fn pluralize_handles_sibilant_endings() {
        assert_eq!(pluralize("Box"), "Boxes");
        assert_eq!(pluralize("Wish"), "Wishes");
        assert_eq!(pluralize("Church"), "Churches");
    }

    #[test]
    fn pluralize_handles_consonant_y() {
        assert_eq!(pluralize("Category"), "Categories");
        assert_eq!(pluralize("Day"), "Days");
    }
}
