//! Local editor state
//!
//! One ordered `Vec` per loaded scope. Vector index is the position;
//! every entity's `sort_order` is kept equal to its index.

use std::collections::HashMap;

use shared::models::{OrderedEntity, Props, ScopeKey, merge_props};

use super::EditorError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorState {
    scopes: HashMap<ScopeKey, Vec<OrderedEntity>>,
}

impl EditorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a scope wholesale with a server snapshot
    pub fn load_scope(&mut self, scope: ScopeKey, mut entities: Vec<OrderedEntity>) {
        entities.sort_by_key(|e| (e.sort_order, e.id));
        renumber(&mut entities);
        self.scopes.insert(scope, entities);
    }

    pub fn unload_scope(&mut self, scope: ScopeKey) -> Option<Vec<OrderedEntity>> {
        self.scopes.remove(&scope)
    }

    pub fn is_loaded(&self, scope: ScopeKey) -> bool {
        self.scopes.contains_key(&scope)
    }

    /// Entities of a scope in order (empty if not loaded)
    pub fn entities(&self, scope: ScopeKey) -> &[OrderedEntity] {
        self.scopes.get(&scope).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ids(&self, scope: ScopeKey) -> Vec<i64> {
        self.entities(scope).iter().map(|e| e.id).collect()
    }

    pub fn get(&self, scope: ScopeKey, id: i64) -> Option<&OrderedEntity> {
        self.entities(scope).iter().find(|e| e.id == id)
    }

    pub fn position(&self, scope: ScopeKey, id: i64) -> Option<usize> {
        self.entities(scope).iter().position(|e| e.id == id)
    }

    pub(crate) fn scope(&self, scope: ScopeKey) -> Result<&Vec<OrderedEntity>, EditorError> {
        self.scopes.get(&scope).ok_or(EditorError::UnknownScope(scope))
    }

    fn scope_mut(&mut self, scope: ScopeKey) -> Result<&mut Vec<OrderedEntity>, EditorError> {
        self.scopes
            .get_mut(&scope)
            .ok_or(EditorError::UnknownScope(scope))
    }

    /// Insert at `entity.sort_order` (clamped), shifting later entities
    pub(crate) fn insert(&mut self, scope: ScopeKey, entity: OrderedEntity) -> Result<(), EditorError> {
        let entities = self.scope_mut(scope)?;
        if entities.iter().any(|e| e.id == entity.id) {
            return Err(EditorError::Duplicate { scope, id: entity.id });
        }
        let at = usize::try_from(entity.sort_order)
            .unwrap_or(0)
            .min(entities.len());
        entities.insert(at, entity);
        renumber(entities);
        Ok(())
    }

    pub(crate) fn remove(&mut self, scope: ScopeKey, id: i64) -> Result<OrderedEntity, EditorError> {
        let entities = self.scope_mut(scope)?;
        let index = entities
            .iter()
            .position(|e| e.id == id)
            .ok_or(EditorError::NotFound { scope, id })?;
        let removed = entities.remove(index);
        renumber(entities);
        Ok(removed)
    }

    pub(crate) fn merge(&mut self, scope: ScopeKey, id: i64, patch: &Props) -> Result<(), EditorError> {
        let entity = self
            .scope_mut(scope)?
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(EditorError::NotFound { scope, id })?;
        merge_props(&mut entity.props, patch);
        Ok(())
    }

    /// Move the entity at `from` to `to`; everything in between shifts by one
    pub(crate) fn move_entity(&mut self, scope: ScopeKey, from: usize, to: usize) -> Result<(), EditorError> {
        let entities = self.scope_mut(scope)?;
        let moved = entities.remove(from);
        entities.insert(to, moved);
        renumber(entities);
        Ok(())
    }
}

fn renumber(entities: &mut [OrderedEntity]) {
    for (index, entity) in entities.iter_mut().enumerate() {
        entity.sort_order = index as i32;
    }
}
