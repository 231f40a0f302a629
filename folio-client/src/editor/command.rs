//! Command Model
//!
//! A [`Command`] pairs a forward [`Mutation`] with its inverse. Both are
//! computed once, from the state *before* the edit, and never change after.
//!
//! | Forward | Inverse |
//! |---------|---------|
//! | Create  | Delete (same id) |
//! | Delete  | Create (pre-delete snapshot, same position) |
//! | Update  | Update (prior values of the touched keys, `null` where absent) |
//! | Reorder | Reorder back, targeting the entity that filled the vacated slot |

use serde::{Deserialize, Serialize};

use shared::models::{EntityKind, OrderedEntity, Props, ScopeKey, prior_values};

use super::{EditorError, EditorState};

/// One local edit, replayable on an [`EditorState`] and on the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mutation {
    Create {
        scope: ScopeKey,
        entity: OrderedEntity,
    },
    Delete {
        scope: ScopeKey,
        id: i64,
    },
    Update {
        scope: ScopeKey,
        id: i64,
        patch: Props,
    },
    Reorder {
        scope: ScopeKey,
        source_id: i64,
        target_id: i64,
        from: usize,
        to: usize,
    },
}

impl Mutation {
    pub fn scope(&self) -> ScopeKey {
        match self {
            Self::Create { scope, .. }
            | Self::Delete { scope, .. }
            | Self::Update { scope, .. }
            | Self::Reorder { scope, .. } => *scope,
        }
    }

    /// Entity the mutation is about (the moved entity for a reorder)
    pub fn entity_id(&self) -> i64 {
        match self {
            Self::Create { entity, .. } => entity.id,
            Self::Delete { id, .. } | Self::Update { id, .. } => *id,
            Self::Reorder { source_id, .. } => *source_id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.scope().kind
    }

    /// Apply to local state. On error the state is unchanged.
    pub fn apply(&self, state: &mut EditorState) -> Result<(), EditorError> {
        match self {
            Self::Create { scope, entity } => state.insert(*scope, entity.clone()),
            Self::Delete { scope, id } => state.remove(*scope, *id).map(|_| ()),
            Self::Update { scope, id, patch } => state.merge(*scope, *id, patch),
            Self::Reorder {
                scope,
                source_id,
                target_id,
                from,
                to,
            } => {
                let entities = state.scope(*scope)?;
                let at = |index: usize| entities.get(index).map(|e| e.id);
                if at(*from) != Some(*source_id) || at(*to) != Some(*target_id) {
                    return Err(EditorError::Stale {
                        scope: *scope,
                        id: *source_id,
                    });
                }
                state.move_entity(*scope, *from, *to)
            }
        }
    }
}

/// Invertible edit
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    forward: Mutation,
    inverse: Mutation,
}

impl Command {
    pub fn forward(&self) -> &Mutation {
        &self.forward
    }

    pub fn inverse(&self) -> &Mutation {
        &self.inverse
    }

    /// Insert a new entity at `at` (default: append)
    pub fn create(
        state: &EditorState,
        scope: ScopeKey,
        id: i64,
        props: Props,
        at: Option<usize>,
    ) -> Result<Self, EditorError> {
        let entities = state.scope(scope)?;
        if entities.iter().any(|e| e.id == id) {
            return Err(EditorError::Duplicate { scope, id });
        }
        let position = at.map_or(entities.len(), |at| at.min(entities.len()));

        let entity = OrderedEntity {
            id,
            scope_id: scope.parent_id,
            sort_order: position as i32,
            props,
        };
        Ok(Self {
            forward: Mutation::Create { scope, entity },
            inverse: Mutation::Delete { scope, id },
        })
    }

    pub fn delete(state: &EditorState, scope: ScopeKey, id: i64) -> Result<Self, EditorError> {
        let snapshot = state
            .scope(scope)?
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(EditorError::NotFound { scope, id })?;

        Ok(Self {
            forward: Mutation::Delete { scope, id },
            inverse: Mutation::Create {
                scope,
                entity: snapshot,
            },
        })
    }

    pub fn update(state: &EditorState, scope: ScopeKey, id: i64, patch: Props) -> Result<Self, EditorError> {
        let current = state
            .scope(scope)?
            .iter()
            .find(|e| e.id == id)
            .ok_or(EditorError::NotFound { scope, id })?;
        let prior = prior_values(&current.props, &patch);

        Ok(Self {
            forward: Mutation::Update { scope, id, patch },
            inverse: Mutation::Update {
                scope,
                id,
                patch: prior,
            },
        })
    }

    /// Move `source_id` to the position of `target_id`.
    ///
    /// `Ok(None)` when there is nothing to move (same entity or same slot).
    pub fn reorder(
        state: &EditorState,
        scope: ScopeKey,
        source_id: i64,
        target_id: i64,
    ) -> Result<Option<Self>, EditorError> {
        if source_id == target_id {
            return Ok(None);
        }
        let entities = state.scope(scope)?;
        let position = |id: i64| {
            entities
                .iter()
                .position(|e| e.id == id)
                .ok_or(EditorError::NotFound { scope, id })
        };
        let from = position(source_id)?;
        let to = position(target_id)?;
        if from == to {
            return Ok(None);
        }

        // After the move the neighbour on the vacated side sits at `from`.
        let refill = if from < to { from + 1 } else { from - 1 };
        let inverse_target = entities[refill].id;

        Ok(Some(Self {
            forward: Mutation::Reorder {
                scope,
                source_id,
                target_id,
                from,
                to,
            },
            inverse: Mutation::Reorder {
                scope,
                source_id,
                target_id: inverse_target,
                from: to,
                to: from,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{block, props, scope_of, seeded_state};
    use serde_json::json;

    /// apply forward then inverse, returning the intermediate state
    fn round_trip(state: &mut EditorState, command: &Command) -> EditorState {
        let before = state.clone();
        command.forward().apply(state).unwrap();
        let after = state.clone();
        command.inverse().apply(state).unwrap();
        assert_eq!(*state, before, "inverse did not restore {:?}", command.forward());
        after
    }

    #[test]
    fn test_create_inverse() {
        let (mut state, scope) = seeded_state();
        let command = Command::create(&state, scope, 9, props(json!({"t": "new"})), Some(1)).unwrap();
        let after = round_trip(&mut state, &command);
        assert_eq!(after.ids(scope), vec![1, 9, 2, 3, 4]);
    }

    #[test]
    fn test_create_appends_by_default() {
        let (state, scope) = seeded_state();
        let command = Command::create(&state, scope, 9, Props::new(), None).unwrap();
        assert!(matches!(
            command.forward(),
            Mutation::Create { entity, .. } if entity.sort_order == 4
        ));
        assert!(matches!(
            Command::create(&state, scope, 2, Props::new(), None),
            Err(EditorError::Duplicate { id: 2, .. })
        ));
    }

    #[test]
    fn test_delete_inverse_restores_position_and_props() {
        let (mut state, scope) = seeded_state();
        let command = Command::delete(&state, scope, 2).unwrap();
        let after = round_trip(&mut state, &command);
        assert_eq!(after.ids(scope), vec![1, 3, 4]);
        assert_eq!(state.get(scope, 2).unwrap().props, props(json!({"name": "B"})));
    }

    #[test]
    fn test_update_inverse_restores_touched_keys_only() {
        let (mut state, scope) = seeded_state();
        let patch = props(json!({"name": "B2", "color": "red"}));
        let command = Command::update(&state, scope, 2, patch).unwrap();
        assert_eq!(
            command.inverse(),
            &Mutation::Update {
                scope,
                id: 2,
                patch: props(json!({"name": "B", "color": null})),
            }
        );
        let after = round_trip(&mut state, &command);
        assert_eq!(
            after.get(scope, 2).unwrap().props,
            props(json!({"name": "B2", "color": "red"}))
        );
    }

    #[test]
    fn test_update_removing_key_is_restored() {
        let (mut state, scope) = seeded_state();
        let command = Command::update(&state, scope, 3, props(json!({"name": null}))).unwrap();
        let after = round_trip(&mut state, &command);
        assert!(after.get(scope, 3).unwrap().props.is_empty());
    }

    #[test]
    fn test_reorder_forward_inverse() {
        let (mut state, scope) = seeded_state();
        let command = Command::reorder(&state, scope, 1, 3).unwrap().unwrap();
        assert_eq!(
            command.inverse(),
            &Mutation::Reorder {
                scope,
                source_id: 1,
                target_id: 2,
                from: 2,
                to: 0,
            }
        );
        let after = round_trip(&mut state, &command);
        assert_eq!(after.ids(scope), vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_reorder_backward_inverse() {
        let (mut state, scope) = seeded_state();
        let command = Command::reorder(&state, scope, 4, 2).unwrap().unwrap();
        let after = round_trip(&mut state, &command);
        assert_eq!(after.ids(scope), vec![1, 4, 2, 3]);
    }

    #[test]
    fn test_reorder_every_pair_round_trips() {
        let (state, scope) = seeded_state();
        for source in 1..=4 {
            for target in 1..=4 {
                let mut local = state.clone();
                match Command::reorder(&local, scope, source, target).unwrap() {
                    Some(command) => {
                        round_trip(&mut local, &command);
                    }
                    None => assert_eq!(source, target),
                }
            }
        }
    }

    #[test]
    fn test_reorder_same_entity_is_none() {
        let (state, scope) = seeded_state();
        assert!(Command::reorder(&state, scope, 3, 3).unwrap().is_none());
        assert!(Command::reorder(&state, scope, 77, 77).unwrap().is_none());
    }

    #[test]
    fn test_reorder_unknown_entity() {
        let (state, scope) = seeded_state();
        assert!(matches!(
            Command::reorder(&state, scope, 1, 77),
            Err(EditorError::NotFound { id: 77, .. })
        ));
        assert!(matches!(
            Command::reorder(&state, ScopeKey::blocks_of(999), 1, 2),
            Err(EditorError::UnknownScope(_))
        ));
    }

    #[test]
    fn test_stale_reorder_leaves_state_unchanged() {
        let (mut state, scope) = seeded_state();
        let command = Command::reorder(&state, scope, 1, 3).unwrap().unwrap();
        // someone else moved block 1 first
        Command::reorder(&state, scope, 1, 2)
            .unwrap()
            .unwrap()
            .forward()
            .apply(&mut state)
            .unwrap();

        let before = state.clone();
        assert!(matches!(
            command.forward().apply(&mut state),
            Err(EditorError::Stale { id: 1, .. })
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_mutation_accessors() {
        let scope = scope_of();
        let create = Mutation::Create {
            scope,
            entity: block(5),
        };
        assert_eq!(create.entity_id(), 5);
        assert_eq!(create.scope(), scope);
        assert_eq!(create.kind(), EntityKind::Block);
    }
}
