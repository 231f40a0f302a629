//! Edit History
//!
//! Two stacks of [`Command`]s. `apply` pushes onto `undo` and clears `redo`;
//! `undo` runs the inverse and moves the command to `redo`; `redo` runs the
//! forward mutation again. The oldest commands are dropped past `limit`.

use std::collections::VecDeque;

use super::{Command, EditorError, EditorState, Mutation};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct EditHistory {
    undo: VecDeque<Command>,
    redo: Vec<Command>,
    limit: usize,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// `limit` of 0 is treated as 1
    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Apply a new command. Returns the mutation to persist.
    pub fn apply(&mut self, command: Command, state: &mut EditorState) -> Result<Mutation, EditorError> {
        command.forward().apply(state)?;
        let applied = command.forward().clone();

        self.redo.clear();
        self.undo.push_back(command);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
        Ok(applied)
    }

    /// Undo the latest command. `Ok(None)` when there is nothing to undo.
    ///
    /// If the inverse no longer applies the command stays on the undo stack.
    pub fn undo(&mut self, state: &mut EditorState) -> Result<Option<Mutation>, EditorError> {
        let Some(command) = self.undo.pop_back() else {
            return Ok(None);
        };
        if let Err(e) = command.inverse().apply(state) {
            self.undo.push_back(command);
            return Err(e);
        }
        let applied = command.inverse().clone();
        self.redo.push(command);
        Ok(Some(applied))
    }

    /// Redo the latest undone command. `Ok(None)` when there is nothing to redo.
    pub fn redo(&mut self, state: &mut EditorState) -> Result<Option<Mutation>, EditorError> {
        let Some(command) = self.redo.pop() else {
            return Ok(None);
        };
        if let Err(e) = command.forward().apply(state) {
            self.redo.push(command);
            return Err(e);
        }
        let applied = command.forward().clone();
        self.undo.push_back(command);
        Ok(Some(applied))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::new()
    }
}
