use super::{Sequence, State};
use crate::error::EditError;
use crate::node::Raw;

/// Where [`Sequence::insert`] places the new state, relative to an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    Before(String),
    After(String),
}

impl Position {
    pub fn before(name: impl Into<String>) -> Self {
        Position::Before(name.into())
    }

    pub fn after(name: impl Into<String>) -> Self {
        Position::After(name.into())
    }
}

impl Sequence {
    /// Inserts a state, redirecting pointers so the chain stays intact.
    pub fn insert(&mut self, raw: impl Into<Raw>, position: Position) -> Result<&mut State, EditError> {
        let state = self.parse_new(raw)?;
        match position {
            Position::Before(target) => self.insert_before(state, target),
            Position::After(target) => self.insert_after(state, target),
        }
    }

    fn insert_before(&mut self, mut state: State, target: String) -> Result<&mut State, EditError> {
        let is_start = self.start_at.as_deref() == Some(target.as_str());
        let predecessors: Vec<String> = self
            .states
            .values()
            .filter(|s| s.next.as_deref() == Some(target.as_str()))
            .map(|s| s.name.clone())
            .collect();
        if !is_start && predecessors.is_empty() {
            return Err(EditError::NoPredecessor(target));
        }

        if is_start {
            self.start_at = Some(state.name.clone());
        }
        for name in predecessors {
            if let Some(predecessor) = self.states.get_mut(&name) {
                predecessor.next = Some(state.name.clone());
            }
        }
        state.next = Some(target);
        state.end = None;
        Ok(self.place(state))
    }

    fn insert_after(&mut self, mut state: State, target: String) -> Result<&mut State, EditError> {
        let anchor = self
            .states
            .get_mut(&target)
            .ok_or(EditError::UnknownState(target))?;
        state.next = anchor.next.replace(state.name.clone());
        state.end = anchor.end.take();
        Ok(self.place(state))
    }

    /// Removes a state and returns it. Its predecessors inherit its successor.
    pub fn remove(&mut self, name: &str) -> Result<State, EditError> {
        let removed = self
            .states
            .remove(name)
            .ok_or_else(|| EditError::UnknownState(name.to_string()))?;

        for state in self.states.values_mut() {
            if state.next.as_deref() == Some(name) {
                state.next = removed.next.clone();
                if state.next.is_none() {
                    state.end = removed.end;
                }
            }
        }
        if self.start_at.as_deref() == Some(name) {
            self.start_at = removed.next.clone();
        }
        Ok(removed)
    }

    /// Adds a state after every terminal tip of the chain.
    ///
    /// An empty sequence starts at the new state. A non-empty sequence must have at least one
    /// state that continues through `next` and currently has none.
    pub fn append(&mut self, raw: impl Into<Raw>) -> Result<&mut State, EditError> {
        let state = self.parse_new(raw)?;
        if self.states.is_empty() {
            self.start_at = Some(state.name.clone());
            return Ok(self.place(state));
        }

        let mut redirected = false;
        for tip in self
            .states
            .values_mut()
            .filter(|s| s.kind.accepts_next() && s.next.is_none())
        {
            tip.next = Some(state.name.clone());
            tip.end = None;
            redirected = true;
        }
        if !redirected {
            return Err(EditError::NoTerminalState);
        }
        Ok(self.place(state))
    }

    fn parse_new(&self, raw: impl Into<Raw>) -> Result<State, EditError> {
        let state = State::parse(raw)?;
        if self.states.contains_key(&state.name) {
            return Err(EditError::DuplicateName(state.name));
        }
        Ok(state)
    }

    fn place(&mut self, state: State) -> &mut State {
        self.states.entry(state.name.clone()).or_insert(state)
    }
}
