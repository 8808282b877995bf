use super::MaterialState;
use crate::StrError;

/// Holds the committed history of all material points (arena indexed by point id)
///
/// A state is replaced atomically by `commit` and is never modified by an evaluation;
/// trial states live elsewhere until the owning step is accepted.
#[derive(Clone, Debug)]
pub struct StateStore {
    states: Vec<MaterialState>,
}

impl StateStore {
    /// Allocates a new instance with virgin states
    pub fn new(n_points: usize) -> Self {
        StateStore {
            states: vec![MaterialState::new(); n_points],
        }
    }

    /// Returns the number of points
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns the committed state of a point
    pub fn get(&self, point_id: usize) -> Result<&MaterialState, StrError> {
        self.states.get(point_id).ok_or("point id is out of bounds")
    }

    /// Replaces the committed state of a point
    pub fn commit(&mut self, point_id: usize, state: MaterialState) -> Result<(), StrError> {
        let slot = self.states.get_mut(point_id).ok_or("point id is out of bounds")?;
        *slot = state;
        Ok(())
    }

    /// Returns an iterator over the committed states
    pub fn iter(&self) -> std::slice::Iter<'_, MaterialState> {
        self.states.iter()
    }

    /// Returns a mutable iterator used by the mode switch hand-off
    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, MaterialState> {
        self.states.iter_mut()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
