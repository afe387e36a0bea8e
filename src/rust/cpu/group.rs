// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::std::collections::{
    BTreeSet,
    VecDeque,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Pool of cores. Idle cores are handed out in the order they went idle.
#[derive(Default)]
pub struct CoreGroup {
    idle: VecDeque<usize>,
    active: BTreeSet<usize>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl CoreGroup {
    /// Builds a pool where every core starts idle.
    pub fn new<I: IntoIterator<Item = usize>>(cores: I) -> Self {
        Self {
            idle: cores.into_iter().collect(),
            active: BTreeSet::new(),
        }
    }

    /// Takes the longest idle core out of the idle set.
    pub fn take_idle(&mut self) -> Option<usize> {
        let core: usize = self.idle.pop_front()?;
        self.active.insert(core);
        Some(core)
    }

    /// Records that `core` went active without being taken through [CoreGroup::take_idle].
    pub fn mark_active(&mut self, core: usize) {
        self.idle.retain(|c| *c != core);
        self.active.insert(core);
    }

    /// Puts `core` back into the idle set.
    pub fn return_idle(&mut self, core: usize) {
        self.active.remove(&core);
        if !self.idle.contains(&core) {
            self.idle.push_back(core);
        }
    }

    pub fn has_idle(&self) -> bool {
        !self.idle.is_empty()
    }

    pub fn num_idle(&self) -> usize {
        self.idle.len()
    }

    pub fn num_active(&self) -> usize {
        self.active.len()
    }

    pub fn len(&self) -> usize {
        self.idle.len() + self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

#[cfg(test)]
mod tests {
    use super::CoreGroup;
    use ::anyhow::Result;

    #[test]
    fn cores_move_between_idle_and_active() -> Result<()> {
        let mut group: CoreGroup = CoreGroup::new(2..5);
        crate::ensure_eq!(group.take_idle(), Some(2));
        crate::ensure_eq!(group.take_idle(), Some(3));
        crate::ensure_eq!(group.num_active(), 2);

        group.return_idle(2);
        group.return_idle(2);
        crate::ensure_eq!(group.num_idle(), 2);
        crate::ensure_eq!(group.take_idle(), Some(4));
        crate::ensure_eq!(group.take_idle(), Some(2));
        crate::ensure_eq!(group.take_idle(), None);
        crate::ensure_eq!(group.has_idle(), false);
        crate::ensure_eq!(group.len(), 3);
        Ok(())
    }

    #[test]
    fn marking_active_removes_from_idle() -> Result<()> {
        let mut group: CoreGroup = CoreGroup::new(0..2);
        group.mark_active(1);
        crate::ensure_eq!(group.take_idle(), Some(0));
        crate::ensure_eq!(group.take_idle(), None);
        crate::ensure_eq!(group.num_active(), 2);
        Ok(())
    }
}
