use slotmap::SlotMap;
use std::collections::HashSet;

use crate::{Agent, AgentId};

/// Dense agent storage addressed by generational handles.
///
/// Agents live in a contiguous `Vec` for cache-friendly iteration; the slot map
/// translates stable [`AgentId`]s into dense indices.
#[derive(Debug, Default)]
pub struct AgentArena {
    slots: SlotMap<AgentId, usize>,
    handles: Vec<AgentId>,
    agents: Vec<Agent>,
}

impl AgentArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an arena with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
            handles: Vec::with_capacity(capacity),
            agents: Vec::with_capacity(capacity),
        }
    }

    /// Number of stored agents, including tombstoned ones awaiting the sweep.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Iterate over agent handles in dense iteration order.
    pub fn iter_handles(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.handles.iter().copied()
    }

    /// Iterate over `(id, agent)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &Agent)> + '_ {
        self.handles.iter().copied().zip(self.agents.iter())
    }

    /// Dense slice of agents, aligned with [`AgentArena::iter_handles`].
    #[must_use]
    pub fn as_slice(&self) -> &[Agent] {
        &self.agents
    }

    /// Returns the dense index for `id`, if present.
    #[must_use]
    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.slots.get(id).copied()
    }

    /// Returns true if `id` refers to a stored agent.
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.slots.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.index_of(id).map(|idx| &self.agents[idx])
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        let idx = self.index_of(id)?;
        Some(&mut self.agents[idx])
    }

    /// Mutable access to two distinct agents at once.
    pub fn pair_mut(&mut self, a: AgentId, b: AgentId) -> Option<(&mut Agent, &mut Agent)> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        if ia == ib {
            return None;
        }
        if ia < ib {
            let (left, right) = self.agents.split_at_mut(ib);
            Some((&mut left[ia], &mut right[0]))
        } else {
            let (left, right) = self.agents.split_at_mut(ia);
            Some((&mut right[0], &mut left[ib]))
        }
    }

    /// Insert a new agent and return its handle.
    pub fn insert(&mut self, agent: Agent) -> AgentId {
        let index = self.agents.len();
        self.agents.push(agent);
        let id = self.slots.insert(index);
        self.handles.push(id);
        id
    }

    /// Remove all agents whose ids are in `dead`, preserving iteration order.
    /// Returns the removed agents in their former dense order.
    pub fn remove_many(&mut self, dead: &HashSet<AgentId>) -> Vec<(AgentId, Agent)> {
        if dead.is_empty() {
            return Vec::new();
        }
        let handles = std::mem::take(&mut self.handles);
        let agents = std::mem::take(&mut self.agents);
        let mut removed = Vec::new();
        for (id, agent) in handles.into_iter().zip(agents) {
            if dead.contains(&id) {
                self.slots.remove(id);
                removed.push((id, agent));
                continue;
            }
            if let Some(slot) = self.slots.get_mut(id) {
                *slot = self.agents.len();
            }
            self.handles.push(id);
            self.agents.push(agent);
        }
        removed
    }
}
