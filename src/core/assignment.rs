//! Which model each configured host will chat with.

use std::error::Error as StdError;
use std::fmt;

use crate::core::config::Host;

/// Upper bound on concurrently assigned hosts in multimodel mode.
pub const MAX_MULTIMODEL_SESSIONS: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    pub model: String,
    pub assigned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    UnknownHost(usize),
    LimitReached(usize),
}

impl fmt::Display for AssignmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentError::UnknownHost(index) => write!(f, "no host at index {index}"),
            AssignmentError::LimitReached(max) => {
                write!(f, "at most {max} hosts can be assigned at once")
            }
        }
    }
}

impl StdError for AssignmentError {}

#[derive(Debug, Clone)]
pub struct AssignmentRegistry {
    hosts: Vec<Host>,
    assignments: Vec<Assignment>,
    max_assigned: usize,
}

impl AssignmentRegistry {
    pub fn new(hosts: Vec<Host>, max_assigned: usize) -> Self {
        let assignments = vec![Assignment::default(); hosts.len()];
        Self {
            hosts,
            assignments,
            max_assigned: max_assigned.max(1),
        }
    }

    pub fn for_mode(hosts: Vec<Host>, multimodel: bool) -> Self {
        let max = if multimodel {
            MAX_MULTIMODEL_SESSIONS
        } else {
            1
        };
        Self::new(hosts, max)
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn host(&self, index: usize) -> Option<&Host> {
        self.hosts.get(index)
    }

    pub fn assignment(&self, index: usize) -> Option<&Assignment> {
        self.assignments.get(index)
    }

    pub fn max_assigned(&self) -> usize {
        self.max_assigned
    }

    pub fn is_single(&self) -> bool {
        self.max_assigned == 1
    }

    /// Assign `model` to the host at `index`.
    ///
    /// With a limit of one the previous assignment is replaced; otherwise a
    /// new host beyond the limit is rejected.
    pub fn select(&mut self, index: usize, model: impl Into<String>) -> Result<(), AssignmentError> {
        if index >= self.hosts.len() {
            return Err(AssignmentError::UnknownHost(index));
        }
        let already = self.assignments[index].assigned;
        if !already && self.assigned_count() >= self.max_assigned {
            if self.max_assigned == 1 {
                for assignment in &mut self.assignments {
                    *assignment = Assignment::default();
                }
            } else {
                return Err(AssignmentError::LimitReached(self.max_assigned));
            }
        }
        self.assignments[index] = Assignment {
            model: model.into(),
            assigned: true,
        };
        Ok(())
    }

    pub fn clear(&mut self, index: usize) -> Result<(), AssignmentError> {
        let assignment = self
            .assignments
            .get_mut(index)
            .ok_or(AssignmentError::UnknownHost(index))?;
        *assignment = Assignment::default();
        Ok(())
    }

    pub fn assigned_count(&self) -> usize {
        self.assignments.iter().filter(|a| a.assigned).count()
    }

    pub fn has_assignment(&self) -> bool {
        self.assigned_count() > 0
    }

    /// Assigned hosts in registry order with their chosen model.
    pub fn assigned(&self) -> impl Iterator<Item = (usize, &Host, &str)> + '_ {
        self.hosts
            .iter()
            .zip(&self.assignments)
            .enumerate()
            .filter(|(_, (_, a))| a.assigned)
            .map(|(i, (host, a))| (i, host, a.model.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectableModel {
    pub name: String,
    pub loaded: bool,
}

/// Candidate models for a host, currently loaded ones first.
///
/// Order within each group follows `candidates`.
pub fn list_selectable(candidates: &[String], loaded: &[String]) -> Vec<SelectableModel> {
    let (mut first, rest): (Vec<_>, Vec<_>) = candidates
        .iter()
        .map(|name| SelectableModel {
            name: name.clone(),
            loaded: loaded.iter().any(|l| l == name),
        })
        .partition(|m| m.loaded);
    first.extend(rest);
    first
}
