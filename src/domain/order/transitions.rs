use std::collections::{HashMap, HashSet};

use super::errors::OrderError;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Status Transition Table
// ============================================================================
//
// The set of legal status changes is data, not control flow. The default
// table below can be replaced wholesale from configuration.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransitions {
    edges: HashMap<OrderStatus, HashSet<OrderStatus>>,
}

impl Default for StatusTransitions {
    fn default() -> Self {
        use OrderStatus::*;

        Self::from_edges([
            (Ordered, vec![Fetched, ReadyToPack, ReadyToPackWithException, InRoute, TransferFailed]),
            (Fetched, vec![ReadyToPack, ReadyToPackWithException, TransferFailed]),
            (ReadyToPack, vec![InRoute, ReadyToPackWithException, Shipped, TransferFailed]),
            (ReadyToPackWithException, vec![ReadyToPack, InRoute, Shipped, TransferFailed]),
            (InRoute, vec![Shipped, Received, TransferFailed]),
            (Shipped, vec![Received]),
            (TransferFailed, vec![ReadyToPack, ReadyToPackWithException, InRoute, Received]),
            (Received, vec![]),
        ])
    }
}

impl StatusTransitions {
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (OrderStatus, Vec<OrderStatus>)>,
    {
        let edges = edges
            .into_iter()
            .map(|(from, to)| (from, to.into_iter().collect()))
            .collect();
        Self { edges }
    }

    /// Builds a table from configuration, where statuses are given by name.
    pub fn from_names(table: &HashMap<String, Vec<String>>) -> Result<Self, OrderError> {
        let mut edges = HashMap::new();
        for (from, targets) in table {
            let from: OrderStatus = from.parse()?;
            let targets = targets
                .iter()
                .map(|name| name.parse::<OrderStatus>())
                .collect::<Result<HashSet<_>, _>>()?;
            edges.insert(from, targets);
        }
        Ok(Self { edges })
    }

    pub fn allows(&self, from: OrderStatus, to: OrderStatus) -> bool {
        self.edges
            .get(&from)
            .map(|targets| targets.contains(&to))
            .unwrap_or(false)
    }

    pub fn check(&self, from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(OrderError::InvalidStatusTransition { from, to })
        }
    }

    /// Allowed next states, in declaration order of `OrderStatus`.
    pub fn next_states(&self, from: OrderStatus) -> Vec<OrderStatus> {
        OrderStatus::ALL
            .iter()
            .copied()
            .filter(|to| self.allows(from, *to))
            .collect()
    }
}
