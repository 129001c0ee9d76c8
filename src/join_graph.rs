//! Foreign-key graph derived from a schema.
//!
//! Edges are a pure projection of the schema's foreign keys, rebuilt on
//! every query. Join paths are found by breadth-first search with every
//! foreign key traversable in both directions, since a SQL JOIN does not
//! care which side declared the key.

use crate::error::{AssistError, Result};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_MAX_JOIN_DEPTH: usize = 4;

/// One directed edge per foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FkEdge {
    pub from_table: String,
    pub from_columns: Vec<String>,
    pub to_table: String,
    pub to_columns: Vec<String>,
}

impl FkEdge {
    /// The same relationship traversed from the referred side.
    pub fn reversed(&self) -> FkEdge {
        FkEdge {
            from_table: self.to_table.clone(),
            from_columns: self.to_columns.clone(),
            to_table: self.from_table.clone(),
            to_columns: self.from_columns.clone(),
        }
    }
}

/// Flatten the schema's foreign keys into edges, in table-then-key
/// order. No deduplication, no existence check on the referred table.
pub fn build_fk_edges(schema: &Schema) -> Vec<FkEdge> {
    let mut edges = Vec::new();
    for table in &schema.tables {
        for fk in &table.foreign_keys {
            edges.push(FkEdge {
                from_table: table.name.clone(),
                from_columns: fk.constrained_columns.clone(),
                to_table: fk.referred_table.clone(),
                to_columns: fk.referred_columns.clone(),
            });
        }
    }
    edges
}

/// All simple join paths from `start` to `goal` of length <= `max_depth`,
/// in breadth-first discovery order (shortest first). Start and goal are
/// resolved case-insensitively; an unresolvable name is an error, never
/// an empty result.
pub fn find_join_paths(
    schema: &Schema,
    start: &str,
    goal: &str,
    max_depth: usize,
) -> Result<Vec<Vec<FkEdge>>> {
    let start = schema
        .resolve_table_name(start)
        .ok_or_else(|| AssistError::UnknownTable(start.to_string()))?
        .to_string();
    let goal = schema
        .resolve_table_name(goal)
        .ok_or_else(|| AssistError::UnknownTable(goal.to_string()))?
        .to_string();

    let mut adjacency: HashMap<String, Vec<FkEdge>> = HashMap::new();
    for edge in build_fk_edges(schema) {
        let reverse = edge.reversed();
        adjacency
            .entry(edge.from_table.clone())
            .or_default()
            .push(edge);
        adjacency
            .entry(reverse.from_table.clone())
            .or_default()
            .push(reverse);
    }

    let mut paths = Vec::new();
    let mut queue: VecDeque<(String, Vec<FkEdge>)> = VecDeque::new();
    queue.push_back((start.clone(), Vec::new()));

    while let Some((node, path)) = queue.pop_front() {
        if path.len() > max_depth {
            continue;
        }
        if node == goal && !path.is_empty() {
            paths.push(path);
            continue;
        }
        let Some(outgoing) = adjacency.get(&node) else {
            continue;
        };
        for edge in outgoing {
            let next = &edge.to_table;
            if next.is_empty() {
                continue;
            }
            // A table already visited on this path blocks every edge
            // into it, not just the one that got there first.
            if *next == start || path.iter().any(|seen| seen.to_table == *next) {
                continue;
            }
            let mut extended = path.clone();
            extended.push(edge.clone());
            queue.push_back((next.clone(), extended));
        }
    }

    Ok(paths)
}

/// Render one edge as an aliased JOIN clause.
pub fn edge_to_join_sql(edge: &FkEdge, left_alias: &str, right_alias: &str) -> String {
    let conditions: Vec<String> = edge
        .from_columns
        .iter()
        .zip(edge.to_columns.iter())
        .filter(|(left, right)| !left.is_empty() && !right.is_empty())
        .map(|(left, right)| format!("{}.`{}` = {}.`{}`", left_alias, left, right_alias, right))
        .collect();
    let on_clause = if conditions.is_empty() {
        "/* missing fk columns */".to_string()
    } else {
        conditions.join(" AND ")
    };
    format!(
        "`{}` {} JOIN `{}` {} ON {}",
        edge.from_table, left_alias, edge.to_table, right_alias, on_clause
    )
}

/// Render a full path as a chained JOIN expression with one alias letter
/// per table, starting from `start_table`.
pub fn render_join_chain(start_table: &str, path: &[FkEdge]) -> String {
    const ALIASES: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    let alias = |i: usize| (ALIASES[i.min(ALIASES.len() - 1)] as char).to_string();

    let mut parts = vec![format!("`{}` {}", start_table, alias(0))];
    for (i, edge) in path.iter().enumerate() {
        let clause = edge_to_join_sql(edge, &alias(i), &alias(i + 1));
        // Keep only the "JOIN ... ON ..." suffix; the left side is
        // already present in the chain.
        let joined = match clause.split_once("JOIN") {
            Some((_, rest)) => format!("JOIN{}", rest),
            None => clause,
        };
        parts.push(joined);
    }
    parts.join(" ")
}
