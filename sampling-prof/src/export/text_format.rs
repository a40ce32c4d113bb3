//! Four-section text record for closed sessions.
//!
//! ```text
//! 1567.25                  runtime in milliseconds
//!
//! src/lib.rs:12:main,0     frame_key,node_id        (id order)
//! src/lib.rs:30:fib,1
//!
//! 0,0,15                   node_id,self,total       (id order)
//! 1,15,15
//!
//! -1,0,15                  from,to,count
//! 0,1,15
//! ```
//!
//! Sections are separated by one blank line and every record ends with a
//! newline. The same format is written by the file sink and read back by
//! the report generator.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::{FormatError, NodeId};

const SECTION_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeEntry {
    /// Frame key, `file:line:label`
    pub name: String,
    pub id: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleCount {
    pub id: NodeId,
    pub self_count: u64,
    pub total_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub count: u64,
}

/// Export form of a closed session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub runtime_ms: f64,
    pub nodes: Vec<NodeEntry>,
    pub counts: Vec<SampleCount>,
    pub edges: Vec<Edge>,
}

impl Profile {
    /// Node id → frame key
    #[must_use]
    pub fn node_names(&self) -> HashMap<NodeId, String> {
        self.nodes.iter().map(|node| (node.id, node.name.clone())).collect()
    }

    /// Sum of self counts, i.e. the number of captured stacks
    #[must_use]
    pub fn total_samples(&self) -> u64 {
        self.counts.iter().map(|c| c.self_count).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serialize into the text record
    #[must_use]
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Parse a text record
    ///
    /// # Errors
    /// Returns [`FormatError`] if fewer than four sections are present or a
    /// record has the wrong number of fields.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let sections: Vec<&str> = text.splitn(4, SECTION_SEPARATOR).collect();
        let &[runtime, nodes, counts, edges] = sections.as_slice() else {
            return Err(FormatError::MissingSections { found: sections.len() });
        };

        let runtime = runtime.trim();
        let runtime_ms = runtime.parse::<f64>().map_err(|_| FormatError::InvalidNumber {
            section: "runtime",
            line: runtime.to_string(),
            value: runtime.to_string(),
        })?;

        let nodes: Vec<NodeEntry> = records(nodes).map(parse_node).collect::<Result<_, _>>()?;

        let counts = records(counts)
            .map(|line| -> Result<SampleCount, FormatError> {
                let [id, self_count, total_count] = fields::<3>("counts", line)?;
                Ok(SampleCount {
                    id: NodeId(number("counts", line, id)?),
                    self_count: number("counts", line, self_count)?,
                    total_count: number("counts", line, total_count)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let edges = records(edges)
            .map(|line| -> Result<Edge, FormatError> {
                let [from, to, count] = fields::<3>("edges", line)?;
                Ok(Edge {
                    from: NodeId(number("edges", line, from)?),
                    to: NodeId(number("edges", line, to)?),
                    count: number("edges", line, count)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Profile { runtime_ms, nodes, counts, edges })
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.runtime_ms)?;
        writeln!(f)?;
        for node in &self.nodes {
            writeln!(f, "{},{}", node.name, node.id)?;
        }
        writeln!(f)?;
        for count in &self.counts {
            writeln!(f, "{},{},{}", count.id, count.self_count, count.total_count)?;
        }
        writeln!(f)?;
        for edge in &self.edges {
            writeln!(f, "{},{},{}", edge.from, edge.to, edge.count)?;
        }
        Ok(())
    }
}

impl FromStr for Profile {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn records(section: &str) -> impl Iterator<Item = &str> {
    section.lines().filter(|line| !line.is_empty())
}

/// Node records split on the last comma; frame keys may contain commas
fn parse_node(line: &str) -> Result<NodeEntry, FormatError> {
    let Some((name, id)) = line.rsplit_once(',') else {
        return Err(FormatError::FieldCount {
            section: "nodes",
            line: line.to_string(),
            expected: 2,
            found: 1,
        });
    };
    Ok(NodeEntry { name: name.to_string(), id: NodeId(number("nodes", line, id)?) })
}

fn fields<'a, const N: usize>(
    section: &'static str,
    line: &'a str,
) -> Result<[&'a str; N], FormatError> {
    let parts: Vec<&str> = line.split(',').collect();
    parts.as_slice().try_into().map_err(|_| FormatError::FieldCount {
        section,
        line: line.to_string(),
        expected: N,
        found: parts.len(),
    })
}

fn number<T: FromStr>(section: &'static str, line: &str, value: &str) -> Result<T, FormatError> {
    value.trim().parse().map_err(|_| FormatError::InvalidNumber {
        section,
        line: line.to_string(),
        value: value.to_string(),
    })
}
