//! File-level dependency graph and staleness closure.
//!
//! Nodes are files (sources and everything they include), edges point from a
//! file to its direct dependencies. Edges may form cycles: staleness is a
//! reachability fixpoint over reversed edges, not a topological order.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};

/// Content hash of a file (lowercase hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Fingerprint of an argument vector; arguments are length-delimited.
    pub fn of_args<S: AsRef<str>>(args: &[S]) -> Self {
        let mut hasher = Sha256::new();
        for arg in args {
            let arg = arg.as_ref();
            hasher.update((arg.len() as u64).to_le_bytes());
            hasher.update(arg.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct Node {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    /// Direct dependencies, as lookups into the graph
    pub deps: Vec<NodeId>,
}

/// Why a compilation unit has to be rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecompileReason {
    /// No artifact was recorded, or its object file is gone
    NoArtifact,
    /// The last compilation of this file failed
    PreviousFailure,
    /// The file's own content changed
    SourceChanged,
    /// The compile command changed (flags, build type, compiler)
    FlagsChanged,
    /// A transitive dependency changed
    DependencyChanged(PathBuf),
}

impl fmt::Display for RecompileReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecompileReason::NoArtifact => write!(f, "no artifact"),
            RecompileReason::PreviousFailure => write!(f, "previous build failed"),
            RecompileReason::SourceChanged => write!(f, "source changed"),
            RecompileReason::FlagsChanged => write!(f, "command changed"),
            RecompileReason::DependencyChanged(p) => write!(f, "{} changed", p.display()),
        }
    }
}

#[derive(Debug, Default)]
pub struct BuildGraph {
    nodes: Vec<Node>,
    index: HashMap<PathBuf, NodeId>,
}

impl BuildGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or return the existing id for this path.
    pub fn add_node(&mut self, path: PathBuf, fingerprint: Fingerprint) -> NodeId {
        if let Some(&id) = self.index.get(&path) {
            return id;
        }
        let id = self.nodes.len();
        self.index.insert(path.clone(), id);
        self.nodes.push(Node {
            path,
            fingerprint,
            deps: Vec::new(),
        });
        id
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        let deps = &mut self.nodes[from].deps;
        if !deps.contains(&to) {
            deps.push(to);
        }
    }

    pub fn id(&self, path: &Path) -> Option<NodeId> {
        self.index.get(path).copied()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    fn reverse_edges(&self) -> Vec<Vec<NodeId>> {
        let mut rdeps = vec![Vec::new(); self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            for &dep in &node.deps {
                rdeps[dep].push(id);
            }
        }
        rdeps
    }

    /// Mark-and-spread from `seeds` over reversed edges.
    ///
    /// Returns, for every node, the seed that made it stale (`None` when
    /// fresh). A node is marked at most once, so cycles terminate.
    pub fn stale_closure(&self, seeds: &[NodeId]) -> Vec<Option<NodeId>> {
        let rdeps = self.reverse_edges();
        let mut cause: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut queue = VecDeque::new();

        for &seed in seeds {
            if cause[seed].is_none() {
                cause[seed] = Some(seed);
                queue.push_back(seed);
            }
        }

        while let Some(id) = queue.pop_front() {
            let origin = cause[id];
            for &dependent in &rdeps[id] {
                if cause[dependent].is_none() {
                    cause[dependent] = origin;
                    queue.push_back(dependent);
                }
            }
        }

        cause
    }
}
