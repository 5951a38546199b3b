//! Cascade-context annotation (spec §4.G/§6.7): given an externally-supplied
//! `component -> depends_on[]` map, an alert on `component` is annotated
//! with the components that transitively depend on it, found via BFS up to
//! depth 5 with `impact_score = 1/depth`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use signalhub_core::CascadeImpact;
use thiserror::Error;

const MAX_DEPTH: u32 = 5;

#[derive(Debug, Error)]
pub enum DependencyMapError {
    #[error("failed to read dependency map at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dependency map: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The forward edges (`component -> depends_on[]`) plus the reverse index
/// (`component -> dependents`) used for BFS, built once at load time.
#[derive(Debug, Clone, Default)]
pub struct DependencyMap {
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyMap {
    pub fn empty() -> DependencyMap {
        DependencyMap::default()
    }

    pub fn from_forward_map(forward: HashMap<String, Vec<String>>) -> DependencyMap {
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for (component, depends_on) in forward {
            for dependency in depends_on {
                dependents.entry(dependency).or_default().push(component.clone());
            }
        }
        DependencyMap { dependents }
    }

    /// Loads the JSON dependency map from disk (spec §6.7). Read at start
    /// and on `SIGHUP`; absence of the file is handled by the caller
    /// (`DependencyMap::empty()`), not by this loader.
    pub fn load(path: &Path) -> Result<DependencyMap, DependencyMapError> {
        let raw = std::fs::read_to_string(path).map_err(|e| DependencyMapError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let forward: HashMap<String, Vec<String>> = serde_json::from_str(&raw)?;
        Ok(DependencyMap::from_forward_map(forward))
    }

    /// BFS over reverse edges from `component`, depth-bounded at 5,
    /// `impact_score = 1/depth`. A component reachable via more than one
    /// path keeps its shortest-path depth (first visit wins, as BFS
    /// guarantees).
    pub fn affected(&self, component: &str) -> Vec<CascadeImpact> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(component.to_string());
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();
        queue.push_back((component.to_string(), 0));
        let mut out = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= MAX_DEPTH {
                continue;
            }
            for dependent in self.dependents.get(&current).into_iter().flatten() {
                if visited.insert(dependent.clone()) {
                    let next_depth = depth + 1;
                    out.push(CascadeImpact {
                        component: dependent.clone(),
                        depth: next_depth,
                        impact_score: 1.0 / next_depth as f64,
                    });
                    queue.push_back((dependent.clone(), next_depth));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> DependencyMap {
        // api-gateway depends on auth-service and database; auth-service
        // depends on database. So an alert on `database` cascades to both
        // `auth-service` (depth 1) and `api-gateway` (depth 2, via
        // auth-service, and also depth 1 directly — shortest wins).
        let mut forward = HashMap::new();
        forward.insert("api-gateway".to_string(), vec!["auth-service".to_string(), "database".to_string()]);
        forward.insert("auth-service".to_string(), vec!["database".to_string()]);
        DependencyMap::from_forward_map(forward)
    }

    #[test]
    fn direct_and_transitive_dependents_are_found_with_shortest_depth() {
        let map = sample_map();
        let affected = map.affected("database");
        let api_gateway = affected.iter().find(|c| c.component == "api-gateway").unwrap();
        assert_eq!(api_gateway.depth, 1);
        assert_eq!(api_gateway.impact_score, 1.0);

        let auth_service = affected.iter().find(|c| c.component == "auth-service").unwrap();
        assert_eq!(auth_service.depth, 1);
    }

    #[test]
    fn leaf_component_with_no_dependents_returns_empty() {
        let map = sample_map();
        assert!(map.affected("auth-service").iter().all(|c| c.component != "nonexistent"));
        assert!(DependencyMap::empty().affected("anything").is_empty());
    }
}
