use std::collections::HashMap;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use strata_layout::{Graph, LayoutConstraints, StaticImportance};

/// Reads a file, or stdin when `path` is `-`.
fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read graph from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub fn load_graph(path: &Path) -> Result<Graph> {
    let text = read_source(path)?;
    parse_graph(&text).with_context(|| format!("invalid graph in {}", path.display()))
}

pub fn load_constraints(path: Option<&Path>) -> Result<LayoutConstraints> {
    let Some(path) = path else {
        return Ok(LayoutConstraints::default());
    };
    let text = read_source(path)?;
    parse_constraints(&text).with_context(|| format!("invalid constraints in {}", path.display()))
}

pub fn load_weights(path: &Path) -> Result<StaticImportance> {
    let text = read_source(path)?;
    parse_weights(&text).with_context(|| format!("invalid importance weights in {}", path.display()))
}

fn parse_graph(text: &str) -> Result<Graph> {
    Ok(serde_json::from_str(text)?)
}

fn parse_constraints(text: &str) -> Result<LayoutConstraints> {
    Ok(serde_json::from_str(text)?)
}

/// A flat JSON object mapping node id to score.
fn parse_weights(text: &str) -> Result<StaticImportance> {
    let weights: HashMap<String, f64> = serde_json::from_str(text)?;
    Ok(StaticImportance::new(weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_layout::{Direction, GraphDefect, ImportanceProvider, LayoutError};

    #[test]
    fn test_parse_graph() {
        let graph = parse_graph(
            r#"{
                "nodes": [{"id": "api"}, {"id": "db", "metadata": {"importance": 0.9}}],
                "edges": [{"source": "api", "target": "db", "label": "queries"}]
            }"#,
        )
        .unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_id(0).as_str(), "api->db");
    }

    #[test]
    fn test_parse_graph_reports_defect() {
        let err = parse_graph(
            r#"{"nodes": [{"id": "a"}, {"id": "a"}], "edges": []}"#,
        )
        .unwrap_err();
        let message = format!("{err:#}");
        let defect = LayoutError::from(GraphDefect::DuplicateNode("a".into()));
        assert!(message.contains(&defect.to_string()), "{message}");
    }

    #[test]
    fn test_partial_constraints_fill_defaults() {
        let config = parse_constraints(r#"{"levelSeparation": 80, "direction": "leftRight"}"#).unwrap();
        assert_eq!(config.level_separation, 80.0);
        assert_eq!(config.direction, Direction::LeftRight);
        assert_eq!(config.ideal_edge_length, LayoutConstraints::default().ideal_edge_length);
    }

    #[test]
    fn test_missing_constraints_file_is_default() {
        assert_eq!(load_constraints(None).unwrap(), LayoutConstraints::default());
    }

    #[tokio::test]
    async fn test_parse_weights() {
        let provider = parse_weights(r#"{"api": 0.2, "db": 0.9}"#).unwrap();
        let graph = parse_graph(r#"{"nodes": [{"id": "api"}, {"id": "db"}]}"#).unwrap();
        let weights = provider.importance(&graph).await.unwrap();
        assert_eq!(weights["db"], 0.9);
        assert!(parse_weights("[0.5]").is_err());
    }
}
