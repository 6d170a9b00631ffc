//! Loading the desired spec from the command line or a file.

use std::path::Path;

use anyhow::{Context, Result, bail};
use nbsync_core::DesiredSpec;

/// Parse `--data` as JSON, or read `--data-file` as YAML (`.yaml`/`.yml`) or JSON.
pub fn load(data: Option<&str>, file: Option<&Path>) -> Result<DesiredSpec> {
    match (data, file) {
        (Some(text), _) => serde_json::from_str(text).context("--data must be a JSON object"),
        (None, Some(path)) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if is_yaml(path) {
                serde_yaml::from_str(&text)
                    .with_context(|| format!("{} must contain a YAML mapping", path.display()))
            } else {
                serde_json::from_str(&text)
                    .with_context(|| format!("{} must contain a JSON object", path.display()))
            }
        }
        (None, None) => bail!("one of --data or --data-file is required"),
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_inline_json() {
        let spec = load(Some(r#"{"name": "Contact One", "title": null}"#), None).unwrap();
        assert_eq!(spec.get("name"), Some(&json!("Contact One")));
        assert!(!spec.contains("title"));

        assert!(load(Some("[1, 2]"), None).is_err());
        assert!(load(None, None).is_err());
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(
            file,
            "rack: Test rack\nunits: [1, 3, 5]\ndescription: Patch panels\ntags:\n  - first"
        )
        .unwrap();

        let spec = load(None, Some(file.path())).unwrap();
        assert_eq!(spec.get("units"), Some(&json!([1, 3, 5])));
        assert_eq!(spec.get("tags"), Some(&json!(["first"])));
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.json");
        std::fs::write(
            &path,
            r#"{"name": "AWS data source", "parameters": {"aws_access_key_id": 1234567}}"#,
        )
        .unwrap();

        let spec = load(None, Some(&path)).unwrap();
        assert_eq!(
            spec.get("parameters"),
            Some(&json!({"aws_access_key_id": 1234567}))
        );
    }

    #[test]
    fn test_missing_file() {
        let err = load(None, Some(Path::new("/nonexistent/spec.yaml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
