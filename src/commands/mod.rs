mod config_cmd;
mod delete;
mod fetch;
mod list;
mod schema;
mod set;

pub use config_cmd::ConfigCommand;
pub use delete::DeleteCommand;
pub use fetch::FetchCommand;
pub use list::ListCommand;
pub use schema::SchemaCommand;
pub use set::SetCommand;

use clap::ValueEnum;
use std::path::Path;

use hydramap_core::{Declarations, EntityManager, HttpTransport};

use crate::config::Config;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Reads entity declarations, as JSON when the file ends in `.json` and YAML otherwise.
pub fn load_declarations(path: &Path) -> Result<Declarations, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read declarations '{}': {}", path.display(), e))?;
    let declarations = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Declarations::from_json_str(&contents)?,
        _ => Declarations::from_yaml_str(&contents)?,
    };
    tracing::debug!(
        "Loaded {} entity declarations from {}",
        declarations.len(),
        path.display()
    );
    Ok(declarations)
}

/// Builds an entity manager talking to the configured Data API.
pub fn connect(config: &Config) -> Result<EntityManager<HttpTransport>, Box<dyn std::error::Error>> {
    let declarations = load_declarations(&config.declarations.value)?;
    let mut transport = HttpTransport::new(config.api_url.value.clone());
    if let Some(auth) = config.auth() {
        transport = transport.with_auth(auth);
    }
    Ok(EntityManager::new(transport, declarations))
}

/// Splits a `key=value` argument.
pub fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use hydramap_core::{Declarations, EntityDecl, EntityManager, InMemoryTransport};
    use serde_json::json;

    pub fn declarations() -> Declarations {
        Declarations::new()
            .with(
                EntityDecl::new("User")
                    .endpoint("users")
                    .id("id")
                    .scalar("name", "string")
                    .scalar("phone", "string")
                    .scalar("active", "boolean"),
            )
            .with(
                EntityDecl::new("Resource")
                    .endpoint("resources")
                    .id("id")
                    .scalar("title", "string")
                    .reference("owner", "User"),
            )
    }

    pub fn manager() -> EntityManager<InMemoryTransport> {
        let transport = InMemoryTransport::new();
        transport.insert("users", json!({"id": 2, "name": "Ann", "active": true}));
        transport.insert("users", json!({"id": 7, "name": "Bob", "active": false}));
        transport.insert(
            "resources",
            json!({"id": 10, "title": "Desk", "owner": {"@id": "/users/2"}}),
        );
        EntityManager::new(transport, declarations())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("name=Ann"),
            Ok(("name".to_string(), "Ann".to_string()))
        );
        assert_eq!(
            parse_pair("note=a=b"),
            Ok(("note".to_string(), "a=b".to_string()))
        );
        assert_eq!(parse_pair("phone="), Ok(("phone".to_string(), String::new())));
        assert!(parse_pair("name").is_err());
        assert!(parse_pair("=x").is_err());
    }

    #[test]
    fn test_load_declarations_by_extension() {
        let temp_dir = tempdir().unwrap();

        let yaml_path = temp_dir.path().join("entities.yaml");
        let mut file = std::fs::File::create(&yaml_path).unwrap();
        writeln!(file, "- name: User").unwrap();
        writeln!(file, "  endpoint: users").unwrap();
        writeln!(file, "  properties:").unwrap();
        writeln!(file, "    - name: id").unwrap();
        writeln!(file, "      type: integer").unwrap();
        writeln!(file, "      id: true").unwrap();
        let decls = load_declarations(&yaml_path).unwrap();
        assert!(decls.contains("User"));

        let json_path = temp_dir.path().join("entities.json");
        std::fs::write(
            &json_path,
            r#"[{"name": "Room", "endpoint": "rooms", "properties": [{"name": "id", "type": "integer", "id": true}]}]"#,
        )
        .unwrap();
        let decls = load_declarations(&json_path).unwrap();
        assert!(decls.contains("Room"));

        let missing = load_declarations(&temp_dir.path().join("missing.yaml"));
        assert!(missing
            .unwrap_err()
            .to_string()
            .contains("Failed to read declarations"));
    }
}
