use clap::Args;
use serde_json::Value as Json;

use hydramap_core::{
    EntityCollection, EntityManager, Handle, Id, PayloadOutcome, PropertyKind, Transport, Value,
};

use super::parse_pair;

#[derive(Args)]
pub struct SetCommand {
    /// Entity type name
    pub type_name: String,

    /// Resource id
    pub id: Id,

    /// Changes as FIELD=VALUE; `null` clears a field, relations take ids
    #[arg(value_name = "FIELD=VALUE", value_parser = parse_pair, required = true)]
    pub changes: Vec<(String, String)>,

    /// Print the payload that would be sent without sending it
    #[arg(long)]
    pub dry_run: bool,
}

impl SetCommand {
    pub async fn run<T: Transport>(
        &self,
        manager: &mut EntityManager<T>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let handle = manager
            .repository(&self.type_name)?
            .find(self.id)
            .await?
            .ok_or_else(|| format!("{} not found: {}", self.type_name, self.id))?;

        for (field, raw) in &self.changes {
            apply(manager, handle, &self.type_name, field, raw).await?;
        }

        let payload = match manager.repository(&self.type_name)?.diff(handle)? {
            PayloadOutcome::Unchanged => {
                println!("No changes");
                return Ok(());
            }
            PayloadOutcome::Changed(payload) => payload,
        };

        if self.dry_run {
            println!("{}", serde_json::to_string_pretty(&payload.to_wire())?);
            return Ok(());
        }

        let saved = manager.save(handle).await?;
        println!("{}", serde_json::to_string_pretty(&manager.to_json(saved))?);
        Ok(())
    }
}

/// Writes one `field=value` change into the record.
async fn apply<T: Transport>(
    manager: &mut EntityManager<T>,
    handle: Handle,
    type_name: &str,
    field: &str,
    raw: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = manager.schema(type_name)?;
    if field == schema.id_property {
        return Err(format!("{}.{} is read-only", type_name, field).into());
    }
    let property = schema
        .property(field)
        .ok_or_else(|| format!("{} has no property '{}'", type_name, field))?;
    if property.read_only {
        return Err(format!("{}.{} is read-only", type_name, field).into());
    }

    let value = if raw == "null" {
        None
    } else {
        match &property.kind {
            PropertyKind::Scalar { scalar } => {
                let json = serde_json::from_str(raw).unwrap_or_else(|_| Json::String(raw.to_string()));
                let coerced = scalar
                    .coerce(&json)
                    .ok_or_else(|| format!("'{}' is not a valid {} for {}.{}", raw, scalar, type_name, field))?;
                Some(Value::Scalar(coerced))
            }
            PropertyKind::Reference { target } => {
                let related = find_related(manager, target.type_name(), raw).await?;
                Some(Value::Ref(related))
            }
            PropertyKind::Collection { target } => {
                let mut items = Vec::new();
                for id in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    items.push(find_related(manager, target.type_name(), id).await?);
                }
                Some(Value::Collection(EntityCollection::from_handles(items)))
            }
        }
    };

    let record = manager
        .get_mut(handle)
        .ok_or_else(|| format!("{} {} is no longer loaded", type_name, handle.index()))?;
    match value {
        Some(value) => record.set(field, value),
        None => {
            record.clear(field);
        }
    }
    Ok(())
}

async fn find_related<T: Transport>(
    manager: &mut EntityManager<T>,
    type_name: &str,
    raw: &str,
) -> Result<Handle, Box<dyn std::error::Error>> {
    let id: Id = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a {} id", raw, type_name))?;
    let handle = manager
        .repository(type_name)?
        .find(id)
        .await?
        .ok_or_else(|| format!("{} not found: {}", type_name, id))?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydramap_core::transport::Call;
    use serde_json::json;

    use crate::commands::testing;

    fn command(type_name: &str, id: Id, changes: &[(&str, &str)], dry_run: bool) -> SetCommand {
        SetCommand {
            type_name: type_name.to_string(),
            id,
            changes: changes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            dry_run,
        }
    }

    fn puts(manager: &EntityManager<hydramap_core::InMemoryTransport>) -> Vec<Json> {
        manager
            .transport()
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Put { body, .. } => Some(body),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_set_sends_only_changed_field() {
        let mut manager = testing::manager();
        command("User", 2, &[("phone", "123"), ("name", "Ann")], false)
            .run(&mut manager)
            .await
            .unwrap();

        assert_eq!(
            puts(&manager),
            vec![json!({"@id": "/users/2", "id": 2, "phone": "123"})]
        );
        assert_eq!(
            manager.transport().resource("users", 2).unwrap()["phone"],
            json!("123")
        );
    }

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let mut manager = testing::manager();
        command("User", 2, &[("active", "false")], true)
            .run(&mut manager)
            .await
            .unwrap();

        assert_eq!(manager.transport().write_count(), 0);
    }

    #[tokio::test]
    async fn test_same_value_is_unchanged() {
        let mut manager = testing::manager();
        command("User", 7, &[("active", "false")], false)
            .run(&mut manager)
            .await
            .unwrap();

        assert_eq!(manager.transport().write_count(), 0);
    }

    #[tokio::test]
    async fn test_null_clears_field() {
        let mut manager = testing::manager();
        command("User", 2, &[("name", "null")], false)
            .run(&mut manager)
            .await
            .unwrap();

        assert_eq!(
            puts(&manager),
            vec![json!({"@id": "/users/2", "id": 2, "name": null})]
        );
    }

    #[tokio::test]
    async fn test_reference_by_id() {
        let mut manager = testing::manager();
        command("Resource", 10, &[("owner", "7")], false)
            .run(&mut manager)
            .await
            .unwrap();

        let body = &puts(&manager)[0];
        assert_eq!(body["owner"]["@id"], json!("/users/7"));
        assert_eq!(body.as_object().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_changes() {
        let mut manager = testing::manager();

        let unknown = command("User", 2, &[("email", "a@x.io")], false)
            .run(&mut manager)
            .await;
        assert!(unknown.unwrap_err().to_string().contains("no property 'email'"));

        let id = command("User", 2, &[("id", "5")], false).run(&mut manager).await;
        assert!(id.unwrap_err().to_string().contains("read-only"));

        let owner = command("Resource", 10, &[("owner", "x")], false)
            .run(&mut manager)
            .await;
        assert!(owner.unwrap_err().to_string().contains("is not a User id"));

        assert_eq!(manager.transport().write_count(), 0);
    }
}
