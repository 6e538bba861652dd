use clap::Args;

use hydramap_core::{EntityManager, Id, Transport};

#[derive(Args)]
pub struct FetchCommand {
    /// Entity type name
    pub type_name: String,

    /// Resource id
    pub id: Id,
}

impl FetchCommand {
    pub async fn run<T: Transport>(
        &self,
        manager: &mut EntityManager<T>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let handle = manager
            .repository(&self.type_name)?
            .find(self.id)
            .await?
            .ok_or_else(|| format!("{} not found: {}", self.type_name, self.id))?;
        println!("{}", serde_json::to_string_pretty(&manager.to_json(handle))?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;

    #[tokio::test]
    async fn test_fetch_missing_reports_not_found() {
        let mut manager = testing::manager();
        let command = FetchCommand {
            type_name: "User".to_string(),
            id: 99,
        };
        let err = command.run(&mut manager).await.unwrap_err();
        assert_eq!(err.to_string(), "User not found: 99");
    }

    #[tokio::test]
    async fn test_fetch_existing() {
        let mut manager = testing::manager();
        let command = FetchCommand {
            type_name: "Resource".to_string(),
            id: 10,
        };
        command.run(&mut manager).await.unwrap();
        assert_eq!(manager.arena().len(), 2);
    }
}
