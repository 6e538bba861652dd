use clap::Args;

use hydramap_core::{EntityManager, Id, Transport};

#[derive(Args)]
pub struct DeleteCommand {
    /// Entity type name
    pub type_name: String,

    /// Resource id
    pub id: Id,
}

impl DeleteCommand {
    pub async fn run<T: Transport>(
        &self,
        manager: &mut EntityManager<T>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let handle = manager
            .repository(&self.type_name)?
            .find(self.id)
            .await?
            .ok_or_else(|| format!("{} not found: {}", self.type_name, self.id))?;

        if manager.delete(handle).await? {
            println!("Deleted {} {}", self.type_name, self.id);
        } else {
            println!("{} {} was not deleted", self.type_name, self.id);
        }
        Ok(())
    }
}
