use clap::Args;

use hydramap_core::{EntityManager, PropertyKind, Schema, Transport};

use super::OutputFormat;

#[derive(Args)]
pub struct SchemaCommand {
    /// Entity type name
    pub type_name: String,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl SchemaCommand {
    pub fn run<T: Transport>(
        &self,
        manager: &mut EntityManager<T>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let schema = manager.schema(&self.type_name)?;
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*schema)?),
            OutputFormat::Text => print!("{}", describe(&schema)),
        }
        Ok(())
    }
}

/// One line per property: name, kind and flags.
fn describe(schema: &Schema) -> String {
    let mut out = format!(
        "{} (/{}, id: {})\n",
        schema.type_name, schema.endpoint, schema.id_property
    );
    for property in &schema.properties {
        let kind = match &property.kind {
            PropertyKind::Scalar { scalar } => scalar.to_string(),
            PropertyKind::Reference { target } => format!("-> {}", target.type_name()),
            PropertyKind::Collection { target } => format!("[{}]", target.type_name()),
        };
        let mut flags = Vec::new();
        if property.read_only {
            flags.push("read-only");
        }
        if property.write_only {
            flags.push("write-only");
        }
        if property.reader.is_none() {
            flags.push("no getter");
        }
        if !property.writable {
            flags.push("no setter");
        }
        if flags.is_empty() {
            out.push_str(&format!("  {}: {}\n", property.name, kind));
        } else {
            out.push_str(&format!("  {}: {} ({})\n", property.name, kind, flags.join(", ")));
        }
    }
    out
}
