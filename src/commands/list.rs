use clap::Args;

use hydramap_core::{EntityManager, Query, Record, Transport, Value};

use super::{parse_pair, OutputFormat};

#[derive(Args)]
pub struct ListCommand {
    /// Entity type name
    pub type_name: String,

    /// Equality filter (can be repeated)
    #[arg(long = "filter", value_name = "FIELD=VALUE", value_parser = parse_pair)]
    pub filters: Vec<(String, String)>,

    /// Sort order, e.g. "name asc, created desc"
    #[arg(long)]
    pub order: Option<String>,

    /// Fetch a single page instead of every page
    #[arg(long)]
    pub page: Option<u32>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl ListCommand {
    pub fn query(&self) -> Query {
        let mut query = self
            .filters
            .iter()
            .fold(Query::new(), |q, (field, value)| q.filter(field, value));
        if let Some(order) = &self.order {
            query = query.order(order);
        }
        if let Some(page) = self.page {
            query = query.page(page);
        }
        query
    }

    pub async fn run<T: Transport>(
        &self,
        manager: &mut EntityManager<T>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let found = manager
            .repository(&self.type_name)?
            .find_by(&self.query())
            .await?;

        match self.format {
            OutputFormat::Json => {
                let items: Vec<_> = found.iter().map(|h| manager.to_json(h)).collect();
                println!("{}", serde_json::to_string_pretty(&items)?);
            }
            OutputFormat::Text => {
                if found.is_empty() {
                    println!("No {} found.", self.type_name);
                    return Ok(());
                }
                for record in found.iter().filter_map(|h| manager.get(h)) {
                    println!("{}", summary(record));
                }
            }
        }
        Ok(())
    }
}

/// `#id field=value ...` using the record's scalar fields.
fn summary(record: &Record) -> String {
    let mut line = match record.id() {
        Some(id) => format!("#{}", id),
        None => "#new".to_string(),
    };
    for (name, value) in record.fields() {
        if let Value::Scalar(scalar) = value {
            line.push_str(&format!(" {}={}", name, scalar.to_json()));
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use hydramap_core::transport::Call;

    use crate::commands::testing;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        list: ListCommand,
    }

    #[test]
    fn test_query_from_arguments() {
        let cli = TestCli::parse_from([
            "test",
            "User",
            "--filter",
            "active=true",
            "--filter",
            "name=Ann",
            "--order",
            "name desc",
            "--page",
            "2",
        ]);
        let params = cli.list.query().to_params();

        assert!(params.contains(&("active".to_string(), "true".to_string())));
        assert!(params.contains(&("name".to_string(), "Ann".to_string())));
        assert!(params.contains(&("order[name]".to_string(), "desc".to_string())));
        assert_eq!(cli.list.query().page_number(), Some(2));
    }

    #[test]
    fn test_rejects_malformed_filter() {
        let result = TestCli::try_parse_from(["test", "User", "--filter", "active"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_sends_filters() {
        let mut manager = testing::manager();
        let cli = TestCli::parse_from(["test", "User", "--filter", "name=Bob"]);
        cli.list.run(&mut manager).await.unwrap();

        let calls = manager.transport().calls();
        assert!(matches!(
            &calls[0],
            Call::GetPage { endpoint, page: 1, query }
                if endpoint == "users"
                    && query == &vec![("name".to_string(), "Bob".to_string())]
        ));
    }

    #[tokio::test]
    async fn test_summary_shows_scalars() {
        let mut manager = testing::manager();
        let handle = manager.repository("User").unwrap().find(2).await.unwrap().unwrap();
        let line = summary(manager.get(handle).unwrap());

        assert!(line.starts_with("#2"));
        assert!(line.contains(" name=\"Ann\""));
        assert!(line.contains(" active=true"));
    }
}
