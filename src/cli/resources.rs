use crate::api::{ApiClient, ResourceFilter};
use crate::cli::not_found;
use crate::cli::output::{format_timestamp, or_dash, print_json, Table};
use crate::core::models::Resource;
use anyhow::Result;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ResourcesCommand {
    /// List discovered resources
    List {
        #[arg(long)]
        provider: Option<i64>,

        /// Resource type, e.g. virtual_machine
        #[arg(long = "type")]
        resource_type: Option<String>,

        /// Free-text search on name and identifiers
        #[arg(long)]
        search: Option<String>,

        /// Only resources carrying this tag
        #[arg(long)]
        tag: Option<String>,

        /// Include resources no longer seen by the provider
        #[arg(long)]
        include_deleted: bool,

        #[arg(long)]
        page: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one resource with its properties
    Show {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(client: &ApiClient, command: ResourcesCommand) -> Result<()> {
    match command {
        ResourcesCommand::List {
            provider,
            resource_type,
            search,
            tag,
            include_deleted,
            page,
            json,
        } => {
            let filter = ResourceFilter {
                provider,
                resource_type,
                search,
                tag,
                include_deleted,
                page,
                page_size: None,
            };
            let page = client.list_resources(&filter).await?;
            if json {
                return print_json(&page);
            }

            print_list(&page.results);
            if page.has_more() {
                println!(
                    "\nShowing {} of {} resources, use --page for more",
                    page.results.len(),
                    page.count
                );
            }
            Ok(())
        }
        ResourcesCommand::Show { id, json } => {
            let resource = client
                .get_resource(id)
                .await
                .map_err(not_found("resource", id))?;
            if json {
                print_json(&resource)
            } else {
                print_detail(&resource);
                Ok(())
            }
        }
    }
}

pub(crate) fn resources_table(resources: &[Resource]) -> Table {
    let mut table = Table::new(&["ID", "NAME", "TYPE", "PROVIDER", "REGION", "TAGS"]);
    for resource in resources {
        let tags: Vec<&str> = resource.tags.iter().map(|t| t.name.as_str()).collect();
        let name = if resource.is_deleted {
            format!("{} (deleted)", resource.name)
        } else {
            resource.name.clone()
        };
        table.row(vec![
            resource.id.to_string(),
            name,
            resource.resource_type.clone(),
            resource.provider.to_string(),
            or_dash(resource.region.as_deref()),
            tags.join(","),
        ]);
    }
    table
}

fn print_list(resources: &[Resource]) {
    if resources.is_empty() {
        println!("No resources found");
        return;
    }
    resources_table(resources).print();
}

fn print_detail(resource: &Resource) {
    println!("{} (#{})", resource.name, resource.id);
    println!("  Type:        {}", resource.resource_type);
    println!("  Provider:    {}", resource.provider);
    println!("  External ID: {}", or_dash(resource.external_id.as_deref()));
    println!("  Region:      {}", or_dash(resource.region.as_deref()));
    println!("  First seen:  {}", format_timestamp(resource.first_seen));
    println!("  Last seen:   {}", format_timestamp(resource.last_seen));
    if resource.is_deleted {
        println!("  Deleted:     yes");
    }

    if !resource.tags.is_empty() {
        let tags: Vec<&str> = resource.tags.iter().map(|t| t.name.as_str()).collect();
        println!("  Tags:        {}", tags.join(", "));
    }

    if !resource.properties.is_empty() {
        println!("  Properties:");
        for (key, value) in &resource.properties {
            println!("    {key} = {value}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Tag;

    #[test]
    fn test_resources_table_marks_deleted_and_joins_tags() {
        let resource = Resource {
            id: 7,
            provider: 1,
            name: "db-01".to_string(),
            resource_type: "virtual_machine".to_string(),
            external_id: None,
            region: None,
            tags: vec![
                Tag {
                    id: 1,
                    name: "prod".to_string(),
                    color: None,
                    resource_count: None,
                },
                Tag {
                    id: 2,
                    name: "db".to_string(),
                    color: None,
                    resource_count: None,
                },
            ],
            properties: Default::default(),
            first_seen: None,
            last_seen: None,
            is_deleted: true,
        };

        let rendered = resources_table(&[resource]).render();
        let row = rendered.lines().nth(1).unwrap();
        assert!(row.contains("db-01 (deleted)"));
        assert!(row.ends_with("prod,db"));
    }
}
