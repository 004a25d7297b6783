use crate::api::ApiClient;
use crate::cli::output::{or_dash, print_json, Table};
use crate::core::models::NewTag;
use anyhow::Result;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum TagsCommand {
    /// List tags
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a tag
    Create {
        name: String,

        /// Hex colour, e.g. #3b82f6
        #[arg(long)]
        color: Option<String>,
    },

    /// Rename a tag or change its colour
    Rename {
        id: i64,

        name: String,

        /// Hex colour, e.g. #3b82f6
        #[arg(long)]
        color: Option<String>,
    },

    /// Delete a tag
    Delete { id: i64 },

    /// Tag a resource
    Assign { resource: i64, tag: i64 },

    /// Remove a tag from a resource
    Unassign { resource: i64, tag: i64 },
}

pub async fn run(client: &ApiClient, command: TagsCommand) -> Result<()> {
    match command {
        TagsCommand::List { json } => {
            let tags = client.list_tags().await?;
            if json {
                return print_json(&tags);
            }
            if tags.is_empty() {
                println!("No tags");
                return Ok(());
            }

            let mut table = Table::new(&["ID", "NAME", "COLOR", "RESOURCES"]);
            for tag in &tags {
                table.row(vec![
                    tag.id.to_string(),
                    tag.name.clone(),
                    or_dash(tag.color.as_deref()),
                    tag.resource_count
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            }
            table.print();
            Ok(())
        }
        TagsCommand::Create { name, color } => {
            let tag = client.create_tag(&NewTag { name, color }).await?;
            println!("Created tag {} ({})", tag.id, tag.name);
            Ok(())
        }
        TagsCommand::Rename { id, name, color } => {
            let tag = client.update_tag(id, &NewTag { name, color }).await?;
            println!("Updated tag {} ({})", tag.id, tag.name);
            Ok(())
        }
        TagsCommand::Delete { id } => {
            client.delete_tag(id).await?;
            println!("Deleted tag {id}");
            Ok(())
        }
        TagsCommand::Assign { resource, tag } => {
            let tag = client.assign_tag(resource, tag).await?;
            println!("Tagged resource {resource} with {}", tag.name);
            Ok(())
        }
        TagsCommand::Unassign { resource, tag } => {
            client.unassign_tag(resource, tag).await?;
            println!("Removed tag {tag} from resource {resource}");
            Ok(())
        }
    }
}
