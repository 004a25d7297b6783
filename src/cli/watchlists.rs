use crate::api::ApiClient;
use crate::cli::not_found;
use crate::cli::output::{format_timestamp, or_dash, print_json, Table};
use crate::cli::resources::resources_table;
use crate::core::models::{NewWatchlist, Resource, Watchlist};
use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

#[derive(Subcommand)]
pub enum WatchlistsCommand {
    /// List watchlists
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a watchlist and its resources
    Show {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a watchlist
    Create {
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a watchlist
    Delete { id: i64 },

    /// Add a resource to a watchlist
    Add { id: i64, resource: i64 },

    /// Remove a resource from a watchlist
    Remove { id: i64, resource: i64 },
}

#[derive(Serialize)]
struct WatchlistOutput<'a> {
    #[serde(flatten)]
    watchlist: &'a Watchlist,
    resource_details: &'a [Resource],
}

pub async fn run(client: &ApiClient, command: WatchlistsCommand) -> Result<()> {
    match command {
        WatchlistsCommand::List { json } => {
            let watchlists = client.list_watchlists().await?;
            if json {
                return print_json(&watchlists);
            }
            if watchlists.is_empty() {
                println!("No watchlists");
                return Ok(());
            }

            let mut table = Table::new(&["ID", "NAME", "RESOURCES", "CREATED"]);
            for watchlist in &watchlists {
                table.row(vec![
                    watchlist.id.to_string(),
                    watchlist.name.clone(),
                    watchlist.resources.len().to_string(),
                    format_timestamp(watchlist.created_at),
                ]);
            }
            table.print();
            Ok(())
        }
        WatchlistsCommand::Show { id, json } => {
            let (watchlist, resources) =
                tokio::try_join!(client.get_watchlist(id), client.watchlist_resources(id))
                    .map_err(not_found("watchlist", id))?;

            if json {
                return print_json(&WatchlistOutput {
                    watchlist: &watchlist,
                    resource_details: &resources,
                });
            }

            println!("{} (#{})", watchlist.name, watchlist.id);
            println!("  {}", or_dash(watchlist.description.as_deref()));
            println!();
            if resources.is_empty() {
                println!("No resources on this watchlist");
            } else {
                resources_table(&resources).print();
            }
            Ok(())
        }
        WatchlistsCommand::Create { name, description } => {
            let watchlist = client
                .create_watchlist(&NewWatchlist { name, description })
                .await?;
            println!("Created watchlist {} ({})", watchlist.id, watchlist.name);
            Ok(())
        }
        WatchlistsCommand::Delete { id } => {
            client.delete_watchlist(id).await?;
            println!("Deleted watchlist {id}");
            Ok(())
        }
        WatchlistsCommand::Add { id, resource } => {
            let watchlist = client.add_to_watchlist(id, resource).await?;
            println!(
                "Added resource {resource} to {} ({} resources)",
                watchlist.name,
                watchlist.resources.len()
            );
            Ok(())
        }
        WatchlistsCommand::Remove { id, resource } => {
            client.remove_from_watchlist(id, resource).await?;
            println!("Removed resource {resource} from watchlist {id}");
            Ok(())
        }
    }
}
