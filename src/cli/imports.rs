use crate::api::ApiClient;
use crate::cli::not_found;
use crate::cli::output::{format_timestamp, or_dash, print_json, Table};
use crate::core::models::{MetricsImport, ReviewDecision};
use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ImportsCommand {
    /// List metrics imports
    List {
        #[arg(long)]
        page: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show an import and its host matches
    Show {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload a metrics tarball (.tar.gz, .tgz or .tar)
    Upload {
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Approve an import awaiting review
    Approve {
        id: i64,

        /// Accept only these match ids (default: all proposed matches)
        #[arg(long = "match", value_name = "MATCH_ID")]
        matches: Vec<i64>,

        #[arg(long)]
        note: Option<String>,
    },

    /// Reject an import awaiting review
    Reject {
        id: i64,

        #[arg(long)]
        note: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PluginsCommand {
    /// List installed collector plugins
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload a plugin archive (.zip, .tar.gz or .tgz)
    Upload { archive: PathBuf },
}

pub async fn run(client: &ApiClient, command: ImportsCommand) -> Result<()> {
    match command {
        ImportsCommand::List { page, json } => {
            let page = client.list_imports(page).await?;
            if json {
                return print_json(&page);
            }
            if page.results.is_empty() {
                println!("No metrics imports");
                return Ok(());
            }

            let mut table = Table::new(&["ID", "FILE", "STATUS", "MATCHES", "UNMATCHED", "CREATED"]);
            for import in &page.results {
                table.row(vec![
                    import.id.to_string(),
                    or_dash(import.filename.as_deref()),
                    import.status.to_string(),
                    import.matches.len().to_string(),
                    import.unmatched().count().to_string(),
                    format_timestamp(import.created_at),
                ]);
            }
            table.print();
            Ok(())
        }
        ImportsCommand::Show { id, json } => {
            let import = client
                .get_import(id)
                .await
                .map_err(not_found("metrics import", id))?;
            if json {
                print_json(&import)
            } else {
                print_detail(&import);
                Ok(())
            }
        }
        ImportsCommand::Upload { file, json } => {
            let import = client.upload_metrics(&file).await?;
            if json {
                return print_json(&import);
            }
            println!("Uploaded {} as import {} ({})", file.display(), import.id, import.status);
            if import.status.is_reviewable() {
                println!("Review it with `invctl imports show {}`", import.id);
            }
            Ok(())
        }
        ImportsCommand::Approve { id, matches, note } => {
            let import = client
                .approve_import(id, &ReviewDecision { matches, note })
                .await?;
            println!("Import {} is now {}", import.id, import.status);
            Ok(())
        }
        ImportsCommand::Reject { id, note } => {
            let decision = ReviewDecision {
                matches: Vec::new(),
                note,
            };
            let import = client.reject_import(id, &decision).await?;
            println!("Import {} is now {}", import.id, import.status);
            Ok(())
        }
    }
}

pub async fn run_plugins(client: &ApiClient, command: PluginsCommand) -> Result<()> {
    match command {
        PluginsCommand::List { json } => {
            let plugins = client.list_plugins().await?;
            if json {
                return print_json(&plugins);
            }
            if plugins.is_empty() {
                println!("No plugins installed");
                return Ok(());
            }

            let mut table = Table::new(&["NAME", "VERSION", "VENDOR"]);
            for plugin in &plugins {
                table.row(vec![
                    plugin.name.clone(),
                    or_dash(plugin.version.as_deref()),
                    plugin
                        .vendor
                        .as_ref()
                        .map(|v| v.slug().to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            }
            table.print();
            Ok(())
        }
        PluginsCommand::Upload { archive } => {
            let plugin = client.upload_plugin(&archive).await?;
            match &plugin.version {
                Some(version) => println!("Installed plugin {} {}", plugin.name, version),
                None => println!("Installed plugin {}", plugin.name),
            }
            Ok(())
        }
    }
}

fn print_detail(import: &MetricsImport) {
    println!("Import #{} ({})", import.id, import.status);
    println!("  File:    {}", or_dash(import.filename.as_deref()));
    println!("  Created: {}", format_timestamp(import.created_at));
    if let Some(error) = &import.error_message {
        println!("  Error:   {error}");
    }

    if import.matches.is_empty() {
        return;
    }

    println!();
    let mut table = Table::new(&["MATCH", "HOSTNAME", "RESOURCE", "CONFIDENCE"]);
    for m in &import.matches {
        table.row(vec![
            m.id.to_string(),
            m.hostname.clone(),
            m.resource
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unmatched".to_string()),
            m.confidence
                .map(|c| format!("{:.0}%", c * 100.0))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.print();
}
