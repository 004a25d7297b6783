use crate::api::ApiClient;
use crate::cli::not_found;
use crate::cli::output::{format_timestamp, or_dash, print_json, Table};
use crate::core::models::{NewProvider, Properties, PropertyValue, Provider, ProviderUpdate, Vendor};
use anyhow::{Context, Result};
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ProvidersCommand {
    /// List configured providers
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one provider
    Show {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register a new provider
    Create {
        name: String,

        /// Vendor name or alias (aws, azure, gcp, vmware, proxmox, openstack, kubernetes, ...)
        #[arg(long)]
        vendor: String,

        #[arg(long)]
        description: Option<String>,

        /// Create the provider disabled
        #[arg(long)]
        inactive: bool,

        /// Connection setting, repeatable
        #[arg(long = "config", value_name = "KEY=VALUE")]
        config: Vec<String>,
    },

    /// Change a provider's name, description, state or connection settings
    Update {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        active: Option<bool>,

        /// Connection setting, repeatable; replaces the whole connection config
        #[arg(long = "config", value_name = "KEY=VALUE")]
        config: Vec<String>,
    },

    /// Delete a provider
    Delete { id: i64 },

    /// Start a collection run
    Collect {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the service can reach the provider
    Test { id: i64 },
}

pub async fn run(client: &ApiClient, command: ProvidersCommand) -> Result<()> {
    match command {
        ProvidersCommand::List { json } => {
            let providers = client.all_providers().await?;
            if json {
                print_json(&providers)
            } else {
                print_list(&providers);
                Ok(())
            }
        }
        ProvidersCommand::Show { id, json } => {
            let provider = client
                .get_provider(id)
                .await
                .map_err(not_found("provider", id))?;
            if json {
                print_json(&provider)
            } else {
                print_detail(&provider);
                Ok(())
            }
        }
        ProvidersCommand::Create {
            name,
            vendor,
            description,
            inactive,
            config,
        } => {
            let provider = NewProvider {
                name,
                vendor: Vendor::normalize(&vendor),
                description,
                is_active: !inactive,
                connection_config: parse_config(&config)?,
            };
            let created = client.create_provider(&provider).await?;
            println!("Created provider {} ({})", created.id, created.name);
            Ok(())
        }
        ProvidersCommand::Update {
            id,
            name,
            description,
            active,
            config,
        } => {
            let update = ProviderUpdate {
                name,
                description,
                is_active: active,
                connection_config: if config.is_empty() {
                    None
                } else {
                    Some(parse_config(&config)?)
                },
            };
            let updated = client.update_provider(id, &update).await?;
            println!("Updated provider {} ({})", updated.id, updated.name);
            Ok(())
        }
        ProvidersCommand::Delete { id } => {
            client.delete_provider(id).await?;
            println!("Deleted provider {id}");
            Ok(())
        }
        ProvidersCommand::Collect { id, json } => {
            let run = client.trigger_collection(id).await?;
            if json {
                print_json(&run)
            } else {
                println!("Started collection run {} ({})", run.label(), run.status);
                Ok(())
            }
        }
        ProvidersCommand::Test { id } => {
            let result = client.test_connection(id).await?;
            let verdict = if result.success { "OK" } else { "FAILED" };
            match result.message {
                Some(message) => println!("{verdict}: {message}"),
                None => println!("{verdict}"),
            }
            if !result.success {
                anyhow::bail!("Connection test failed for provider {id}");
            }
            Ok(())
        }
    }
}

/// Parses `key=value` pairs. Values that read as JSON keep their type, anything else is text.
fn parse_config(pairs: &[String]) -> Result<Properties> {
    let mut properties = Properties::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("Invalid config entry '{pair}', expected KEY=VALUE"))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Invalid config entry '{pair}', key is empty");
        }

        let value = serde_json::from_str::<PropertyValue>(raw)
            .unwrap_or_else(|_| PropertyValue::Text(raw.to_string()));
        properties.insert(key.to_string(), value);
    }
    Ok(properties)
}

fn print_list(providers: &[Provider]) {
    if providers.is_empty() {
        println!("No providers configured");
        return;
    }

    let mut table = Table::new(&["ID", "NAME", "VENDOR", "ACTIVE", "LAST COLLECTED"]);
    for provider in providers {
        table.row(vec![
            provider.id.to_string(),
            provider.name.clone(),
            provider.vendor.slug().to_string(),
            if provider.is_active { "yes" } else { "no" }.to_string(),
            format_timestamp(provider.last_collected_at),
        ]);
    }
    table.print();
}

fn print_detail(provider: &Provider) {
    println!("{} (#{})", provider.name, provider.id);
    println!("  Vendor:      {}", provider.vendor);
    println!("  Description: {}", or_dash(provider.description.as_deref()));
    println!("  Active:      {}", provider.is_active);
    println!("  Created:     {}", format_timestamp(provider.created_at));
    println!("  Collected:   {}", format_timestamp(provider.last_collected_at));

    if !provider.connection_config.is_empty() {
        println!("  Connection:");
        for (key, value) in &provider.connection_config {
            println!("    {key} = {value}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_keeps_json_types() {
        let pairs = vec![
            "host=vcenter.lab".to_string(),
            "port=443".to_string(),
            "verify_tls=false".to_string(),
            "regions=[\"eu-west-1\",\"us-east-1\"]".to_string(),
        ];
        let config = parse_config(&pairs).unwrap();

        assert_eq!(config["host"], PropertyValue::Text("vcenter.lab".to_string()));
        assert_eq!(config["port"], PropertyValue::Integer(443));
        assert_eq!(config["verify_tls"], PropertyValue::Bool(false));
        assert!(matches!(config["regions"], PropertyValue::List(ref items) if items.len() == 2));
    }

    #[test]
    fn test_parse_config_value_may_contain_equals() {
        let config = parse_config(&["token=a=b".to_string()]).unwrap();
        assert_eq!(config["token"], PropertyValue::Text("a=b".to_string()));
    }

    #[test]
    fn test_parse_config_rejects_malformed_entries() {
        assert!(parse_config(&["no-separator".to_string()]).is_err());
        assert!(parse_config(&["=value".to_string()]).is_err());
    }
}
