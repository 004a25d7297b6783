use crate::api::{ApiClient, RunFilter};
use crate::cli::not_found;
use crate::cli::output::{format_age, format_duration, format_timestamp, or_dash, print_json, Table};
use crate::core::models::{CollectionRun, RunStatus, RunSummary};
use crate::core::polling::{PollState, Poller};
use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use std::time::Duration;

#[derive(Subcommand)]
pub enum RunsCommand {
    /// List recent collection runs
    List {
        /// Only runs of this provider
        #[arg(long)]
        provider: Option<i64>,

        /// Only runs with this status
        #[arg(long)]
        status: Option<RunStatus>,

        /// Number of runs to show
        #[arg(long, default_value = "25")]
        limit: u32,

        /// Keep the list up to date until Ctrl-C
        #[arg(long)]
        watch: bool,

        /// Seconds between refreshes with --watch
        #[arg(long, default_value = "5")]
        interval: u64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one collection run
    Show {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(client: &ApiClient, command: RunsCommand) -> Result<()> {
    match command {
        RunsCommand::List {
            provider,
            status,
            limit,
            watch,
            interval,
            json,
        } => {
            let filter = RunFilter {
                provider,
                status,
                ..RunFilter::recent(limit)
            };

            if watch {
                return watch_runs(client.clone(), filter, Duration::from_secs(interval), json)
                    .await;
            }

            let runs = client.list_runs(&filter).await?.results;
            if json {
                print_json(&runs)
            } else {
                print_runs(&runs);
                Ok(())
            }
        }
        RunsCommand::Show { id, json } => {
            let run = client
                .get_run(id)
                .await
                .map_err(not_found("collection run", id))?;
            if json {
                print_json(&run)
            } else {
                print_detail(&run);
                Ok(())
            }
        }
    }
}

async fn watch_runs(client: ApiClient, filter: RunFilter, interval: Duration, json: bool) -> Result<()> {
    let mut poller = Poller::start(
        move || {
            let client = client.clone();
            let filter = filter.clone();
            async move { Ok::<_, anyhow::Error>(client.list_runs(&filter).await?.results) }
        },
        interval,
        true,
    )?;
    let mut state_rx = poller.subscribe();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_sequence = 0;
    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                if state.sequence == last_sequence {
                    continue;
                }
                last_sequence = state.sequence;

                if json {
                    print_json(&state.data)?;
                } else {
                    // Clear the terminal and redraw from the top.
                    print!("\x1b[2J\x1b[H");
                    print!("{}", render_watch(&state, interval));
                }
            }
            _ = &mut shutdown => break,
        }
    }

    poller.shutdown();
    Ok(())
}

fn render_watch(state: &PollState<Vec<CollectionRun>>, interval: Duration) -> String {
    let mut out = format!(
        "Collection runs (every {}s, Ctrl-C to stop) at {}\n",
        interval.as_secs(),
        Utc::now().format("%H:%M:%S")
    );

    if let Some(message) = state.error_message() {
        out.push_str(&format!("Error: {message}\n"));
    }

    match &state.data {
        Some(runs) => {
            let summary = RunSummary::from_runs(runs);
            out.push_str(&format!(
                "{} active, {} completed, {} failed, {} resources\n\n",
                summary.active(),
                summary.completed,
                summary.failed,
                summary.resources
            ));
            out.push_str(&runs_table(runs).render());
        }
        None if state.error.is_none() => out.push_str("Loading...\n"),
        None => {}
    }
    out
}

fn runs_table(runs: &[CollectionRun]) -> Table {
    let now = Utc::now();
    let mut table = Table::new(&["ID", "PROVIDER", "STATUS", "RESOURCES", "STARTED", "DURATION"]);
    for run in runs {
        table.row(vec![
            run.id.to_string(),
            run.provider_name
                .clone()
                .unwrap_or_else(|| run.provider.to_string()),
            run.status.to_string(),
            run.resource_count.to_string(),
            run.started_at
                .map(|t| format_age(t, now))
                .unwrap_or_else(|| "-".to_string()),
            run.duration()
                .map(format_duration)
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

fn print_runs(runs: &[CollectionRun]) {
    if runs.is_empty() {
        println!("No collection runs");
        return;
    }
    runs_table(runs).print();
}

fn print_detail(run: &CollectionRun) {
    println!("Run {}", run.label());
    println!("  Status:    {}", run.status);
    println!("  Resources: {}", run.resource_count);
    println!("  Started:   {}", format_timestamp(run.started_at));
    println!("  Finished:  {}", format_timestamp(run.finished_at));
    if let Some(duration) = run.duration() {
        println!("  Duration:  {}", format_duration(duration));
    }
    if run.error_message.is_some() {
        println!("  Error:     {}", or_dash(run.error_message.as_deref()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn run(id: i64, status: RunStatus) -> CollectionRun {
        CollectionRun {
            id,
            provider: 2,
            provider_name: Some("vsphere-lab".to_string()),
            status,
            started_at: None,
            finished_at: None,
            resource_count: 10,
            error_message: None,
        }
    }

    #[test]
    fn test_render_watch_shows_runs_and_summary() {
        let state = PollState {
            data: Some(vec![run(3, RunStatus::Running), run(2, RunStatus::Failed)]),
            error: None,
            loading: false,
            sequence: 1,
        };

        let out = render_watch(&state, Duration::from_secs(5));
        assert!(out.contains("every 5s"));
        assert!(out.contains("1 active, 0 completed, 1 failed, 20 resources"));
        assert!(out.contains("vsphere-lab"));
    }

    #[test]
    fn test_render_watch_keeps_stale_rows_on_error() {
        let state = PollState {
            data: Some(vec![run(3, RunStatus::Completed)]),
            error: Some(Arc::new(anyhow::anyhow!("connection refused"))),
            loading: false,
            sequence: 2,
        };

        let out = render_watch(&state, Duration::from_secs(5));
        assert!(out.contains("Error: connection refused"));
        assert!(out.contains("completed"));
    }

    #[test]
    fn test_render_watch_before_first_result() {
        let state: PollState<Vec<CollectionRun>> = PollState {
            data: None,
            error: None,
            loading: true,
            sequence: 0,
        };
        assert!(render_watch(&state, Duration::from_secs(5)).contains("Loading..."));
    }
}
