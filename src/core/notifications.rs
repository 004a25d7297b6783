use crate::core::models::RunStatus;
use crate::core::store::RunTransition;
use anyhow::Result;
use notify_rust::Notification;

pub fn notification_text(transition: &RunTransition) -> (String, String) {
    let run = &transition.run;
    let summary = match run.status {
        RunStatus::Failed => format!("Collection run {} failed", run.label()),
        RunStatus::Cancelled => format!("Collection run {} cancelled", run.label()),
        _ => format!("Collection run {} finished", run.label()),
    };

    let body = match (&run.error_message, run.status) {
        (Some(message), RunStatus::Failed) => message.clone(),
        _ => format!("{} resources collected.", run.resource_count),
    };

    (summary, body)
}

pub fn send_run_notification(transition: &RunTransition) -> Result<()> {
    let (summary, body) = notification_text(transition);

    Notification::new()
        .summary(&summary)
        .body(&body)
        .appname("invctl")
        .timeout(notify_rust::Timeout::Milliseconds(5000))
        .show()?;

    tracing::info!(
        run = transition.run.id,
        status = %transition.run.status,
        "Sent run notification"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::CollectionRun;

    fn transition(status: RunStatus, error_message: Option<&str>) -> RunTransition {
        RunTransition {
            run: CollectionRun {
                id: 7,
                provider: 2,
                provider_name: Some("vcenter-lab".to_string()),
                status,
                started_at: None,
                finished_at: None,
                resource_count: 31,
                error_message: error_message.map(str::to_string),
            },
            previous: Some(RunStatus::Running),
        }
    }

    #[test]
    fn test_failure_text_uses_error_message() {
        let (summary, body) = notification_text(&transition(RunStatus::Failed, Some("auth rejected")));
        assert_eq!(summary, "Collection run #7 (vcenter-lab) failed");
        assert_eq!(body, "auth rejected");
    }

    #[test]
    fn test_completion_text_reports_resources() {
        let (summary, body) = notification_text(&transition(RunStatus::Completed, None));
        assert_eq!(summary, "Collection run #7 (vcenter-lab) finished");
        assert_eq!(body, "31 resources collected.");
    }
}
