//! Follow auth state changes.

use super::SessionSummary;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use gotrue_types::{AuthChangeEvent, Session};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use ymir::{AuthEngine, Diagnostic};

/// Keep the engine running and print every auth event until Ctrl-C.
///
/// The stored session is refreshed in the background while this runs.
pub async fn watch(engine: &AuthEngine, format: &OutputFormat) -> Result<()> {
    let format = *format;
    let subscription = engine.on_auth_state_change(move |event, session| {
        println!("{}", render_event(event, session, format));
    });
    let mut diagnostics = engine.diagnostics();

    match format {
        OutputFormat::Text => {
            let state = if engine.is_signed_in() {
                "signed in"
            } else {
                "signed out"
            };
            println!("Watching auth events ({}). Press Ctrl-C to stop.", state);
        }
        OutputFormat::Json => output::print_json(&engine.status()),
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = diagnostics.recv() => match received {
                Ok(diagnostic) => output::print_error(&render_diagnostic(&diagnostic), &format),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Diagnostics lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    subscription.unsubscribe();
    Ok(())
}

fn render_event(event: AuthChangeEvent, session: Option<&Session>, format: OutputFormat) -> String {
    let summary = session.map(SessionSummary::from);
    match format {
        OutputFormat::Text => match &summary {
            Some(summary) => format!(
                "{:<18} {} (expires in {}s)",
                event.as_str(),
                summary.display_name(),
                summary.expires_in_secs
            ),
            None => event.to_string(),
        },
        OutputFormat::Json => json!({ "event": event, "session": summary }).to_string(),
    }
}

fn render_diagnostic(diagnostic: &Diagnostic) -> String {
    match diagnostic {
        Diagnostic::RefreshFailed { error, trigger } => {
            format!("refresh failed ({:?}): {}", trigger, error)
        }
        Diagnostic::PersistFailed { operation, message } => {
            format!("could not {} the stored session: {}", operation, message)
        }
    }
}
