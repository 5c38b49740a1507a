//! Errors command - Review the persisted error log
//!
//! Every record that failed during a pass, a single-record sync, a status
//! push or a webhook delivery leaves one entry. `woosync errors --since 1d`
//! lists them newest first, with a per-kind summary.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::Args;
use tracing::info;

use woosync_core::domain::ErrorLogEntry;
use woosync_core::ports::ISyncStateRepository;
use woosync_core::usecases::ReviewErrorsUseCase;

use super::CliContext;
use crate::output;

#[derive(Debug, Args)]
pub struct ErrorsCommand {
    /// Show entries since this time (e.g., "1h", "2d", "2024-01-01")
    #[arg(long)]
    pub since: Option<String>,

    /// Maximum number of entries to show
    #[arg(long, default_value = "50")]
    pub limit: u32,

    /// Only entries of this kind (e.g., "transport", "validation")
    #[arg(long)]
    pub kind: Option<String>,
}

impl ErrorsCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();

        let since = match &self.since {
            Some(since_str) => parse_since(since_str).with_context(|| {
                format!(
                    "Invalid --since value: '{}'. Expected formats: '1h', '30m', '2d', '1w', '2024-01-01', '2024-01-01T12:00:00'",
                    since_str
                )
            })?,
            None => Utc::now() - chrono::Duration::days(7),
        };

        let config = ctx.load_config()?;
        let store = ctx.open_store(&config).await?;
        let entries = ReviewErrorsUseCase::new(store as std::sync::Arc<dyn ISyncStateRepository>)
            .recent(since, self.limit)
            .await?;

        info!(count = entries.len(), since = %since, "Retrieved error log entries");

        let entries: Vec<ErrorLogEntry> = entries
            .into_iter()
            .filter(|entry| match &self.kind {
                Some(kind) => entry.kind().as_str() == kind.as_str(),
                None => true,
            })
            .collect();
        let summary = ReviewErrorsUseCase::summarize(&entries);

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "since": since.to_rfc3339(),
                "limit": self.limit,
                "count": entries.len(),
                "by_kind": summary.by_kind,
                "entries": entries,
            }));
            return Ok(());
        }

        if entries.is_empty() {
            formatter.success("No errors logged for the specified criteria.");
            return Ok(());
        }

        formatter.success(&format!(
            "Error log ({})",
            output::count(summary.total as u64, "entry")
        ));
        for (kind, n) in &summary.by_kind {
            formatter.info(&format!("{:<20} {}", kind, n));
        }
        formatter.info("");
        formatter.info("  Timestamp           Kind               Record               Message");
        formatter.info("  ------------------- ------------------ -------------------- -------");

        for entry in &entries {
            let timestamp = entry.timestamp().format("%Y-%m-%d %H:%M:%S");
            let record = entry.record().unwrap_or("-");
            let mut line = format!(
                "  {} {:<18} {:<20} {}",
                timestamp,
                entry.kind().as_str(),
                truncate_string(record, 20),
                truncate_string(entry.message(), 60)
            );
            let details = format_details(entry.details());
            if !details.is_empty() {
                line.push_str(&format!(" [{}]", details));
            }
            formatter.info(&line);
        }

        if entries.len() as u32 >= self.limit {
            formatter.info("");
            formatter.info(&format!(
                "Showing {} entries (limit). Use --limit to show more.",
                self.limit
            ));
        }
        Ok(())
    }
}

/// Parse `--since` into an instant
///
/// Relative ("30m", "1h", "2d", "1w") counts back from now; dates and
/// datetimes without an offset are taken as UTC.
fn parse_since(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Some(duration) = parse_relative_duration(input) {
        return Ok(Utc::now() - duration);
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let datetime = date
            .and_hms_opt(0, 0, 0)
            .context("Failed to create datetime from date")?;
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(input) {
        return Ok(datetime.with_timezone(&Utc));
    }

    anyhow::bail!(
        "Could not parse '{}' as a time. Use relative (1h, 30m, 2d, 1w) or absolute (2024-01-01) format.",
        input
    )
}

fn parse_relative_duration(input: &str) -> Option<chrono::Duration> {
    if input.len() < 2 || !input.is_ascii() {
        return None;
    }

    let (num_str, unit) = input.split_at(input.len() - 1);
    let num: i64 = num_str.parse().ok()?;

    match unit {
        "m" => Some(chrono::Duration::minutes(num)),
        "h" => Some(chrono::Duration::hours(num)),
        "d" => Some(chrono::Duration::days(num)),
        "w" => Some(chrono::Duration::weeks(num)),
        _ => None,
    }
}

/// Short `key=value` summary of an entry's details object
fn format_details(details: &serde_json::Value) -> String {
    match details {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => truncate_string(s, 40),
        serde_json::Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(key, value)| match value.as_str() {
                    Some(s) => format!("{}={}", key, s),
                    None => format!("{}={}", key, value),
                })
                .collect();
            truncate_string(&parts.join(", "), 40)
        }
        other => truncate_string(&other.to_string(), 40),
    }
}

/// Truncate to `max_len` characters, marking the cut with "..."
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
