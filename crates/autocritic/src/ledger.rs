use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use autocritic_critic::ActionCode;
use autocritic_ledger::{CritiqueRecord, LedgerStats, LedgerStore, RecordFilter, RecordOutcome};

#[derive(Subcommand, Debug)]
pub enum LedgerAction {
    /// List stored critique records
    List {
        /// Only records whose action differed from the driver's
        #[arg(long, conflicts_with_all = ["unchanged", "failed"])]
        changed: bool,

        /// Only records where the critic kept the driver's action
        #[arg(long, conflicts_with = "failed")]
        unchanged: bool,

        /// Only records where no valid action could be recovered
        #[arg(long)]
        failed: bool,

        /// Only records that needed the repair exchange
        #[arg(long)]
        repaired: bool,

        /// Only records resolved to this action (code or name)
        #[arg(long)]
        action: Option<ActionCode>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show aggregate statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn handle_ledger_command(action: LedgerAction, store: &LedgerStore) -> Result<()> {
    match action {
        LedgerAction::List {
            changed,
            unchanged,
            failed,
            repaired,
            action,
            json,
        } => {
            let filter = build_filter(changed, unchanged, failed, repaired, action);
            let records = store.list(&filter)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("{}", "No records found.".dimmed());
            } else {
                print_records_table(&records);
            }
        }
        LedgerAction::Stats { json } => {
            let stats = store.stats()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
        }
    }

    Ok(())
}

fn build_filter(
    changed: bool,
    unchanged: bool,
    failed: bool,
    repaired: bool,
    action: Option<ActionCode>,
) -> RecordFilter {
    let outcome = if changed {
        Some(RecordOutcome::Changed)
    } else if unchanged {
        Some(RecordOutcome::Unchanged)
    } else if failed {
        Some(RecordOutcome::Unrecoverable)
    } else {
        None
    };

    RecordFilter {
        outcome,
        action,
        repaired_only: repaired,
    }
}

fn print_records_table(records: &[CritiqueRecord]) {
    println!(
        "{:<5} {:<14} {:<12} {:<6} {:<8} {:<9} {}",
        "#".dimmed(),
        "OUTCOME".dimmed(),
        "ACTION".dimmed(),
        "CALLS".dimmed(),
        "TIME".dimmed(),
        "COST".dimmed(),
        "CRITIQUE".dimmed(),
    );

    for (index, record) in records.iter().enumerate() {
        let outcome = record.outcome();
        let outcome_colored = match outcome {
            RecordOutcome::Changed => format!("{:<14}", outcome).bright_green().to_string(),
            RecordOutcome::Unchanged => format!("{:<14}", outcome).bright_cyan().to_string(),
            RecordOutcome::Unrecoverable => format!("{:<14}", outcome).bright_red().to_string(),
        };
        let action = record
            .reflection_action
            .map(|a| format!("{} ({})", a.code(), a.name()))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<5} {} {:<12} {:<6} {:<8} {:<9} {}",
            index + 1,
            outcome_colored,
            action,
            record.llm_use,
            format_duration(record.time_cost),
            format!("${:.4}", record.llm_cost.cost_usd),
            preview(&record.reflection, 50),
        );
    }
}

fn print_stats(stats: &LedgerStats) {
    println!("{}", "=== Ledger Statistics ===".bright_blue().bold());
    println!("{}  {}", "Total Records:".dimmed(), stats.total_records);
    println!(
        "{}  {}",
        "Changed:".dimmed(),
        stats.changed.to_string().bright_green()
    );
    println!("{}  {}", "Unchanged:".dimmed(), stats.unchanged);
    println!(
        "{}  {}",
        "Unrecoverable:".dimmed(),
        stats.unrecoverable.to_string().bright_red()
    );
    println!("{}  {}", "Repaired:".dimmed(), stats.repaired);
    println!("{}  {}", "Gateway Calls:".dimmed(), stats.total_calls);
    println!(
        "{}  {} prompt / {} completion",
        "Tokens:".dimmed(),
        stats.prompt_tokens,
        stats.completion_tokens
    );
    println!("{}  ${:.4}", "Total Cost:".dimmed(), stats.total_cost_usd);
    println!(
        "{}  {}",
        "Avg Time:".dimmed(),
        format_duration(stats.avg_time_cost_secs)
    );

    if !stats.by_action.is_empty() {
        println!();
        println!("{}", "By Action:".dimmed());
        for entry in &stats.by_action {
            println!(
                "  {:<2} {:<12} {}",
                entry.action.code(),
                entry.action.name(),
                entry.count
            );
        }
    }
}

/// First line of the critique body, skipping `####` headings
fn preview(text: &str, max_chars: usize) -> String {
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("####"))
        .unwrap_or("");
    if line.chars().count() > max_chars {
        format!("{}...", line.chars().take(max_chars).collect::<String>())
    } else {
        line.to_string()
    }
}

fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = (secs % 60.0) as u64;
        format!("{}m {}s", mins, remaining_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_picks_outcome() {
        let filter = build_filter(false, false, true, false, None);
        assert_eq!(filter.outcome, Some(RecordOutcome::Unrecoverable));
        assert!(!filter.repaired_only);

        let filter = build_filter(false, false, false, true, Some(ActionCode::Idle));
        assert_eq!(filter.outcome, None);
        assert_eq!(filter.action, Some(ActionCode::Idle));
        assert!(filter.repaired_only);
    }

    #[test]
    fn test_preview_skips_headings_and_truncates() {
        let text = "#### Analysis of the mistake:\n\nThe driver accelerated into a braking lead car.";
        assert_eq!(preview(text, 12), "The driver a...");
        assert_eq!(preview("", 10), "");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(4.34), "4.3s");
        assert_eq!(format_duration(125.0), "2m 5s");
    }
}
