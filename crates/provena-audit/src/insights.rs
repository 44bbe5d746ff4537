//! Deterministic, rule-based commentary on verification reports.
//!
//! Stands in for the language-model summary when no external provider is
//! configured.  The text is meant for people reading the audit trail, not
//! for machines: nothing downstream parses it.

use provena_contracts::{
    error::LedgerResult,
    verify::{BreakKind, Insights, VerificationReport},
};
use provena_core::traits::InsightProvider;

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedInsights;

impl RuleBasedInsights {
    pub fn new() -> Self {
        Self
    }
}

impl InsightProvider for RuleBasedInsights {
    fn summarize(&self, report: &VerificationReport) -> LedgerResult<Insights> {
        if report.total_entries == 0 {
            return Ok(Insights {
                ai_insights: Some(format!(
                    "Organization '{}' has no audit entries yet; there is nothing to verify.",
                    report.organization_id
                )),
                recommendation: Some(
                    "Make sure compliance actions are being recorded to the audit log.".to_string(),
                ),
            });
        }

        let span = match report.chain_duration_days {
            Some(0) | None => "less than a day".to_string(),
            Some(1) => "1 day".to_string(),
            Some(days) => format!("{} days", days),
        };

        let Some(first_break) = report.broken_links.first() else {
            return Ok(Insights {
                ai_insights: Some(format!(
                    "All {} entries are intact and correctly linked, covering {}.",
                    report.total_entries, span
                )),
                recommendation: Some(
                    "No action needed. Keep verifying the chain on a regular schedule.".to_string(),
                ),
            });
        };

        let count = |kind: BreakKind| {
            report
                .broken_links
                .iter()
                .filter(|link| link.kind == kind)
                .count()
        };
        let linkage = count(BreakKind::ChainLink) + count(BreakKind::Genesis);
        let content = count(BreakKind::InputHash) + count(BreakKind::OutputHash);

        let mut summary = format!(
            "Found {} integrity failure(s) across {} entries covering {}; the first is at entry {}.",
            report.broken_links.len(),
            report.total_entries,
            span,
            first_break.entry_id
        );
        if linkage > 0 {
            summary.push_str(&format!(
                " {} link(s) do not point at the preceding entry, which suggests entries were \
                 removed, reordered, or written concurrently.",
                linkage
            ));
        }
        if content > 0 {
            summary.push_str(&format!(
                " {} stored hash(es) no longer match their payloads, which suggests the \
                 payloads or hashes were edited after the fact.",
                content
            ));
        }

        Ok(Insights {
            ai_insights: Some(summary),
            recommendation: Some(
                "Treat the audit trail as unreliable from the first failing entry onward: \
                 restore the affected rows from backup, review write access to the audit \
                 table, and document the incident."
                    .to_string(),
            ),
        })
    }
}
