//! Human-readable status summaries for top-level jobs.
//!
//! [`summarize`] is a pure function of the materialised subtree: the same
//! tree always yields the same [`Summary`]. Unknown job types degrade to a
//! generic summary; nothing here fails.

use serde::{Deserialize, Serialize};

use crate::aggregate::{collect_item_progress, count_by_status};
use crate::progress::{JobStatus, JobType, ProgressNode};
use crate::tree::ProgressTree;
use crate::types::JobId;

/// Item titles longer than this many characters are cut and suffixed with
/// `...`.
pub const TITLE_MAX_CHARS: usize = 23;

/// How a summary should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Loading,
    Success,
    /// Finished with a mix of successes and failures.
    Warning,
    Error,
}

/// UI-facing status line for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub severity: Severity,
}

impl Summary {
    fn new(title: impl Into<String>, description: Option<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description,
            severity,
        }
    }
}

/// Synthesize the summary for a materialised job subtree.
pub fn summarize(node: &ProgressNode) -> Summary {
    match &node.job_type {
        JobType::BatchReprocess => summarize_entry_job(node, &REPROCESS, None),
        JobType::SourceIngestion => summarize_source_ingestion(node),
        JobType::AllSourcesIngestion => summarize_all_sources(node),
        JobType::Translation => {
            let via = node
                .metrics
                .provider
                .as_deref()
                .map(|p| format!("via {}", provider_display_name(p)));
            summarize_entry_job(node, &TRANSLATION, via)
        }
        JobType::Distillation => summarize_entry_job(node, &DISTILLATION, None),
        JobType::ContextCollection => summarize_context_collection(node),
        JobType::DomainFetch | JobType::ScheduleFetch | JobType::Other(_) => {
            summarize_generic(node)
        }
    }
}

/// Summaries for every visible top-level job in `tree`, ordered by id.
pub fn toast_summaries(tree: &ProgressTree) -> Vec<(JobId, Summary)> {
    tree.roots()
        .into_iter()
        .filter_map(|id| tree.materialize(id))
        .filter(|node| node.visible_as_toast)
        .map(|node| {
            let summary = summarize(&node);
            (node.id, summary)
        })
        .collect()
}

/// Cut `title` to [`TITLE_MAX_CHARS`] characters, appending `...` when cut.
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() <= TITLE_MAX_CHARS {
        return title.to_string();
    }
    let cut: String = title.chars().take(TITLE_MAX_CHARS).collect();
    format!("{cut}...")
}

fn severity_for(status: JobStatus) -> Severity {
    match status {
        JobStatus::Running => Severity::Loading,
        JobStatus::Completed => Severity::Success,
        JobStatus::Error => Severity::Error,
    }
}

fn error_text(node: &ProgressNode) -> String {
    node.error
        .clone()
        .or_else(|| node.message.clone())
        .unwrap_or_else(|| "Unknown error".to_string())
}

fn join_or(parts: Vec<String>, fallback: &str) -> String {
    if parts.is_empty() {
        fallback.to_string()
    } else {
        parts.join(", ")
    }
}

fn count_part(count: u32, label: &str) -> Option<String> {
    (count > 0).then(|| format!("{count} {label}"))
}

// ---------------------------------------------------------------------------
// Single-entry / batch jobs (reprocess, translation, distillation)
// ---------------------------------------------------------------------------

/// Wording for jobs that handle either one entry or a batch of entries.
struct EntryPhrasing {
    single_running: &'static str,
    single_done: &'static str,
    single_failed: &'static str,
    batch_running: &'static str,
    batch_done: &'static str,
    batch_failed: &'static str,
    batch_unit: &'static str,
}

const REPROCESS: EntryPhrasing = EntryPhrasing {
    single_running: "Fetching",
    single_done: "Updated",
    single_failed: "Failed",
    batch_running: "Reprocessing entries",
    batch_done: "Reprocessed",
    batch_failed: "Reprocessing failed",
    batch_unit: "entries",
};

const TRANSLATION: EntryPhrasing = EntryPhrasing {
    single_running: "Translating",
    single_done: "Translated",
    single_failed: "Translation failed",
    batch_running: "Translating entries",
    batch_done: "Translated",
    batch_failed: "Translation failed",
    batch_unit: "entries",
};

const DISTILLATION: EntryPhrasing = EntryPhrasing {
    single_running: "Distilling",
    single_done: "Distilled",
    single_failed: "Distillation failed",
    batch_running: "Distilling entries",
    batch_done: "Distilled",
    batch_failed: "Distillation failed",
    batch_unit: "distilled",
};

/// Title of the only entry, if the job handles exactly one.
fn single_entry_title(node: &ProgressNode) -> Option<String> {
    let metrics = &node.metrics;
    let is_single = match metrics.total_entries {
        Some(total) => total == 1,
        None => metrics.entry_progress.len() == 1,
    };
    if !is_single {
        return None;
    }
    let title = metrics
        .entry_progress
        .values()
        .next()
        .map(|item| item.title.clone())
        .or_else(|| metrics.entry_title.clone())
        .unwrap_or_else(|| "Untitled entry".to_string());
    Some(truncate_title(&title))
}

fn summarize_entry_job(
    node: &ProgressNode,
    phrasing: &EntryPhrasing,
    annotation: Option<String>,
) -> Summary {
    let severity = severity_for(node.status);

    if let Some(title) = single_entry_title(node) {
        let (verb, description) = match node.status {
            JobStatus::Running => (phrasing.single_running, annotation),
            JobStatus::Completed => (phrasing.single_done, annotation),
            JobStatus::Error => (phrasing.single_failed, Some(error_text(node))),
        };
        return Summary::new(format!("{verb}: {title}"), description, severity);
    }

    let metrics = &node.metrics;
    let counts = count_by_status(metrics.entry_progress.values());
    let total = metrics.total_entries.unwrap_or(counts.total());
    let done = metrics.processed_entries.unwrap_or(counts.finished());
    let with_annotation = |text: String| match &annotation {
        Some(note) => format!("{text} {note}"),
        None => text,
    };

    match node.status {
        JobStatus::Running => Summary::new(
            phrasing.batch_running,
            Some(with_annotation(format!(
                "{done}/{total} {}",
                phrasing.batch_unit
            ))),
            severity,
        ),
        JobStatus::Completed => Summary::new(
            format!("{} {total} entries", phrasing.batch_done),
            annotation.clone(),
            severity,
        ),
        JobStatus::Error => Summary::new(phrasing.batch_failed, Some(error_text(node)), severity),
    }
}

/// Display name for a translation provider key.
pub fn provider_display_name(key: &str) -> String {
    match key.to_ascii_lowercase().as_str() {
        "deepl" => "DeepL".to_string(),
        "openai" => "OpenAI".to_string(),
        "anthropic" => "Anthropic".to_string(),
        "google" => "Google Translate".to_string(),
        "azure" => "Azure Translator".to_string(),
        "libretranslate" => "LibreTranslate".to_string(),
        _ => key.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Source ingestion
// ---------------------------------------------------------------------------

fn source_label(node: &ProgressNode) -> String {
    node.metrics
        .source_name
        .as_deref()
        .map(truncate_title)
        .unwrap_or_else(|| "source".to_string())
}

fn summarize_source_ingestion(node: &ProgressNode) -> Summary {
    let severity = severity_for(node.status);
    let source = source_label(node);
    let items = collect_item_progress(node);
    let counts = count_by_status(items.values());

    match node.status {
        JobStatus::Running if !items.is_empty() => Summary::new(
            format!("Ingesting {source}"),
            Some(format!("{}/{} fetched", counts.fetched_or_later(), counts.total())),
            severity,
        ),
        JobStatus::Running => {
            let description = match node.metrics.entries_created {
                Some(created) if created > 0 => format!("Crawling, {created} new so far"),
                _ => "Crawling...".to_string(),
            };
            Summary::new(format!("Ingesting {source}"), Some(description), severity)
        }
        JobStatus::Completed => {
            let created = node.metrics.entries_created.unwrap_or(0);
            let distilled = node.metrics.entries_distilled.unwrap_or(counts.completed);
            let parts = [
                count_part(created, "new"),
                count_part(counts.fetched_or_later(), "fetched"),
                count_part(distilled, "distilled"),
            ]
            .into_iter()
            .flatten()
            .collect();
            Summary::new(
                format!("Ingested {source}"),
                Some(join_or(parts, "No new items")),
                severity,
            )
        }
        JobStatus::Error => Summary::new(
            format!("Ingestion failed: {source}"),
            Some(error_text(node)),
            severity,
        ),
    }
}

fn summarize_all_sources(node: &ProgressNode) -> Summary {
    let severity = severity_for(node.status);
    let m = &node.metrics;

    match node.status {
        JobStatus::Running => {
            let mut parts = Vec::new();
            if let (Some(current), Some(total)) = (m.current_batch, m.total_batches) {
                parts.push(format!("Batch {current}/{total}"));
            }
            if let Some(total) = m.feeds_total {
                parts.push(format!("{}/{total} feeds", m.feeds_completed.unwrap_or(0)));
            }
            let fallback = node.message.as_deref().unwrap_or("Starting...");
            Summary::new("Ingesting all sources", Some(join_or(parts, fallback)), severity)
        }
        JobStatus::Completed => {
            let distilled = m.entries_distilled.unwrap_or_else(|| {
                count_by_status(collect_item_progress(node).values()).completed
            });
            let parts = [
                count_part(
                    m.feeds_processed.or(m.feeds_completed).unwrap_or(0),
                    "feeds processed",
                ),
                count_part(m.entries_created.unwrap_or(0), "new"),
                count_part(distilled, "distilled"),
            ]
            .into_iter()
            .flatten()
            .collect();
            Summary::new(
                "All sources ingested",
                Some(join_or(parts, "No new items")),
                severity,
            )
        }
        JobStatus::Error => Summary::new("Ingestion failed", Some(error_text(node)), severity),
    }
}

// ---------------------------------------------------------------------------
// Context collection
// ---------------------------------------------------------------------------

fn context_step_label(step: Option<&str>) -> &'static str {
    match step {
        Some("extract") => "Extracting context",
        Some("analyze") => "Analyzing content",
        Some("enrich") => "Enriching entities",
        Some("save") => "Saving results",
        _ => "Collecting context",
    }
}

fn summarize_context_collection(node: &ProgressNode) -> Summary {
    let m = &node.metrics;
    let succeeded = m.successful_extractions.unwrap_or(0);
    let failed = m.failed_extractions.unwrap_or(0);

    if node.status == JobStatus::Running {
        let description = match m.total_entries {
            Some(total) => {
                let processed = m.processed_entries.unwrap_or(succeeded.saturating_add(failed));
                Some(format!("{processed}/{total} entries"))
            }
            None => node.message.clone(),
        };
        return Summary::new(
            context_step_label(node.current_step.as_deref()),
            description,
            Severity::Loading,
        );
    }

    if succeeded > 0 && failed > 0 {
        return Summary::new(
            "Context partially collected",
            Some(format!("{succeeded} succeeded, {failed} failed")),
            Severity::Warning,
        );
    }

    match node.status {
        // Finished, but every extraction failed.
        JobStatus::Completed if succeeded == 0 && failed > 0 => Summary::new(
            "Context collection failed",
            Some(format!("{failed} failed")),
            Severity::Error,
        ),
        JobStatus::Completed => {
            let parts = [
                count_part(succeeded, "extracted"),
                count_part(m.entries_enriched.unwrap_or(0), "enriched"),
            ]
            .into_iter()
            .flatten()
            .collect();
            Summary::new(
                "Context collected",
                Some(join_or(parts, "Nothing to collect")),
                Severity::Success,
            )
        }
        _ => Summary::new(
            "Context collection failed",
            Some(error_text(node)),
            Severity::Error,
        ),
    }
}

// ---------------------------------------------------------------------------
// Generic fallback
// ---------------------------------------------------------------------------

/// Human label for job types without a dedicated summary.
pub fn job_type_label(job_type: &JobType) -> String {
    let tag = match job_type {
        JobType::BatchReprocess => return "Reprocessing entries".to_string(),
        JobType::SourceIngestion => return "Ingesting source".to_string(),
        JobType::AllSourcesIngestion => return "Ingesting all sources".to_string(),
        JobType::DomainFetch => return "Fetching domain".to_string(),
        JobType::ScheduleFetch => return "Scheduled fetch".to_string(),
        JobType::Translation => return "Translating".to_string(),
        JobType::Distillation => return "Distilling".to_string(),
        JobType::ContextCollection => return "Collecting context".to_string(),
        JobType::Other(tag) => tag.as_str(),
    };

    match tag {
        "search_reindex" => "Rebuilding search index".to_string(),
        "cleanup" => "Cleaning up".to_string(),
        "digest" => "Building digest".to_string(),
        "export" => "Exporting".to_string(),
        other => humanize_tag(other),
    }
}

fn humanize_tag(tag: &str) -> String {
    let spaced = tag.replace(['_', '-'], " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Background job".to_string(),
    }
}

fn summarize_generic(node: &ProgressNode) -> Summary {
    let description = match node.status {
        JobStatus::Error => Some(error_text(node)),
        _ => node.message.clone(),
    };
    Summary::new(
        job_type_label(&node.job_type),
        description,
        severity_for(node.status),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ItemProgressState, ItemStatus, JobMetrics};
    use crate::types::Timestamp;
    use chrono::TimeZone;

    fn at() -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn job(id: &str, job_type: JobType, status: JobStatus) -> ProgressNode {
        ProgressNode::new(id, job_type, status, at())
    }

    fn item(id: &str, title: &str, status: ItemStatus) -> ItemProgressState {
        ItemProgressState::new(id, title, status, at())
    }

    #[test]
    fn single_reprocess_follows_item_title_through_lifecycle() {
        let running = job("re", JobType::BatchReprocess, JobStatus::Running)
            .with_item(item("e1", "Acme Corp raises funding", ItemStatus::Fetching));

        let summary = summarize(&running);
        assert_eq!(summary.title, "Fetching: Acme Corp raises fundin...");
        assert_eq!(summary.severity, Severity::Loading);

        let mut completed = running.clone();
        completed.status = JobStatus::Completed;

        let summary = summarize(&completed);
        assert_eq!(summary.title, "Updated: Acme Corp raises fundin...");
        assert_eq!(summary.severity, Severity::Success);
    }

    #[test]
    fn failed_single_reprocess_carries_error_text() {
        let node = job("re", JobType::BatchReprocess, JobStatus::Error)
            .with_item(item("e1", "Short title", ItemStatus::Error))
            .with_error("HTTP 503 from origin");

        let summary = summarize(&node);
        assert_eq!(summary.title, "Failed: Short title");
        assert_eq!(summary.description.as_deref(), Some("HTTP 503 from origin"));
        assert_eq!(summary.severity, Severity::Error);
    }

    #[test]
    fn batch_reprocess_shows_done_over_total() {
        let node = job("re", JobType::BatchReprocess, JobStatus::Running).with_metrics(JobMetrics {
            total_entries: Some(12),
            processed_entries: Some(5),
            ..Default::default()
        });

        let summary = summarize(&node);
        assert_eq!(summary.title, "Reprocessing entries");
        assert_eq!(summary.description.as_deref(), Some("5/12 entries"));
    }

    #[test]
    fn completed_source_ingestion_joins_counts() {
        let mut fetch = job("fetch", JobType::DomainFetch, JobStatus::Completed);
        for i in 1..=5 {
            fetch = fetch.with_item(item(&format!("e{i}"), "Entry", ItemStatus::Completed));
        }
        let mut schedule = job("sched", JobType::ScheduleFetch, JobStatus::Completed);
        schedule.children.insert("fetch".into(), fetch);
        let mut top = job("top", JobType::SourceIngestion, JobStatus::Completed).with_metrics(
            JobMetrics {
                entries_created: Some(5),
                ..Default::default()
            },
        );
        top.children.insert("sched".into(), schedule);

        let summary = summarize(&top);
        assert_eq!(summary.description.as_deref(), Some("5 new, 5 fetched, 5 distilled"));
        assert_eq!(summary.severity, Severity::Success);
    }

    #[test]
    fn completed_source_ingestion_without_work_says_no_new_items() {
        let node = job("top", JobType::SourceIngestion, JobStatus::Completed);
        assert_eq!(summarize(&node).description.as_deref(), Some("No new items"));
    }

    #[test]
    fn running_source_ingestion_reports_crawl_then_fetch_progress() {
        let crawling = job("top", JobType::SourceIngestion, JobStatus::Running).with_metrics(
            JobMetrics {
                entries_created: Some(3),
                source_name: Some("Example News".into()),
                ..Default::default()
            },
        );
        let summary = summarize(&crawling);
        assert_eq!(summary.title, "Ingesting Example News");
        assert_eq!(summary.description.as_deref(), Some("Crawling, 3 new so far"));

        let mut fetching = crawling.clone();
        let fetch = job("fetch", JobType::DomainFetch, JobStatus::Running)
            .with_item(item("a", "A", ItemStatus::Fetched))
            .with_item(item("b", "B", ItemStatus::Pending))
            .with_item(item("c", "C", ItemStatus::Distilling));
        fetching.children.insert("fetch".into(), fetch);

        assert_eq!(summarize(&fetching).description.as_deref(), Some("2/3 fetched"));
    }

    #[test]
    fn context_collection_partial_failure_is_a_warning() {
        let node = job("ctx", JobType::ContextCollection, JobStatus::Error)
            .with_error("3 extractions failed")
            .with_metrics(JobMetrics {
                total_entries: Some(10),
                successful_extractions: Some(7),
                failed_extractions: Some(3),
                ..Default::default()
            });

        let summary = summarize(&node);
        assert_eq!(summary.description.as_deref(), Some("7 succeeded, 3 failed"));
        assert_eq!(summary.severity, Severity::Warning);
    }

    #[test]
    fn context_collection_total_failure_is_an_error() {
        let node = job("ctx", JobType::ContextCollection, JobStatus::Error)
            .with_error("extractor offline")
            .with_metrics(JobMetrics {
                failed_extractions: Some(4),
                ..Default::default()
            });

        let summary = summarize(&node);
        assert_eq!(summary.severity, Severity::Error);
        assert_eq!(summary.description.as_deref(), Some("extractor offline"));
    }

    #[test]
    fn completed_context_collection_with_only_failures_is_an_error() {
        let node = job("ctx", JobType::ContextCollection, JobStatus::Completed).with_metrics(
            JobMetrics {
                total_entries: Some(3),
                successful_extractions: Some(0),
                failed_extractions: Some(3),
                ..Default::default()
            },
        );

        let summary = summarize(&node);
        assert_eq!(summary.severity, Severity::Error);
        assert_eq!(summary.description.as_deref(), Some("3 failed"));
    }

    #[test]
    fn running_context_collection_survives_huge_counters() {
        let node = job("ctx", JobType::ContextCollection, JobStatus::Running).with_metrics(
            JobMetrics {
                total_entries: Some(10),
                successful_extractions: Some(u32::MAX),
                failed_extractions: Some(1),
                ..Default::default()
            },
        );

        let summary = summarize(&node);
        assert_eq!(summary.severity, Severity::Loading);
        assert_eq!(
            summary.description,
            Some(format!("{}/10 entries", u32::MAX))
        );
    }

    #[test]
    fn context_collection_running_uses_step_label() {
        let node = job("ctx", JobType::ContextCollection, JobStatus::Running)
            .with_step("enrich")
            .with_metrics(JobMetrics {
                total_entries: Some(10),
                processed_entries: Some(4),
                ..Default::default()
            });

        let summary = summarize(&node);
        assert_eq!(summary.title, "Enriching entities");
        assert_eq!(summary.description.as_deref(), Some("4/10 entries"));
    }

    #[test]
    fn context_collection_completed_counts_extracted_and_enriched() {
        let node = job("ctx", JobType::ContextCollection, JobStatus::Completed).with_metrics(
            JobMetrics {
                successful_extractions: Some(6),
                entries_enriched: Some(4),
                ..Default::default()
            },
        );

        let summary = summarize(&node);
        assert_eq!(summary.description.as_deref(), Some("6 extracted, 4 enriched"));
        assert_eq!(summary.severity, Severity::Success);
    }

    #[test]
    fn translation_mentions_provider() {
        let node = job("tr", JobType::Translation, JobStatus::Running).with_metrics(JobMetrics {
            total_entries: Some(8),
            processed_entries: Some(2),
            provider: Some("deepl".into()),
            ..Default::default()
        });

        let summary = summarize(&node);
        assert_eq!(summary.title, "Translating entries");
        assert_eq!(summary.description.as_deref(), Some("2/8 entries via DeepL"));
    }

    #[test]
    fn single_distillation_uses_entry_title() {
        let node = job("ds", JobType::Distillation, JobStatus::Completed).with_metrics(JobMetrics {
            total_entries: Some(1),
            entry_title: Some("Quarterly results".into()),
            ..Default::default()
        });

        assert_eq!(summarize(&node).title, "Distilled: Quarterly results");
    }

    #[test]
    fn all_sources_progress_and_completion() {
        let running = job("all", JobType::AllSourcesIngestion, JobStatus::Running).with_metrics(
            JobMetrics {
                current_batch: Some(2),
                total_batches: Some(5),
                feeds_completed: Some(14),
                feeds_total: Some(40),
                ..Default::default()
            },
        );
        assert_eq!(
            summarize(&running).description.as_deref(),
            Some("Batch 2/5, 14/40 feeds")
        );

        let done = job("all", JobType::AllSourcesIngestion, JobStatus::Completed).with_metrics(
            JobMetrics {
                feeds_processed: Some(40),
                entries_created: Some(12),
                entries_distilled: Some(9),
                ..Default::default()
            },
        );
        assert_eq!(
            summarize(&done).description.as_deref(),
            Some("40 feeds processed, 12 new, 9 distilled")
        );
    }

    #[test]
    fn unknown_job_type_uses_generic_label_and_message() {
        let node = job("x", JobType::Other("vector_rebuild".into()), JobStatus::Running)
            .with_message("Rebuilt 40 of 90 shards");

        let summary = summarize(&node);
        assert_eq!(summary.title, "Vector rebuild");
        assert_eq!(summary.description.as_deref(), Some("Rebuilt 40 of 90 shards"));
        assert_eq!(summary.severity, Severity::Loading);

        let known = job("y", JobType::Other("search_reindex".into()), JobStatus::Completed);
        assert_eq!(summarize(&known).title, "Rebuilding search index");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_title("short"), "short");
        let long = "ÄÖÜäöüßÄÖÜäöüßÄÖÜäöüßÄÖÜ";
        let truncated = truncate_title(long);
        assert_eq!(truncated.chars().count(), TITLE_MAX_CHARS + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn summarize_is_deterministic() {
        let mut top = job("top", JobType::SourceIngestion, JobStatus::Running);
        top.children.insert(
            "f".into(),
            job("f", JobType::DomainFetch, JobStatus::Running)
                .with_item(item("1", "One", ItemStatus::Fetched)),
        );

        let first = summarize(&top);
        let _ = summarize(&job("other", JobType::Translation, JobStatus::Error));
        assert_eq!(first, summarize(&top));
    }

    #[test]
    fn toast_summaries_skip_hidden_roots() {
        let mut tree = ProgressTree::new();
        tree.apply_update(job("visible", JobType::Translation, JobStatus::Running))
            .unwrap();
        tree.apply_update(job("hidden", JobType::Translation, JobStatus::Running).hidden())
            .unwrap();
        tree.apply_update(
            job("child", JobType::DomainFetch, JobStatus::Running).with_parent("visible"),
        )
        .unwrap();

        let summaries = toast_summaries(&tree);
        let ids: Vec<_> = summaries.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["visible"]);
    }
}
