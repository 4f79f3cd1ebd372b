//! Usage statistics over the library.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use shared::records::{
    DailyActivity, EditHistoryEntry, ImageRecord, PromptCount, TagCount, UsageStatistics,
};
use std::collections::{BTreeMap, HashMap};

const TOP_TAGS: usize = 10;
const TOP_PROMPTS: usize = 5;
const PROMPT_SAMPLE: usize = 100;
const PROMPT_PREFIX_CHARS: usize = 50;
const ACTIVITY_DAYS: i64 = 7;

/// Count descending, then key ascending.
fn ranked(counts: HashMap<String, usize>, limit: usize) -> Vec<(String, usize)> {
    let mut entries: Vec<_> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(limit);
    entries
}

pub fn compute_statistics(
    images: &[ImageRecord],
    edits: &[EditHistoryEntry],
    now: DateTime<Utc>,
) -> UsageStatistics {
    let mut tag_counts: HashMap<String, usize> = HashMap::new();
    for tag in images.iter().flat_map(|i| i.tags.iter()) {
        *tag_counts.entry(tag.clone()).or_default() += 1;
    }

    let mut recent: Vec<&EditHistoryEntry> = edits.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut prompt_counts: HashMap<String, usize> = HashMap::new();
    for edit in recent.iter().take(PROMPT_SAMPLE) {
        let short: String = edit.prompt.chars().take(PROMPT_PREFIX_CHARS).collect();
        *prompt_counts.entry(short).or_default() += 1;
    }

    let since = now - Duration::days(ACTIVITY_DAYS);
    let mut by_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for edit in edits.iter().filter(|e| e.created_at >= since) {
        *by_day.entry(edit.created_at.date_naive()).or_default() += 1;
    }

    UsageStatistics {
        total_images: images.len(),
        total_edits: edits.len(),
        top_tags: ranked(tag_counts, TOP_TAGS)
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect(),
        top_prompts: ranked(prompt_counts, TOP_PROMPTS)
            .into_iter()
            .map(|(prompt, count)| PromptCount { prompt, count })
            .collect(),
        recent_activity: by_day
            .into_iter()
            .map(|(date, count)| DailyActivity { date, count })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn edit(prompt: &str, days_ago: i64) -> EditHistoryEntry {
        EditHistoryEntry {
            id: format!("{}-{}", prompt, days_ago),
            image_id: None,
            prompt: prompt.to_string(),
            created_at: now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn counts_tags_and_prompts() {
        let images = vec![
            ImageRecord::new("a", "u", "p", now()).with_tags(["red", "summer"]),
            ImageRecord::new("b", "u", "p", now()).with_tags(["red"]),
        ];
        let long = "x".repeat(80);
        let edits = vec![
            edit("blue jacket", 0),
            edit("blue jacket", 1),
            edit(&long, 2),
            edit("green scarf", 3),
        ];

        let stats = compute_statistics(&images, &edits, now());
        assert_eq!(stats.total_images, 2);
        assert_eq!(stats.total_edits, 4);
        assert_eq!(
            stats.top_tags,
            vec![
                TagCount { tag: "red".into(), count: 2 },
                TagCount { tag: "summer".into(), count: 1 },
            ]
        );
        assert_eq!(stats.top_prompts[0].prompt, "blue jacket");
        assert_eq!(stats.top_prompts[0].count, 2);
        assert!(stats
            .top_prompts
            .iter()
            .any(|p| p.prompt.chars().count() == 50));
    }

    #[test]
    fn activity_covers_last_week_in_date_order() {
        let edits = vec![edit("a", 9), edit("b", 2), edit("c", 0), edit("d", 2)];
        let stats = compute_statistics(&[], &edits, now());
        let days: Vec<(u32, usize)> = stats
            .recent_activity
            .iter()
            .map(|d| (chrono::Datelike::day(&d.date), d.count))
            .collect();
        assert_eq!(days, vec![(8, 2), (10, 1)]);
    }

    #[test]
    fn prompt_ranking_uses_only_recent_edits() {
        let mut edits: Vec<_> = (0..100).map(|i| edit("fresh", i % 5)).collect();
        edits.extend((0..3).map(|_| edit("stale", 300)));
        let stats = compute_statistics(&[], &edits, now());
        assert_eq!(stats.top_prompts.len(), 1);
        assert_eq!(stats.top_prompts[0].prompt, "fresh");
    }
}
