use itertools::Itertools;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use crate::history::HistoryEntry;
use crate::language::PracticeLanguage;

const CHARS_PER_WORD: f64 = 5.0;

/// Words per minute from correctly typed characters, 5 characters per word
pub fn calculate_wpm(chars: usize, seconds: u64) -> u32 {
    if seconds == 0 {
        return 0;
    }
    let words = chars as f64 / CHARS_PER_WORD;
    let minutes = seconds as f64 / 60.0;
    (words / minutes).round() as u32
}

/// Percentage of attempted positions that were never mistyped
pub fn calculate_accuracy(total_chars: usize, error_count: usize) -> u32 {
    if total_chars == 0 {
        return 100;
    }
    let correct = total_chars as f64 - error_count as f64;
    let accuracy = correct / total_chars as f64 * 100.0;
    accuracy.max(0.0).round() as u32
}

/// Whole seconds between `start` and `end` with `paused` subtracted.
/// Clock skew (end before start) counts as zero.
pub fn elapsed_secs(start: SystemTime, end: SystemTime, paused: Duration) -> u64 {
    end.duration_since(start)
        .unwrap_or_default()
        .saturating_sub(paused)
        .as_secs()
}

/// `m:ss`
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        None
    } else {
        Some(data.iter().sum::<f64>() / data.len() as f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageSummary {
    pub sessions: usize,
    pub avg_wpm: u32,
    pub avg_accuracy: u32,
    pub best_wpm: u32,
}

/// Aggregates shown above the history table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySummary {
    pub sessions: usize,
    pub avg_wpm: u32,
    pub avg_accuracy: u32,
    pub best_wpm: u32,
    pub total_secs: u64,
    pub by_language: BTreeMap<PracticeLanguage, LanguageSummary>,
}

impl HistorySummary {
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        let by_language = entries
            .iter()
            .into_group_map_by(|e| e.result.language)
            .into_iter()
            .map(|(language, group)| {
                let wpms = group.iter().map(|e| e.result.wpm as f64).collect_vec();
                let accs = group.iter().map(|e| e.result.accuracy as f64).collect_vec();
                let summary = LanguageSummary {
                    sessions: group.len(),
                    avg_wpm: rounded_mean(&wpms),
                    avg_accuracy: rounded_mean(&accs),
                    best_wpm: group.iter().map(|e| e.result.wpm).max().unwrap_or(0),
                };
                (language, summary)
            })
            .collect();

        let wpms = entries.iter().map(|e| e.result.wpm as f64).collect_vec();
        let accs = entries.iter().map(|e| e.result.accuracy as f64).collect_vec();

        Self {
            sessions: entries.len(),
            avg_wpm: rounded_mean(&wpms),
            avg_accuracy: rounded_mean(&accs),
            best_wpm: entries.iter().map(|e| e.result.wpm).max().unwrap_or(0),
            total_secs: entries.iter().map(|e| e.result.time).sum(),
            by_language,
        }
    }
}

fn rounded_mean(data: &[f64]) -> u32 {
    mean(data).map_or(0, |m| m.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PracticeResult;
    use chrono::{TimeZone, Utc};

    fn entry(id: i64, language: PracticeLanguage, wpm: u32, accuracy: u32, time: u64) -> HistoryEntry {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        HistoryEntry {
            id,
            result: PracticeResult {
                language,
                wpm,
                accuracy,
                errors: 0,
                time,
                date,
            },
            created_at: date,
        }
    }

    #[test]
    fn wpm_is_zero_without_time() {
        assert_eq!(calculate_wpm(0, 0), 0);
        assert_eq!(calculate_wpm(250, 0), 0);
    }

    #[test]
    fn wpm_uses_five_chars_per_word() {
        assert_eq!(calculate_wpm(300, 60), 60);
        assert_eq!(calculate_wpm(100, 30), 40);
        // 7 chars in 4s -> 1.4 words / 0.0667 min = 21
        assert_eq!(calculate_wpm(7, 4), 21);
    }

    #[test]
    fn accuracy_edge_cases() {
        assert_eq!(calculate_accuracy(0, 0), 100);
        assert_eq!(calculate_accuracy(0, 3), 100);
        assert_eq!(calculate_accuracy(12, 0), 100);
        assert_eq!(calculate_accuracy(12, 12), 0);
        assert_eq!(calculate_accuracy(1, 4), 0);
    }

    #[test]
    fn accuracy_rounds() {
        assert_eq!(calculate_accuracy(10, 2), 80);
        assert_eq!(calculate_accuracy(3, 1), 67);
        assert_eq!(calculate_accuracy(8, 1), 88);
    }

    #[test]
    fn elapsed_subtracts_pauses_and_floors() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let end = start + Duration::from_millis(20_900);
        assert_eq!(elapsed_secs(start, end, Duration::ZERO), 20);
        assert_eq!(elapsed_secs(start, end, Duration::from_secs(10)), 10);
        assert_eq!(elapsed_secs(start, end, Duration::from_secs(60)), 0);
        assert_eq!(elapsed_secs(end, start, Duration::ZERO), 0);
    }

    #[test]
    fn format_duration_pads_seconds() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(600), "10:00");
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[10., 20., 30., 15., 22.]), Some(19.4));
    }

    #[test]
    fn summary_of_empty_history() {
        let summary = HistorySummary::from_entries(&[]);
        assert_eq!(summary, HistorySummary::default());
    }

    #[test]
    fn summary_aggregates_overall_and_per_language() {
        let entries = vec![
            entry(1, PracticeLanguage::Go, 40, 90, 30),
            entry(2, PracticeLanguage::Go, 51, 95, 20),
            entry(3, PracticeLanguage::Python, 60, 100, 10),
        ];
        let summary = HistorySummary::from_entries(&entries);

        assert_eq!(summary.sessions, 3);
        assert_eq!(summary.avg_wpm, 50);
        assert_eq!(summary.avg_accuracy, 95);
        assert_eq!(summary.best_wpm, 60);
        assert_eq!(summary.total_secs, 60);

        let go = &summary.by_language[&PracticeLanguage::Go];
        assert_eq!(go.sessions, 2);
        assert_eq!(go.avg_wpm, 46);
        assert_eq!(go.avg_accuracy, 93);
        assert_eq!(go.best_wpm, 51);
        assert!(!summary.by_language.contains_key(&PracticeLanguage::Javascript));
    }
}
