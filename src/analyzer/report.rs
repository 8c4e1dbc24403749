use crate::lead::{Lead, Plan, University};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const TOP_UNIVERSITIES: usize = 5;
pub const CHART_DAYS: i64 = 14;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub free: usize,
    pub premium: usize,
    pub today: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniversityStat {
    pub name: University,
    pub label: String,
    pub count: usize,
    pub percentage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadReport {
    pub generated_at: String,
    pub today: NaiveDate,
    pub stats: Stats,
    pub premium_rate: String,
    pub top_universities: Vec<UniversityStat>,
    pub daily_signups: Vec<ChartPoint>,
}

#[derive(Debug)]
pub struct SavedReport {
    pub markdown_path: PathBuf,
    pub json_path: PathBuf,
}

/// Recomputes every derived view from the full lead list.
///
/// Day boundaries are UTC calendar days: a lead counts for `today` when the
/// UTC date of `created_at` equals `today`.
pub fn build_report(leads: &[Lead], today: NaiveDate, generated_at: DateTime<Utc>) -> LeadReport {
    let stats = compute_stats(leads, today);

    LeadReport {
        generated_at: generated_at.to_rfc3339(),
        today,
        premium_rate: premium_rate(&stats),
        top_universities: top_universities(leads, TOP_UNIVERSITIES),
        daily_signups: daily_series(leads, today, CHART_DAYS),
        stats,
    }
}

pub fn compute_stats(leads: &[Lead], today: NaiveDate) -> Stats {
    let count_plan = |plan: Plan| {
        leads
            .iter()
            .filter(|lead| lead.selected_plan == plan)
            .count()
    };

    Stats {
        total: leads.len(),
        free: count_plan(Plan::Free),
        premium: count_plan(Plan::Premium),
        today: leads
            .iter()
            .filter(|lead| lead.created_at.date_naive() == today)
            .count(),
    }
}

pub fn premium_rate(stats: &Stats) -> String {
    if stats.total == 0 {
        return "0".to_string();
    }

    format!("{:.1}", percent(stats.premium, stats.total))
}

/// Ties keep the order in which each university first appears in `leads`.
pub fn top_universities(leads: &[Lead], n: usize) -> Vec<UniversityStat> {
    let mut positions = HashMap::new();
    let mut counts: Vec<(University, usize)> = Vec::new();

    for lead in leads {
        let index = *positions.entry(lead.university).or_insert_with(|| {
            counts.push((lead.university, 0));
            counts.len() - 1
        });
        counts[index].1 += 1;
    }

    counts.sort_by(|left, right| right.1.cmp(&left.1));
    counts.truncate(n);

    let shown = counts.iter().map(|(_, count)| *count).collect::<Vec<_>>();
    let tenths = shares_in_tenths(&shown, leads.len());

    counts
        .into_iter()
        .zip(tenths)
        .map(|((university, count), share)| UniversityStat {
            name: university,
            label: university.label().to_string(),
            count,
            percentage: format!("{}.{}", share / 10, share % 10),
        })
        .collect()
}

/// Largest-remainder rounding to tenths of a percent. Shares never add up
/// past the exact combined share, so a full breakdown sums to 100.0.
fn shares_in_tenths(counts: &[usize], total: usize) -> Vec<usize> {
    if total == 0 {
        return vec![0; counts.len()];
    }

    let mut shares = counts
        .iter()
        .map(|count| count * 1000 / total)
        .collect::<Vec<_>>();
    let target = counts.iter().sum::<usize>() * 1000 / total;
    let leftover = target.saturating_sub(shares.iter().sum());

    let mut by_remainder = (0..counts.len()).collect::<Vec<_>>();
    by_remainder.sort_by_key(|&index| Reverse(counts[index] * 1000 % total));
    for &index in by_remainder.iter().take(leftover) {
        shares[index] += 1;
    }

    shares
}

/// Exactly `days` points ending at `today`, oldest first, zero-filled.
pub fn daily_series(leads: &[Lead], today: NaiveDate, days: i64) -> Vec<ChartPoint> {
    let per_day = leads.iter().fold(HashMap::new(), |mut acc, lead| {
        *acc.entry(lead.created_at.date_naive()).or_insert(0_usize) += 1;
        acc
    });

    (0..days)
        .rev()
        .map(|offset| today - Duration::days(offset))
        .map(|date| ChartPoint {
            date,
            label: date.format("%b %d").to_string(),
            count: per_day.get(&date).copied().unwrap_or_default(),
        })
        .collect()
}

pub fn render_markdown(report: &LeadReport) -> String {
    let university_rows = if report.top_universities.is_empty() {
        "- No data".to_string()
    } else {
        report
            .top_universities
            .iter()
            .enumerate()
            .map(|(index, stat)| {
                format!(
                    "{}. {} - {} ({}%)",
                    index + 1,
                    stat.label,
                    stat.count,
                    stat.percentage
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let peak = report
        .daily_signups
        .iter()
        .map(|point| point.count)
        .max()
        .unwrap_or_default();

    let daily_rows = report
        .daily_signups
        .iter()
        .map(|point| {
            format!(
                "| {} | {} | {} |",
                point.date.format("%Y-%m-%d"),
                point.count,
                bar(point.count, peak)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "# Lead Report - {}\n\n## Summary\n- Total signups: {}\n- Free plan: {}\n- Premium plan: {}\n- Premium rate: {}%\n- Signups today (UTC): {}\n\n## Top Universities ({})\n{}\n\n## Daily Signups (last {} days)\n| Date | Signups | |\n|------|---------|---|\n{}\n",
        report.today.format("%Y-%m-%d"),
        report.stats.total,
        report.stats.free,
        report.stats.premium,
        report.premium_rate,
        report.stats.today,
        TOP_UNIVERSITIES,
        university_rows,
        report.daily_signups.len(),
        daily_rows
    )
}

pub fn save_report_files(report: &LeadReport, report_dir: &Path) -> Result<SavedReport> {
    fs::create_dir_all(report_dir).with_context(|| {
        format!(
            "Failed to create report directory: {}",
            report_dir.display()
        )
    })?;

    let date = report.today.format("%Y-%m-%d").to_string();
    let markdown_path = report_dir.join(format!("leads-{date}.md"));
    let json_path = report_dir.join(format!("leads-{date}.json"));

    fs::write(&markdown_path, render_markdown(report)).with_context(|| {
        format!(
            "Failed to write Markdown report: {}",
            markdown_path.display()
        )
    })?;

    let json_content =
        serde_json::to_string_pretty(report).context("Failed to serialize report JSON")?;
    fs::write(&json_path, json_content)
        .with_context(|| format!("Failed to write JSON report: {}", json_path.display()))?;

    Ok(SavedReport {
        markdown_path,
        json_path,
    })
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}

fn bar(count: usize, peak: usize) -> String {
    if peak == 0 {
        return String::new();
    }

    "#".repeat((count * 20).div_ceil(peak))
}
