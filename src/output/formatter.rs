use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use terminal_size::{terminal_size, Width};

use crate::domain::{Competition, Standing, Status};
use crate::service::{Accrual, RankingUpdate, ReadingOutcome};

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Format a score in compact notation (1.5k, 2.3M, 847)
pub fn format_score(score: f64) -> String {
    let formatted = if score >= 1_000_000.0 {
        format!("{:.1}M", score / 1_000_000.0)
    } else if score >= 1_000.0 {
        format!("{:.1}k", score / 1_000.0)
    } else {
        format!("{:.0}", score)
    };

    // "1.0k" -> "1k"
    formatted.replace(".0M", "M").replace(".0k", "k")
}

/// One leaderboard line ready for display.
pub struct LeaderboardRow<'a> {
    pub place: u64,
    pub name: &'a str,
    pub score: f64,
}

/// One standings line with the participant's display name.
pub struct StandingRow<'a> {
    pub standing: &'a Standing,
    pub name: &'a str,
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Truncate a name to fit available width, counting chars not bytes
fn truncate_name(name: &str, max_width: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_width {
        name.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

fn fit_name(name: &str, fixed_width: usize, term_width: Option<usize>) -> String {
    match term_width {
        Some(width) if width > fixed_width + 10 => truncate_name(name, width - fixed_width),
        Some(_) => truncate_name(name, 20),
        None => name.to_string(),
    }
}

/// Format a leaderboard as `place. score  name`, no headers.
/// Place column: 3 chars (fits "99."), score column 7 chars, right-aligned.
pub fn format_leaderboard(rows: &[LeaderboardRow], use_colors: bool) -> String {
    if rows.is_empty() {
        return "No scores recorded yet.".to_string();
    }

    let term_width = get_terminal_width();
    let score_width = 7;
    let fixed_width = 3 + 1 + score_width + 2;

    rows.iter()
        .map(|row| {
            let place = format!("{:>2}.", row.place);
            let score = format!("{:>width$}", format_score(row.score), width = score_width);
            let name = fit_name(row.name, fixed_width, term_width);

            if use_colors {
                format!("{} {}  {}", place.dimmed(), score.bold(), name)
            } else {
                format!("{} {}  {}", place, score, name)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Leaderboard as tab-separated values for scripting
/// Columns: place, name, score (no headers, no colors)
pub fn format_tsv(rows: &[LeaderboardRow]) -> String {
    rows.iter()
        .map(|row| format!("{}\t{}\t{}", row.place, row.name, row.score.round() as i64))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format standings with points, days read and minutes per participant.
pub fn format_standings(rows: &[StandingRow], use_colors: bool) -> String {
    if rows.is_empty() {
        return "No participants.".to_string();
    }

    let term_width = get_terminal_width();
    let fixed_width = 3 + 1 + 7 + 2 + 6 + 2 + 8 + 2;

    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            let place = format!("{:>2}.", idx + 1);
            let points = format!("{:>7}", format_score(row.standing.points as f64));
            let days = format!("{:>4}d", row.standing.days_read);
            let minutes = format!("{:>6}m", row.standing.minutes_total);
            let name = fit_name(row.name, fixed_width, term_width);

            if use_colors {
                format!(
                    "{} {}  {}  {}  {}",
                    place.dimmed(),
                    points.bold(),
                    days.cyan(),
                    minutes.cyan(),
                    name
                )
            } else {
                format!("{} {}  {}  {}  {}", place, points, days, minutes, name)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_status(competition: &Competition, now: DateTime<Utc>, use_colors: bool) -> String {
    let label = match competition.status {
        Status::Closed => "closed",
        Status::Open if competition.is_active(now) => "active",
        Status::Open if now < competition.start => "upcoming",
        Status::Open => "ended",
    };
    if !use_colors {
        return label.to_string();
    }
    match label {
        "active" => label.green().to_string(),
        "closed" => label.dimmed().to_string(),
        _ => label.yellow().to_string(),
    }
}

/// One line per competition: name, status, window, participants, id.
pub fn format_competition_list(
    competitions: &[Competition],
    now: DateTime<Utc>,
    use_colors: bool,
) -> String {
    if competitions.is_empty() {
        return "No competitions found.".to_string();
    }

    competitions
        .iter()
        .map(|c| {
            let window = format!(
                "{} .. {}",
                c.start.format("%Y-%m-%d"),
                c.end.format("%Y-%m-%d")
            );
            let status = format_status(c, now, use_colors);
            if use_colors {
                format!(
                    "{} | {} | {} | {} readers | {}x/min | {}",
                    c.name.bold(),
                    status,
                    window,
                    c.participants.len(),
                    c.rules.points_per_minute,
                    c.id.as_str().dimmed()
                )
            } else {
                format!(
                    "{} | {} | {} | {} readers | {}x/min | {}",
                    c.name,
                    status,
                    window,
                    c.participants.len(),
                    c.rules.points_per_minute,
                    c.id
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summary after logging a reading: streak, lifetime minutes, and one line
/// per competition touched.
pub fn format_reading_outcome(outcome: &ReadingOutcome, use_colors: bool) -> String {
    let mut lines = vec![if use_colors {
        format!(
            "Streak: {} days  Total: {} min",
            outcome.streak.bold(),
            outcome.total_minutes.bold()
        )
    } else {
        format!(
            "Streak: {} days  Total: {} min",
            outcome.streak, outcome.total_minutes
        )
    }];

    for accrual in &outcome.accruals {
        let line = match accrual {
            Accrual::Committed {
                competition_id,
                points_delta,
                points,
                ranking,
                ..
            } => {
                let rank_note = match ranking {
                    RankingUpdate::Posted { .. } => String::new(),
                    RankingUpdate::Degraded { .. } => " (leaderboard update pending)".to_string(),
                };
                format!(
                    "  {}: +{} points ({} total){}",
                    competition_id, points_delta, points, rank_note
                )
            }
            Accrual::Skipped {
                competition_id,
                reason,
            } => format!("  {}: skipped, {}", competition_id, reason),
            Accrual::LedgerFailed {
                competition_id,
                error,
            } => {
                let msg = format!("  {}: failed, {}", competition_id, error);
                if use_colors {
                    msg.red().to_string()
                } else {
                    msg
                }
            }
        };
        lines.push(line);
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CompetitionId, Rules, UserId};
    use crate::error::CoreError;
    use chrono::{Duration, TimeZone};

    fn standing(user: &str, points: u64, days: u32, minutes: u64) -> Standing {
        Standing {
            user_id: UserId::from(user),
            points,
            days_read: days,
            minutes_total: minutes,
        }
    }

    #[test]
    fn test_format_score_small() {
        assert_eq!(format_score(500.0), "500");
        assert_eq!(format_score(0.0), "0");
    }

    #[test]
    fn test_format_score_compact() {
        assert_eq!(format_score(1000.0), "1k");
        assert_eq!(format_score(1500.0), "1.5k");
        assert_eq!(format_score(1_000_000.0), "1M");
        assert_eq!(format_score(2_300_000.0), "2.3M");
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("Short", 20), "Short");
        assert_eq!(truncate_name("A very long display name", 15), "A very long ...");
        assert_eq!(truncate_name("Hello world", 3), "Hel");
    }

    #[test]
    fn test_format_leaderboard() {
        assert_eq!(format_leaderboard(&[], false), "No scores recorded yet.");

        let rows = vec![
            LeaderboardRow { place: 1, name: "Ann", score: 2000.0 },
            LeaderboardRow { place: 2, name: "Bob", score: 500.0 },
        ];
        let result = format_leaderboard(&rows, false);
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(" 1."));
        assert!(lines[0].contains("2k"));
        assert!(lines[0].contains("Ann"));
        assert!(lines[1].contains("500"));
    }

    #[test]
    fn test_format_tsv() {
        let rows = vec![LeaderboardRow { place: 1, name: "Ann", score: 100.4 }];
        assert_eq!(format_tsv(&rows), "1\tAnn\t100");
        assert_eq!(format_tsv(&[]), "");
    }

    #[test]
    fn test_format_standings() {
        let a = standing("a", 100, 2, 50);
        let b = standing("b", 30, 1, 15);
        let rows = vec![
            StandingRow { standing: &a, name: "Ann" },
            StandingRow { standing: &b, name: "Bob" },
        ];
        let result = format_standings(&rows, false);
        let lines: Vec<&str> = result.lines().collect();
        assert!(lines[0].contains("100"));
        assert!(lines[0].contains("2d"));
        assert!(lines[0].contains("50m"));
        assert!(lines[1].starts_with(" 2."));
        assert_eq!(format_standings(&[], false), "No participants.");
    }

    #[test]
    fn test_format_competition_list_status() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let rules = Rules::new(2).unwrap();
        let c = Competition::new("January", start, start + Duration::days(30), rules).unwrap();
        let list = std::slice::from_ref(&c);

        let during = format_competition_list(list, start + Duration::days(3), false);
        assert!(during.contains("January | active | 2024-01-01 .. 2024-01-31 | 0 readers"));
        assert!(during.contains("| 2x/min"));

        let before = format_competition_list(list, start - Duration::days(3), false);
        assert!(before.contains("upcoming"));

        let mut closed = c.clone();
        closed.close().unwrap();
        let after = format_competition_list(&[closed], start + Duration::days(3), false);
        assert!(after.contains("closed"));
    }

    #[test]
    fn test_format_reading_outcome() {
        let outcome = ReadingOutcome {
            streak: 3,
            total_minutes: 90,
            accruals: vec![
                Accrual::Committed {
                    competition_id: CompetitionId::from("c1"),
                    points_delta: 40,
                    points: 140,
                    days_read: 3,
                    ranking: RankingUpdate::Degraded { reason: "down".to_string() },
                },
                Accrual::LedgerFailed {
                    competition_id: CompetitionId::from("c2"),
                    error: CoreError::server("failed to save participant"),
                },
            ],
        };
        let result = format_reading_outcome(&outcome, false);
        assert!(result.starts_with("Streak: 3 days  Total: 90 min"));
        assert!(result.contains("c1: +40 points (140 total) (leaderboard update pending)"));
        assert!(result.contains("c2: failed, failed to save participant"));
    }
}
