pub mod formatter;

pub use formatter::{
    format_competition_list, format_leaderboard, format_reading_outcome, format_score,
    format_standings, format_tsv, should_use_colors, LeaderboardRow, StandingRow,
};
