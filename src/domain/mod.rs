pub mod competition;
pub mod ledger;
pub mod reading;
pub mod streak;
pub mod user;

pub use competition::{Competition, CompetitionId, Participant, Rules, Standing, Status, UserId};
pub use reading::ReadingEvent;
pub use streak::StreakState;
pub use user::User;
