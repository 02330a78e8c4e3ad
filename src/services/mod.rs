pub mod awards;
pub mod notify;
pub mod planner;
pub mod reminders;
pub mod score_sync;

pub use awards::{
    evaluate_week, in_your_face_winners, perfect_week_winners, quick_pick_winner,
    won_the_week_winner, AwardsEngine, WeekSlate,
};
pub use notify::AwardNotifier;
pub use planner::{polling_window, reminder_instants, WeekPlanner};
pub use reminders::ReminderService;
pub use score_sync::{ScoreSynchronizer, SyncOutcome};
