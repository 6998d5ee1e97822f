pub mod checklist;
pub mod phases;
pub mod report;
pub mod save;
pub mod score;
pub mod snapshots;
pub mod status;
pub mod template;
