pub mod backups;
pub mod notifications;
pub mod presence;
pub mod reminders;
