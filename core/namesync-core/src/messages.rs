//! User-facing message text.

pub const NOT_LOGGED_IN: &str = "You must be logged in to use this command.";
pub const NO_PERMISSION: &str = "You do not have access to this command.";
pub const NO_PENDING_CHANGE: &str = "You don't have any pending name changes.";
pub const INVALID_PASSWORD: &str = "Invalid password!";
pub const REMINDER: &str = "Reminder: Your account name differs from your player name.";

pub fn mismatch_detected(account_name: &str, display_name: &str) -> String {
    format!(
        "Server detected that your account name ({}) differs from your player name ({}).",
        account_name, display_name
    )
}

pub fn confirm_hint(command: &str) -> String {
    format!("To update your account name, use: /{} <password>", command)
}

pub fn reminder_hint(command: &str) -> String {
    format!("Use: /{} <password> to update your account name.", command)
}

pub fn usage(command: &str) -> String {
    format!("Usage: /{} <password>", command)
}

pub fn renamed(old_name: &str, new_name: &str) -> String {
    format!(
        "Successfully updated account name from '{}' to '{}'!",
        old_name, new_name
    )
}
