use namesync_protocol::{Message, MessageTone, PendingEntry};

pub fn format_message(message: &Message) -> String {
    let tag = match message.tone {
        MessageTone::Info => "info",
        MessageTone::Error => "error",
        MessageTone::Success => "success",
    };
    format!("[{}] {}", tag, message.text)
}

pub fn format_pending(entry: &PendingEntry) -> String {
    let reminded = entry
        .last_reminder_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "{}\taccount={}\topened={}\treminded={}",
        entry.key,
        entry.account_id,
        entry.opened_at.to_rfc3339(),
        reminded
    )
}
