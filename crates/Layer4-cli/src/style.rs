//! Terminal banners for CLI output

const PROCESS_LINE_WIDTH: usize = 70;

/// `+> message`
pub fn bullet(msg: &str) -> String {
    format!("+> {}\n", msg)
}

/// `+ message ------` padded to a fixed width
pub fn process_start(msg: &str) -> String {
    let used = msg.chars().count() + "+ ".len() + " ".len();
    let rule = "-".repeat(PROCESS_LINE_WIDTH.saturating_sub(used));
    format!("+ {} {}\n", msg, rule)
}

/// Closes a process block opened with `process_start`
pub fn process_end() -> String {
    "\n".to_string()
}

/// `! message` on a failed step
pub fn error(msg: &str) -> String {
    format!("! {}\n", msg)
}
