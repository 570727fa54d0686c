//! Machine status and the classifiers that read it out of tool output

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the development VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    /// No machine recorded, or nothing recognizable was reported
    #[default]
    Unknown,
    Running,
    Suspended,
    Halted,
}

impl MachineStatus {
    /// Display form; `Unknown` renders as an empty string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Halted => "halted",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Self::Unknown
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps one line of status output to a machine state
pub trait StatusClassifier: Send + Sync {
    /// `None` when the line carries no recognizable state
    fn classify(&self, line: &str) -> Option<MachineStatus>;
}

/// First-match keyword rules
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: Vec<(String, MachineStatus)>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self::with_rules(vec![
            ("running".to_string(), MachineStatus::Running),
            ("suspended".to_string(), MachineStatus::Suspended),
            ("not created".to_string(), MachineStatus::Halted),
        ])
    }

    pub fn with_rules(rules: Vec<(String, MachineStatus)>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[(String, MachineStatus)] {
        &self.rules
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusClassifier for KeywordClassifier {
    fn classify(&self, line: &str) -> Option<MachineStatus> {
        self.rules
            .iter()
            .find(|(keyword, _)| line.contains(keyword.as_str()))
            .map(|(_, status)| *status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_table() {
        let classifier = KeywordClassifier::new();
        let cases = [
            ("default virtualbox running /home/u/app", Some(MachineStatus::Running)),
            ("default virtualbox suspended /home/u/app", Some(MachineStatus::Suspended)),
            ("default virtualbox not created /home/u/app", Some(MachineStatus::Halted)),
            ("default virtualbox poweroff /home/u/app", None),
            ("default virtualbox aborted /home/u/app", None),
            ("", None),
            // rule order decides between keywords on one line
            ("default running-suspended /srv", Some(MachineStatus::Running)),
        ];

        for (line, expected) in cases {
            assert_eq!(classifier.classify(line), expected, "line: {:?}", line);
        }
    }

    #[test]
    fn test_custom_rules() {
        let classifier = KeywordClassifier::with_rules(vec![(
            "poweroff".to_string(),
            MachineStatus::Halted,
        )]);
        assert_eq!(classifier.classify("vm poweroff"), Some(MachineStatus::Halted));
        assert_eq!(classifier.classify("vm running"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(MachineStatus::Unknown.to_string(), "");
        assert_eq!(MachineStatus::Running.to_string(), "running");
        assert_eq!(MachineStatus::Suspended.to_string(), "suspended");
        assert_eq!(MachineStatus::Halted.to_string(), "halted");
        assert!(!MachineStatus::default().is_known());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&MachineStatus::Suspended).unwrap();
        assert_eq!(json, "\"suspended\"");
    }
}
