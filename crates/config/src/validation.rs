//! Entry registry validation utilities

use crate::entry::Entry;
use std::collections::HashMap;

/// Validator for a list of configuration entries
///
/// Empty flags are reported as errors; the resolver rejects them itself when
/// binding or registering flags. Duplicates are warnings: resolution keeps
/// the first flag registration and later defaults replace earlier ones.
pub struct EntryValidator;

impl EntryValidator {
    /// Validate a complete entry list
    pub fn validate(entries: &[Entry]) -> ValidationReport {
        let mut report = ValidationReport::new();

        Self::validate_flags(entries, &mut report);
        Self::validate_env_keys(entries, &mut report);

        report
    }

    fn validate_flags(entries: &[Entry], report: &mut ValidationReport) {
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (index, entry) in entries.iter().enumerate() {
            if entry.flag.is_empty() {
                report.add_error(
                    &format!("entries[{}].flag", index),
                    "Flag cannot be empty",
                );
                continue;
            }

            let key = entry.flag.to_lowercase();
            if let Some(first) = seen.get(&key) {
                report.add_warning(
                    &entry.flag,
                    &format!("Flag is registered more than once (first at entries[{}])", first),
                );
            } else {
                seen.insert(key, index);
            }
        }
    }

    fn validate_env_keys(entries: &[Entry], report: &mut ValidationReport) {
        let mut owners: HashMap<&str, &str> = HashMap::new();

        for entry in entries.iter().filter(|e| e.has_env_source()) {
            match owners.get(entry.env_key.as_str()) {
                Some(owner) if *owner != entry.flag => {
                    report.add_warning(
                        &entry.env_key,
                        &format!(
                            "Environment variable is shared by flags {} and {}",
                            owner, entry.flag
                        ),
                    );
                }
                Some(_) => {}
                None => {
                    owners.insert(&entry.env_key, &entry.flag);
                }
            }
        }
    }
}

/// Validation report containing errors and warnings
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// A validation issue (error or warning)
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationReport {
    fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn add_error(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// One-line count of the issues, logged after the individual issues
    pub fn summary(&self) -> String {
        format!(
            "Entry registry: {} errors, {} warnings",
            self.errors.len(),
            self.warnings.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::append_builtin_entries;

    #[test]
    fn test_builtin_entries_are_valid() {
        let mut entries = vec![Entry::new("client-id", "", "", "CLIENT_ID")];
        append_builtin_entries(&mut entries);

        let report = EntryValidator::validate(&entries);
        assert!(!report.has_errors());
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_empty_flag_is_an_error() {
        let report = EntryValidator::validate(&[Entry::new("", "x", "", "X")]);
        assert!(report.has_errors());
        assert_eq!(report.errors[0].field, "entries[0].flag");
        assert_eq!(report.summary(), "Entry registry: 1 errors, 0 warnings");
    }

    #[test]
    fn test_duplicate_flag_is_a_warning() {
        let mut entries = vec![Entry::config_file()];
        append_builtin_entries(&mut entries);

        let report = EntryValidator::validate(&entries);
        assert!(!report.has_errors());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].field, "config");
        assert_eq!(report.summary(), "Entry registry: 0 errors, 1 warnings");
    }

    #[test]
    fn test_shared_env_key_is_a_warning() {
        let entries = vec![
            Entry::new("client-id", "", "", "CLIENT"),
            Entry::new("client-name", "", "", "CLIENT"),
        ];

        let report = EntryValidator::validate(&entries);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].field, "CLIENT");
    }
}
