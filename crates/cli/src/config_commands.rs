use std::path::Path;

use anyhow::Result;

use relay_config::{
    RelayConfig, Severity, ValidationResult,
    validate::{self, Diagnostic},
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Validate the config file, then the settings the relay would actually run
/// with (file, environment and flags merged). Exits non-zero on errors.
pub fn check(path: Option<&Path>, effective: &RelayConfig, verbose: bool) -> Result<()> {
    let file = validate::validate(path);

    if let Some(ref path) = file.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults and environment.\n");
    }

    let diagnostics = merge(file, validate::validate_config(effective));

    let mut shown = 0;
    for d in &diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }
        print_diagnostic(d);
        shown += 1;
    }

    let errors = count(&diagnostics, Severity::Error);
    let warnings = count(&diagnostics, Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// File diagnostics cover syntax and unknown fields; delivery semantics come
/// from the merged config so an env-provided webhook URL counts.
fn merge(file: ValidationResult, effective: ValidationResult) -> Vec<Diagnostic> {
    file.diagnostics
        .into_iter()
        .filter(|d| d.category != "delivery")
        .chain(effective.diagnostics)
        .collect()
}

fn count(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity == severity).count()
}

fn print_diagnostic(d: &Diagnostic) {
    let (color, label) = match d.severity {
        Severity::Error => (RED, "error"),
        Severity::Warning => (YELLOW, "warning"),
        Severity::Info => (CYAN, "info"),
    };

    if d.path.is_empty() {
        eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
    } else {
        eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostic(category: &'static str, path: &str) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            category,
            path: path.into(),
            message: String::new(),
        }
    }

    #[test]
    fn delivery_findings_come_from_the_effective_config() {
        let file = ValidationResult {
            diagnostics: vec![
                diagnostic("delivery", "webhook.url"),
                diagnostic("unknown-field", "webhok"),
            ],
            config_path: None,
        };
        let effective = ValidationResult {
            diagnostics: vec![],
            config_path: None,
        };
        let merged = merge(file, effective);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].path, "webhok");
    }
}
