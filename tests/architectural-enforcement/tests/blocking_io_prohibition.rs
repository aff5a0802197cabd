//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Production code in mealagent-core and mealagent-cli MUST NOT
//! use blocking I/O from async code.
//! **Required**: Use `tokio::fs`, `tokio::net`, `tokio::process` and async
//! `reqwest`, not `std::fs`, `std::net`, `std::process` or `reqwest::blocking`.
//!
//! Blocking calls are tolerated in non-async functions (configuration is
//! loaded before any workflow runs) and in test code.

use std::fs;
use std::path::Path;

use architectural_enforcement::production_source_dirs;

/// Test that production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_production_code() {
    let violations = find_blocking_io_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }

        eprintln!("\n❌ FORBIDDEN blocking I/O:");
        eprintln!("  - std::fs::read(), std::fs::write(), std::fs::File");
        eprintln!("  - std::net::TcpStream, std::net::TcpListener");
        eprintln!("  - std::process::Command::output()");
        eprintln!("  - reqwest::blocking::*");
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::fs::read().await, tokio::fs::write().await");
        eprintln!("  - reqwest::Client::get().send().await");
        eprintln!("\n✅ ACCEPTABLE blocking I/O:");
        eprintln!("  - Non-async functions (configuration loading)");
        eprintln!("  - Test code");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

/// Test that the scan actually reads the workspace sources
#[test]
fn test_scan_covers_workspace_sources() {
    let files: usize = production_source_dirs()
        .iter()
        .map(|dir| rust_files(dir).len())
        .sum();

    assert!(files >= 10, "expected to scan the workspace, found {files} files");
}

/// Find all blocking I/O calls in production code
fn find_blocking_io_violations() -> Vec<String> {
    let mut violations = Vec::new();

    for dir in production_source_dirs() {
        for file in rust_files(&dir) {
            check_file(&file, &mut violations);
        }
    }

    violations
}

fn rust_files(dir: &Path) -> Vec<std::path::PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.path().to_path_buf())
        .collect()
}

fn check_file(path: &Path, violations: &mut Vec<String>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };

    let lines: Vec<&str> = content.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        let line_number = idx + 1;

        // Skip comments
        let code_part = line.split("//").next().unwrap_or(line);

        if is_in_test_code(&lines, idx) || is_in_non_async_function(&lines, idx) {
            continue;
        }

        let mut flag = |kind: &str| {
            violations.push(format!(
                "{}:{} - {}: {}",
                path.display(),
                line_number,
                kind,
                line.trim()
            ));
        };

        if code_part.contains("std::fs::") || code_part.contains("use std::fs") {
            flag("Blocking file I/O");
        }

        if code_part.contains("std::net::") || code_part.contains("use std::net") {
            flag("Blocking network I/O");
        }

        if code_part.contains("std::process::Command") {
            flag("Blocking process I/O");
        }

        if code_part.contains("reqwest::blocking") {
            flag("Blocking HTTP client");
        }

        if (code_part.contains("std::io::stdin()") || code_part.contains("std::io::stdout()"))
            && is_in_async_function(&lines, idx)
        {
            flag("Blocking stdin/stdout in async");
        }
    }
}

/// Whether a trimmed line opens a function
fn is_fn_line(line: &str) -> bool {
    line.starts_with("fn ")
        || line.starts_with("pub fn ")
        || line.starts_with("pub(crate) fn ")
        || line.starts_with("async fn ")
        || line.starts_with("pub async fn ")
        || line.starts_with("pub(crate) async fn ")
        || line.contains(" fn ")
}

fn is_module_boundary(line: &str) -> bool {
    line.starts_with("mod ") || (line.starts_with("impl ") && line.contains('{'))
}

/// Check if line is inside a test function or a `#[cfg(test)]` module
fn is_in_test_code(lines: &[&str], current_idx: usize) -> bool {
    if lines[..current_idx]
        .iter()
        .any(|l| l.trim().starts_with("#[cfg(test)]"))
    {
        return true;
    }

    let Some(fn_idx) = (0..current_idx).rev().find(|&i| is_fn_line(lines[i].trim())) else {
        return false;
    };

    for i in (0..fn_idx).rev() {
        let line = lines[i].trim();

        if line.starts_with("#[test]") || line.starts_with("#[tokio::test") {
            return true;
        }

        if line.is_empty() || is_fn_line(line) || is_module_boundary(line) || line == "}" {
            break;
        }
    }

    false
}

/// Check if line is inside an async function
fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();

        if line.contains("async fn ") {
            return true;
        }

        if is_fn_line(line) {
            return false;
        }

        if is_module_boundary(line) {
            return false;
        }
    }
    false
}

/// Check if line is inside a non-async function (acceptable for blocking I/O)
fn is_in_non_async_function(lines: &[&str], current_idx: usize) -> bool {
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();

        if line.contains("async fn ") {
            return false;
        }

        if is_fn_line(line) {
            return true;
        }

        if is_module_boundary(line) {
            return false;
        }
    }
    false
}

mod detector {
    use super::*;

    #[test]
    fn test_blocking_io_detection() {
        let code = vec![
            "async fn bad_function() {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];

        assert!(is_in_async_function(&code, 1), "Should detect async function");
        assert!(
            !is_in_non_async_function(&code, 1),
            "Should not be in non-async function"
        );
    }

    #[test]
    fn test_pub_non_async_function_detection() {
        let code = vec![
            "pub fn load_config_from_path(path: Option<PathBuf>) -> Result<Config, ConfigError> {",
            "    let contents = std::fs::read_to_string(path)?;",
            "}",
        ];

        assert!(
            is_in_non_async_function(&code, 1),
            "Should detect pub non-async function"
        );
    }

    #[test]
    fn test_pub_async_method_detection() {
        let code = vec![
            "impl Checkpointer for FileCheckpointer {",
            "    pub async fn save(&self) -> Result<(), CheckpointError> {",
            "        std::fs::write(&self.path, b\"{}\")?;",
            "    }",
            "}",
        ];

        assert!(is_in_async_function(&code, 2));
        assert!(!is_in_non_async_function(&code, 2));
    }

    #[test]
    fn test_test_function_detection() {
        let code = vec![
            "#[tokio::test]",
            "async fn test_something() {",
            "    let contents = std::fs::read_to_string(\"test.txt\")?;",
            "}",
        ];

        assert!(is_in_test_code(&code, 2), "Should detect test function");
    }

    #[test]
    fn test_test_module_detection() {
        let code = vec![
            "pub async fn load() {}",
            "",
            "#[cfg(test)]",
            "mod tests {",
            "    async fn write_fixture() {",
            "        std::fs::write(\"x\", b\"\").unwrap();",
            "    }",
            "}",
        ];

        assert!(!is_in_test_code(&code, 0));
        assert!(is_in_test_code(&code, 5), "Should detect test module");
    }
}
