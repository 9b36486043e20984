use crate::ir::{LogDigest, LogEntry, Severity};

/// Extracts errors, warnings and bad boxes from a complete log.
///
/// Handles both classic `! message` errors (followed by an `l.<n>` line
/// reference) and the `file:line: message` form produced with
/// `-file-line-error`.
pub fn digest(log: &str) -> LogDigest {
    let mut entries: Vec<LogEntry> = Vec::new();
    // Index of the last error still waiting for its `l.<n>` reference.
    let mut awaiting_line_ref: Option<usize> = None;

    for raw in log.lines() {
        let line = raw.trim_end();

        if let Some(message) = line.strip_prefix('!') {
            entries.push(LogEntry::new(Severity::Error, message.trim()));
            awaiting_line_ref = Some(entries.len() - 1);
            continue;
        }

        if let Some(idx) = awaiting_line_ref {
            if let Some(number) = parse_line_ref(line) {
                let entry = &mut entries[idx];
                entry.line.get_or_insert(number);
                awaiting_line_ref = None;
                continue;
            }
        }

        if let Some((file, number, message)) = split_file_line(line) {
            entries.push(LogEntry {
                severity: Severity::Error,
                message: message.to_string(),
                file: Some(file.to_string()),
                line: Some(number),
            });
            awaiting_line_ref = Some(entries.len() - 1);
            continue;
        }

        if is_warning(line) {
            entries.push(LogEntry::new(Severity::Warning, line.trim()));
            continue;
        }

        if line.starts_with("Overfull \\") || line.starts_with("Underfull \\") {
            let mut entry = LogEntry::new(Severity::BadBox, line.trim());
            entry.line = badbox_line(line);
            entries.push(entry);
        }
    }

    LogDigest { entries }
}

fn is_warning(line: &str) -> bool {
    (line.starts_with("LaTeX ") || line.starts_with("Package ") || line.starts_with("Class "))
        && line.contains("Warning:")
}

/// `l.42 \foo` -> 42
fn parse_line_ref(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("l.")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// `./doc.tex:12: Undefined control sequence.` -> ("./doc.tex", 12, "Undefined control sequence.")
fn split_file_line(line: &str) -> Option<(&str, u32, &str)> {
    for (colon, _) in line.match_indices(':') {
        let file = &line[..colon];
        if file.is_empty() || file.contains(char::is_whitespace) {
            return None;
        }
        let after = &line[colon + 1..];
        let digits_len = after.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits_len == 0 {
            continue;
        }
        if let Some(message) = after[digits_len..].strip_prefix(": ") {
            let number = after[..digits_len].parse().ok()?;
            return Some((file, number, message.trim()));
        }
    }
    None
}

/// `... in paragraph at lines 12--14` -> 12
fn badbox_line(line: &str) -> Option<u32> {
    let (_, rest) = line.split_once("at lines ")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
