//! `.env` style file loader used before logging and config are initialised.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Apply `KEY=value` lines from `path`; variables already set in the process win.
/// Returns how many variables were applied.
pub fn load(path: &Path) -> Result<usize, String> {
    let file = File::open(path).map_err(|e| format!("failed to open {}: {}", path.display(), e))?;
    let reader = BufReader::new(file);
    let mut applied = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("failed to read {} at line {}: {}", path.display(), index + 1, e))?;
        match parse_line(&line) {
            Ok(Some((key, value))) => {
                // Preserve any value that was already supplied via the process environment.
                if std::env::var_os(&key).is_none() {
                    // Updating process-level environment variables is unsafe on some targets.
                    unsafe {
                        std::env::set_var(key, value);
                    }
                    applied += 1;
                }
            }
            Ok(None) => {}
            Err(e) => {
                return Err(format!("{}:{}: {}", path.display(), index + 1, e));
            }
        }
    }

    Ok(applied)
}

/// One `KEY=value` line. Blank lines and `#` comments yield `None`; `export ` is tolerated.
fn parse_line(line: &str) -> Result<Option<(String, String)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let line = line.strip_prefix("export ").map_or(line, str::trim_start);

    let (key, raw) = line.split_once('=').ok_or("missing '=' in assignment")?;
    let key = key.trim();
    if key.is_empty() {
        return Err("environment variable name cannot be empty".to_string());
    }
    if key.contains(char::is_whitespace) {
        return Err(format!("environment variable name contains whitespace: {}", key));
    }
    Ok(Some((key.to_string(), parse_value(raw.trim())?)))
}

/// Unquoted values end at `#`. Double quotes honour `\n`, `\r`, `\t` and `\<char>`; single quotes are literal.
fn parse_value(raw: &str) -> Result<String, String> {
    let quote = match raw.chars().next() {
        Some(q @ ('"' | '\'')) => q,
        _ => return Ok(raw.split('#').next().unwrap_or_default().trim_end().to_string()),
    };

    let body = &raw[1..];
    let mut value = String::new();
    let mut chars = body.char_indices();
    while let Some((at, c)) = chars.next() {
        if c == '\\' && quote == '"' {
            let (_, escaped) = chars.next().ok_or("unterminated escape sequence in quoted value")?;
            value.push(match escaped {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                other => other,
            });
        } else if c == quote {
            let rest = body[at + 1..].trim();
            if rest.is_empty() || rest.starts_with('#') {
                return Ok(value);
            }
            return Err(format!("unexpected characters after closing {} quote", quote));
        } else {
            value.push(c);
        }
    }
    Err(format!("unterminated {} quoted value", quote))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(line: &str) -> Option<(String, String)> {
        parse_line(line).unwrap()
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        assert_eq!(assignment(""), None);
        assert_eq!(assignment("   # GEMINI_API_KEY=abc"), None);
    }

    #[test]
    fn parses_plain_export_and_inline_comments() {
        assert_eq!(
            assignment("STORE_BACKEND=memory # dev only"),
            Some(("STORE_BACKEND".into(), "memory".into()))
        );
        assert_eq!(
            assignment("export BIND_ADDR = 0.0.0.0:3000"),
            Some(("BIND_ADDR".into(), "0.0.0.0:3000".into()))
        );
        assert_eq!(assignment("GEMINI_API_KEY="), Some(("GEMINI_API_KEY".into(), String::new())));
    }

    #[test]
    fn parses_quoted_values() {
        assert_eq!(
            assignment(r#"DATABASE_URL="postgres://u:p@h/db#x" # note"#),
            Some(("DATABASE_URL".into(), "postgres://u:p@h/db#x".into()))
        );
        assert_eq!(assignment(r#"A="line\nbreak""#), Some(("A".into(), "line\nbreak".into())));
        assert_eq!(assignment("B='raw \\n'"), Some(("B".into(), "raw \\n".into())));
    }

    #[test]
    fn quotes_keep_hashes_and_escaped_quotes() {
        assert_eq!(
            assignment(r#"GEMINI_MODEL="say \"hi\" # not a comment""#),
            Some(("GEMINI_MODEL".into(), "say \"hi\" # not a comment".into()))
        );
        assert_eq!(assignment("C='a#b' # tail"), Some(("C".into(), "a#b".into())));
        assert_eq!(assignment(r#"D="""#), Some(("D".into(), String::new())));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("NO_EQUALS").is_err());
        assert!(parse_line("=value").is_err());
        assert!(parse_line("BAD KEY=1").is_err());
        assert!(parse_line(r#"A="unterminated"#).is_err());
        assert!(parse_line(r#"A="x" trailing"#).is_err());
    }

    #[test]
    fn process_environment_wins() {
        let key = format!("CF_ENV_FILE_TEST_{}", uuid::Uuid::new_v4().simple());
        let path = std::env::temp_dir().join(format!("{}.env", key));
        std::fs::write(&path, format!("{key}=from-file\n{key}_OTHER=2\n")).unwrap();
        unsafe {
            std::env::set_var(&key, "from-process");
        }

        assert_eq!(load(&path).unwrap(), 1);
        assert_eq!(std::env::var(&key).unwrap(), "from-process");
        assert_eq!(std::env::var(format!("{key}_OTHER")).unwrap(), "2");
        let _ = std::fs::remove_file(&path);
    }
}
