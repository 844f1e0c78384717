//! Log sanitization for patient attributes and secrets.
//!
//! Assessment requests carry health data. Handlers are written to keep raw
//! values out of `info`-level logs, but debug output and error messages can
//! still echo them. Every formatted log line passes through `sanitize()`
//! before it reaches the sink, redacting:
//! - clinical `field=value` / `"field": value` pairs for the feature schema
//! - UUIDs, emails and phone numbers
//! - key material (long hex or base64 runs)
//!
//! Input longer than `GLUCORISK_SANITIZE_MAX_BYTES` (default 16 KiB) is
//! truncated before scanning.

use std::sync::OnceLock;

use regex::{Regex, RegexSet};
use tracing_subscriber::fmt::MakeWriter;

use crate::domain::FEATURE_NAMES;

const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

struct Rule {
    regex: Regex,
    replacement: &'static str,
}

struct Rules {
    any: RegexSet,
    rules: Vec<Rule>,
}

static RULES: OnceLock<Rules> = OnceLock::new();

fn clinical_pair_pattern() -> String {
    let fields = FEATURE_NAMES.join("|");
    // Matches `age=45`, `"bmi": 31.2`, `gender: "female"` and similar.
    format!(r#"(?i)("?\b(?:{fields})\b"?\s*[:=]\s*)("[^"]*"|'[^']*'|[^\s,}}\]]+)"#)
}

fn rules() -> &'static Rules {
    RULES.get_or_init(|| {
        let specs: Vec<(String, &'static str)> = vec![
            (clinical_pair_pattern(), "${1}[REDACTED]"),
            (
                r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}"
                    .to_string(),
                "[REDACTED-UUID]",
            ),
            (
                r"(?i)\b[a-z0-9._%+-]{1,64}@(?:[a-z0-9-]{1,63}\.)+[a-z]{2,}\b".to_string(),
                "[REDACTED-EMAIL]",
            ),
            (
                r"\b(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s][0-9]{3}[-.\s][0-9]{4}\b".to_string(),
                "[REDACTED-PHONE]",
            ),
            (r"\b[0-9a-fA-F]{32,}\b".to_string(), "[REDACTED-KEY]"),
            (r"[A-Za-z0-9+/]{43,}={0,2}".to_string(), "[REDACTED-KEY]"),
        ];

        let any = RegexSet::new(specs.iter().map(|(p, _)| p.as_str())).expect("Valid regex set");
        let rules = specs
            .into_iter()
            .map(|(pattern, replacement)| Rule {
                regex: Regex::new(&pattern).expect("Valid regex"),
                replacement,
            })
            .collect();
        Rules { any, rules }
    })
}

fn max_sanitize_bytes() -> usize {
    std::env::var("GLUCORISK_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

/// Redact sensitive content from a log line.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let rules = rules();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut out = if rules.any.is_match(prefix) {
        let mut result = prefix.to_string();
        for idx in rules.any.matches(prefix).into_iter() {
            let rule = &rules.rules[idx];
            result = rule.regex.replace_all(&result, rule.replacement).into_owned();
        }
        result
    } else {
        prefix.to_string()
    };

    if truncated {
        // Keep the line terminator so the sink stays line-oriented.
        let newline = input.ends_with('\n');
        out.push_str(" [TRUNCATED]");
        if newline {
            out.push('\n');
        }
    }
    out
}

/// `MakeWriter` wrapper that sanitizes each formatted log line.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter {
            inner: self.inner.make_writer(),
            pending: Vec::new(),
        }
    }
}

/// Line-buffering writer produced by [`SanitizingMakeWriter`].
///
/// Complete lines are sanitized and forwarded as they arrive; a trailing
/// partial line is forwarded on flush or drop.
pub struct SanitizingWriter<W: std::io::Write> {
    inner: W,
    pending: Vec<u8>,
}

impl<W: std::io::Write> SanitizingWriter<W> {
    fn forward(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let line = String::from_utf8_lossy(bytes);
        self.inner.write_all(sanitize(&line).as_bytes())
    }

    fn drain_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.forward(&line)?;
        }
        // A single line beyond the sanitizer cap gets cut instead of buffered forever.
        if self.pending.len() > max_sanitize_bytes() {
            let line = std::mem::take(&mut self.pending);
            self.forward(&line)?;
            self.inner.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> std::io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.drain_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.drain_lines()?;
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.forward(&rest)?;
        }
        self.inner.flush()
    }
}

impl<W: std::io::Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        let _ = std::io::Write::flush(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_sanitize_clinical_pairs() {
        let sanitized = sanitize(r#"payload {"age": 45, "bmi":31.2, "gender": "female"}"#);
        assert!(!sanitized.contains("45"));
        assert!(!sanitized.contains("31.2"));
        assert!(!sanitized.contains("female"));
        assert!(sanitized.contains(r#""age": [REDACTED]"#));

        let sanitized = sanitize("assembled blood_glucose_level=140 insulin=80");
        assert_eq!(
            sanitized,
            "assembled blood_glucose_level=[REDACTED] insulin=[REDACTED]"
        );
    }

    #[test]
    fn test_sanitize_leaves_tier_logs_alone() {
        let line = "Assessment complete: risk=MEDIUM RISK percent=42.5";
        assert_eq!(sanitize(line), line);
    }

    #[test]
    fn test_sanitize_identifiers() {
        let sanitized = sanitize("request 550e8400-e29b-41d4-a716-446655440000 from jane@clinic.org");
        assert!(sanitized.contains("[REDACTED-UUID]"));
        assert!(sanitized.contains("[REDACTED-EMAIL]"));
        assert!(!sanitized.contains("jane"));
    }

    #[test]
    fn test_sanitize_key_material() {
        let sanitized = sanitize("seed 0123456789abcdef0123456789abcdef0123");
        assert!(sanitized.contains("[REDACTED-KEY]"));

        let sanitized = sanitize("pub v3Jk0q9S1b8mZpQx7Lr2Tn4Wc6Hy5Ge0Fd1Sa3Qw9Er8=");
        assert!(sanitized.contains("[REDACTED-KEY]"));
    }

    #[test]
    fn test_sanitize_truncates_large_inputs() {
        let sanitized = sanitize_with_limit("aaaaaaaaaaaaaaaaaaaaaaaa\n", 8);
        assert_eq!(sanitized, "aaaaaaaa [TRUNCATED]\n");
        // Never splits a multibyte character.
        let _ = sanitize_with_limit("ééééé", 3);
    }

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_sanitizes_lines_across_writes() {
        let sink = Sink::default();
        let make = SanitizingMakeWriter::new({
            let sink = sink.clone();
            move || sink.clone()
        });
        {
            let mut writer = make.make_writer();
            writer.write_all(b"normalized age=").expect("write");
            writer.write_all(b"52 ok\npartial").expect("write");
        }
        let out = String::from_utf8(sink.0.lock().expect("lock").clone()).expect("utf8");
        assert_eq!(out, "normalized age=[REDACTED] ok\npartial");
    }
}
