//! Secret redaction for captured output.
//!
//! The gateway is started with provider API keys in its environment and
//! sometimes echoes them. Every line served from the output file goes
//! through [`redact_secrets`] first.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

fn rules() -> &'static [(Regex, &'static str)] {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        let rule = |pattern: &str, replacement: &'static str| {
            // Patterns are literals; a failure here is a programming error caught by tests.
            (Regex::new(pattern).expect("invalid redaction pattern"), replacement)
        };
        vec![
            rule(r"sk-ant-[a-zA-Z0-9\-_]{20,}", "sk-ant-***[REDACTED]***"),
            rule(r"sk-[a-zA-Z0-9]{32,}", "sk-***[REDACTED]***"),
            rule(r"AIza[0-9A-Za-z\-_]{35}", "AIza***[REDACTED]***"),
            rule(r"hf_[a-zA-Z0-9]{30,}", "hf_***[REDACTED]***"),
            rule(r"xox[baprs]-[0-9a-zA-Z\-]{10,48}", "xox-***[REDACTED]***"),
            rule(r"\b[0-9]{8,10}:[a-zA-Z0-9_\-]{35}\b", "***[BOT TOKEN REDACTED]***"),
            rule(r"(Bearer\s+)[a-zA-Z0-9\-_=\.]{20,}", "${1}***[REDACTED]***"),
            rule(r"-----BEGIN [A-Z ]*PRIVATE KEY-----", "[PRIVATE KEY REDACTED]"),
            rule(
                r#"(?i)\b(api_?key|access_?token|secret|password|private_?key)["']?\s*[:=]\s*["']?[a-zA-Z0-9\-_=]+["']?"#,
                "${1}=***[REDACTED]***",
            ),
            rule(r"(?i)\b(key|token|sig|signature)=[a-zA-Z0-9\-_%]+", "${1}=***[REDACTED]***"),
        ]
    })
}

/// Replace known secret shapes in `line`. Borrows when nothing matched.
pub fn redact_secrets(line: &str) -> Cow<'_, str> {
    let mut out = Cow::Borrowed(line);
    for (pattern, replacement) in rules() {
        if pattern.is_match(&out) {
            out = Cow::Owned(pattern.replace_all(&out, *replacement).into_owned());
        }
    }
    out
}
