use crate::config::Config;
use regex::Regex;
use std::ops::RangeInclusive;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Characters between which OCR spacing is dropped: hiragana あ..ん,
/// katakana ア..ン and the CJK unified ideographs 一..鿐.
pub const CJK_RANGES: [RangeInclusive<char>; 3] = [
    '\u{3042}'..='\u{3093}',
    '\u{30A2}'..='\u{30F3}',
    '\u{4E00}'..='\u{9FD0}',
];

/// Unicode White_Space plus the ASCII separators U+001C..U+001F, which
/// Python's `str.isspace` also treats as whitespace.
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\x1C-\x1F]+").expect("failed to compile regex"));

/// Normalize the concatenated OCR output of a job.
pub fn normalize(cfg: &Config, text: &str) -> String {
    let mut out = if cfg.normalize.unicode_nfkc {
        text.nfkc().collect::<String>()
    } else {
        text.to_string()
    };

    if cfg.normalize.remove_newlines {
        out = remove_newlines(&out);
    }

    if cfg.normalize.collapse_cjk_whitespace {
        out = collapse_cjk_whitespace(&out);
    }

    out
}

pub fn remove_newlines(s: &str) -> String {
    s.replace('\n', "")
}

pub fn is_cjk(ch: char) -> bool {
    CJK_RANGES.iter().any(|r| r.contains(&ch))
}

/// Drop every maximal whitespace run that sits between two CJK characters.
///
/// Runs touching a non-CJK character, or the start/end of the text, are kept
/// as-is. Removing a run never changes the neighbours of another run, so the
/// transform is idempotent.
pub fn collapse_cjk_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last = 0;

    for m in WHITESPACE_RUN.find_iter(s) {
        out.push_str(&s[last..m.start()]);

        let before = s[..m.start()].chars().next_back();
        let after = s[m.end()..].chars().next();
        let between_cjk = matches!((before, after), (Some(b), Some(a)) if is_cjk(b) && is_cjk(a));
        if !between_cjk {
            out.push_str(m.as_str());
        }

        last = m.end();
    }

    out.push_str(&s[last..]);
    out
}
