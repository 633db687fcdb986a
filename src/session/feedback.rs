//! Structured coaching feedback parsed from the model's reply.
//!
//! The model is prompted to answer with labeled sections (what was heard,
//! grammar notes, pronunciation notes, suggestions, and a practice prompt),
//! in either English or Chinese.  Real model output drifts, so the parser
//! is deliberately forgiving: unknown lines attach to the current section,
//! and a reply with no recognizable labels at all lands in `suggestions`
//! rather than being dropped.

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// One turn's worth of coaching feedback.  Fields the model did not provide
/// are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feedback {
    /// What the model heard (transcription of the learner's speech).
    pub recognition: String,
    /// Grammar corrections and notes.
    pub grammar: String,
    /// Pronunciation corrections and notes.
    pub pronunciation: String,
    /// General improvement suggestions.
    pub suggestions: String,
    /// A follow-up scenario or sentence to practice next.
    pub practice: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Recognition,
    Grammar,
    Pronunciation,
    Suggestions,
    Practice,
}

/// Section labels, longest first so "语音识别" wins over any shorter prefix.
/// Matching is case-insensitive for the Latin labels.
const LABELS: &[(&str, Field)] = &[
    ("语音识别", Field::Recognition),
    ("recognition", Field::Recognition),
    ("transcription", Field::Recognition),
    ("语法", Field::Grammar),
    ("grammar", Field::Grammar),
    ("发音", Field::Pronunciation),
    ("pronunciation", Field::Pronunciation),
    ("改进建议", Field::Suggestions),
    ("suggestions", Field::Suggestions),
    ("场景练习", Field::Practice),
    ("next practice", Field::Practice),
    ("practice", Field::Practice),
];

impl Feedback {
    /// Parse a model reply into sections.  Never fails: unparseable input
    /// becomes a suggestions-only feedback.
    pub fn parse(text: &str) -> Self {
        let mut feedback = Feedback::default();
        let mut current: Option<Field> = None;
        let mut matched_any = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match split_label(line) {
                Some((field, rest)) => {
                    matched_any = true;
                    current = Some(field);
                    if !rest.is_empty() {
                        feedback.append(field, rest);
                    }
                }
                None => {
                    if let Some(field) = current {
                        feedback.append(field, line);
                    }
                }
            }
        }

        if !matched_any {
            let raw = text.trim();
            if !raw.is_empty() {
                feedback.suggestions = raw.to_string();
            }
        }
        feedback
    }

    /// True when every section is empty.
    pub fn is_empty(&self) -> bool {
        self.recognition.is_empty()
            && self.grammar.is_empty()
            && self.pronunciation.is_empty()
            && self.suggestions.is_empty()
            && self.practice.is_empty()
    }

    fn append(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Recognition => &mut self.recognition,
            Field::Grammar => &mut self.grammar,
            Field::Pronunciation => &mut self.pronunciation,
            Field::Suggestions => &mut self.suggestions,
            Field::Practice => &mut self.practice,
        };
        if !slot.is_empty() {
            slot.push('\n');
        }
        slot.push_str(text);
    }
}

/// Try to interpret `line` as a section heading.  Returns the field and the
/// remainder after the label and its separator.
fn split_label(line: &str) -> Option<(Field, &str)> {
    // Models decorate headings with list markers and emphasis; skip those.
    let stripped = line.trim_start_matches(|c: char| {
        c.is_ascii_digit() || matches!(c, '*' | '#' | '-' | '.' | ')' | ' ')
    });

    for &(label, field) in LABELS {
        let matches_label = if label.is_ascii() {
            stripped.len() >= label.len()
                && stripped.is_char_boundary(label.len())
                && stripped[..label.len()].eq_ignore_ascii_case(label)
        } else {
            stripped.starts_with(label)
        };
        if !matches_label {
            continue;
        }
        let after = &stripped[label.len()..];
        // A heading needs a separator (":" or "："), possibly after closing
        // emphasis markers.
        let after = after.trim_start_matches(['*', ' ']);
        if let Some(rest) = after.strip_prefix(':').or_else(|| after.strip_prefix('：')) {
            return Some((field, rest.trim_start_matches(['*', ' ']).trim()));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chinese_labels() {
        let fb = Feedback::parse("语法：OK\n发音：Good");
        assert_eq!(fb.grammar, "OK");
        assert_eq!(fb.pronunciation, "Good");
        assert!(fb.recognition.is_empty());
        assert!(fb.suggestions.is_empty());
        assert!(fb.practice.is_empty());
    }

    #[test]
    fn parses_english_labels_case_insensitively() {
        let text = "Recognition: I goed to school\n\
                    GRAMMAR: say \"went\", not \"goed\"\n\
                    Pronunciation: clear\n\
                    Suggestions: slow down\n\
                    Next practice: describe your weekend";
        let fb = Feedback::parse(text);
        assert_eq!(fb.recognition, "I goed to school");
        assert_eq!(fb.grammar, "say \"went\", not \"goed\"");
        assert_eq!(fb.pronunciation, "clear");
        assert_eq!(fb.suggestions, "slow down");
        assert_eq!(fb.practice, "describe your weekend");
    }

    #[test]
    fn full_chinese_reply() {
        let text = "语音识别：I like coffee\n\
                    语法：正确\n\
                    发音：coffee 的重音在第一个音节\n\
                    改进建议：多用完整句子\n\
                    场景练习：点一杯咖啡";
        let fb = Feedback::parse(text);
        assert_eq!(fb.recognition, "I like coffee");
        assert_eq!(fb.grammar, "正确");
        assert_eq!(fb.pronunciation, "coffee 的重音在第一个音节");
        assert_eq!(fb.suggestions, "多用完整句子");
        assert_eq!(fb.practice, "点一杯咖啡");
    }

    #[test]
    fn continuation_lines_attach_to_current_section() {
        let text = "Grammar: two issues\n- past tense\n- articles\nPronunciation: fine";
        let fb = Feedback::parse(text);
        assert_eq!(fb.grammar, "two issues\n- past tense\n- articles");
        assert_eq!(fb.pronunciation, "fine");
    }

    #[test]
    fn markdown_decorated_headings() {
        let text = "1. **Grammar:** watch your tenses\n2. **Pronunciation**: the \"th\" sound";
        let fb = Feedback::parse(text);
        assert_eq!(fb.grammar, "watch your tenses");
        assert_eq!(fb.pronunciation, "the \"th\" sound");
    }

    #[test]
    fn unlabeled_reply_falls_back_to_suggestions() {
        let fb = Feedback::parse("Great job, keep practicing!");
        assert_eq!(fb.suggestions, "Great job, keep practicing!");
        assert!(fb.grammar.is_empty());
    }

    #[test]
    fn empty_input_is_empty_feedback() {
        assert!(Feedback::parse("").is_empty());
        assert!(Feedback::parse("   \n\n  ").is_empty());
    }

    #[test]
    fn label_without_separator_is_plain_text() {
        // "Grammar is hard" is prose, not a heading.
        let fb = Feedback::parse("Grammar is hard");
        assert_eq!(fb.suggestions, "Grammar is hard");
        assert!(fb.grammar.is_empty());
    }
}
