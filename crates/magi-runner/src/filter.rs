//! Line predicates: noise filters and readiness signals
//!
//! A predicate classifies one cleaned line of terminal output. Predicates are
//! pure: the only permitted side effect is reporting a [`Signal`] through the
//! callback, e.g. a token counter embedded in a status line.
//!
//! Integrations describe their terminal chrome as a [`RuleSet`], an ordered
//! table of named [`NoiseRule`]s, so each rule can be tested on its own and
//! tables can be composed or overridden per integration.

use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Incidental structured value extracted from a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    /// Name of the rule that reported the signal
    pub rule: String,
    /// Extracted value
    pub value: String,
}

/// Classifies a single line of output.
pub trait LineFilter: Send + Sync {
    /// Return true when the line matches. `report` receives side-channel
    /// signals and must not influence the return value.
    fn is_match(&self, line: &str, report: &mut dyn FnMut(Signal)) -> bool;
}

impl<F> LineFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_match(&self, line: &str, _report: &mut dyn FnMut(Signal)) -> bool {
        self(line)
    }
}

/// Shared, dynamically typed filter.
pub type SharedFilter = Arc<dyn LineFilter>;

/// Filter that never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNoise;

impl LineFilter for NoNoise {
    fn is_match(&self, _line: &str, _report: &mut dyn FnMut(Signal)) -> bool {
        false
    }
}

/// How a rule recognises a line.
#[derive(Clone)]
pub enum RuleKind {
    /// Empty or whitespace-only line
    Blank,
    /// Trimmed line equals the text
    Exact(String),
    /// Trimmed line starts with the text
    Prefix(String),
    /// Line contains the text anywhere
    Contains(String),
    /// Line matches the regular expression
    Regex(Regex),
    /// Line consists only of box-drawing characters and whitespace, or is a
    /// bordered row such as `│ > │`
    BoxDrawing,
    /// Line starts with a spinner glyph
    Spinner,
}

impl fmt::Debug for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => write!(f, "Blank"),
            Self::Exact(s) => write!(f, "Exact({:?})", s),
            Self::Prefix(s) => write!(f, "Prefix({:?})", s),
            Self::Contains(s) => write!(f, "Contains({:?})", s),
            Self::Regex(r) => write!(f, "Regex({:?})", r.as_str()),
            Self::BoxDrawing => write!(f, "BoxDrawing"),
            Self::Spinner => write!(f, "Spinner"),
        }
    }
}

const SPINNER_GLYPHS: &[char] = &[
    '⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏', '✻', '✽', '✶', '✳', '✢', '·', '◐', '◓',
    '◑', '◒',
];

fn is_box_char(c: char) -> bool {
    ('\u{2500}'..='\u{257F}').contains(&c) || ('\u{2580}'..='\u{259F}').contains(&c)
}

impl RuleKind {
    fn matches(&self, line: &str) -> bool {
        let trimmed = line.trim();
        match self {
            Self::Blank => trimmed.is_empty(),
            Self::Exact(s) => trimmed == s,
            Self::Prefix(s) => trimmed.starts_with(s.as_str()),
            Self::Contains(s) => line.contains(s.as_str()),
            Self::Regex(r) => r.is_match(line),
            Self::BoxDrawing => {
                if trimmed.is_empty() {
                    return false;
                }
                if trimmed.chars().all(|c| is_box_char(c) || c.is_whitespace()) {
                    return true;
                }
                // Bordered prompt rows carry almost no content between the rails
                let mut chars = trimmed.chars();
                match (chars.next(), chars.next_back()) {
                    (Some(first), Some(last)) if is_box_char(first) && is_box_char(last) => {
                        let inner: String = chars.collect();
                        let inner = inner.trim();
                        inner.is_empty() || inner == ">"
                    }
                    _ => false,
                }
            }
            Self::Spinner => trimmed
                .chars()
                .next()
                .is_some_and(|c| SPINNER_GLYPHS.contains(&c)),
        }
    }
}

/// A named entry in a [`RuleSet`].
#[derive(Debug, Clone)]
pub struct NoiseRule {
    /// Rule name, unique within a set
    pub name: String,
    /// Matching strategy
    pub kind: RuleKind,
    /// Optional regex whose first capture group is reported as a signal
    pub signal: Option<Regex>,
}

impl NoiseRule {
    /// Create a rule without signal extraction.
    pub fn new(name: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            name: name.into(),
            kind,
            signal: None,
        }
    }

    /// Rule matching blank lines.
    pub fn blank() -> Self {
        Self::new("blank", RuleKind::Blank)
    }

    /// Rule matching box-drawing borders.
    pub fn box_drawing() -> Self {
        Self::new("box_drawing", RuleKind::BoxDrawing)
    }

    /// Rule matching spinner lines.
    pub fn spinner() -> Self {
        Self::new("spinner", RuleKind::Spinner)
    }

    /// Rule matching an exact trimmed line.
    pub fn exact(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, RuleKind::Exact(text.into()))
    }

    /// Rule matching a trimmed prefix.
    pub fn prefix(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, RuleKind::Prefix(text.into()))
    }

    /// Rule matching a substring.
    pub fn contains(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, RuleKind::Contains(text.into()))
    }

    /// Rule matching a regular expression.
    pub fn regex(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::new(name, RuleKind::Regex(Regex::new(pattern)?)))
    }

    /// Attach a signal extractor; the first capture group becomes the value.
    pub fn with_signal(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.signal = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Test a line against this rule, reporting any signal it carries.
    pub fn check(&self, line: &str, report: &mut dyn FnMut(Signal)) -> bool {
        if !self.kind.matches(line) {
            return false;
        }
        if let Some(re) = &self.signal {
            if let Some(value) = re.captures(line).and_then(|c| c.get(1)) {
                report(Signal {
                    rule: self.name.clone(),
                    value: value.as_str().to_string(),
                });
            }
        }
        true
    }
}

/// Ordered table of named rules; a line matches when any rule matches.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<NoiseRule>,
}

impl RuleSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule, replacing any existing rule with the same name in place.
    #[must_use]
    pub fn with(mut self, rule: NoiseRule) -> Self {
        if let Some(existing) = self.rules.iter_mut().find(|r| r.name == rule.name) {
            *existing = rule;
        } else {
            self.rules.push(rule);
        }
        self
    }

    /// Remove a rule by name.
    #[must_use]
    pub fn without(mut self, name: &str) -> Self {
        self.rules.retain(|r| r.name != name);
        self
    }

    /// Append every rule of `other`, with `other` winning on name clashes.
    #[must_use]
    pub fn extend(self, other: RuleSet) -> Self {
        other.rules.into_iter().fold(self, RuleSet::with)
    }

    /// Name of the first rule matching the line, without reporting signals.
    #[must_use]
    pub fn matching_rule(&self, line: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|r| r.kind.matches(line))
            .map(|r| r.name.as_str())
    }

    /// Rule names in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Wrap into a shared filter.
    #[must_use]
    pub fn shared(self) -> SharedFilter {
        Arc::new(self)
    }
}

impl LineFilter for RuleSet {
    fn is_match(&self, line: &str, report: &mut dyn FnMut(Signal)) -> bool {
        self.rules.iter().any(|rule| rule.check(line, report))
    }
}

/// Rules shared by most interactive TUIs: blank lines, borders, spinners.
#[must_use]
pub fn terminal_chrome() -> RuleSet {
    RuleSet::new()
        .with(NoiseRule::blank())
        .with(NoiseRule::box_drawing())
        .with(NoiseRule::spinner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_report() -> impl FnMut(Signal) {
        |_| {}
    }

    #[test]
    fn test_closure_is_filter() {
        let filter = |line: &str| line.starts_with('#');
        let mut report = no_report();
        assert!(filter.is_match("# comment", &mut report));
        assert!(!filter.is_match("code", &mut report));
    }

    #[test]
    fn test_box_drawing_rule() {
        let rule = NoiseRule::box_drawing();
        let mut report = no_report();
        assert!(rule.check("╭──────────────╮", &mut report));
        assert!(rule.check("│ >            │", &mut report));
        assert!(rule.check("  ───  ", &mut report));
        assert!(!rule.check("│ fn main() {} │", &mut report));
        assert!(!rule.check("", &mut report));
    }

    #[test]
    fn test_spinner_rule() {
        let rule = NoiseRule::spinner();
        let mut report = no_report();
        assert!(rule.check("⠋ Thinking...", &mut report));
        assert!(rule.check("  ✻ Pondering…", &mut report));
        assert!(!rule.check("Thinking...", &mut report));
    }

    #[test]
    fn test_signal_reported_without_changing_result() {
        let rule = NoiseRule::contains("interrupt", "esc to interrupt")
            .with_signal(r"(\d+) tokens")
            .unwrap();
        let mut signals = Vec::new();
        let matched = rule.check("(12s · 340 tokens · esc to interrupt)", &mut |s| {
            signals.push(s)
        });
        assert!(matched);
        assert_eq!(
            signals,
            vec![Signal {
                rule: "interrupt".to_string(),
                value: "340".to_string()
            }]
        );

        signals.clear();
        assert!(!rule.check("340 tokens used", &mut |s| signals.push(s)));
        assert!(signals.is_empty());
    }

    #[test]
    fn test_rule_set_composition() {
        let base = terminal_chrome().with(NoiseRule::prefix("prompt", ">"));
        assert_eq!(base.len(), 4);
        assert_eq!(base.matching_rule("   "), Some("blank"));
        assert_eq!(base.matching_rule("> type here"), Some("prompt"));

        let trimmed = base.clone().without("prompt");
        assert_eq!(trimmed.matching_rule("> type here"), None);

        let overridden = base.extend(RuleSet::new().with(NoiseRule::exact("prompt", ">")));
        assert_eq!(overridden.len(), 4);
        assert_eq!(overridden.matching_rule("> type here"), None);
        assert_eq!(
            overridden.names().collect::<Vec<_>>(),
            vec!["blank", "box_drawing", "spinner", "prompt"]
        );
    }

    #[test]
    fn test_rule_set_any_match() {
        let set = RuleSet::new()
            .with(NoiseRule::exact("tip", "Tip: use /help"))
            .with(NoiseRule::regex("version", r"^v\d+\.\d+").unwrap());
        let mut report = no_report();
        assert!(set.is_match("  Tip: use /help  ", &mut report));
        assert!(set.is_match("v1.2.3", &mut report));
        assert!(!set.is_match("real output", &mut report));
        assert!(!RuleSet::new().is_match("anything", &mut report));
    }
}
