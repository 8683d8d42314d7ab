//! Aggregation configuration: field rules plus the windowing directive.
//!
//! The engine consumes an already-resolved [`AggSpec`]. For callers holding
//! the textual form, [`AggSpec::parse`] is a stateless parser over the
//! classic option-string syntax (`-k SRC_IP -s BYTES -t p:60`), invoked once
//! per configuration load.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::record::{TIME_FIRST_FIELD, TIME_LAST_FIELD};
use crate::reduce::AggOp;

/// Timeout applied when the windowing directive is absent or malformed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ── Windowing directive ───────────────────────────────────────────────────────

/// Windowing policy, fixed for the lifetime of one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowConfig {
    /// Window closes when a new record for the key arrives more than
    /// `timeout` after the group's window start. Checked on the ingestion
    /// path only; no background activity.
    Active { timeout: Duration },
    /// Window closes when no record for the key has been seen for longer
    /// than `timeout`, measured against a shared logical clock advanced by
    /// a background sweep.
    Passive { timeout: Duration },
    /// Every group is flushed unconditionally each `period`.
    Global { period: Duration },
    /// Active and Passive combined, each with its own threshold.
    Mixed { active: Duration, passive: Duration },
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::Active {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl WindowConfig {
    /// The active-rollover threshold applied during ingestion, if any.
    pub fn active_timeout(self) -> Option<Duration> {
        match self {
            Self::Active { timeout } => Some(timeout),
            Self::Mixed { active, .. } => Some(active),
            Self::Passive { .. } | Self::Global { .. } => None,
        }
    }

    /// Parse a windowing directive: `a:30`, `p:30`, `g:30`, `m:10,60`, or a
    /// bare `30` (active). Malformed input or a non-positive timeout is
    /// non-fatal: the default policy is kept and a diagnostic logged.
    pub fn parse_directive(input: &str) -> Self {
        match Self::try_parse_directive(input.trim()) {
            Some(window) => window,
            None => {
                warn!(directive = input, "malformed windowing directive, using default");
                Self::default()
            }
        }
    }

    fn try_parse_directive(input: &str) -> Option<Self> {
        let secs = |s: &str| -> Option<Duration> {
            let n: u64 = s.trim().parse().ok()?;
            (n > 0).then(|| Duration::from_secs(n))
        };

        let Some((kind, rest)) = input.split_once(':') else {
            // Bare seconds keep the default (active) policy.
            return Some(Self::Active { timeout: secs(input)? });
        };

        match kind.trim() {
            "a" | "A" => Some(Self::Active { timeout: secs(rest)? }),
            "p" | "P" => Some(Self::Passive { timeout: secs(rest)? }),
            "g" | "G" => Some(Self::Global { period: secs(rest)? }),
            "m" | "M" => {
                let (active, passive) = rest.split_once(',')?;
                Some(Self::Mixed {
                    active: secs(active)?,
                    passive: secs(passive)?,
                })
            }
            _ => None,
        }
    }
}

// ── Field rules ───────────────────────────────────────────────────────────────

/// One configured field: its name and the operator applied to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: String,
    pub op: AggOp,
}

impl FieldRule {
    pub fn new(field: impl Into<String>, op: AggOp) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }

    /// Name this rule contributes to the output schema. Count-distinct
    /// materializes a derived field so the source field stays available to
    /// other rules.
    pub fn output_name(&self) -> String {
        match self.op {
            AggOp::CountDistinct => format!("DISTINCT_{}", self.field),
            _ => self.field.clone(),
        }
    }
}

/// Complete resolved configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggSpec {
    pub rules: Vec<FieldRule>,
    pub window: WindowConfig,
}

impl AggSpec {
    pub fn new(rules: Vec<FieldRule>, window: WindowConfig) -> Self {
        Self { rules, window }
    }

    /// Parse the option-string configuration syntax.
    ///
    /// Field flags: `-k` key, `-s` sum, `-a` avg, `-m` min, `-M` max,
    /// `-f` first, `-l` last, `-o` bitwise-or, `-n` bitwise-and,
    /// `-c` count-distinct, `-r` rate; each takes a field name. `-t` takes
    /// the windowing directive. Unknown flags are skipped with a
    /// diagnostic; a flag missing its argument is an error.
    pub fn parse(input: &str) -> Result<Self> {
        let mut rules: Vec<FieldRule> = Vec::new();
        let mut window = WindowConfig::default();

        let mut tokens = input.split_whitespace();
        while let Some(flag) = tokens.next() {
            let Some(short) = flag.strip_prefix('-') else {
                bail!("expected an option flag, got {flag:?}");
            };
            let Some(arg) = tokens.next() else {
                bail!("option -{short} is missing its argument");
            };

            let op = match short {
                "t" => {
                    window = WindowConfig::parse_directive(arg);
                    continue;
                }
                "k" => AggOp::Key,
                "s" => AggOp::Sum,
                "a" => AggOp::Avg,
                "m" => AggOp::Min,
                "M" => AggOp::Max,
                "f" => AggOp::First,
                "l" => AggOp::Last,
                "o" => AggOp::BitOr,
                "n" => AggOp::BitAnd,
                "c" => AggOp::CountDistinct,
                "r" => AggOp::Rate,
                other => {
                    warn!(flag = other, "unknown option flag, skipped");
                    continue;
                }
            };

            let rule = FieldRule::new(arg, op);
            if arg == TIME_FIRST_FIELD || arg == TIME_LAST_FIELD {
                warn!(field = arg, "window bound fields cannot carry rules, skipped");
                continue;
            }
            if rules.iter().any(|r| r.output_name() == rule.output_name()) {
                warn!(field = arg, "field already assigned, skipped");
                continue;
            }
            rules.push(rule);
        }

        Ok(Self { rules, window })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_spec() {
        let spec = AggSpec::parse("-k SRC_IP -k DST_IP -s BYTES -a PKTS -t p:60").unwrap();
        assert_eq!(spec.rules.len(), 4);
        assert_eq!(spec.rules[0], FieldRule::new("SRC_IP", AggOp::Key));
        assert_eq!(spec.rules[2], FieldRule::new("BYTES", AggOp::Sum));
        assert_eq!(
            spec.window,
            WindowConfig::Passive {
                timeout: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn test_parse_missing_argument_is_error() {
        assert!(AggSpec::parse("-k").is_err());
        assert!(AggSpec::parse("SRC_IP -k").is_err());
    }

    #[test]
    fn test_parse_skips_duplicates_and_window_bounds() {
        let spec = AggSpec::parse("-k SRC_IP -s SRC_IP -s TIME_LAST -s BYTES").unwrap();
        let names: Vec<_> = spec.rules.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(names, vec!["SRC_IP", "BYTES"]);
    }

    #[test]
    fn test_distinct_coexists_with_other_rule_on_same_field() {
        let spec = AggSpec::parse("-s PORT -c PORT").unwrap();
        assert_eq!(spec.rules.len(), 2);
        assert_eq!(spec.rules[1].output_name(), "DISTINCT_PORT");
    }

    #[test]
    fn test_directive_forms() {
        assert_eq!(
            WindowConfig::parse_directive("a:30"),
            WindowConfig::Active {
                timeout: Duration::from_secs(30)
            }
        );
        assert_eq!(
            WindowConfig::parse_directive("G:5"),
            WindowConfig::Global {
                period: Duration::from_secs(5)
            }
        );
        assert_eq!(
            WindowConfig::parse_directive("m:10,60"),
            WindowConfig::Mixed {
                active: Duration::from_secs(10),
                passive: Duration::from_secs(60)
            }
        );
        assert_eq!(
            WindowConfig::parse_directive("45"),
            WindowConfig::Active {
                timeout: Duration::from_secs(45)
            }
        );
    }

    #[test]
    fn test_malformed_directive_falls_back_to_default() {
        for bad in ["x:30", "p:0", "p:-5", "m:10", "m:10,", "p:abc", ""] {
            assert_eq!(WindowConfig::parse_directive(bad), WindowConfig::default());
        }
    }
}
