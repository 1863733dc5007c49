//! Classifier: maps (context, facility, level, program) to the ordered set
//! of output indices a message should be written to.

use crate::config::{Config, GLOBAL};
use crate::facility::{Facility, Level};

fn facility_matches(rule: Facility, message: u8) -> bool {
    match rule {
        Facility::Any => true,
        Facility::Code(code) => code == message,
    }
}

fn level_matches(rule: Level, invert: bool, message: u8) -> bool {
    match rule {
        Level::Any => true,
        Level::Code(code) => {
            if !invert {
                code == message
            } else {
                code != message
            }
        }
    }
}

fn program_matches(rule: &str, message: &str) -> bool {
    rule.is_empty() || rule == message
}

/// Evaluate `context_name`'s rules (falling back to `<global>` if the name
/// is unknown) against a message and return the deduplicated, ordered list
/// of output indices to write to. A matching `omit` rule suppresses its
/// output index for good: it wins over both earlier and later positive
/// matches for the same index. Among positive matches, the first one for a
/// given output decides its place in the returned order.
pub fn classify(config: &Config, context_name: &str, facility: u8, level: u8, program: &str) -> Vec<usize> {
    let context = config
        .find_context(context_name)
        .or_else(|| config.find_context(GLOBAL));

    let context = match context {
        Some(c) => c,
        None => return Vec::new(),
    };

    let mut order: Vec<usize> = Vec::new();
    let mut added: std::collections::HashSet<usize> = std::collections::HashSet::new();
    let mut suppressed: std::collections::HashSet<usize> = std::collections::HashSet::new();

    for rule in &context.rules {
        if !facility_matches(rule.facility, facility) {
            continue;
        }
        if !level_matches(rule.level, rule.level_invert, level) {
            continue;
        }
        if !program_matches(&rule.program, program) {
            continue;
        }
        if rule.omit {
            suppressed.insert(rule.output_index);
        } else if added.insert(rule.output_index) {
            order.push(rule.output_index);
        }
    }

    order.into_iter().filter(|idx| !suppressed.contains(idx)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Context, Output, Rule};
    use std::path::PathBuf;

    fn test_config() -> Config {
        Config {
            outputs: vec![
                Output {
                    name: "stdlog".to_string(),
                    path: PathBuf::from("/tmp/a.log"),
                    max_size: 1024 * 1024,
                    rotations: 1,
                },
                Output {
                    name: "errlog".to_string(),
                    path: PathBuf::from("/tmp/b.log"),
                    max_size: 1024 * 1024,
                    rotations: 1,
                },
            ],
            contexts: vec![Context {
                name: "<global>".to_string(),
                rules: vec![
                    Rule {
                        facility: Facility::Any,
                        level: Level::Any,
                        level_invert: false,
                        program: String::new(),
                        output_index: 0,
                        omit: false,
                    },
                    Rule {
                        facility: Facility::Code(0),
                        level: Level::Any,
                        level_invert: false,
                        program: String::new(),
                        output_index: 0,
                        omit: true,
                    },
                    Rule {
                        facility: Facility::Code(3),
                        level: Level::Code(3),
                        level_invert: false,
                        program: String::new(),
                        output_index: 1,
                        omit: false,
                    },
                ],
                ring_buffer: None,
            }],
        }
    }

    #[test]
    fn default_rule_routes_to_stdlog() {
        let cfg = test_config();
        assert_eq!(classify(&cfg, "<global>", 1, 6, "a"), vec![0]);
    }

    #[test]
    fn later_omit_suppresses_earlier_match() {
        let cfg = test_config();
        // facility=kern(0): rule1 matches stdlog first (positive), but
        // rule2's omit for the same output suppresses it regardless of
        // the earlier positive match.
        assert_eq!(classify(&cfg, "<global>", 0, 3, "k"), Vec::<usize>::new());
    }

    #[test]
    fn unknown_context_falls_back_to_global() {
        let cfg = test_config();
        assert_eq!(classify(&cfg, "nope", 1, 6, "a"), vec![0]);
    }

    #[test]
    fn independent_output_can_still_match() {
        let cfg = test_config();
        assert_eq!(classify(&cfg, "<global>", 3, 3, "daemon"), vec![0, 1]);
    }

    #[test]
    fn classify_is_idempotent() {
        let cfg = test_config();
        let a = classify(&cfg, "<global>", 1, 6, "a");
        let b = classify(&cfg, "<global>", 1, 6, "a");
        assert_eq!(a, b);
    }

    #[test]
    fn level_invert_excludes_the_named_level_only() {
        let cfg = Config {
            outputs: vec![Output {
                name: "stdlog".to_string(),
                path: PathBuf::from("/tmp/a.log"),
                max_size: 1024 * 1024,
                rotations: 1,
            }],
            contexts: vec![Context {
                name: "<global>".to_string(),
                rules: vec![Rule {
                    facility: Facility::Code(1),
                    level: Level::Code(6),
                    level_invert: true,
                    program: String::new(),
                    output_index: 0,
                    omit: false,
                }],
                ring_buffer: None,
            }],
        };
        // level == info(6): inverted match fails, nothing written.
        assert_eq!(classify(&cfg, "<global>", 1, 6, "a"), Vec::<usize>::new());
        // level == err(3): inverted match succeeds.
        assert_eq!(classify(&cfg, "<global>", 1, 3, "a"), vec![0]);
    }
}
