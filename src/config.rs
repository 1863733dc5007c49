//! Config Loader: parses the grouped keyed-value configuration file into an
//! immutable `Config` (outputs + contexts). A failed load never propagates
//! past `Config::load`; the caller always gets back a usable configuration,
//! falling back to the hard-coded default on any fatal error (see spec §4.1,
//! §7).

use std::fs;
use std::io::{Error, ErrorKind, Result};
use std::path::PathBuf;

use log::{error, warn};

use crate::facility::{self, Facility, Level};
use crate::util::{clamp_max_size, clamp_rotations, parse_size};

pub const STDLOG: &str = "stdlog";
pub const GLOBAL: &str = "<global>";

pub const MAX_OUTPUT_NAME_LEN: usize = 32;
pub const MAX_CONTEXT_NAME_LEN: usize = 31;
pub const MAX_RULES_PER_CONTEXT: usize = 32;

pub const DEFAULT_MAX_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_ROTATIONS: u32 = 1;
pub const DEFAULT_LOG_PATH: &str = "/var/log/messages";

#[derive(Debug, Clone)]
pub struct Output {
    pub name: String,
    pub path: PathBuf,
    pub max_size: u64,
    pub rotations: u32,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub facility: Facility,
    pub level: Level,
    pub level_invert: bool,
    pub program: String,
    pub output_index: usize,
    pub omit: bool,
}

#[derive(Debug, Clone)]
pub struct RingBufferSpec {
    pub size: u64,
    pub flush_level: u8,
}

#[derive(Debug, Clone)]
pub struct Context {
    pub name: String,
    pub rules: Vec<Rule>,
    pub ring_buffer: Option<RingBufferSpec>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub outputs: Vec<Output>,
    pub contexts: Vec<Context>,
}

impl Config {
    pub fn find_output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| o.name == name)
    }

    pub fn find_context(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name == name)
    }

    /// The hard-coded fallback: one `stdlog` output at the default path, one
    /// `<global>` context with the catch-all rule `*.*,stdlog`.
    pub fn default_config() -> Config {
        Config {
            outputs: vec![Output {
                name: STDLOG.to_string(),
                path: PathBuf::from(DEFAULT_LOG_PATH),
                max_size: DEFAULT_MAX_SIZE,
                rotations: DEFAULT_ROTATIONS,
            }],
            contexts: vec![Context {
                name: GLOBAL.to_string(),
                rules: vec![Rule {
                    facility: Facility::Any,
                    level: Level::Any,
                    level_invert: false,
                    program: String::new(),
                    output_index: 0,
                    omit: false,
                }],
                ring_buffer: None,
            }],
        }
    }

    /// Load the configuration from `path`. Never fails: a fatal parse error
    /// is logged and the default configuration is installed instead.
    pub fn load(path: &std::path::Path) -> Config {
        match load_inner(path) {
            Ok(config) => config,
            Err(e) => {
                error!(
                    "failed to load config from {:?}: {}; falling back to default configuration",
                    path, e
                );
                Config::default_config()
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum GroupKind {
    Output,
    Context,
}

struct Group {
    kind: GroupKind,
    name: String,
    entries: Vec<(String, String)>,
}

fn load_inner(path: &std::path::Path) -> Result<Config> {
    let text = fs::read_to_string(path)?;
    let groups = parse_groups(&text)?;

    let mut outputs: Vec<Output> = Vec::new();
    let mut contexts: Vec<Context> = Vec::new();
    let mut seen_first_output = false;
    let mut seen_first_context = false;

    for group in groups {
        match group.kind {
            GroupKind::Output => {
                if !seen_first_output && group.name != STDLOG {
                    return Err(Error::new(
                        ErrorKind::InvalidData,
                        format!(
                            "first output group must be named '{}', found '{}'",
                            STDLOG, group.name
                        ),
                    ));
                }
                seen_first_output = true;
                if outputs.iter().any(|o| o.name == group.name) {
                    return Err(Error::new(
                        ErrorKind::InvalidData,
                        format!("duplicate output name '{}'", group.name),
                    ));
                }
                let output = parse_output(&group.name, &group.entries)?;
                outputs.push(output);
            }
            GroupKind::Context => {
                if !seen_first_context && group.name != GLOBAL {
                    return Err(Error::new(
                        ErrorKind::InvalidData,
                        format!(
                            "first context group must be named '{}', found '{}'",
                            GLOBAL, group.name
                        ),
                    ));
                }
                seen_first_context = true;
                if contexts.iter().any(|c| c.name == group.name) {
                    return Err(Error::new(
                        ErrorKind::InvalidData,
                        format!("duplicate context name '{}'", group.name),
                    ));
                }
                let context = parse_context(&group.name, &group.entries, &outputs)?;
                contexts.push(context);
            }
        }
    }

    if outputs.is_empty() || outputs[0].name != STDLOG {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "configuration has no 'stdlog' output",
        ));
    }
    if contexts.iter().find(|c| c.name == GLOBAL).is_none() {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "configuration has no '<global>' context",
        ));
    }

    Ok(Config { outputs, contexts })
}

/// Scan the file into an ordered list of `[OUTPUT=name]`/`[CONTEXT=name]`
/// groups, each holding its `key=value` entries. Unknown group headers are
/// warned about and skipped (along with their entries).
fn parse_groups(text: &str) -> Result<Vec<Group>> {
    let mut groups: Vec<Group> = Vec::new();
    let mut current: Option<Group> = None;
    let mut skipping = false;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            if let Some(g) = current.take() {
                groups.push(g);
            }
            skipping = false;

            let header = &line[1..line.len() - 1];
            let mut parts = header.splitn(2, '=');
            let kind_str = parts.next().unwrap_or("");
            let name = parts.next().unwrap_or("").to_string();

            let kind = match kind_str {
                "OUTPUT" => GroupKind::Output,
                "CONTEXT" => GroupKind::Context,
                _ => {
                    warn!("skipping unknown config group '[{}]'", header);
                    skipping = true;
                    continue;
                }
            };
            current = Some(Group {
                kind,
                name,
                entries: Vec::new(),
            });
            continue;
        }

        if skipping {
            continue;
        }

        let mut parts = line.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim().to_string();
        let value = parts.next().unwrap_or("").trim().to_string();
        if key.is_empty() {
            continue;
        }
        match current.as_mut() {
            Some(g) => g.entries.push((key, value)),
            None => warn!("ignoring key '{}' outside of any group", key),
        }
    }
    if let Some(g) = current.take() {
        groups.push(g);
    }
    Ok(groups)
}

fn parse_output(name: &str, entries: &[(String, String)]) -> Result<Output> {
    if name.len() > MAX_OUTPUT_NAME_LEN {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("output name '{}' exceeds {} characters", name, MAX_OUTPUT_NAME_LEN),
        ));
    }

    let mut path: Option<PathBuf> = None;
    let mut max_size = DEFAULT_MAX_SIZE;
    let mut rotations = DEFAULT_ROTATIONS;

    for (key, value) in entries {
        match key.as_str() {
            "File" => {
                if !value.starts_with('/') {
                    return Err(Error::new(
                        ErrorKind::InvalidData,
                        format!("output '{}': File '{}' is not an absolute path", name, value),
                    ));
                }
                path = Some(PathBuf::from(value));
            }
            "MaxSize" => {
                let raw = parse_size(value)?;
                let (clamped, changed) = clamp_max_size(raw);
                if changed {
                    warn!(
                        "output '{}': MaxSize {} out of range, clamped to {}",
                        name, value, clamped
                    );
                }
                max_size = clamped;
            }
            "Rotations" => {
                let raw = value.parse::<i64>().map_err(|_| {
                    Error::new(
                        ErrorKind::InvalidData,
                        format!("output '{}': invalid Rotations '{}'", name, value),
                    )
                })?;
                let (clamped, changed) = clamp_rotations(raw);
                if changed {
                    warn!(
                        "output '{}': Rotations {} out of range, clamped to {}",
                        name, value, clamped
                    );
                }
                rotations = clamped;
            }
            other => warn!("output '{}': ignoring unknown key '{}'", name, other),
        }
    }

    let path = path.ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("output '{}' is missing required key 'File'", name),
        )
    })?;

    Ok(Output {
        name: name.to_string(),
        path,
        max_size,
        rotations,
    })
}

fn parse_context(name: &str, entries: &[(String, String)], outputs: &[Output]) -> Result<Context> {
    if name.len() > MAX_CONTEXT_NAME_LEN {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("context name '{}' exceeds {} characters", name, MAX_CONTEXT_NAME_LEN),
        ));
    }

    let mut rules: Vec<Rule> = Vec::new();
    let mut buffer_size: Option<u64> = None;
    let mut flush_level: Option<u8> = None;

    for (key, value) in entries {
        if let Some(rest) = key.strip_prefix("Rule") {
            if rest.parse::<u32>().is_err() {
                warn!("context '{}': ignoring malformed rule key '{}'", name, key);
                continue;
            }
            continue; // rules are re-scanned below, in numeric order, so duplicates/out-of-order keys don't double count
        }
        match key.as_str() {
            "BufferSize" => buffer_size = Some(parse_size(value)?),
            "FlushLevel" => {
                flush_level = Some(facility::parse_flush_level(value).ok_or_else(|| {
                    Error::new(
                        ErrorKind::InvalidData,
                        format!("context '{}': invalid FlushLevel '{}'", name, value),
                    )
                })?)
            }
            other => warn!("context '{}': ignoring unknown key '{}'", name, other),
        }
    }

    // Rule1, Rule2, ... scanned in sequence until the first missing index,
    // capped at MAX_RULES_PER_CONTEXT.
    let mut index = 1usize;
    loop {
        if rules.len() >= MAX_RULES_PER_CONTEXT {
            warn!(
                "context '{}': rule list exceeds {} entries, ignoring the rest",
                name, MAX_RULES_PER_CONTEXT
            );
            break;
        }
        let key = format!("Rule{}", index);
        let value = match entries.iter().find(|(k, _)| k == &key) {
            Some((_, v)) => v,
            None => break,
        };
        let rule = parse_rule(name, value, outputs)?;
        rules.push(rule);
        index += 1;
    }

    let ring_buffer = match (buffer_size, flush_level) {
        (Some(size), Some(flush_level)) => Some(RingBufferSpec { size, flush_level }),
        (None, None) => None,
        (Some(_), None) => {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("context '{}': BufferSize set without FlushLevel", name),
            ))
        }
        (None, Some(_)) => {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("context '{}': FlushLevel set without BufferSize", name),
            ))
        }
    };

    Ok(Context {
        name: name.to_string(),
        rules,
        ring_buffer,
    })
}

/// Parse a single rule value: `<facility>[.[!]<level>[.<program>]],[-]<outputName>`.
fn parse_rule(context_name: &str, value: &str, outputs: &[Output]) -> Result<Rule> {
    let mut halves = value.splitn(2, ',');
    let filter = halves.next().unwrap_or("");
    let target = halves.next().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("context '{}': rule '{}' is missing ',<outputName>'", context_name, value),
        )
    })?;

    let mut fields = filter.splitn(3, '.');
    let facility_tok = fields.next().unwrap_or("");
    let level_tok = fields.next();
    let program_tok = fields.next();

    let facility = facility::parse_facility(facility_tok).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("context '{}': unknown facility '{}' in rule '{}'", context_name, facility_tok, value),
        )
    })?;

    let (level, level_invert) = match level_tok {
        None => (Level::Any, false),
        Some(tok) => {
            let (invert, tok) = match tok.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, tok),
            };
            let level = facility::parse_level(tok).ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidData,
                    format!("context '{}': unknown level '{}' in rule '{}'", context_name, tok, value),
                )
            })?;
            (level, invert)
        }
    };

    let program = program_tok.unwrap_or("").to_string();

    let (omit, output_name) = match target.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, target),
    };

    let output_index = outputs.iter().position(|o| o.name == output_name).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!(
                "context '{}': rule '{}' references undeclared output '{}'",
                context_name, value, output_name
            ),
        )
    })?;

    Ok(Rule {
        facility,
        level,
        level_invert,
        program,
        output_index,
        omit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_minimal_config() {
        let f = write_temp(
            "[OUTPUT=stdlog]\nFile=/tmp/t.log\n\n[CONTEXT=<global>]\nRule1=*.*,stdlog\n",
        );
        let cfg = Config::load(f.path());
        assert_eq!(cfg.outputs[0].name, STDLOG);
        assert_eq!(cfg.outputs[0].path, PathBuf::from("/tmp/t.log"));
        assert_eq!(cfg.contexts[0].name, GLOBAL);
        assert_eq!(cfg.contexts[0].rules.len(), 1);
    }

    #[test]
    fn falls_back_to_default_on_missing_stdlog() {
        let f = write_temp("[OUTPUT=other]\nFile=/tmp/x.log\n\n[CONTEXT=<global>]\nRule1=*.*,other\n");
        let cfg = Config::load(f.path());
        assert_eq!(cfg.outputs[0].name, STDLOG);
        assert_eq!(cfg.outputs.len(), 1);
    }

    #[test]
    fn falls_back_to_default_on_missing_global() {
        let f = write_temp("[OUTPUT=stdlog]\nFile=/tmp/x.log\n\n[CONTEXT=other]\nRule1=*.*,stdlog\n");
        let cfg = Config::load(f.path());
        assert_eq!(cfg.contexts[0].name, GLOBAL);
    }

    #[test]
    fn clamps_max_size_and_rotations() {
        let f = write_temp(
            "[OUTPUT=stdlog]\nFile=/tmp/t.log\nMaxSize=1\nRotations=99\n\n[CONTEXT=<global>]\nRule1=*.*,stdlog\n",
        );
        let cfg = Config::load(f.path());
        assert_eq!(cfg.outputs[0].max_size, 4 * 1024);
        assert_eq!(cfg.outputs[0].rotations, 9);
    }

    #[test]
    fn rejects_relative_path() {
        let f = write_temp("[OUTPUT=stdlog]\nFile=relative/path.log\n\n[CONTEXT=<global>]\nRule1=*.*,stdlog\n");
        let cfg = Config::load(f.path());
        // falls back to default since the section failed
        assert_eq!(cfg.outputs[0].path, PathBuf::from(DEFAULT_LOG_PATH));
    }

    #[test]
    fn rejects_duplicate_output_name() {
        let f = write_temp(
            "[OUTPUT=stdlog]\nFile=/tmp/a.log\n\n[OUTPUT=stdlog]\nFile=/tmp/b.log\n\n[CONTEXT=<global>]\nRule1=*.*,stdlog\n",
        );
        let cfg = Config::load(f.path());
        // falls back to default since the duplicate name is a fatal load error
        assert_eq!(cfg.outputs.len(), 1);
        assert_eq!(cfg.outputs[0].path, PathBuf::from(DEFAULT_LOG_PATH));
    }

    #[test]
    fn rejects_duplicate_context_name() {
        let f = write_temp(
            "[OUTPUT=stdlog]\nFile=/tmp/a.log\n\n[CONTEXT=<global>]\nRule1=*.*,stdlog\n\n[CONTEXT=<global>]\nRule1=*.*,stdlog\n",
        );
        let cfg = Config::load(f.path());
        assert_eq!(cfg.contexts.len(), 1);
    }

    #[test]
    fn parses_level_invert_and_omit() {
        let f = write_temp(
            "[OUTPUT=stdlog]\nFile=/tmp/t.log\n\n[CONTEXT=<global>]\nRule1=user.!info,stdlog\nRule2=kern.*,-stdlog\n",
        );
        let cfg = Config::load(f.path());
        let rules = &cfg.contexts[0].rules;
        assert_eq!(rules[0].level, Level::Code(6));
        assert!(rules[0].level_invert);
        assert!(!rules[0].omit);
        assert_eq!(rules[1].facility, Facility::Code(0));
        assert!(rules[1].omit);
    }

    #[test]
    fn parses_ring_buffer_spec() {
        let f = write_temp(
            "[OUTPUT=stdlog]\nFile=/tmp/t.log\n\n[CONTEXT=<global>]\nRule1=*.*,stdlog\nBufferSize=16K\nFlushLevel=warning\n",
        );
        let cfg = Config::load(f.path());
        let rb = cfg.contexts[0].ring_buffer.as_ref().unwrap();
        assert_eq!(rb.size, 16 * 1024);
        assert_eq!(rb.flush_level, 4);
    }
}
