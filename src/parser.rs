use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;

use crate::cidr::parse_cidr;
use crate::error::{PolicyError, Result};
use crate::policy::RuleSpec;
use crate::types::{
    Action, Direction, Method, Priority, RoleId, TextRule, WorkloadId, PROTO_TCP, PROTO_UDP,
    SERVICE_HTTP,
};

/// Regex pattern for parsing policy rules
/// Format: action(key=value, key=value, ...)
static RULE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([\w\-]+)\s*\((.*)\)$").expect("RULE_PATTERN: hardcoded regex is invalid")
});

/// Maximum nesting depth for `file:` include directives.
const MAX_INCLUDE_DEPTH: usize = 10;

/// Parse policy rules from text.
///
/// Supports `file: /path/to/policy.rules` directive to include rules from an external file.
pub fn parse_rules(text: &str) -> Result<Vec<TextRule>> {
    parse_rules_inner(text, 0)
}

fn parse_rules_inner(text: &str, depth: usize) -> Result<Vec<TextRule>> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(PolicyError::ParseError(format!(
            "file include depth exceeds maximum ({MAX_INCLUDE_DEPTH}), possible circular include"
        )));
    }

    let mut rules = Vec::new();

    for (line_num, line) in text.lines().enumerate() {
        let line_num = line_num + 1;

        // Comments only start at the beginning of a line; `#` may appear in a uri
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(path) = line.strip_prefix("file:") {
            let path = path.trim();
            let file_rules = parse_rules_from_file_inner(path, depth + 1)?;
            rules.extend(file_rules);
            continue;
        }

        let rule = parse_single_rule(line, line_num)?;
        rules.push(rule);
    }

    Ok(rules)
}

/// Parse policy rules from a file.
pub fn parse_rules_from_file(path: impl AsRef<Path>) -> Result<Vec<TextRule>> {
    parse_rules_from_file_inner(path, 0)
}

fn parse_rules_from_file_inner(path: impl AsRef<Path>, depth: usize) -> Result<Vec<TextRule>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        PolicyError::ParseError(format!(
            "Failed to read rules file '{}': {}",
            path.display(),
            e
        ))
    })?;
    parse_rules_inner(&text, depth)
}

/// Parse a single rule line
fn parse_single_rule(line: &str, line_num: usize) -> Result<TextRule> {
    let at_line = |message: String| PolicyError::ParseErrorAtLine {
        line: line_num,
        message,
    };

    let captures = RULE_PATTERN
        .captures(line)
        .ok_or_else(|| at_line(format!("Invalid rule format: {}", line)))?;

    let (name, body) = match (captures.get(1), captures.get(2)) {
        (Some(name), Some(body)) => (name.as_str(), body.as_str()),
        _ => return Err(at_line(format!("Invalid rule format: {}", line))),
    };
    let action =
        Action::from_name(name).ok_or_else(|| at_line(format!("Unknown action: {}", name)))?;

    let mut spec = RuleSpec::default();
    let mut rest = body.trim();
    while !rest.is_empty() {
        // `uri` swallows the rest of the body so patterns may contain commas
        let takes_rest = rest.starts_with("uri") && rest[3..].trim_start().starts_with('=');
        let (field, remainder) = if takes_rest {
            (rest, "")
        } else {
            rest.split_once(',').unwrap_or((rest, ""))
        };
        rest = remainder.trim_start();

        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| at_line(format!("Expected key=value, got '{}'", field.trim())))?;
        apply_field(&mut spec, key.trim(), value.trim()).map_err(at_line)?;
    }

    Ok(TextRule {
        action,
        spec,
        line_num,
    })
}

fn apply_field(spec: &mut RuleSpec, key: &str, value: &str) -> std::result::Result<(), String> {
    match key.to_ascii_lowercase().as_str() {
        "prio" | "priority" => {
            spec.priority =
                Priority::from_name(value).ok_or_else(|| format!("Invalid priority: {}", value))?;
        }
        "cidr" => {
            parse_cidr(value).map_err(|e| e.to_string())?;
            spec.cidr = value.to_string();
        }
        "workload" => spec.workload = parse_optional_id(value)?.map(WorkloadId),
        "role" => spec.role = parse_optional_id(value)?.map(RoleId),
        "group" => {
            let facets: Vec<&str> = value.split('/').map(str::trim).collect();
            let [app, env, loc] = facets.as_slice() else {
                return Err(format!("Group must be app/env/loc: {}", value));
            };
            spec.group.app = parse_optional_id(app)?;
            spec.group.env = parse_optional_id(env)?;
            spec.group.loc = parse_optional_id(loc)?;
        }
        "dir" | "direction" => {
            spec.direction =
                Direction::from_name(value).ok_or_else(|| format!("Invalid direction: {}", value))?;
        }
        "method" => {
            spec.method = match value {
                "*" => None,
                _ => Method::from_name(value)
                    .map(Some)
                    .ok_or_else(|| format!("Invalid method: {}", value))?,
            }
            .filter(|m| m.0 != 0);
        }
        "api" => {
            let (service, protocol, port) = parse_api(value)?;
            spec.service = service;
            spec.protocol = protocol;
            spec.port = port;
        }
        "uri" => {
            spec.uri = match value {
                "" | "*" => None,
                _ => Some(value.to_string()),
            };
        }
        _ => return Err(format!("Unknown field: {}", key)),
    }
    Ok(())
}

/// `*` and `0` are wildcards.
fn parse_optional_id(value: &str) -> std::result::Result<Option<u64>, String> {
    if value == "*" {
        return Ok(None);
    }
    let id: u64 = value
        .parse()
        .map_err(|_| format!("Invalid identifier: {}", value))?;
    Ok((id != 0).then_some(id))
}

/// Parse an `api=` value
/// Examples: "http/tcp/80", "1/6/443", "http/udp/8443"
fn parse_api(spec: &str) -> std::result::Result<(u8, u8, u16), String> {
    let parts: Vec<&str> = spec.split('/').map(str::trim).collect();
    let [service, protocol, port] = parts.as_slice() else {
        return Err(format!("Api must be type/proto/port: {}", spec));
    };

    let service = match service.to_ascii_lowercase().as_str() {
        "http" => SERVICE_HTTP,
        other => other
            .parse()
            .map_err(|_| format!("Unknown service type: {}", service))?,
    };
    let protocol = match protocol.to_ascii_lowercase().as_str() {
        "tcp" => PROTO_TCP,
        "udp" => PROTO_UDP,
        other => other
            .parse()
            .map_err(|_| format!("Unknown protocol: {}", protocol))?,
    };
    let port = port
        .parse()
        .map_err(|_| format!("Invalid port: {}", port))?;

    Ok((service, protocol, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Group;

    #[test]
    fn test_rule_pattern_regex_compiles() {
        assert!(RULE_PATTERN.is_match("pass(cidr=10.0.0.0/8)"));
    }

    #[test]
    fn test_parse_network_rule() {
        let text = "pass(prio=medium, cidr=10.0.0.0/8, dir=ingress, method=get, \
                    api=http/tcp/80, uri=/orders)";
        let rules = parse_rules(text).unwrap();
        assert_eq!(rules.len(), 1);

        let rule = &rules[0];
        assert_eq!(rule.action, Action::Pass);
        assert_eq!(rule.line_num, 1);
        assert_eq!(
            rule.spec,
            RuleSpec::network(Priority::Medium, "10.0.0.0/8")
                .with_direction(Direction::INGRESS)
                .with_method(Method::GET)
                .with_api(SERVICE_HTTP, PROTO_TCP, 80)
                .with_uri("/orders")
        );
    }

    #[test]
    fn test_parse_role_rule_with_wildcards() {
        let text = "drop(role=7, group=1/*/3, dir=egress, method=*, api=1/6/443)";
        let rules = parse_rules(text).unwrap();
        let spec = &rules[0].spec;
        assert_eq!(rules[0].action, Action::Drop);
        assert_eq!(spec.role, Some(RoleId(7)));
        assert_eq!(
            spec.group,
            Group {
                app: Some(1),
                env: None,
                loc: Some(3)
            }
        );
        assert_eq!(spec.method, None);
        assert_eq!(spec.uri, None);
        assert_eq!((spec.service, spec.protocol, spec.port), (1, 6, 443));
    }

    #[test]
    fn test_parse_uri_keeps_commas() {
        let text = "pass(workload=5, uri=/v[0-9]{1,2}/items, more)";
        let rules = parse_rules(text).unwrap();
        assert_eq!(rules[0].spec.workload, Some(WorkloadId(5)));
        assert_eq!(rules[0].spec.uri.as_deref(), Some("/v[0-9]{1,2}/items, more"));
    }

    #[test]
    fn test_parse_defaults() {
        let rules = parse_rules("pass()").unwrap();
        assert_eq!(rules[0].spec, RuleSpec::default());
    }

    #[test]
    fn test_parse_zero_ids_are_wildcards() {
        let rules = parse_rules("pass(workload=0, role=0, group=0/0/0, method=0)").unwrap();
        let spec = &rules[0].spec;
        assert!(!spec.has_identity());
        assert_eq!(spec.group, Group::default());
        assert_eq!(spec.method, None);
    }

    #[test]
    fn test_parse_multiple_rules_and_comments() {
        let text = r#"
# Network rules
pass(cidr=10.0.0.0/8, api=http/tcp/80)
drop(prio=low, cidr=0.0.0.0/0)

# Identity rules
pass(workload=9, uri=/health)
"#;
        let rules = parse_rules(text).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[1].line_num, 4);
        assert_eq!(rules[1].spec.priority, Priority::Low);
        assert_eq!(rules[2].line_num, 7);
    }

    #[test]
    fn test_parse_invalid_rules() {
        for text in [
            "invalid rule format",
            "permit(cidr=10.0.0.0/8)",
            "pass(cidr=10.0.0.0)",
            "pass(cidr=2001:db8::/32)",
            "pass(prio=max)",
            "pass(prio=3)",
            "pass(group=1/2)",
            "pass(api=http/tcp)",
            "pass(api=http/sctp/80)",
            "pass(method=FETCH)",
            "pass(color=blue)",
            "pass(workload)",
        ] {
            assert!(parse_rules(text).is_err(), "should reject: {}", text);
        }
    }

    #[test]
    fn test_parse_error_has_line_number() {
        let text = "pass(cidr=10.0.0.0/8)\npass(cidr=10.0.0.0/99)";
        match parse_rules(text) {
            Err(PolicyError::ParseErrorAtLine { line, message }) => {
                assert_eq!(line, 2);
                assert!(message.contains("exceeds 32"), "got: {}", message);
            }
            other => panic!("expected ParseErrorAtLine, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_file_directive() {
        use std::io::Write;
        let dir = std::env::temp_dir().join("acl_policy_test");
        let _ = fs::create_dir_all(&dir);
        let file_path = dir.join("test_rules.rules");
        let mut f = fs::File::create(&file_path).unwrap();
        writeln!(f, "pass(workload=1)").unwrap();
        writeln!(f, "drop(cidr=10.0.0.0/8)").unwrap();
        drop(f);

        let text = format!(
            "pass(cidr=192.168.0.0/16)\nfile: {}\ndrop(role=2)",
            file_path.display()
        );
        let rules = parse_rules(&text).unwrap();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].spec.cidr, "192.168.0.0/16");
        assert_eq!(rules[1].spec.workload, Some(WorkloadId(1)));
        assert_eq!(rules[2].spec.cidr, "10.0.0.0/8");
        assert_eq!(rules[3].spec.role, Some(RoleId(2)));

        let _ = fs::remove_file(&file_path);
        let _ = fs::remove_dir(&dir);
    }

    #[test]
    fn test_parse_file_directive_not_found() {
        let text = "file: /nonexistent/path/policy.rules";
        assert!(parse_rules(text).is_err());
    }

    #[test]
    fn test_parse_file_circular_include() {
        use std::io::Write;
        let dir = std::env::temp_dir().join("acl_policy_test_circular");
        let _ = fs::create_dir_all(&dir);

        let file_a = dir.join("a.rules");
        let file_b = dir.join("b.rules");

        let mut f = fs::File::create(&file_a).unwrap();
        writeln!(f, "pass(cidr=10.0.0.0/8)").unwrap();
        writeln!(f, "file: {}", file_b.display()).unwrap();
        drop(f);

        let mut f = fs::File::create(&file_b).unwrap();
        writeln!(f, "drop(workload=3)").unwrap();
        writeln!(f, "file: {}", file_a.display()).unwrap();
        drop(f);

        let result = parse_rules_from_file(&file_a);
        assert!(result.is_err(), "Circular file include should return error");
        let err_msg = format!("{}", result.unwrap_err());
        assert!(err_msg.contains("depth"), "got: {}", err_msg);

        let _ = fs::remove_file(&file_a);
        let _ = fs::remove_file(&file_b);
        let _ = fs::remove_dir(&dir);
    }
}
