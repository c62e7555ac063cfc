//! TOON endpoint format parser.
//!
//! Parses TOON-formatted endpoint documents into typed [`EndpointDefinition`]s.
//!
//! # TOON Format
//!
//! ```toon
//! hub_endpoint{path,methods,backend_url,timeout_ms,retries,policies}:
//!   /v1/orders
//!   GET|POST
//!   https://orders.internal
//!   30000
//!   3
//!   policies[2]{id,name,type,enabled,priority,mode,conditions,channels,config}:
//!     slow,Slow responses,monitoring,true,1,all,response_time greater_than 5000 for 5m,email|sms,severity=high
//!     limit,Per-key limit,rateLimit,true,1,all,,,requests=100;window_seconds=60
//! ```
//!
//! Cells are comma separated; cells containing commas are double-quoted.
//! Conditions and config entries are `;` separated, list values `|` separated.
//! A literal `;`, `|` or `\` inside a condition or config value is written
//! with a leading backslash. Optional header fields such as `methods` may be
//! left out of the header entirely.

use crate::endpoint::{Backend, EndpointDefinition, HttpMethod};
use crate::error::{Error, Result};
use crate::model::{
    AuthScheme, AuthenticationConfig, AuthorizationConfig, CachingConfig, Channel, Condition,
    MatchMode, Metric, MonitoringConfig, Operator, Policy, PolicyConfig, PolicyType,
    RateLimitConfig, Schedule, SecurityConfig, Severity, TransformationConfig,
};
use std::collections::BTreeSet;
use std::fmt::Write;

/// Parses a TOON-formatted string into an [`EndpointDefinition`].
///
/// # Errors
///
/// Returns an error if:
/// - The TOON syntax is invalid
/// - Required fields are missing
/// - Array counts don't match (strict mode)
/// - A condition or config cell is malformed
/// - Two policies share an id
///
/// # Example
///
/// ```rust
/// use hub_policy::parse;
///
/// let input = r#"
/// hub_endpoint{path,methods,backend_url,policies}:
///   /v1/orders
///   GET
///   https://orders.internal
///   policies[1]{id,name,type,priority,conditions,channels,config}:
///     slow,Slow responses,monitoring,1,response_time greater_than 5000 for 5m,email,severity=high
/// "#;
///
/// let endpoint = parse(input).unwrap();
/// assert_eq!(endpoint.path, "/v1/orders");
/// assert_eq!(endpoint.policies.len(), 1);
/// ```
pub fn parse(input: &str) -> Result<EndpointDefinition> {
    let mut parser = ToonParser::new(input);
    parser.parse_endpoint()
}

/// Internal parser state.
struct ToonParser<'a> {
    lines: Vec<(usize, &'a str)>, // (line_number, content)
    pos: usize,
}

impl<'a> ToonParser<'a> {
    fn new(input: &'a str) -> Self {
        let lines: Vec<(usize, &str)> = input
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line))
            .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
            .collect();
        Self { lines, pos: 0 }
    }

    fn current_line(&self) -> Option<(usize, &'a str)> {
        self.lines.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn last_line_number(&self) -> usize {
        self.lines.last().map_or(1, |(n, _)| *n)
    }

    fn parse_endpoint(&mut self) -> Result<EndpointDefinition> {
        let (line_num, header_line) = self.current_line().ok_or_else(|| Error::Parse {
            line: 1,
            reason: "empty input".to_string(),
        })?;

        let header = parse_header(header_line.trim(), line_num)?;
        if header.name != "hub_endpoint" {
            return Err(Error::Parse {
                line: line_num,
                reason: format!("expected 'hub_endpoint' header, found '{}'", header.name),
            });
        }

        self.advance();

        let mut path: Option<String> = None;
        let mut methods: Vec<HttpMethod> = Vec::new();
        let mut backend_url: Option<String> = None;
        let mut timeout_ms: Option<u64> = None;
        let mut retries: Option<u32> = None;
        let mut backoff_ms: Option<u64> = None;
        let mut policies: Vec<Policy> = Vec::new();

        for field in &header.fields {
            match field.as_str() {
                "path" => {
                    let (_, value) = self.expect_value(2)?;
                    path = Some(value.to_string());
                }
                "methods" => {
                    let (line_num, value) = self.expect_value(2)?;
                    methods = parse_methods(value, line_num)?;
                }
                "backend_url" => {
                    let (_, value) = self.expect_value(2)?;
                    backend_url = Some(value.to_string());
                }
                "timeout_ms" => {
                    let (line_num, value) = self.expect_value(2)?;
                    timeout_ms = Some(parse_number(value, line_num, "timeout")?);
                }
                "retries" => {
                    let (line_num, value) = self.expect_value(2)?;
                    retries = Some(parse_number(value, line_num, "retry count")?);
                }
                "backoff_ms" => {
                    let (line_num, value) = self.expect_value(2)?;
                    backoff_ms = Some(parse_number(value, line_num, "backoff")?);
                }
                "policies" => {
                    policies = self.parse_policies(2)?;
                }
                other => {
                    return Err(Error::Parse {
                        line: line_num,
                        reason: format!("unknown field: {other}"),
                    });
                }
            }
        }

        let path = path.ok_or_else(|| Error::MissingField("path".to_string()))?;
        let backend_url = backend_url.ok_or_else(|| Error::MissingField("backend_url".to_string()))?;

        let mut backend = Backend::new(backend_url);
        if let Some(timeout_ms) = timeout_ms {
            backend.timeout_ms = timeout_ms;
        }
        backend.retry.attempts = retries.unwrap_or(0);
        backend.retry.backoff_ms = backoff_ms.unwrap_or(0);

        let mut endpoint = EndpointDefinition::new(path, backend);
        for method in methods {
            endpoint = endpoint.with_method(method);
        }
        for policy in policies {
            endpoint.policies.insert(policy)?;
        }

        Ok(endpoint)
    }

    fn expect_value(&mut self, expected_indent: usize) -> Result<(usize, &'a str)> {
        let (line_num, line) = self.current_line().ok_or_else(|| Error::Parse {
            line: self.last_line_number(),
            reason: "unexpected end of input".to_string(),
        })?;

        let indent = count_indent(line);
        if indent < expected_indent {
            return Err(Error::Parse {
                line: line_num,
                reason: format!(
                    "expected indent of at least {expected_indent} spaces, found {indent}"
                ),
            });
        }

        self.advance();
        Ok((line_num, line.trim()))
    }

    fn parse_policies(&mut self, expected_indent: usize) -> Result<Vec<Policy>> {
        // Expect: policies[N]{id,name,type,...}:
        let (line_num, line) = self.current_line().ok_or_else(|| Error::Parse {
            line: self.last_line_number(),
            reason: "expected policies section".to_string(),
        })?;

        let indent = count_indent(line);
        if indent < expected_indent {
            return Err(Error::Parse {
                line: line_num,
                reason: format!(
                    "expected indent of at least {expected_indent} spaces for policies header"
                ),
            });
        }

        let header = parse_header(line.trim(), line_num)?;
        if header.name != "policies" {
            return Err(Error::Parse {
                line: line_num,
                reason: format!("expected 'policies' header, found '{}'", header.name),
            });
        }

        let declared_count = header.count.ok_or_else(|| Error::Parse {
            line: line_num,
            reason: "policies header must specify count [N]".to_string(),
        })?;

        self.advance();

        let mut policies = Vec::new();
        let row_indent = expected_indent + 2;

        while let Some((row_line_num, row_line)) = self.current_line() {
            if count_indent(row_line) < row_indent {
                break;
            }

            policies.push(parse_policy_row(&header.fields, row_line_num, row_line.trim())?);
            self.advance();
        }

        if policies.len() != declared_count {
            return Err(Error::CountMismatch {
                declared: declared_count,
                actual: policies.len(),
            });
        }

        Ok(policies)
    }
}

/// Parses a single policy row.
fn parse_policy_row(fields: &[String], line_num: usize, row: &str) -> Result<Policy> {
    let values = parse_csv_row(row);

    if values.len() != fields.len() {
        return Err(Error::Parse {
            line: line_num,
            reason: format!(
                "expected {} fields, found {} in row: {row}",
                fields.len(),
                values.len()
            ),
        });
    }

    let mut id: Option<String> = None;
    let mut name: Option<String> = None;
    let mut policy_type: Option<PolicyType> = None;
    let mut enabled = true;
    let mut priority = 0;
    let mut mode = MatchMode::All;
    let mut conditions: Vec<Condition> = Vec::new();
    let mut channels: BTreeSet<Channel> = BTreeSet::new();
    let mut config_cell: Option<&str> = None;

    for (field, value) in fields.iter().zip(values.iter()) {
        match field.as_str() {
            "id" => id = Some(value.clone()),
            "name" => name = Some(value.clone()),
            "type" => {
                policy_type = Some(PolicyType::from_name(value).ok_or_else(|| Error::Parse {
                    line: line_num,
                    reason: format!("unknown policy type: {value}"),
                })?);
            }
            "enabled" => {
                enabled = value.parse().map_err(|_| Error::Parse {
                    line: line_num,
                    reason: format!("invalid enabled flag: {value}"),
                })?;
            }
            "priority" => priority = parse_number(value, line_num, "priority")?,
            "mode" => {
                if !value.is_empty() {
                    mode = MatchMode::from_name(value).ok_or_else(|| Error::Parse {
                        line: line_num,
                        reason: format!("invalid match mode: {value}"),
                    })?;
                }
            }
            "conditions" => conditions = parse_conditions(value)?,
            "channels" => channels = parse_channels(value, line_num)?,
            "config" => config_cell = Some(value.as_str()),
            other => {
                return Err(Error::Parse {
                    line: line_num,
                    reason: format!("unknown policy field: {other}"),
                });
            }
        }
    }

    let id = id.ok_or_else(|| Error::Parse {
        line: line_num,
        reason: "policy missing 'id' field".to_string(),
    })?;

    let name = name.ok_or_else(|| Error::Parse {
        line: line_num,
        reason: "policy missing 'name' field".to_string(),
    })?;

    let policy_type = policy_type.ok_or_else(|| Error::Parse {
        line: line_num,
        reason: "policy missing 'type' field".to_string(),
    })?;

    let config = parse_config(policy_type, config_cell.unwrap_or_default())?;

    let mut policy = Policy::new(id, name, config)
        .with_priority(priority)
        .with_match_mode(mode);
    policy.enabled = enabled;
    policy.conditions = conditions;
    policy.channels = channels;

    Ok(policy)
}

/// Parses a `;`-separated list of conditions.
///
/// # Errors
///
/// Returns an error if any condition is malformed.
pub fn parse_conditions(cell: &str) -> Result<Vec<Condition>> {
    split_escaped(cell, ';')
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| parse_condition(&unescape(c)))
        .collect()
}

/// Parses a condition of the form `metric operator value [for Nm]`.
///
/// The threshold is kept verbatim; it is only checked against the operator
/// when the condition is evaluated.
///
/// # Errors
///
/// Returns an error if the metric, operator or value is missing, or the
/// operator is unknown.
pub fn parse_condition(text: &str) -> Result<Condition> {
    let text = text.trim();
    let invalid = |reason: &str| Error::InvalidCondition {
        condition: text.to_string(),
        reason: reason.to_string(),
    };

    let (body, duration_minutes) = split_duration(text);

    let (metric, rest) = take_token(body).ok_or_else(|| invalid("missing metric"))?;
    let (operator, rest) = take_token(rest).ok_or_else(|| invalid("missing operator"))?;
    let value = rest.trim();

    let operator = Operator::from_name(operator)
        .ok_or_else(|| invalid(&format!("unknown operator '{operator}'")))?;
    if value.is_empty() {
        return Err(invalid("missing value"));
    }

    Ok(Condition::new(Metric::from_name(metric), operator, value).sustained_for(duration_minutes))
}

/// Splits a trailing ` for Nm` off a condition.
fn split_duration(text: &str) -> (&str, u32) {
    if let Some(idx) = text.rfind(" for ") {
        let tail = text[idx + 5..].trim();
        if let Some(minutes) = tail.strip_suffix('m').and_then(|n| n.parse().ok()) {
            return (&text[..idx], minutes);
        }
    }
    (text, 0)
}

/// Takes the next whitespace-delimited token.
fn take_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    Some((&input[..end], &input[end..]))
}

fn parse_methods(cell: &str, line_num: usize) -> Result<Vec<HttpMethod>> {
    split_list(cell)
        .map(|m| {
            HttpMethod::from_name(m).ok_or_else(|| Error::Parse {
                line: line_num,
                reason: format!("unknown HTTP method: {m}"),
            })
        })
        .collect()
}

fn parse_channels(cell: &str, line_num: usize) -> Result<BTreeSet<Channel>> {
    split_list(cell)
        .map(|c| {
            Channel::from_name(c).ok_or_else(|| Error::Parse {
                line: line_num,
                reason: format!("unknown channel: {c}"),
            })
        })
        .collect()
}

fn split_list(cell: &str) -> impl Iterator<Item = &str> {
    cell.split('|').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_number<T: std::str::FromStr>(value: &str, line_num: usize, what: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::Parse {
        line: line_num,
        reason: format!("invalid {what}: {value}"),
    })
}

/// Parses a `key=value;key=value` config cell for the given policy type.
///
/// Missing keys keep the type's defaults.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] for unknown keys or unparseable values.
pub fn parse_config(policy_type: PolicyType, cell: &str) -> Result<PolicyConfig> {
    let invalid = |reason: String| Error::InvalidConfig {
        policy_type: policy_type.to_string(),
        reason,
    };
    let number = |key: &str, value: &str| -> Result<u32> {
        value
            .parse()
            .map_err(|_| invalid(format!("'{key}' must be a number, found '{value}'")))
    };
    let list = |raw: &str| -> Vec<String> {
        split_escaped(raw, '|')
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(unescape)
            .collect()
    };

    let mut config = PolicyConfig::default_for(policy_type);

    for entry in split_escaped(cell, ';')
        .into_iter()
        .map(str::trim)
        .filter(|e| !e.is_empty())
    {
        let (key, raw) = entry
            .split_once('=')
            .ok_or_else(|| invalid(format!("expected key=value, found '{entry}'")))?;
        let (key, raw) = (key.trim(), raw.trim());
        let text = unescape(raw);
        let value = text.as_str();

        match (&mut config, key) {
            (PolicyConfig::Authentication(cfg), "scheme") => {
                cfg.scheme = AuthScheme::from_name(value)
                    .ok_or_else(|| invalid(format!("unknown scheme '{value}'")))?;
            }
            (PolicyConfig::Authentication(cfg), "header") => cfg.header = Some(value.to_string()),
            (PolicyConfig::Authorization(cfg), "roles") => cfg.roles = list(raw),
            (PolicyConfig::Authorization(cfg), "scopes") => cfg.scopes = list(raw),
            (PolicyConfig::RateLimit(cfg), "requests") => cfg.requests = number(key, value)?,
            (PolicyConfig::RateLimit(cfg), "window_seconds") => {
                cfg.window_seconds = number(key, value)?;
            }
            (PolicyConfig::RateLimit(cfg), "burst") => cfg.burst = Some(number(key, value)?),
            (PolicyConfig::Caching(cfg), "ttl_seconds") => cfg.ttl_seconds = number(key, value)?,
            (PolicyConfig::Caching(cfg), "vary_headers") => cfg.vary_headers = list(raw),
            (PolicyConfig::Transformation(cfg), "add_headers") => {
                for header in split_escaped(raw, '|').into_iter().map(str::trim) {
                    if header.is_empty() {
                        continue;
                    }
                    let (name, header_value) = header.split_once(':').ok_or_else(|| {
                        invalid(format!("expected Name:value header, found '{header}'"))
                    })?;
                    cfg.add_headers
                        .insert(unescape(name.trim()), unescape(header_value.trim()));
                }
            }
            (PolicyConfig::Transformation(cfg), "remove_headers") => {
                cfg.remove_headers = list(raw);
            }
            (PolicyConfig::Security(cfg), "cors_origins") => cfg.cors_origins = list(raw),
            (PolicyConfig::Security(cfg), "cors_methods") => cfg.cors_methods = list(raw),
            (PolicyConfig::Security(cfg), "ip_allowlist") => cfg.ip_allowlist = list(raw),
            (PolicyConfig::Monitoring(cfg), "severity") => {
                cfg.severity = Severity::from_name(value)
                    .ok_or_else(|| invalid(format!("unknown severity '{value}'")))?;
            }
            (PolicyConfig::Monitoring(cfg), "schedule") => {
                if value != "immediate" {
                    return Err(invalid(format!("unsupported schedule '{value}'")));
                }
                cfg.schedule = Schedule::Immediate;
            }
            (_, other) => return Err(invalid(format!("unknown key '{other}'"))),
        }
    }

    Ok(config)
}

/// Renders a config payload as a `key=value;...` cell.
fn config_cell(config: &PolicyConfig) -> String {
    fn join(items: &[String]) -> String {
        items
            .iter()
            .map(|item| escape_item(item))
            .collect::<Vec<_>>()
            .join("|")
    }

    let mut entries: Vec<String> = Vec::new();

    match config {
        PolicyConfig::Authentication(AuthenticationConfig { scheme, header }) => {
            entries.push(format!("scheme={}", scheme.as_str()));
            if let Some(header) = header {
                entries.push(format!("header={}", escape_item(header)));
            }
        }
        PolicyConfig::Authorization(AuthorizationConfig { roles, scopes }) => {
            if !roles.is_empty() {
                entries.push(format!("roles={}", join(roles)));
            }
            if !scopes.is_empty() {
                entries.push(format!("scopes={}", join(scopes)));
            }
        }
        PolicyConfig::RateLimit(RateLimitConfig {
            requests,
            window_seconds,
            burst,
        }) => {
            entries.push(format!("requests={requests}"));
            entries.push(format!("window_seconds={window_seconds}"));
            if let Some(burst) = burst {
                entries.push(format!("burst={burst}"));
            }
        }
        PolicyConfig::Caching(CachingConfig {
            ttl_seconds,
            vary_headers,
        }) => {
            entries.push(format!("ttl_seconds={ttl_seconds}"));
            if !vary_headers.is_empty() {
                entries.push(format!("vary_headers={}", join(vary_headers)));
            }
        }
        PolicyConfig::Transformation(TransformationConfig {
            add_headers,
            remove_headers,
        }) => {
            if !add_headers.is_empty() {
                let headers: Vec<String> = add_headers
                    .iter()
                    .map(|(k, v)| format!("{}:{}", escape_item(k), escape_item(v)))
                    .collect();
                entries.push(format!("add_headers={}", headers.join("|")));
            }
            if !remove_headers.is_empty() {
                entries.push(format!("remove_headers={}", join(remove_headers)));
            }
        }
        PolicyConfig::Security(SecurityConfig {
            cors_origins,
            cors_methods,
            ip_allowlist,
        }) => {
            for (key, items) in [
                ("cors_origins", cors_origins),
                ("cors_methods", cors_methods),
                ("ip_allowlist", ip_allowlist),
            ] {
                if !items.is_empty() {
                    entries.push(format!("{key}={}", join(items)));
                }
            }
        }
        PolicyConfig::Monitoring(MonitoringConfig { severity, .. }) => {
            entries.push(format!("severity={severity}"));
        }
    }

    entries.join(";")
}

/// Parsed TOON header info.
struct Header {
    name: String,
    count: Option<usize>,
    fields: Vec<String>,
}

/// Parses a header line like `name[N]{field1,field2}:` or `name{field1,field2}:`
fn parse_header(line: &str, line_num: usize) -> Result<Header> {
    let line = line.trim();

    let line = line.strip_suffix(':').ok_or_else(|| Error::Parse {
        line: line_num,
        reason: "header must end with ':'".to_string(),
    })?;

    let name_end = line.find(['[', '{']).ok_or_else(|| Error::Parse {
        line: line_num,
        reason: "header must have fields in braces".to_string(),
    })?;

    let name = line[..name_end].to_string();

    let (count, fields_start) = if line[name_end..].starts_with('[') {
        let bracket_end = line[name_end..].find(']').ok_or_else(|| Error::Parse {
            line: line_num,
            reason: "unclosed '[' in header".to_string(),
        })? + name_end;

        let count_str = &line[name_end + 1..bracket_end];
        let count: usize = count_str.parse().map_err(|_| Error::Parse {
            line: line_num,
            reason: format!("invalid count in header: {count_str}"),
        })?;

        (Some(count), bracket_end + 1)
    } else {
        (None, name_end)
    };

    if !line[fields_start..].starts_with('{') || !line.ends_with('}') {
        return Err(Error::Parse {
            line: line_num,
            reason: "header must have fields in braces".to_string(),
        });
    }

    let fields: Vec<String> = line[fields_start + 1..line.len() - 1]
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if fields.is_empty() {
        return Err(Error::Parse {
            line: line_num,
            reason: "header must declare at least one field".to_string(),
        });
    }

    Ok(Header {
        name,
        count,
        fields,
    })
}

/// Counts leading spaces in a line.
fn count_indent(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Parses a CSV row, handling quoted values.
fn parse_csv_row(row: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = row.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => values.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }

    values.push(current.trim().to_string());
    values
}

/// Serializes an [`EndpointDefinition`] to TOON format.
///
/// Policies are written in insertion order so a parse of the output rebuilds
/// the same execution order.
pub fn serialize(endpoint: &EndpointDefinition) -> String {
    let mut output = String::new();

    let mut fields = vec!["path"];
    if !endpoint.methods.is_empty() {
        fields.push("methods");
    }
    fields.extend(["backend_url", "timeout_ms", "retries", "backoff_ms", "policies"]);
    let _ = writeln!(output, "hub_endpoint{{{}}}:", fields.join(","));

    let _ = writeln!(output, "  {}", endpoint.path);
    if !endpoint.methods.is_empty() {
        let methods: Vec<&str> = endpoint.methods.iter().map(|m| m.as_str()).collect();
        let _ = writeln!(output, "  {}", methods.join("|"));
    }
    let _ = writeln!(output, "  {}", endpoint.backend.url);
    let _ = writeln!(output, "  {}", endpoint.backend.timeout_ms);
    let _ = writeln!(output, "  {}", endpoint.backend.retry.attempts);
    let _ = writeln!(output, "  {}", endpoint.backend.retry.backoff_ms);

    let _ = writeln!(
        output,
        "  policies[{}]{{id,name,type,enabled,priority,mode,conditions,channels,config}}:",
        endpoint.policies.len()
    );

    for policy in &endpoint.policies {
        let conditions: Vec<String> = policy
            .conditions
            .iter()
            .map(|c| escape_item(&c.to_string()))
            .collect();
        let channels: Vec<&str> = policy.channels.iter().map(|c| c.as_str()).collect();

        let _ = writeln!(
            output,
            "    {},{},{},{},{},{},{},{},{}",
            escape_csv_value(policy.id.as_str()),
            escape_csv_value(&policy.name),
            policy.kind(),
            policy.enabled,
            policy.priority,
            policy.match_mode.as_str(),
            escape_csv_value(&conditions.join(";")),
            channels.join("|"),
            escape_csv_value(&config_cell(&policy.config)),
        );
    }

    output
}

/// Splits on `separator` where it is not preceded by a backslash.
///
/// Escapes are kept in the parts so nested lists can be split again.
fn split_escaped(cell: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (idx, c) in cell.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == separator {
            parts.push(&cell[start..idx]);
            start = idx + c.len_utf8();
        }
    }
    parts.push(&cell[start..]);
    parts
}

/// Drops the backslash in front of `;`, `|` and `\`. Other backslashes stay.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ (';' | '|' | '\\')) => out.push(next),
            Some(next) => {
                out.push(c);
                out.push(next);
            }
            None => out.push(c),
        }
    }
    out
}

/// Backslash-escapes the list separators inside a single value.
fn escape_item(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ';' | '|' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escapes a value for CSV output if it contains special characters.
fn escape_csv_value(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PolicyId;

    const ORDERS: &str = r#"
hub_endpoint{path,methods,backend_url,timeout_ms,retries,policies}:
  /v1/orders
  GET|POST
  https://orders.internal
  15000
  3
  policies[4]{id,name,type,enabled,priority,mode,conditions,channels,config}:
    slow,Slow responses,monitoring,true,1,all,response_time greater_than 5000 for 5m,email|sms,severity=high
    limit,Per-key limit,rateLimit,true,1,all,,,requests=50;window_seconds=10;burst=5
    band,"Latency band, warm",monitoring,false,2,any,"response_time between 100,500;status_code equals 503",email,severity=low
    cors,CORS,security,true,0,all,,,cors_origins=https://app.example.com|https://admin.example.com;cors_methods=GET|POST
"#;

    #[test]
    fn parse_endpoint_document() {
        let endpoint = parse(ORDERS).unwrap();
        assert_eq!(endpoint.path, "/v1/orders");
        assert_eq!(endpoint.methods, vec![HttpMethod::Get, HttpMethod::Post]);
        assert_eq!(endpoint.backend.timeout_ms, 15_000);
        assert_eq!(endpoint.backend.retry.attempts, 3);
        assert_eq!(endpoint.policies.len(), 4);

        let slow = endpoint.policies.get(&PolicyId::from("slow")).unwrap();
        assert_eq!(slow.severity(), Some(Severity::High));
        assert_eq!(slow.conditions.len(), 1);
        assert_eq!(slow.conditions[0].duration_minutes, 5);
        assert_eq!(slow.conditions[0].value, "5000");
        assert!(slow.channels.contains(&Channel::Sms));

        let limit = endpoint.policies.get(&PolicyId::from("limit")).unwrap();
        assert_eq!(
            limit.config,
            PolicyConfig::RateLimit(RateLimitConfig {
                requests: 50,
                window_seconds: 10,
                burst: Some(5),
            })
        );

        let band = endpoint.policies.get(&PolicyId::from("band")).unwrap();
        assert_eq!(band.name, "Latency band, warm");
        assert!(!band.enabled);
        assert_eq!(band.match_mode, MatchMode::Any);
        assert_eq!(band.conditions[0].operator, Operator::Between);
        assert_eq!(band.conditions[0].value, "100,500");
        assert_eq!(band.conditions[1].metric, Metric::StatusCode);

        let cors = endpoint.policies.get(&PolicyId::from("cors")).unwrap();
        match &cors.config {
            PolicyConfig::Security(cfg) => {
                assert_eq!(cfg.cors_origins.len(), 2);
                assert_eq!(cfg.cors_methods, vec!["GET", "POST"]);
            }
            other => panic!("unexpected config {other:?}"),
        }
    }

    #[test]
    fn parse_condition_forms() {
        let c = parse_condition("error_message contains timed out for 2m").unwrap();
        assert_eq!(c.metric, Metric::ErrorMessage);
        assert_eq!(c.operator, Operator::Contains);
        assert_eq!(c.value, "timed out");
        assert_eq!(c.duration_minutes, 2);

        let c = parse_condition("response_body contains wait for it").unwrap();
        assert_eq!(c.value, "wait for it");
        assert_eq!(c.duration_minutes, 0);

        let c = parse_condition("status_code != 200").unwrap();
        assert_eq!(c.operator, Operator::NotEquals);

        // thresholds are not checked until evaluation
        let c = parse_condition("response_time greater_than abc").unwrap();
        assert_eq!(c.value, "abc");
    }

    #[test]
    fn parse_condition_errors() {
        assert!(matches!(
            parse_condition("response_time"),
            Err(Error::InvalidCondition { .. })
        ));
        assert!(matches!(
            parse_condition("response_time exceeds 5"),
            Err(Error::InvalidCondition { .. })
        ));
        assert!(matches!(
            parse_condition("response_time greater_than"),
            Err(Error::InvalidCondition { .. })
        ));
    }

    #[test]
    fn parse_config_rejects_foreign_keys() {
        let err = parse_config(PolicyType::Caching, "requests=10").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));

        let err = parse_config(PolicyType::RateLimit, "requests=lots").unwrap_err();
        assert!(err.to_string().contains("'requests' must be a number"));
    }

    #[test]
    fn parse_transformation_headers() {
        let config = parse_config(
            PolicyType::Transformation,
            "add_headers=X-Tenant:acme|X-Trace:on;remove_headers=Server",
        )
        .unwrap();
        match config {
            PolicyConfig::Transformation(cfg) => {
                assert_eq!(cfg.add_headers.get("X-Tenant").map(String::as_str), Some("acme"));
                assert_eq!(cfg.remove_headers, vec!["Server"]);
            }
            other => panic!("unexpected config {other:?}"),
        }
    }

    #[test]
    fn parse_policy_count_mismatch() {
        let input = r"
hub_endpoint{path,backend_url,policies}:
  /v1/orders
  https://orders.internal
  policies[3]{id,name,type}:
    a,A,caching
    b,B,security
";
        assert!(matches!(
            parse(input),
            Err(Error::CountMismatch {
                declared: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn parse_duplicate_policy_ids() {
        let input = r"
hub_endpoint{path,backend_url,policies}:
  /v1/orders
  https://orders.internal
  policies[2]{id,name,type}:
    a,A,caching
    a,B,security
";
        assert!(matches!(parse(input), Err(Error::DuplicatePolicy(_))));
    }

    #[test]
    fn parse_missing_backend() {
        let input = r"
hub_endpoint{path,policies}:
  /v1/orders
  policies[0]{id,name,type}:
";
        assert!(matches!(parse(input), Err(Error::MissingField(_))));
    }

    #[test]
    fn roundtrip_serialize_parse() {
        let endpoint = parse(ORDERS).unwrap();
        let serialized = serialize(&endpoint);
        let parsed = parse(&serialized).unwrap();
        assert_eq!(parsed, endpoint);
    }

    #[test]
    fn roundtrip_endpoint_without_methods() {
        let endpoint = EndpointDefinition::new("/v1/orders", Backend::new("https://o"));
        let serialized = serialize(&endpoint);
        assert!(serialized.starts_with("hub_endpoint{path,backend_url,"));
        assert!(serialized.lines().all(|line| !line.trim().is_empty()));
        assert_eq!(parse(&serialized).unwrap(), endpoint);
    }

    #[test]
    fn roundtrip_separators_inside_values() {
        let input = r#"
hub_endpoint{path,methods,backend_url,policies}:
  /v1/orders
  GET
  https://orders.internal
  policies[3]{id,name,type,conditions,channels,config}:
    odd,Odd errors,monitoring,error_message contains a\;b;response_body contains x\|y\\z,email,severity=low
    roles,Roles,authorization,,,roles=ops\|admin|reader;scopes=orders:read
    hdrs,Headers,transformation,,,"add_headers=X-Mode:a\;b|X-Tag:c\|d"
"#;
        let endpoint = parse(input).unwrap();

        let odd = endpoint.policies.get(&PolicyId::from("odd")).unwrap();
        assert_eq!(odd.conditions.len(), 2);
        assert_eq!(odd.conditions[0].value, "a;b");
        assert_eq!(odd.conditions[1].value, r"x|y\z");

        let roles = endpoint.policies.get(&PolicyId::from("roles")).unwrap();
        match &roles.config {
            PolicyConfig::Authorization(cfg) => {
                assert_eq!(cfg.roles, vec!["ops|admin", "reader"]);
                assert_eq!(cfg.scopes, vec!["orders:read"]);
            }
            other => panic!("unexpected config {other:?}"),
        }

        let hdrs = endpoint.policies.get(&PolicyId::from("hdrs")).unwrap();
        match &hdrs.config {
            PolicyConfig::Transformation(cfg) => {
                assert_eq!(cfg.add_headers.get("X-Mode").map(String::as_str), Some("a;b"));
                assert_eq!(cfg.add_headers.get("X-Tag").map(String::as_str), Some("c|d"));
            }
            other => panic!("unexpected config {other:?}"),
        }

        assert_eq!(parse(&serialize(&endpoint)).unwrap(), endpoint);
    }

    #[test]
    fn roundtrip_built_policy_with_separators() {
        let policy = Policy::trigger("odd", "Odd errors", Severity::Low).with_condition(
            Condition::new(Metric::ErrorMessage, Operator::Contains, "\"a;b\""),
        );
        let mut endpoint = EndpointDefinition::new("/v1/orders", Backend::new("https://o"))
            .with_method(HttpMethod::Get);
        endpoint.policies.insert(policy).unwrap();

        let parsed = parse(&serialize(&endpoint)).unwrap();
        assert_eq!(parsed, endpoint);
    }

    #[test]
    fn parse_csv_row_quoted() {
        assert_eq!(parse_csv_row(r#"a,"b,c",d"#), vec!["a", "b,c", "d"]);
        assert_eq!(parse_csv_row(r#"a,"b""c",d"#), vec!["a", "b\"c", "d"]);
        assert_eq!(parse_csv_row("a,,"), vec!["a", "", ""]);
    }
}
