use std::sync::Arc;

use regex::Regex;

use crate::error::{InvalidRouteReason, RouterError, RouterResult};
use crate::node::{ParamSpec, WildcardSpec};
use crate::route::ParamDescriptor;

/// One token of a tokenized pattern, in order.
#[derive(Debug, Clone)]
pub enum PatternPart {
    Literal(Box<str>),
    Param(ParamSpec),
    Wildcard(WildcardSpec),
}

/// Result of tokenizing a full `host? path` pattern (spec.md §4.1/§6).
#[derive(Debug, Clone)]
pub struct ParsedPattern {
    pub host_split: usize,
    pub host_parts: Vec<PatternPart>,
    pub path_parts: Vec<PatternPart>,
    pub params: Vec<ParamDescriptor>,
}

pub fn parse_pattern(pattern: &str) -> RouterResult<ParsedPattern> {
    if pattern.is_empty() {
        return Err(invalid(pattern, InvalidRouteReason::EmptyPath));
    }

    let host_split = find_host_split(pattern)?;
    let host_str = &pattern[..host_split];
    let path_str = &pattern[host_split..];

    if !path_str.starts_with('/') {
        return Err(invalid(pattern, InvalidRouteReason::MissingLeadingSlash));
    }

    let mut params = Vec::new();

    let host_parts = if host_str.is_empty() {
        Vec::new()
    } else {
        tokenize(pattern, host_str, b'.', &mut params)?
    };
    let path_parts = tokenize(pattern, path_str, b'/', &mut params)?;

    Ok(ParsedPattern {
        host_split,
        host_parts,
        path_parts,
        params,
    })
}

fn invalid(pattern: &str, reason: InvalidRouteReason) -> RouterError {
    RouterError::InvalidRoute {
        pattern: pattern.to_string(),
        reason,
    }
}

/// Finds the byte offset of the first top-level `/` (i.e. not inside a
/// `{...}` brace group, since a regex constraint may itself contain `/`).
/// Returns 0 if the pattern is path-only (starts with `/`).
fn find_host_split(pattern: &str) -> RouterResult<usize> {
    let bytes = pattern.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(invalid(pattern, InvalidRouteReason::UnbalancedBraces));
                }
            }
            b'/' if depth == 0 => return Ok(i),
            _ => {}
        }
    }
    Err(invalid(pattern, InvalidRouteReason::MissingLeadingSlash))
}

/// Tokenizes one half (host or path) of a pattern at `delim` boundaries,
/// accumulating any parameter descriptors into `params`.
fn tokenize(
    full_pattern: &str,
    half: &str,
    delim: u8,
    params: &mut Vec<ParamDescriptor>,
) -> RouterResult<Vec<PatternPart>> {
    let bytes = half.as_bytes();
    let mut parts = Vec::new();
    let mut literal_start = 0usize;
    let mut i = 0usize;
    // tracks whether the literal buffer since the last delimiter is empty,
    // required for the "wildcard must start a segment" rule.
    let mut segment_start = true;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                flush_literal(half, literal_start, i, &mut parts);
                let (spec_end, name, regex_src) = scan_brace_body(full_pattern, half, i)?;
                let regex = compile_constraint(full_pattern, regex_src)?;
                let suffix_start = spec_end;
                let suffix_end = next_delim_or_brace(bytes, suffix_start, delim);
                let suffix = &half[suffix_start..suffix_end];
                let name_arc: Arc<str> = Arc::from(name);
                params.push(ParamDescriptor {
                    name: name_arc.clone(),
                    catch_all: false,
                });
                parts.push(PatternPart::Param(ParamSpec {
                    name: name_arc,
                    regex,
                    suffix: Box::from(suffix),
                }));
                i = suffix_end;
                literal_start = i;
                segment_start = false;
            }
            b'*' => {
                if !segment_start {
                    return Err(invalid(
                        full_pattern,
                        InvalidRouteReason::WildcardWrongPosition,
                    ));
                }
                if bytes.get(i + 1) != Some(&b'{') {
                    return Err(invalid(
                        full_pattern,
                        InvalidRouteReason::WildcardMissingArgument,
                    ));
                }
                flush_literal(half, literal_start, i, &mut parts);
                let (spec_end, name, regex_src) = scan_brace_body(full_pattern, half, i + 1)?;
                check_infix_wildcard_suffix(full_pattern, bytes, spec_end, delim)?;
                let regex = compile_constraint(full_pattern, regex_src)?;
                let name_arc: Arc<str> = Arc::from(name);
                params.push(ParamDescriptor {
                    name: name_arc.clone(),
                    catch_all: true,
                });
                parts.push(PatternPart::Wildcard(WildcardSpec {
                    name: name_arc,
                    regex,
                }));
                i = spec_end;
                literal_start = i;
                segment_start = false;
            }
            b if b == delim => {
                i += 1;
                segment_start = true;
            }
            _ => {
                i += 1;
                segment_start = false;
            }
        }
    }
    flush_literal(half, literal_start, bytes.len(), &mut parts);

    Ok(parts)
}

fn flush_literal(half: &str, start: usize, end: usize, parts: &mut Vec<PatternPart>) {
    if end > start {
        parts.push(PatternPart::Literal(Box::from(&half[start..end])));
    }
}

/// Given `half[brace_idx] == '{'`, scans to the matching `}` tracking brace
/// depth so balanced braces inside a regex (e.g. `{2,4}` quantifiers) don't
/// terminate the token early. Returns (byte offset just past `}`, name,
/// optional raw regex source).
fn scan_brace_body<'a>(
    full_pattern: &str,
    half: &'a str,
    brace_idx: usize,
) -> RouterResult<(usize, &'a str, Option<&'a str>)> {
    let bytes = half.as_bytes();
    debug_assert_eq!(bytes[brace_idx], b'{');
    let mut depth = 1i32;
    let mut j = brace_idx + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
        j += 1;
    }
    if depth != 0 {
        return Err(invalid(full_pattern, InvalidRouteReason::UnclosedBrace));
    }
    let inner = &half[brace_idx + 1..j];
    let (name, regex_src) = match inner.find(':') {
        Some(colon) => (&inner[..colon], Some(&inner[colon + 1..])),
        None => (inner, None),
    };
    validate_param_name(full_pattern, name)?;
    Ok((j + 1, name, regex_src))
}

fn validate_param_name(full_pattern: &str, name: &str) -> RouterResult<()> {
    if name.is_empty() {
        return Ok(()); // anonymous parameter, explicitly allowed by spec.md §4.1
    }
    let bytes = name.as_bytes();
    if !(bytes[0].is_ascii_alphabetic() || bytes[0] == b'_') {
        return Err(invalid(full_pattern, InvalidRouteReason::InvalidParamName));
    }
    if !bytes[1..]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return Err(invalid(full_pattern, InvalidRouteReason::InvalidParamName));
    }
    Ok(())
}

fn compile_constraint(
    full_pattern: &str,
    regex_src: Option<&str>,
) -> RouterResult<Option<Arc<Regex>>> {
    match regex_src {
        None => Ok(None),
        Some(src) => {
            let wrapped = format!("^(?:{src})$");
            Regex::new(&wrapped)
                .map(Arc::new)
                .map(Some)
                .map_err(|_| invalid(full_pattern, InvalidRouteReason::InvalidRegex))
        }
    }
}

/// Rejects an infix wildcard (one with more tokens after it in this half)
/// that isn't followed by at least one literal byte before the next
/// delimiter — a bare `*{args}` immediately followed by another delimiter,
/// brace, or `*` produces a degenerate zero-byte continuation segment that
/// can never be reached by the lookup walk (spec.md §4.1 rule 3). An
/// *ending* wildcard (`spec_end == bytes.len()`) is exempt.
fn check_infix_wildcard_suffix(
    full_pattern: &str,
    bytes: &[u8],
    spec_end: usize,
    delim: u8,
) -> RouterResult<()> {
    if spec_end >= bytes.len() {
        return Ok(());
    }
    let mut suffix_start = spec_end;
    if bytes[suffix_start] == delim {
        suffix_start += 1;
    }
    let suffix_end = next_delim_or_brace(bytes, suffix_start, delim);
    if suffix_end == suffix_start {
        return Err(invalid(
            full_pattern,
            InvalidRouteReason::InfixWildcardMissingSuffix,
        ));
    }
    Ok(())
}

/// Byte offset of the next `delim`, `{`, or `*` after `start` (end of a
/// literal suffix run following a parameter/wildcard close-brace).
fn next_delim_or_brace(bytes: &[u8], start: usize, delim: u8) -> usize {
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] == delim || bytes[i] == b'{' || bytes[i] == b'*' {
            break;
        }
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pattern_when_path_only_then_host_parts_empty() {
        let parsed = parse_pattern("/users/{id}").unwrap();
        assert!(parsed.host_parts.is_empty());
        assert_eq!(parsed.host_split, 0);
        assert_eq!(parsed.params.len(), 1);
    }

    #[test]
    fn parse_pattern_when_host_qualified_then_splits_at_first_top_level_slash() {
        let parsed = parse_pattern("a.b.c/x").unwrap();
        assert_eq!(parsed.host_split, 5);
        assert_eq!(parsed.host_parts.len(), 1);
        assert_eq!(parsed.path_parts.len(), 1);
        assert!(matches!(&parsed.host_parts[0], PatternPart::Literal(l) if l.as_ref() == "a.b.c"));
    }

    #[test]
    fn parse_pattern_when_missing_leading_slash_then_errors() {
        let err = parse_pattern("users").unwrap_err();
        assert!(matches!(
            err,
            RouterError::InvalidRoute {
                reason: InvalidRouteReason::MissingLeadingSlash,
                ..
            }
        ));
    }

    #[test]
    fn parse_pattern_when_empty_then_errors() {
        let err = parse_pattern("").unwrap_err();
        assert!(matches!(
            err,
            RouterError::InvalidRoute {
                reason: InvalidRouteReason::EmptyPath,
                ..
            }
        ));
    }

    #[test]
    fn parse_pattern_when_infix_wildcard_has_literal_suffix_then_tokenizes_three_parts() {
        let parsed = parse_pattern("/foo/*{args}/bar").unwrap();
        assert_eq!(parsed.path_parts.len(), 3);
        assert!(matches!(parsed.path_parts[0], PatternPart::Literal(_)));
        assert!(matches!(parsed.path_parts[1], PatternPart::Wildcard(_)));
        assert!(matches!(parsed.path_parts[2], PatternPart::Literal(_)));
    }

    #[test]
    fn parse_pattern_when_param_has_literal_suffix_then_suffix_is_captured() {
        let parsed = parse_pattern("/user_{name}").unwrap();
        let param = parsed
            .path_parts
            .iter()
            .find_map(|p| match p {
                PatternPart::Param(spec) => Some(spec),
                _ => None,
            })
            .unwrap();
        assert_eq!(param.name.as_ref(), "name");
    }

    #[test]
    fn parse_pattern_when_regex_constraint_has_braces_then_brace_depth_is_tracked() {
        let parsed = parse_pattern("/ids/{id:[0-9]{2,4}}").unwrap();
        assert_eq!(parsed.path_parts.len(), 2);
        let param = match &parsed.path_parts[1] {
            PatternPart::Param(spec) => spec,
            _ => panic!("expected a parameter token"),
        };
        assert!(param.regex.is_some());
        assert!(param.regex.as_ref().unwrap().is_match("23"));
        assert!(!param.regex.as_ref().unwrap().is_match("2"));
    }

    #[test]
    fn parse_pattern_when_infix_wildcard_has_no_literal_suffix_then_errors() {
        let err = parse_pattern("/foo/*{args}/{id}").unwrap_err();
        assert!(matches!(
            err,
            RouterError::InvalidRoute {
                reason: InvalidRouteReason::InfixWildcardMissingSuffix,
                ..
            }
        ));
    }

    #[test]
    fn parse_pattern_when_infix_wildcard_trailing_delim_has_nothing_after_then_errors() {
        let err = parse_pattern("/foo/*{args}/").unwrap_err();
        assert!(matches!(
            err,
            RouterError::InvalidRoute {
                reason: InvalidRouteReason::InfixWildcardMissingSuffix,
                ..
            }
        ));
    }

    #[test]
    fn parse_pattern_when_wildcard_not_at_segment_start_then_errors() {
        let err = parse_pattern("/foo-*{args}").unwrap_err();
        assert!(matches!(
            err,
            RouterError::InvalidRoute {
                reason: InvalidRouteReason::WildcardWrongPosition,
                ..
            }
        ));
    }

    #[test]
    fn parse_pattern_when_wildcard_missing_brace_argument_then_errors() {
        let err = parse_pattern("/foo/*bar").unwrap_err();
        assert!(matches!(
            err,
            RouterError::InvalidRoute {
                reason: InvalidRouteReason::WildcardMissingArgument,
                ..
            }
        ));
    }

    #[test]
    fn parse_pattern_when_brace_unclosed_then_errors() {
        let err = parse_pattern("/users/{id").unwrap_err();
        assert!(matches!(
            err,
            RouterError::InvalidRoute {
                reason: InvalidRouteReason::UnclosedBrace,
                ..
            }
        ));
    }

    #[test]
    fn parse_pattern_when_anonymous_param_name_then_allowed() {
        let parsed = parse_pattern("/files/{}").unwrap();
        let param = parsed
            .path_parts
            .iter()
            .find_map(|p| match p {
                PatternPart::Param(spec) => Some(spec),
                _ => None,
            })
            .unwrap();
        assert_eq!(param.name.as_ref(), "");
    }

    #[test]
    fn parse_pattern_when_solitary_root_slash_then_single_literal_part() {
        let parsed = parse_pattern("/").unwrap();
        assert_eq!(parsed.path_parts.len(), 1);
        assert!(matches!(&parsed.path_parts[0], PatternPart::Literal(l) if l.as_ref() == "/"));
    }
}
