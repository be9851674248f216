//! `parse_header` — splits a raw `From`/`To`/`Cc` header value into
//! `{address, name, domain}` tuples (spec §4.1). Pure, deterministic,
//! side-effect-free: malformed tokens are dropped rather than erroring,
//! matching the "malformed headers are silently dropped" validation policy.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedAddress {
    pub address: String,
    pub name: Option<String>,
    pub domain: String,
}

pub fn parse_header(raw: &str) -> Vec<ParsedAddress> {
    split_tokens(raw)
        .into_iter()
        .filter_map(|token| parse_token(token.trim()))
        .collect()
}

/// Split on commas, but not ones nested inside a quoted display name or an
/// angle-bracket address group — `"Roe, Jane" <jane@x.io>, bob@y.io` is two
/// tokens, not three.
fn split_tokens(raw: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut angle_depth = 0i32;

    for (i, c) in raw.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => angle_depth += 1,
            '>' if !in_quotes => angle_depth = (angle_depth - 1).max(0),
            ',' if !in_quotes && angle_depth == 0 => {
                tokens.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    tokens.push(&raw[start..]);
    tokens
}

fn parse_token(token: &str) -> Option<ParsedAddress> {
    if token.is_empty() {
        return None;
    }

    let (name, address) = match (token.rfind('<'), token.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let name = token[..open].trim();
            let name = name.trim_matches('"').trim();
            let name = if name.is_empty() { None } else { Some(name.to_string()) };
            (name, token[open + 1..close].trim())
        }
        _ => (None, token.trim_matches('"').trim()),
    };

    validate_address(address).map(|(address, domain)| ParsedAddress { address, name, domain })
}

fn validate_address(address: &str) -> Option<(String, String)> {
    let mut parts = address.splitn(2, '@');
    let local = parts.next()?;
    let domain = parts.next()?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return None;
    }

    Some((address.to_lowercase(), domain.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(addrs: &[ParsedAddress]) -> String {
        addrs
            .iter()
            .map(|a| match &a.name {
                Some(name) => format!("\"{name}\" <{}>", a.address),
                None => a.address.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[test]
    fn parses_display_name_and_angle_bracket_address() {
        let parsed = parse_header(r#""Jane Roe" <jane@beta.io>"#);
        assert_eq!(
            parsed,
            vec![ParsedAddress {
                address: "jane@beta.io".to_string(),
                name: Some("Jane Roe".to_string()),
                domain: "beta.io".to_string(),
            }]
        );
    }

    #[test]
    fn parses_bare_address_with_no_name() {
        let parsed = parse_header("me@acme.com");
        assert_eq!(
            parsed,
            vec![ParsedAddress {
                address: "me@acme.com".to_string(),
                name: None,
                domain: "acme.com".to_string(),
            }]
        );
    }

    #[test]
    fn splits_on_comma_outside_quotes_and_angle_brackets() {
        let parsed = parse_header(r#""Roe, Jane" <jane@beta.io>, bob@y.io"#);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].address, "jane@beta.io");
        assert_eq!(parsed[0].name.as_deref(), Some("Roe, Jane"));
        assert_eq!(parsed[1].address, "bob@y.io");
        assert_eq!(parsed[1].name, None);
    }

    #[test]
    fn lowercases_address_and_domain_but_preserves_name_case() {
        let parsed = parse_header(r#""Jane ROE" <JANE@BETA.IO>"#);
        assert_eq!(parsed[0].address, "jane@beta.io");
        assert_eq!(parsed[0].domain, "beta.io");
        assert_eq!(parsed[0].name.as_deref(), Some("Jane ROE"));
    }

    #[test]
    fn drops_invalid_tokens_silently() {
        // no @, no '.', empty local part, empty domain
        let parsed = parse_header("not-an-address, @nodomain.com, user@, user@nodot, ok@ok.io");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].address, "ok@ok.io");
    }

    #[test]
    fn last_angle_bracket_group_wins_when_multiple_present() {
        let parsed = parse_header("Prefix <ignored@x.io> trailer <real@y.io>");
        assert_eq!(parsed[0].address, "real@y.io");
    }

    #[test]
    fn empty_header_yields_no_addresses() {
        assert_eq!(parse_header(""), vec![]);
        assert_eq!(parse_header("   "), vec![]);
    }

    /// P5: parsing is involutive over a render round-trip for valid parsed addresses.
    #[test]
    fn property_parse_is_involutive_over_render(
    ) {
        let cases = vec![
            vec![ParsedAddress {
                address: "jane@beta.io".to_string(),
                name: Some("Jane Roe".to_string()),
                domain: "beta.io".to_string(),
            }],
            vec![ParsedAddress {
                address: "me@acme.com".to_string(),
                name: None,
                domain: "acme.com".to_string(),
            }],
        ];

        for case in cases {
            let rendered = render(&case);
            let reparsed = parse_header(&rendered);
            assert_eq!(reparsed, case);
        }
    }
}
