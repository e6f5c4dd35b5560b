//! Request heuristics used by the local oracle
//!
//! - Shield rules: SQL injection, script injection and path traversal
//!   signatures in the request target
//! - Bot detection: automation user agents, with an allow-list of crawlers

use lazy_static::lazy_static;
use regex::Regex;

/// A named attack signature
#[derive(Debug)]
pub struct ShieldRule {
    pub name: &'static str,
    pub pattern: Regex,
}

lazy_static! {
    static ref SHIELD_RULES: Vec<ShieldRule> = vec![
        ShieldRule {
            name: "sql_injection",
            // Plain words like "select one from list" are fine; a SELECT counts
            // after a quote, semicolon or closing paren, or as `select *`
            pattern: Regex::new(
                r#"(?i)(\bunion\b[\s\S]*\bselect\b|['";)]\s*select\b[\s\S]*\bfrom\b|\bselect\s*\*\s*from\b|\binsert\s+into\b[\s\S]*\bvalues\s*\(|\bdrop\b\s+\btable\b|\bor\b\s+'?\d+'?\s*=\s*'?\d+|'\s*(or|and)\s+'|--\s*$|;\s*(drop|delete|update|insert)\b|\bsleep\s*\(|\bbenchmark\s*\()"#
            )
            .expect("sql injection pattern compiles"),
        },
        ShieldRule {
            name: "script_injection",
            pattern: Regex::new(r"(?i)(<\s*script\b|javascript\s*:|\bon(error|load|click|mouseover)\s*=|<\s*iframe\b|<\s*img\b[^>]*\bsrc\s*=)")
                .expect("script injection pattern compiles"),
        },
        ShieldRule {
            name: "path_traversal",
            pattern: Regex::new(r"(\.\./|\.\.\\|/etc/passwd|\x00)")
                .expect("path traversal pattern compiles"),
        },
    ];

    static ref AUTOMATION_UA: Regex = Regex::new(
        r"(?i)(bot|crawl|spider|scrap|slurp|headless|phantomjs|selenium|puppeteer|playwright|python-requests|python-urllib|aiohttp|go-http-client|java/|libwww-perl|wget|scrapy|httpclient|okhttp)"
    )
    .expect("user agent pattern compiles");
}

/// Name of the first shield rule the request target trips, if any.
///
/// The target is checked both raw and percent-decoded, with `+` read as a
/// space.
pub fn shield_violation(path_and_query: &str) -> Option<&'static str> {
    let spaced = path_and_query.replace('+', " ");
    let decoded = urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| spaced.clone());

    SHIELD_RULES
        .iter()
        .find(|rule| rule.pattern.is_match(path_and_query) || rule.pattern.is_match(&decoded))
        .map(|rule| rule.name)
}

/// Bot classification for user agents
#[derive(Debug, Clone)]
pub struct BotDetector {
    allowed: Vec<String>,
    block_missing: bool,
}

impl BotDetector {
    pub fn new(allowed: &[String], block_missing: bool) -> Self {
        Self {
            allowed: allowed.iter().map(|name| name.to_lowercase()).collect(),
            block_missing,
        }
    }

    /// Whether the user agent belongs to an automated client that is not allow-listed
    pub fn is_bot(&self, user_agent: Option<&str>) -> bool {
        let ua = match user_agent.map(str::trim) {
            Some(ua) if !ua.is_empty() => ua,
            _ => return self.block_missing,
        };

        let lowered = ua.to_lowercase();
        if self.allowed.iter().any(|name| lowered.contains(name.as_str())) {
            return false;
        }

        AUTOMATION_UA.is_match(ua)
    }
}
