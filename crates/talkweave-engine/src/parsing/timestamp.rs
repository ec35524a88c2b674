//! Timestamp pattern compiler and parser.
//!
//! Each locale variant's date-format template is compiled once into a
//! matching [`regex::Regex`] plus a field-extraction plan; the compiled
//! matchers are reused for every candidate text node. Parsing resolves the
//! matched calendar fields in the wiki's local timezone, disambiguating
//! daylight-saving fall-back instants toward the earlier candidate and
//! reporting an inconsistent abbreviation as a warning instead of a failure.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use talkweave_locale::LocaleConfig;
use thiserror::Error;

/// Calendar field a capturing group maps to, in group order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Year,
    MonthName,
    MonthNameGenitive,
    Month,
    Day,
    Hour,
    Minute,
    Weekday,
    TimezoneAbbr,
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("locale '{locale}': invalid timestamp pattern: {source}")]
    Regex {
        locale: String,
        source: regex::Error,
    },

    #[error("locale '{locale}': unknown timezone '{timezone}'")]
    Timezone { locale: String, timezone: String },
}

/// Bidi control characters tolerated between fields (copy-paste artifacts).
const BIDI: &str = "[\u{200e}\u{200f}]*";

/// Instants before this date use the legacy fixed-width digit encoding in
/// identifiers and serialized records; later instants use strict RFC 3339.
static TIMESTAMP_KEY_SWITCH: LazyLock<DateTime<Utc>> = LazyLock::new(|| {
    // Known-valid constant; the unwrap cannot fire.
    Utc.with_ymd_and_hms(2022, 7, 1, 0, 0, 0).unwrap()
});

/// Canonical timestamp string folded into identifiers and records.
pub fn timestamp_key(ts: &DateTime<Utc>) -> String {
    if *ts < *TIMESTAMP_KEY_SWITCH {
        ts.format("%Y%m%d%H%M%S").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

/// Accepts both canonical encodings: the fixed-width digit form and RFC 3339.
pub fn parse_timestamp_key(s: &str) -> Option<DateTime<Utc>> {
    if s.len() == 14 && s.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M%S")
            .ok()
            .map(|naive| naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// One compiled matcher per locale variant.
pub struct TimestampMatcher {
    pub language: String,
    regex: Regex,
    plan: Vec<DateField>,
    digits: Option<Vec<char>>,
    month_names: Vec<String>,
    month_names_genitive: Vec<String>,
    tz: Tz,
    tz_abbreviations: HashMap<String, String>,
}

/// A successfully parsed timestamp occurrence within a text node.
#[derive(Debug, Clone)]
pub struct TimestampHit {
    /// Index of the matcher (= locale priority) that produced the hit.
    pub matcher: usize,
    /// Byte range of the match within the text node.
    pub start: usize,
    pub end: usize,
    pub instant: DateTime<Utc>,
    pub warning: Option<String>,
}

impl TimestampMatcher {
    pub fn compile(config: &LocaleConfig) -> Result<Self, PatternError> {
        let (source, plan) = build_pattern(config);
        let regex = Regex::new(&source).map_err(|source| PatternError::Regex {
            locale: config.language.clone(),
            source,
        })?;
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|_| PatternError::Timezone {
                locale: config.language.clone(),
                timezone: config.timezone.clone(),
            })?;
        let digits = config
            .digits
            .as_ref()
            .map(|glyphs| glyphs.iter().filter_map(|g| g.chars().next()).collect());
        Ok(TimestampMatcher {
            language: config.language.clone(),
            regex,
            plan,
            digits,
            month_names: config.month_names.clone(),
            month_names_genitive: config.genitive_months().to_vec(),
            tz,
            tz_abbreviations: config.timezone_abbreviations.clone(),
        })
    }

    /// First parseable match at or after byte offset `from`.
    pub fn find_in(&self, text: &str, from: usize) -> Option<(std::ops::Range<usize>, DateTime<Utc>, Option<String>)> {
        for caps in self.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() < from {
                continue;
            }
            if let Some((instant, warning)) = self.parse_captures(&caps) {
                return Some((whole.range(), instant, warning));
            }
        }
        None
    }

    /// Apply the field-extraction plan to a successful match.
    fn parse_captures(&self, caps: &regex::Captures<'_>) -> Option<(DateTime<Utc>, Option<String>)> {
        let mut year: Option<i32> = None;
        let mut month0: Option<u32> = None;
        let mut day: Option<u32> = None;
        let mut hour: Option<u32> = None;
        let mut minute: Option<u32> = None;
        let mut abbr: Option<&str> = None;

        for (i, field) in self.plan.iter().enumerate() {
            let text = caps.get(i + 1)?.as_str();
            match field {
                DateField::Year => year = Some(self.localized_number(text)? as i32),
                DateField::Month => month0 = Some(self.localized_number(text)?.checked_sub(1)?),
                DateField::MonthName => {
                    month0 = Some(position_of(&self.month_names, text)? as u32)
                }
                DateField::MonthNameGenitive => {
                    month0 = Some(position_of(&self.month_names_genitive, text)? as u32)
                }
                DateField::Day => day = Some(self.localized_number(text)?),
                DateField::Hour => hour = Some(self.localized_number(text)?),
                DateField::Minute => minute = Some(self.localized_number(text)?),
                DateField::Weekday => {}
                DateField::TimezoneAbbr => abbr = Some(text),
            }
        }

        let naive = NaiveDate::from_ymd_opt(year?, month0? + 1, day?)?.and_hms_opt(hour?, minute?, 0)?;
        self.resolve_local(naive, abbr?)
    }

    /// Resolve a local wall-clock time to an instant, preferring the
    /// daylight-saving candidate whose abbreviation matches the signature.
    fn resolve_local(
        &self,
        naive: NaiveDateTime,
        matched_abbr: &str,
    ) -> Option<(DateTime<Utc>, Option<String>)> {
        let canonical = self
            .tz_abbreviations
            .get(matched_abbr)
            .cloned()
            .unwrap_or_else(|| matched_abbr.to_string());

        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => {
                let actual = dt.format("%Z").to_string();
                let warning = (actual != canonical).then(|| wrong_abbr_warning(&canonical, &actual));
                Some((dt.with_timezone(&Utc), warning))
            }
            LocalResult::Ambiguous(earlier, later) => {
                if earlier.format("%Z").to_string() == canonical {
                    Some((earlier.with_timezone(&Utc), None))
                } else if later.format("%Z").to_string() == canonical {
                    Some((later.with_timezone(&Utc), None))
                } else {
                    // Neither candidate carries the claimed abbreviation;
                    // force the earlier instant and report the mismatch.
                    let actual = earlier.format("%Z").to_string();
                    Some((
                        earlier.with_timezone(&Utc),
                        Some(wrong_abbr_warning(&canonical, &actual)),
                    ))
                }
            }
            LocalResult::None => {
                // Nonexistent wall-clock time (spring-forward gap): shift
                // through the gap and back to keep the claimed clock reading.
                let shifted = self
                    .tz
                    .from_local_datetime(&(naive + Duration::hours(1)))
                    .earliest()?;
                Some((shifted.with_timezone(&Utc) - Duration::hours(1), None))
            }
        }
    }

    fn localized_number(&self, text: &str) -> Option<u32> {
        let ascii: String = match &self.digits {
            None => text.to_string(),
            Some(glyphs) => text
                .chars()
                .map(|c| {
                    glyphs
                        .iter()
                        .position(|g| *g == c)
                        .and_then(|d| char::from_digit(d as u32, 10))
                        .unwrap_or(c)
                })
                .collect(),
        };
        ascii.parse().ok()
    }
}

fn wrong_abbr_warning(claimed: &str, actual: &str) -> String {
    format!("Timestamp has timezone abbreviation {claimed}, but the resolved time is in {actual}")
}

fn position_of(names: &[String], text: &str) -> Option<usize> {
    names.iter().position(|n| n == text)
}

fn name_group(names: &[String]) -> String {
    let alternatives: Vec<String> = names.iter().map(|n| regex::escape(n)).collect();
    format!("({})", alternatives.join("|"))
}

fn digit_class(config: &LocaleConfig) -> String {
    match &config.digits {
        Some(glyphs) => {
            let chars: String = glyphs.iter().map(|g| regex::escape(g)).collect();
            format!("[{chars}]")
        }
        None => r"\d".to_string(),
    }
}

/// Compile a date-format template into a regex source and extraction plan.
///
/// Every format code becomes a capturing group; every literal character is
/// escaped. An unterminated quote is a literal quote, a trailing escape is a
/// literal backslash, and bidi controls are tolerated between tokens.
fn build_pattern(config: &LocaleConfig) -> (String, Vec<DateField>) {
    let d = digit_class(config);
    let mut pattern = String::new();
    let mut plan = Vec::new();
    let format: Vec<char> = config.date_format.chars().collect();

    let weekday_group = if config.day_names.is_empty() {
        r"(\S+)".to_string()
    } else {
        name_group(&config.day_names)
    };

    let push_field = |pattern: &mut String, plan: &mut Vec<DateField>, group: String, field: DateField| {
        pattern.push_str(&group);
        pattern.push_str(BIDI);
        plan.push(field);
    };
    let push_literal = |pattern: &mut String, c: char| {
        pattern.push_str(&regex::escape(&c.to_string()));
        pattern.push_str(BIDI);
    };

    let mut i = 0;
    while i < format.len() {
        let c = format[i];
        i += 1;
        match c {
            'Y' => push_field(&mut pattern, &mut plan, format!("({d}{{4}})"), DateField::Year),
            'F' | 'M' => push_field(
                &mut pattern,
                &mut plan,
                name_group(&config.month_names),
                DateField::MonthName,
            ),
            'x' if format.get(i) == Some(&'g') => {
                i += 1;
                push_field(
                    &mut pattern,
                    &mut plan,
                    name_group(config.genitive_months()),
                    DateField::MonthNameGenitive,
                );
            }
            'n' => push_field(&mut pattern, &mut plan, format!("({d}{{1,2}})"), DateField::Month),
            'm' => push_field(&mut pattern, &mut plan, format!("({d}{{2}})"), DateField::Month),
            'j' => push_field(&mut pattern, &mut plan, format!("({d}{{1,2}})"), DateField::Day),
            'd' => push_field(&mut pattern, &mut plan, format!("({d}{{2}})"), DateField::Day),
            'D' | 'l' => push_field(&mut pattern, &mut plan, weekday_group.clone(), DateField::Weekday),
            'G' => push_field(&mut pattern, &mut plan, format!("({d}{{1,2}})"), DateField::Hour),
            'H' => push_field(&mut pattern, &mut plan, format!("({d}{{2}})"), DateField::Hour),
            'i' => push_field(&mut pattern, &mut plan, format!("({d}{{2}})"), DateField::Minute),
            '\\' => {
                // A trailing escape is a literal backslash.
                match format.get(i) {
                    Some(&next) => {
                        i += 1;
                        push_literal(&mut pattern, next);
                    }
                    None => push_literal(&mut pattern, '\\'),
                }
            }
            '"' => {
                // Quoted literal run; an unterminated quote is a literal '"'.
                match format[i..].iter().position(|&q| q == '"') {
                    Some(len) => {
                        for &q in &format[i..i + len] {
                            push_literal(&mut pattern, q);
                        }
                        i += len + 1;
                    }
                    None => push_literal(&mut pattern, '"'),
                }
            }
            other => push_literal(&mut pattern, other),
        }
    }

    // Fixed local-timezone disambiguation group.
    let mut abbrs: Vec<&String> = config.timezone_abbreviations.keys().collect();
    abbrs.sort();
    let abbr_group: Vec<String> = abbrs.iter().map(|a| regex::escape(a)).collect();
    pattern.push_str(&format!(r"\s*{BIDI}\(({})\)", abbr_group.join("|")));
    plan.push(DateField::TimezoneAbbr);

    (pattern, plan)
}

/// All compiled matchers for a site, in locale-priority order.
///
/// Build once from the static locale bundles and reuse for every parse; the
/// registry is read-only after construction.
pub struct TimestampRegistry {
    matchers: Vec<TimestampMatcher>,
}

impl TimestampRegistry {
    pub fn new(locales: &[LocaleConfig]) -> Result<Self, PatternError> {
        let matchers = locales
            .iter()
            .map(TimestampMatcher::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TimestampRegistry { matchers })
    }

    pub fn matchers(&self) -> &[TimestampMatcher] {
        &self.matchers
    }

    /// First hit at or after byte offset `from`, trying matchers in
    /// configured priority order; the first variant that matches wins.
    pub fn find_in(&self, text: &str, from: usize) -> Option<TimestampHit> {
        for (index, matcher) in self.matchers.iter().enumerate() {
            if let Some((range, instant, warning)) = matcher.find_in(text, from) {
                return Some(TimestampHit {
                    matcher: index,
                    start: range.start,
                    end: range.end,
                    instant,
                    warning,
                });
            }
        }
        None
    }
}
