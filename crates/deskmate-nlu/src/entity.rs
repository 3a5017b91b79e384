//! Entity extraction from support queries.
//!
//! Each entity kind is matched by an ordered list of patterns. The first
//! pattern that yields an acceptable match wins, so at most one entity per
//! kind is reported.

use chrono::{Datelike, Days, Local, Months, NaiveDate, Weekday};
use regex::{Captures, Regex};
use tracing::debug;

use deskmate_core::types::{Entity, EntityKind, EntityMap};

const MONTHS: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";
const WEEKDAYS: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday";

/// Which capture layout a date pattern uses.
#[derive(Debug, Clone, Copy)]
enum DateShape {
    /// 2024-03-15, 2024/03/15
    YearMonthDay,
    /// 03/15/2024, 3-15-24
    MonthDayYear,
    /// March 15, 2024
    NamedMonthDayYear,
    /// 15 March 2024
    DayNamedMonthYear,
    /// today, last week, next friday
    Relative,
}

/// Extracts account numbers, order numbers, dates and amounts from text.
pub struct EntityExtractor {
    order_patterns: Vec<Regex>,
    account_patterns: Vec<Regex>,
    standalone_account: Regex,
    amount_patterns: Vec<Regex>,
    date_patterns: Vec<(Regex, DateShape)>,
    ordinal_suffix: Regex,
}

impl EntityExtractor {
    /// Create a new extractor with pre-compiled patterns.
    pub fn new() -> Self {
        Self {
            order_patterns: vec![
                Regex::new(
                    r"(?i:\border)\s*(?:(?i:number|num|id|no\.?)\s*)?(?:(?i:is)\s+)?[#:]?\s*([A-Z0-9]{6,15})\b",
                )
                .unwrap(),
                Regex::new(r"\b(ORD[-_]?\d{4,12})\b").unwrap(),
            ],
            account_patterns: vec![
                Regex::new(
                    r"(?i)\baccount\s*(?:(?:number|num|id|no\.?)\s*)?(?:is\s+)?[#:]?\s*(\d{6,12})\b",
                )
                .unwrap(),
                Regex::new(r"(?i)\bacct?\.?\s*[#:]?\s*(\d{6,12})\b").unwrap(),
            ],
            standalone_account: Regex::new(r"\b(\d{10,12})\b").unwrap(),
            amount_patterns: vec![
                Regex::new(r"\$\s?(\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d+(?:\.\d{1,2})?)").unwrap(),
                Regex::new(r"(?i)\b(\d+(?:\.\d{1,2})?)\s*(?:dollars?|usd|bucks)\b").unwrap(),
            ],
            date_patterns: vec![
                (
                    Regex::new(r"\b(\d{4})[-/](\d{1,2})[-/](\d{1,2})\b").unwrap(),
                    DateShape::YearMonthDay,
                ),
                (
                    Regex::new(r"\b(\d{1,2})[-/](\d{1,2})[-/](\d{4}|\d{2})\b").unwrap(),
                    DateShape::MonthDayYear,
                ),
                (
                    Regex::new(&format!(
                        r"(?i)\b((?:{MONTHS})[a-z]*)\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"
                    ))
                    .unwrap(),
                    DateShape::NamedMonthDayYear,
                ),
                (
                    Regex::new(&format!(
                        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+((?:{MONTHS})[a-z]*)\.?,?\s+(\d{{4}})\b"
                    ))
                    .unwrap(),
                    DateShape::DayNamedMonthYear,
                ),
                (
                    Regex::new(&format!(
                        r"(?i)\b(today|yesterday|tomorrow|(?:last|next)\s+(?:week|month|year|{WEEKDAYS}))\b"
                    ))
                    .unwrap(),
                    DateShape::Relative,
                ),
            ],
            ordinal_suffix: Regex::new(r"(?i)(\d)(?:st|nd|rd|th)\b").unwrap(),
        }
    }

    /// Extract entities, resolving relative dates against the local date.
    pub fn extract(&self, text: &str) -> EntityMap {
        self.extract_at(text, Local::now().date_naive())
    }

    /// Extract entities, resolving relative dates against `today`.
    pub fn extract_at(&self, text: &str, today: NaiveDate) -> EntityMap {
        let mut entities = EntityMap::new();

        let order = self.find_order(text);
        let order_span = order.as_ref().map(|(_, start, end)| (*start, *end));
        if let Some((entity, _, _)) = order {
            entities.insert(EntityKind::OrderNumber, entity);
        }

        if let Some(entity) = self.find_account(text, order_span) {
            entities.insert(EntityKind::AccountNumber, entity);
        }

        if let Some(entity) = self.find_amount(text) {
            entities.insert(EntityKind::Amount, entity);
        }

        if let Some(entity) = self.find_date(text, today) {
            entities.insert(EntityKind::Date, entity);
        }

        debug!(count = entities.len(), "Entities extracted");
        entities
    }

    /// Render extracted entities as a one-line summary,
    /// e.g. `Account: 1234567890 | Amount: $49.99`.
    pub fn summary(entities: &EntityMap) -> String {
        if entities.is_empty() {
            return "No entities found".to_string();
        }
        entities
            .values()
            .map(|e| match e.kind {
                EntityKind::AccountNumber => format!("Account: {}", e.value),
                EntityKind::OrderNumber => format!("Order: {}", e.value),
                EntityKind::Date => format!("Date: {}", e.value),
                EntityKind::Amount => format!("Amount: {}", e.text),
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }

    // =========================================================================
    // Per-kind matchers
    // =========================================================================

    fn find_order(&self, text: &str) -> Option<(Entity, usize, usize)> {
        for pattern in &self.order_patterns {
            let found = pattern.captures_iter(text).find_map(|caps| {
                let id = caps.get(1)?;
                if !id.as_str().chars().any(|c| c.is_ascii_digit()) {
                    return None;
                }
                let whole = caps.get(0)?;
                Some((
                    Entity {
                        kind: EntityKind::OrderNumber,
                        text: whole.as_str().to_string(),
                        value: id.as_str().to_string(),
                    },
                    whole.start(),
                    whole.end(),
                ))
            });
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn find_account(&self, text: &str, order_span: Option<(usize, usize)>) -> Option<Entity> {
        for pattern in &self.account_patterns {
            if let Some(caps) = pattern.captures(text) {
                return capture_entity(EntityKind::AccountNumber, &caps, |v| v.to_string());
            }
        }

        // A bare 10-12 digit run counts only outside the order number.
        self.standalone_account.captures_iter(text).find_map(|caps| {
            let m = caps.get(1)?;
            if let Some((start, end)) = order_span {
                if m.start() < end && start < m.end() {
                    return None;
                }
            }
            capture_entity(EntityKind::AccountNumber, &caps, |v| v.to_string())
        })
    }

    fn find_amount(&self, text: &str) -> Option<Entity> {
        self.amount_patterns.iter().find_map(|pattern| {
            let caps = pattern.captures(text)?;
            capture_entity(EntityKind::Amount, &caps, |v| v.replace(',', ""))
        })
    }

    fn find_date(&self, text: &str, today: NaiveDate) -> Option<Entity> {
        for (pattern, shape) in &self.date_patterns {
            let Some(caps) = pattern.captures(text) else {
                continue;
            };
            let matched = caps.get(0)?.as_str();
            let resolved = match shape {
                DateShape::YearMonthDay => ymd(&caps[1], &caps[2], &caps[3]),
                DateShape::MonthDayYear => ymd(&caps[3], &caps[1], &caps[2]),
                DateShape::NamedMonthDayYear => {
                    month_number(&caps[1]).and_then(|m| ymd(&caps[3], &m.to_string(), &caps[2]))
                }
                DateShape::DayNamedMonthYear => {
                    month_number(&caps[2]).and_then(|m| ymd(&caps[3], &m.to_string(), &caps[1]))
                }
                DateShape::Relative => resolve_relative(&caps[1], today),
            };

            // Unresolvable dates (e.g. 02/30/2024) keep their cleaned text.
            let value = match resolved {
                Some(date) => date.format("%Y-%m-%d").to_string(),
                None => self.ordinal_suffix.replace_all(matched, "$1").into_owned(),
            };
            return Some(Entity {
                kind: EntityKind::Date,
                text: matched.to_string(),
                value,
            });
        }
        None
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn capture_entity(
    kind: EntityKind,
    caps: &Captures<'_>,
    normalize: impl Fn(&str) -> String,
) -> Option<Entity> {
    let whole = caps.get(0)?;
    let value = caps.get(1)?;
    Some(Entity {
        kind,
        text: whole.as_str().to_string(),
        value: normalize(value.as_str()),
    })
}

// =============================================================================
// Date resolution
// =============================================================================

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let mut y: i32 = year.parse().ok()?;
    if year.len() == 2 {
        y += 2000;
    }
    NaiveDate::from_ymd_opt(y, month.parse().ok()?, day.parse().ok()?)
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.to_ascii_lowercase().chars().take(3).collect();
    MONTHS
        .split('|')
        .position(|m| m == prefix)
        .map(|i| i as u32 + 1)
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    name.parse::<Weekday>().ok()
}

fn resolve_relative(phrase: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = phrase.to_ascii_lowercase();
    let mut words = lower.split_whitespace();
    let first = words.next()?;
    match (first, words.next()) {
        ("today", None) => Some(today),
        ("yesterday", None) => today.checked_sub_days(Days::new(1)),
        ("tomorrow", None) => today.checked_add_days(Days::new(1)),
        ("last", Some("week")) => today.checked_sub_days(Days::new(7)),
        ("next", Some("week")) => today.checked_add_days(Days::new(7)),
        ("last", Some("month")) => today.checked_sub_months(Months::new(1)),
        ("next", Some("month")) => today.checked_add_months(Months::new(1)),
        ("last", Some("year")) => today.checked_sub_months(Months::new(12)),
        ("next", Some("year")) => today.checked_add_months(Months::new(12)),
        (direction, Some(day)) => {
            let target = weekday_from_name(day)?;
            // Strictly before (last) or strictly after (next) today.
            (1..=7u64).find_map(|offset| {
                let candidate = if direction == "last" {
                    today.checked_sub_days(Days::new(offset))?
                } else {
                    today.checked_add_days(Days::new(offset))?
                };
                (candidate.weekday() == target).then_some(candidate)
            })
        }
        _ => None,
    }
}
