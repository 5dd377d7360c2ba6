//! Environment conditions attached to data access policies.
//!
//! Grammar: `clause (AND clause)*` where a clause is
//! `time.hour|time.minute|time.weekday <op> <integer>` and `<op>` is one of
//! `<`, `<=`, `>`, `>=`, `==`, `!=`. Times are UTC; weekday 0 is Monday.

use std::fmt;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionField {
    Hour,
    Minute,
    Weekday,
}

impl ConditionField {
    fn value_at(&self, now: &DateTime<Utc>) -> i64 {
        match self {
            ConditionField::Hour => now.hour() as i64,
            ConditionField::Minute => now.minute() as i64,
            ConditionField::Weekday => now.weekday().num_days_from_monday() as i64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    fn holds(&self, left: i64, right: i64) -> bool {
        match self {
            Comparison::Lt => left < right,
            Comparison::Le => left <= right,
            Comparison::Gt => left > right,
            Comparison::Ge => left >= right,
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub field: ConditionField,
    pub op: Comparison,
    pub value: i64,
}

/// Parsed environment condition; an empty condition always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition {
    clauses: Vec<Clause>,
}

impl Condition {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::default());
        }

        let clauses = split_and(text)
            .into_iter()
            .map(parse_clause)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { clauses })
    }

    pub fn holds_at(&self, now: &DateTime<Utc>) -> bool {
        self.clauses
            .iter()
            .all(|c| c.op.holds(c.field.value_at(now), c.value))
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            let field = match clause.field {
                ConditionField::Hour => "time.hour",
                ConditionField::Minute => "time.minute",
                ConditionField::Weekday => "time.weekday",
            };
            let op = match clause.op {
                Comparison::Lt => "<",
                Comparison::Le => "<=",
                Comparison::Gt => ">",
                Comparison::Ge => ">=",
                Comparison::Eq => "==",
                Comparison::Ne => "!=",
            };
            write!(f, "{} {} {}", field, op, clause.value)?;
        }
        Ok(())
    }
}

/// Split on the keyword `AND` (any case) between whitespace.
fn split_and(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;
    loop {
        let lower = rest.to_ascii_lowercase();
        match lower.find(" and ") {
            Some(pos) => {
                parts.push(rest[..pos].trim());
                rest = &rest[pos + 5..];
            }
            None => {
                parts.push(rest.trim());
                return parts;
            }
        }
    }
}

fn parse_clause(clause: &str) -> Result<Clause> {
    let invalid = || Error::validation(format!("Invalid environment condition clause: '{}'", clause));

    // Two-character operators first so `<=` is not read as `<`.
    const OPS: [(&str, Comparison); 6] = [
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("==", Comparison::Eq),
        ("!=", Comparison::Ne),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
    ];
    let (pos, token, op) = OPS
        .iter()
        .find_map(|(token, op)| clause.find(token).map(|pos| (pos, *token, *op)))
        .ok_or_else(invalid)?;

    let field = match clause[..pos].trim().to_ascii_lowercase().as_str() {
        "time.hour" => ConditionField::Hour,
        "time.minute" => ConditionField::Minute,
        "time.weekday" => ConditionField::Weekday,
        _ => return Err(invalid()),
    };
    let value: i64 = clause[pos + token.len()..]
        .trim()
        .parse()
        .map_err(|_| invalid())?;

    Ok(Clause { field, op, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        // 2024-06-03 is a Monday.
        Utc.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
    }

    #[test]
    fn test_empty_condition_holds() {
        let c = Condition::parse("  ").unwrap();
        assert!(c.holds_at(&at(3, 0)));
    }

    #[test]
    fn test_business_hours() {
        let c = Condition::parse("time.hour >= 9 AND time.hour < 17").unwrap();
        assert_eq!(c.clauses().len(), 2);
        assert!(c.holds_at(&at(9, 0)));
        assert!(c.holds_at(&at(16, 59)));
        assert!(!c.holds_at(&at(17, 0)));
        assert!(!c.holds_at(&at(8, 59)));
    }

    #[test]
    fn test_weekday_and_minute() {
        let c = Condition::parse("time.weekday == 0 and time.minute != 30").unwrap();
        assert!(c.holds_at(&at(12, 0)));
        assert!(!c.holds_at(&at(12, 30)));

        let tuesday = Utc.with_ymd_and_hms(2024, 6, 4, 12, 0, 0).unwrap();
        assert!(!c.holds_at(&tuesday));
    }

    #[test]
    fn test_invalid_conditions() {
        assert!(Condition::parse("time.hour").is_err());
        assert!(Condition::parse("time.second > 3").is_err());
        assert!(Condition::parse("time.hour > nine").is_err());
        assert!(Condition::parse("time.hour > 9 AND").is_err());
        assert!(Condition::parse("ip == 10").is_err());
    }

    #[test]
    fn test_display_normalises() {
        let c = Condition::parse("TIME.HOUR>=9 AND time.hour<17").unwrap();
        assert_eq!(c.to_string(), "time.hour >= 9 AND time.hour < 17");
        assert_eq!(Condition::parse(&c.to_string()).unwrap(), c);
    }
}
