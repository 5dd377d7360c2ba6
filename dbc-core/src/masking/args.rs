//! Validation of masking pattern arguments.
//!
//! Arguments are stored as JSON text. Each masking type accepts one shape; the
//! parsed form is [`MaskingParams`], which is what the transforms consume.

use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::MaskingType;

/// Placeholder written by REDACT when none is configured.
pub const DEFAULT_PLACEHOLDER: &str = "*****";

/// Fill character used by PARTIAL when neither `mask` nor `char` is given.
pub const DEFAULT_MASK_CHAR: char = '*';

/// How PARTIAL hides the middle of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartialFill {
    /// One character per hidden character.
    Char(char),
    /// A fixed literal regardless of how many characters are hidden.
    Literal(String),
}

/// Validated, typed masking arguments.
#[derive(Debug, Clone)]
pub enum MaskingParams {
    None,
    Redact { placeholder: String },
    Partial { start: usize, end: usize, fill: PartialFill },
    Hash { salt: String },
    Nullify,
    Shuffle { seed: Option<String> },
    Custom { pattern: Regex, replacement: String },
}

impl MaskingParams {
    pub fn masking_type(&self) -> MaskingType {
        match self {
            MaskingParams::None => MaskingType::None,
            MaskingParams::Redact { .. } => MaskingType::Redact,
            MaskingParams::Partial { .. } => MaskingType::Partial,
            MaskingParams::Hash { .. } => MaskingType::Hash,
            MaskingParams::Nullify => MaskingType::Nullify,
            MaskingParams::Shuffle { .. } => MaskingType::Shuffle,
            MaskingParams::Custom { .. } => MaskingType::Custom,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RedactArgs {
    placeholder: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialArgs {
    start: usize,
    end: usize,
    mask: Option<String>,
    #[serde(rename = "char")]
    mask_char: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HashArgs {
    salt: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ShuffleArgs {
    seed: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CustomArgs {
    pattern: String,
    replacement: String,
}

/// Parse and validate `args` for `masking_type`.
///
/// Blank text and JSON `null` count as absent. PARTIAL and CUSTOM require
/// arguments; every other type works without them.
pub fn parse_args(masking_type: MaskingType, args: Option<&str>) -> Result<MaskingParams> {
    let value = match args.map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(text) => {
            let value: Value = serde_json::from_str(text).map_err(|e| {
                Error::validation(format!("maskingArgs is not valid JSON: {}", e))
            })?;
            match value {
                Value::Null => None,
                Value::Object(_) => Some(value),
                _ => {
                    return Err(Error::validation("maskingArgs must be a JSON object"));
                }
            }
        }
    };

    match masking_type {
        MaskingType::None => {
            shape::<NoArgs>(masking_type, value)?;
            Ok(MaskingParams::None)
        }
        MaskingType::Nullify => {
            shape::<NoArgs>(masking_type, value)?;
            Ok(MaskingParams::Nullify)
        }
        MaskingType::Redact => {
            let args = shape::<RedactArgs>(masking_type, value)?;
            Ok(MaskingParams::Redact {
                placeholder: args
                    .and_then(|a| a.placeholder)
                    .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string()),
            })
        }
        MaskingType::Hash => {
            let args = shape::<HashArgs>(masking_type, value)?;
            Ok(MaskingParams::Hash {
                salt: args.and_then(|a| a.salt).unwrap_or_default(),
            })
        }
        MaskingType::Shuffle => {
            let args = shape::<ShuffleArgs>(masking_type, value)?;
            Ok(MaskingParams::Shuffle {
                seed: args.and_then(|a| a.seed),
            })
        }
        MaskingType::Partial => {
            let args = required::<PartialArgs>(masking_type, value)?;
            let fill = match (args.mask, args.mask_char) {
                (Some(_), Some(_)) => {
                    return Err(Error::validation(
                        "PARTIAL arguments accept either `mask` or `char`, not both",
                    ));
                }
                (Some(mask), None) => PartialFill::Literal(mask),
                (None, Some(c)) => {
                    let mut chars = c.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => PartialFill::Char(c),
                        _ => {
                            return Err(Error::validation(
                                "PARTIAL `char` must be exactly one character",
                            ));
                        }
                    }
                }
                (None, None) => PartialFill::Char(DEFAULT_MASK_CHAR),
            };
            Ok(MaskingParams::Partial {
                start: args.start,
                end: args.end,
                fill,
            })
        }
        MaskingType::Custom => {
            let args = required::<CustomArgs>(masking_type, value)?;
            let pattern = Regex::new(&args.pattern).map_err(|e| {
                Error::validation(format!("CUSTOM pattern is not a valid regex: {}", e))
            })?;
            Ok(MaskingParams::Custom {
                pattern,
                replacement: args.replacement,
            })
        }
    }
}

/// Validate without keeping the parsed form.
pub fn validate_args(masking_type: MaskingType, args: Option<&str>) -> Result<()> {
    parse_args(masking_type, args).map(|_| ())
}

fn shape<T: DeserializeOwned>(masking_type: MaskingType, value: Option<Value>) -> Result<Option<T>> {
    value
        .map(|v| {
            serde_json::from_value(v).map_err(|e| {
                Error::validation(format!("Invalid {} arguments: {}", masking_type, e))
            })
        })
        .transpose()
}

fn required<T: DeserializeOwned>(masking_type: MaskingType, value: Option<Value>) -> Result<T> {
    shape(masking_type, value)?
        .ok_or_else(|| Error::validation(format!("{} masking requires arguments", masking_type)))
}
