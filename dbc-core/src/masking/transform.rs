//! Reference value transforms for each masking type.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use sha2::{Digest, Sha256};

use super::args::{MaskingParams, PartialFill};

/// Apply a masking function to a single value.
///
/// `session_key` seeds SHUFFLE so the same value shuffles the same way within
/// one session. Returns `None` only for NULLIFY.
pub fn apply(value: &str, params: &MaskingParams, session_key: &str) -> Option<String> {
    match params {
        MaskingParams::None => Some(value.to_string()),
        MaskingParams::Redact { placeholder } => Some(placeholder.clone()),
        MaskingParams::Partial { start, end, fill } => Some(partial(value, *start, *end, fill)),
        MaskingParams::Hash { salt } => Some(hash(value, salt)),
        MaskingParams::Nullify => None,
        MaskingParams::Shuffle { seed } => Some(shuffle(value, session_key, seed.as_deref())),
        MaskingParams::Custom {
            pattern,
            replacement,
        } => Some(pattern.replace_all(value, replacement.as_str()).into_owned()),
    }
}

/// Keep `start` leading and `end` trailing characters and hide the rest.
///
/// A value with no hidden middle is masked entirely.
fn partial(value: &str, start: usize, end: usize, fill: &PartialFill) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();

    if len <= start.saturating_add(end) {
        return match fill {
            PartialFill::Char(c) => std::iter::repeat_n(*c, len).collect(),
            PartialFill::Literal(mask) => mask.clone(),
        };
    }

    let head: String = chars[..start].iter().collect();
    let tail: String = chars[len - end..].iter().collect();
    let middle = match fill {
        PartialFill::Char(c) => std::iter::repeat_n(*c, len - start - end).collect(),
        PartialFill::Literal(mask) => mask.clone(),
    };
    format!("{head}{middle}{tail}")
}

fn hash(value: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

fn shuffle(value: &str, session_key: &str, seed: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_key.as_bytes());
    if let Some(seed) = seed {
        hasher.update(b":");
        hasher.update(seed.as_bytes());
    }
    let mut rng = StdRng::from_seed(hasher.finalize().into());

    let mut chars: Vec<char> = value.chars().collect();
    chars.shuffle(&mut rng);
    chars.into_iter().collect()
}
