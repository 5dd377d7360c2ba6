//! Masking pattern registry.
//!
//! Validates pattern arguments before anything is written, and refuses to
//! delete a pattern that an active policy still references.

use std::sync::Arc;

use tracing::info;

use super::args::{parse_args, validate_args};
use super::transform;
use crate::db::{self, Database};
use crate::error::{Error, Result};
use crate::types::{MaskingPattern, MaskingPatternUpdate, MaskingType, NewMaskingPattern};

/// Standard patterns installed by [`MaskingRegistry::seed_defaults`].
const DEFAULT_PATTERNS: &[(&str, &str, MaskingType, Option<&str>)] = &[
    ("Full Masking", "Completely hide the data", MaskingType::Redact, None),
    (
        "Partial Masking (Credit Card)",
        "Show only last 4 digits",
        MaskingType::Partial,
        Some(r#"{"start": 0, "end": 4, "mask": "************"}"#),
    ),
    (
        "Partial Masking (US Phone)",
        "Show only last 4 digits (XXX-XXX-1234)",
        MaskingType::Partial,
        Some(r#"{"start": 0, "end": 4, "mask": "***-***-"}"#),
    ),
    (
        "Initial Masking",
        "Show only first character",
        MaskingType::Partial,
        Some(r#"{"start": 1, "end": 0, "mask": "*****"}"#),
    ),
    ("Nullify", "Return NULL for sensitive data", MaskingType::Nullify, None),
    ("Hashing", "One-way SHA-256 hash for analytics", MaskingType::Hash, None),
];

#[derive(Clone)]
pub struct MaskingRegistry {
    db: Arc<Database>,
}

impl MaskingRegistry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create(&self, input: NewMaskingPattern) -> Result<MaskingPattern> {
        if input.name.trim().is_empty() {
            return Err(Error::validation("Masking pattern name is required"));
        }
        validate_args(input.masking_type, input.masking_args.as_deref())?;

        let now = db::now();
        let pattern = MaskingPattern {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            masking_type: input.masking_type,
            masking_args: normalize_args(input.masking_args),
            created_at: now,
            updated_at: now,
        };
        self.db.insert_masking_pattern(&pattern)?;

        info!(id = %pattern.id, name = %pattern.name, masking_type = %pattern.masking_type, "Created masking pattern");
        Ok(pattern)
    }

    /// Apply a partial update. The merged pattern is validated as a whole, so
    /// changing only the type still checks the stored arguments against it.
    pub fn update(&self, id: &str, update: MaskingPatternUpdate) -> Result<MaskingPattern> {
        let mut pattern = self.get(id)?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(Error::validation("Masking pattern name is required"));
            }
            pattern.name = name;
        }
        if let Some(description) = update.description {
            pattern.description = Some(description).filter(|d| !d.is_empty());
        }
        if let Some(masking_type) = update.masking_type {
            pattern.masking_type = masking_type;
        }
        if let Some(args) = update.masking_args {
            pattern.masking_args = normalize_args(Some(args));
        }

        validate_args(pattern.masking_type, pattern.masking_args.as_deref())?;
        pattern.updated_at = db::now();
        self.db.replace_masking_pattern(&pattern)?;

        info!(id = %pattern.id, masking_type = %pattern.masking_type, "Updated masking pattern");
        Ok(pattern)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.db.delete_unreferenced_masking_pattern(id)?;
        info!(id, "Deleted masking pattern");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<MaskingPattern>> {
        self.db.list_masking_patterns()
    }

    pub fn get(&self, id: &str) -> Result<MaskingPattern> {
        self.db
            .get_masking_pattern(id)?
            .ok_or_else(|| Error::not_found("MaskingPattern", id))
    }

    /// Install the standard pattern set if the registry is empty.
    ///
    /// Returns the patterns created, which is empty when anything already exists.
    pub fn seed_defaults(&self) -> Result<Vec<MaskingPattern>> {
        if self.db.count_masking_patterns()? > 0 {
            return Ok(Vec::new());
        }

        let created = DEFAULT_PATTERNS
            .iter()
            .map(|(name, description, masking_type, args)| {
                self.create(NewMaskingPattern {
                    name: name.to_string(),
                    description: Some(description.to_string()),
                    masking_type: *masking_type,
                    masking_args: args.map(str::to_string),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(count = created.len(), "Seeded default masking patterns");
        Ok(created)
    }

    /// Run a (possibly unsaved) pattern against a sample value.
    pub fn preview(
        masking_type: MaskingType,
        masking_args: Option<&str>,
        value: &str,
    ) -> Result<Option<String>> {
        let params = parse_args(masking_type, masking_args)?;
        Ok(transform::apply(value, &params, "preview"))
    }
}

/// Blank argument text is stored as NULL.
fn normalize_args(args: Option<String>) -> Option<String> {
    args.filter(|a| !a.trim().is_empty())
}
