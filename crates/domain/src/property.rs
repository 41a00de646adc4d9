//! Property cells — the current value of one property, guarded by its schema.

use serde_json::Value;

use crate::error::ValidationError;
use crate::schema::DataSchema;

/// One property's current value plus the schema every write is checked
/// against.
///
/// A cell distinguishes two write paths: [`set`](Self::set) is the
/// client-facing one and honours `readOnly`, while [`sync`](Self::sync) is
/// the device-facing one and bypasses it. Both validate against the schema,
/// and a failed validation leaves the stored value untouched.
#[derive(Debug, Clone)]
pub struct PropertyCell {
    name: String,
    value: Value,
    schema: DataSchema,
}

impl PropertyCell {
    /// Create a cell holding `initial`, validated against `schema`.
    ///
    /// # Errors
    ///
    /// Fails when the initial value does not satisfy the schema. The
    /// `readOnly` flag is not consulted here; read-only properties still
    /// need a starting value.
    pub fn new(
        name: impl Into<String>,
        schema: DataSchema,
        initial: Value,
    ) -> Result<Self, ValidationError> {
        schema.validate(&initial)?;
        Ok(Self {
            name: name.into(),
            value: initial,
            schema,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn schema(&self) -> &DataSchema {
        &self.schema
    }

    /// Write through the client-facing path.
    ///
    /// # Errors
    ///
    /// Rejects read-only properties with [`ValidationError::ReadOnly`] and
    /// schema violations with the underlying error; the stored value is
    /// unchanged in both cases.
    pub fn set(&mut self, value: Value) -> Result<(), ValidationError> {
        if self.schema.read_only {
            return Err(ValidationError::ReadOnly {
                name: self.name.clone(),
            });
        }
        self.sync(value)
    }

    /// Write through the device-facing path, bypassing `readOnly`.
    ///
    /// # Errors
    ///
    /// Rejects schema violations; the stored value is unchanged.
    pub fn sync(&mut self, value: Value) -> Result<(), ValidationError> {
        self.schema.validate(&value)?;
        self.value = value;
        Ok(())
    }
}
