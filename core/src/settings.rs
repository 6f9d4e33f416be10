//! Run settings (spec §6.1).
//!
//! The on-disk TOML settings file is parsed by an external collaborator
//! (the CLI crate, see `sortition-cli`); this struct is the contract the
//! core actually consumes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    Legacy,
    Maximin,
    Leximin,
    Nash,
}

impl Algorithm {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "legacy" => Some(Algorithm::Legacy),
            "maximin" => Some(Algorithm::Maximin),
            "leximin" => Some(Algorithm::Leximin),
            "nash" => Some(Algorithm::Nash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub id_column: String,
    pub columns_to_keep: Vec<String>,
    pub check_same_address: bool,
    pub check_same_address_columns: Vec<String>,
    pub max_attempts: u32,
    pub selection_algorithm: Algorithm,
    pub random_number_seed: u64,
    pub number_selections: u32,
    pub test_selection: bool,
}

impl Settings {
    /// Validates the cross-field invariants spec §6.1 names explicitly:
    /// the address-match column list is either empty or has exactly two
    /// entries, and exactly two are required when the flag is set.
    pub fn validate(&self) -> Result<(), crate::error::CoreError> {
        use crate::error::CoreError;

        match self.check_same_address_columns.len() {
            0 | 2 => {}
            _ => {
                return Err(CoreError::ConfigError(
                    "check_same_address_columns must have length 0 or 2".to_string(),
                ))
            }
        }

        if self.check_same_address && self.check_same_address_columns.len() != 2 {
            return Err(CoreError::ConfigError(
                "check_same_address requires exactly two check_same_address_columns".to_string(),
            ));
        }

        if self.number_selections == 0 {
            return Err(CoreError::ConfigError(
                "number_selections must be >= 1".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            id_column: "id".to_string(),
            columns_to_keep: Vec::new(),
            check_same_address: false,
            check_same_address_columns: Vec::new(),
            max_attempts: 100,
            selection_algorithm: Algorithm::Maximin,
            random_number_seed: 0,
            number_selections: 1,
            test_selection: false,
        }
    }
}
