//! # Dataset Constants
//!
//! Fixed facts about the directory dataset and the export format. Tunable limits live in
//! [`crate::config`], not here.

/// Default cell value for absent location fields
pub const UNKNOWN_VALUE: &str = "Unknown";

/// Default cell value for any other absent field
pub const NOT_PRESENT_VALUE: &str = "not present";

/// Separator used inside a record's sub-subcategory field
pub const LABEL_SEPARATOR: char = ',';

/// Canonical spelling stored in the dataset for the United States
pub const CANONICAL_US: &str = "United States of America (U.S.A)";

/// Alias table applied to the country constraint before matching
pub const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("USA", CANONICAL_US),
    ("US", CANONICAL_US),
    ("United States", CANONICAL_US),
    (CANONICAL_US, CANONICAL_US),
    ("CAN", "Canada"),
    ("Canada", "Canada"),
];

/// Archive and chunk file naming
pub mod artifacts {
    pub const FILE_STEM: &str = "companies";
    pub const CHUNK_EXTENSION: &str = "csv";
    pub const ARCHIVE_EXTENSION: &str = "csv.gz";
}

/// Event names published on the lifecycle channel
pub mod events {
    pub const FULFILLMENT_STARTED: &str = "fulfillment.started";
    pub const FULFILLMENT_COMPLETED: &str = "fulfillment.completed";
    pub const FULFILLMENT_FAILED: &str = "fulfillment.failed";
    pub const FULFILLMENT_DEFERRED: &str = "fulfillment.deferred";
}
