//! Conflict copy naming
//!
//! Names for preserved local versions follow the pattern
//! `filename (conflicted copy YYYY-MM-DD xxxxxxxx).ext`. The date plus an
//! 8-hex random suffix keeps copies from separate syncs distinct and makes
//! a collision with an existing file practically impossible.

use chrono::Utc;
use uuid::Uuid;

/// Builds on-disk names for conflict copies
pub struct ConflictNamer;

impl ConflictNamer {
    /// `rivers.gtab` becomes e.g. `rivers (conflicted copy 2026-08-29 1a2b3c4d).gtab`
    ///
    /// The extension, when present, stays last so file type associations
    /// keep working on the copy.
    pub fn generate(file_name: &str) -> String {
        let (stem, ext) = match file_name.rfind('.') {
            Some(pos) => (&file_name[..pos], &file_name[pos..]),
            None => (file_name, ""),
        };
        let date = Utc::now().format("%Y-%m-%d");
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{stem} (conflicted copy {date} {}){ext}", &suffix[..8])
    }
}
