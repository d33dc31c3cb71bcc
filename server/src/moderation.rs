//! Acceptability checks for placed flowers.
//!
//! The relay consults a [`Moderator`] before persisting a flower. A
//! moderator that errors is treated as having accepted the flower.

use log::warn;
use shared::NewFlower;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("moderation service unavailable: {0}")]
    Unavailable(String),
}

pub trait Moderator: Send {
    fn is_acceptable(&self, flower: &NewFlower) -> Result<bool, ModerationError>;
}

/// Accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Moderator for AllowAll {
    fn is_acceptable(&self, _flower: &NewFlower) -> Result<bool, ModerationError> {
        Ok(true)
    }
}

/// Rejects flowers whose creator name contains a blocked word.
#[derive(Debug, Clone, Default)]
pub struct NameBlocklist {
    words: Vec<String>,
}

impl NameBlocklist {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }
}

impl Moderator for NameBlocklist {
    fn is_acceptable(&self, flower: &NewFlower) -> Result<bool, ModerationError> {
        let name = flower.created_by.to_lowercase();
        Ok(!self.words.iter().any(|word| name.contains(word.as_str())))
    }
}

/// Runs the moderator, failing open on error.
pub fn screen(moderator: &dyn Moderator, flower: &NewFlower) -> bool {
    match moderator.is_acceptable(flower) {
        Ok(accepted) => accepted,
        Err(e) => {
            warn!("Moderation check failed, accepting flower: {}", e);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Moderator for Broken {
        fn is_acceptable(&self, _flower: &NewFlower) -> Result<bool, ModerationError> {
            Err(ModerationError::Unavailable("timeout".to_string()))
        }
    }

    fn flower_by(name: &str) -> NewFlower {
        NewFlower {
            x: 0.0,
            y: 0.0,
            image_data: "X".to_string(),
            created_by: name.to_string(),
        }
    }

    #[test]
    fn test_allow_all() {
        assert!(screen(&AllowAll, &flower_by("anyone")));
    }

    #[test]
    fn test_blocklist_is_case_insensitive() {
        let moderator = NameBlocklist::new(["Spam", "  "]);
        assert!(!screen(&moderator, &flower_by("xXSPAMmerXx")));
        assert!(screen(&moderator, &flower_by("gardener")));
    }

    #[test]
    fn test_failure_fails_open() {
        assert!(screen(&Broken, &flower_by("a")));
    }
}
