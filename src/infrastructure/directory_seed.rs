use crate::domain::fees::MAX_PRICE_PER_SUBMISSION;
use crate::domain::party::{ExpertisePost, UserProfile};
use crate::error::{BookingError, Result};
use crate::infrastructure::in_memory::InMemoryDirectory;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// On-disk shape of the directory seed:
/// `{ "users": [...], "expertisePosts": [...] }`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySeed {
    #[serde(default)]
    pub users: Vec<UserProfile>,
    #[serde(default)]
    pub expertise_posts: Vec<ExpertisePost>,
}

impl DirectorySeed {
    /// Parses a seed. A post priced above [`MAX_PRICE_PER_SUBMISSION`] is a
    /// configuration error, since no quote could ever be computed for it.
    pub fn from_json(json: &str) -> Result<Self> {
        let seed: Self = serde_json::from_str(json)
            .map_err(|e| BookingError::Config(format!("Invalid directory seed: {e}")))?;

        if let Some(post) = seed
            .expertise_posts
            .iter()
            .find(|p| p.price_per_submission.value() > MAX_PRICE_PER_SUBMISSION)
        {
            return Err(BookingError::Config(format!(
                "Expertise post {} is priced at {}, above the maximum of {MAX_PRICE_PER_SUBMISSION}",
                post.id, post.price_per_submission
            )));
        }
        Ok(seed)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            BookingError::Config(format!(
                "Cannot read directory seed {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&json)
    }

    /// Builds the directory. Posts whose owner is not a known user are kept
    /// but logged, since every booking against them will fail.
    pub fn into_directory(self) -> InMemoryDirectory {
        let mut directory = InMemoryDirectory::new();
        for post in self.expertise_posts {
            if !self.users.iter().any(|u| u.id == post.user) {
                warn!(post_id = %post.id, owner = %post.user, "Expertise post owner is not in the directory");
            }
            directory = directory.with_post(post);
        }
        for user in self.users {
            directory = directory.with_user(user);
        }

        info!(
            users = directory.user_count(),
            expertise_posts = directory.post_count(),
            "Directory loaded"
        );
        directory
    }
}
