use crate::domain::money::Amount;
use serde::{Deserialize, Serialize};

/// A marketplace user as known to the directory (owned by another subsystem).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    /// Connected payout account; `None` until the expert finishes onboarding.
    #[serde(default)]
    pub stripe_account_id: Option<String>,
}

/// An expert's listing. The price here is the trusted source for every charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpertisePost {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub price_per_submission: Amount,
    /// Owning expert's user id.
    pub user: String,
}

/// The subset of a user a booking keeps: id, display name, contact email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<&UserProfile> for PartyRef {
    fn from(user: &UserProfile) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
}

impl From<&ExpertisePost> for PostRef {
    fn from(post: &ExpertisePost) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
        }
    }
}
