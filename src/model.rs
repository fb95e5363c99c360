//! Documents stored in the metadata store and the views returned to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Field names shared by the services and the stores.
pub mod fields {
    pub const BLOG_ID: &str = "blog_id";
    pub const SLUG: &str = "slug";
    pub const TITLE: &str = "title";
    pub const BODY: &str = "body";
    pub const IMAGE_URL: &str = "image_url";
    pub const IMAGE_ALT: &str = "image_alt";
    pub const PENDING_IMAGE_URL: &str = "pending_image_url";
    pub const PUBLISHED: &str = "published";

    pub const USER_ID: &str = "user_id";
    pub const FULL_NAME: &str = "full_name";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const PHONE_NUMBER: &str = "phone_number";
    pub const PROFILE_PICTURE_URL: &str = "profile_picture_url";
    pub const PENDING_PROFILE_PICTURE_URL: &str = "pending_profile_picture_url";
}

/// Derive a URL-safe slug from a title.
///
/// Lowercases, trims surrounding spaces, drops everything outside
/// `[a-z0-9 ]`, then turns each remaining space into `-`.  Pure and
/// deterministic; uniqueness is not guaranteed.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    lowered
        .trim_matches(' ')
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
        .map(|c| if c == ' ' { '-' } else { c })
        .collect()
}

/// Two-valued publish flag, stored as `"yes"` / `"no"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishState {
    #[default]
    Draft,
    Published,
}

impl PublishState {
    pub fn as_str(self) -> &'static str {
        match self {
            PublishState::Draft => "no",
            PublishState::Published => "yes",
        }
    }

    /// Anything other than `"yes"` reads as a draft.
    pub fn parse(value: &str) -> Self {
        if value == "yes" {
            PublishState::Published
        } else {
            PublishState::Draft
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            PublishState::Published => PublishState::Draft,
            PublishState::Draft => PublishState::Published,
        }
    }
}

impl Serialize for PublishState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PublishState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(PublishState::parse(&raw))
    }
}

/// A blog post document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub blog_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Media key basename of the thumbnail; empty means none.
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub image_alt: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub published: PublishState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_by: String,
    /// Thumbnail being swapped in; set only while a replace is in flight.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pending_image_url: String,
}

/// A post as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicPost {
    pub blog_id: String,
    pub title: String,
    pub body: String,
    pub image_url: String,
    pub image_alt: String,
    pub slug: String,
    pub published: PublishState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl From<BlogPost> for PublicPost {
    fn from(post: BlogPost) -> Self {
        Self {
            blog_id: post.blog_id,
            title: post.title,
            body: post.body,
            image_url: post.image_url,
            image_alt: post.image_alt,
            slug: post.slug,
            published: post.published,
            created_at: post.created_at,
            updated_at: post.updated_at,
            updated_by: post.updated_by,
        }
    }
}

/// A user account document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub username: String,
    /// Argon2 PHC hash. Stored, never returned to clients.
    #[serde(rename = "password", default)]
    pub password_hash: String,
    #[serde(default)]
    pub profile_picture_url: String,
    #[serde(default)]
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_by: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pending_profile_picture_url: String,
}

/// A user as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicUser {
    pub user_id: String,
    pub full_name: String,
    pub username: String,
    pub profile_picture_url: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl From<UserAccount> for PublicUser {
    fn from(user: UserAccount) -> Self {
        Self {
            user_id: user.user_id,
            full_name: user.full_name,
            username: user.username,
            profile_picture_url: user.profile_picture_url,
            phone_number: user.phone_number,
            created_at: user.created_at,
            updated_at: user.updated_at,
            updated_by: user.updated_by,
        }
    }
}

/// Successful login payload.
#[derive(Debug, Clone, Serialize)]
pub struct LoginData {
    pub id: String,
    pub profile_picture_url: String,
    pub username: String,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_punctuation() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
    }

    #[test]
    fn test_slugify_non_ascii_stripped() {
        assert_eq!(slugify("  Café Life  "), "caf-life");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("   "), "");
    }

    #[test]
    fn test_slugify_trims_before_stripping() {
        // Punctuation after the last word leaves the separator in place.
        assert_eq!(slugify("Rust 2024 !"), "rust-2024-");
        assert_eq!(slugify("a  b"), "a--b");
    }

    #[test]
    fn test_slugify_deterministic() {
        let title = "Same Title, Same Slug";
        assert_eq!(slugify(title), slugify(title));
    }

    #[test]
    fn test_publish_state_wire_format() {
        assert_eq!(serde_json::to_value(PublishState::Published).unwrap(), "yes");
        assert_eq!(serde_json::to_value(PublishState::Draft).unwrap(), "no");
        let odd: PublishState = serde_json::from_value(serde_json::json!("maybe")).unwrap();
        assert_eq!(odd, PublishState::Draft);
    }

    #[test]
    fn test_publish_toggle() {
        assert_eq!(PublishState::Draft.toggled(), PublishState::Published);
        assert_eq!(PublishState::Published.toggled(), PublishState::Draft);
    }

    #[test]
    fn test_public_user_has_no_password() {
        let now = Utc::now();
        let user = UserAccount {
            user_id: "u".into(),
            full_name: "A".into(),
            username: "a".into(),
            password_hash: "$argon2id$secret".into(),
            profile_picture_url: String::new(),
            phone_number: String::new(),
            created_at: now,
            updated_at: now,
            updated_by: String::new(),
            pending_profile_picture_url: String::new(),
        };
        let json = serde_json::to_value(PublicUser::from(user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "a");
    }

    #[test]
    fn test_public_post_drops_pending_thumbnail() {
        let now = Utc::now();
        let post = BlogPost {
            blog_id: "b".into(),
            title: "T".into(),
            body: String::new(),
            image_url: "old.png".into(),
            image_alt: String::new(),
            slug: "t".into(),
            published: PublishState::Draft,
            created_at: now,
            updated_at: now,
            updated_by: String::new(),
            pending_image_url: "new.png".into(),
        };
        let json = serde_json::to_value(PublicPost::from(post)).unwrap();
        assert!(json.get("pending_image_url").is_none());
        assert_eq!(json["image_url"], "old.png");
    }
}
