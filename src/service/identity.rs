//! User accounts and login.

use std::sync::Arc;

use chrono::Utc;
use garde::Validate;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use super::{
    delete_with_media, find_all, find_one, insert, merge_update, replace_media, MediaReplaced,
    MediaSlot, Upload,
};
use crate::auth::{hash_password, verify_password, AuthGate, Identity};
use crate::errors::ApiError;
use crate::metadata::store::{from_document, to_document, Collection, MetadataStore};
use crate::model::{fields, LoginData, PublicUser, UserAccount};
use crate::patch::{MergeDocument, Patch};
use crate::storage::backend::MediaStore;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Empty fields are not refused up front; they simply match no account.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct NewUser {
    #[serde(default)]
    #[garde(skip)]
    pub full_name: String,
    #[garde(length(min = 1, max = 64))]
    pub username: String,
    #[garde(length(min = 1))]
    pub password: String,
    #[serde(default)]
    #[garde(skip)]
    pub phone_number: String,
}

/// Sparse edit of an account. `username` and `password` cannot be cleared.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UserEdit {
    #[schema(value_type = Option<String>)]
    pub full_name: Patch<String>,
    #[schema(value_type = Option<String>)]
    pub username: Patch<String>,
    #[schema(value_type = Option<String>)]
    pub phone_number: Patch<String>,
    #[schema(value_type = Option<String>)]
    pub password: Patch<String>,
}

#[derive(Clone)]
pub struct IdentityService {
    metadata: Arc<dyn MetadataStore>,
    media: Arc<dyn MediaStore>,
    auth: Arc<AuthGate>,
}

impl IdentityService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        media: Arc<dyn MediaStore>,
        auth: Arc<AuthGate>,
    ) -> Self {
        Self {
            metadata,
            media,
            auth,
        }
    }

    fn not_found(id: &str) -> ApiError {
        ApiError::NotFound {
            entity: "user",
            key: id.to_string(),
        }
    }

    async fn find_by(&self, field: &str, value: &str) -> Result<Option<UserAccount>, ApiError> {
        let found = find_one(self.metadata.as_ref(), Collection::Users, field, value).await?;
        Ok(found.map(from_document).transpose()?)
    }

    /// Refuse `username` if another account already holds it.
    async fn ensure_username_free(&self, username: &str, owner: Option<&str>) -> Result<(), ApiError> {
        match self.find_by(fields::USERNAME, username).await? {
            Some(existing) if Some(existing.user_id.as_str()) != owner => Err(ApiError::Rejected {
                message: format!("Username {username} is already taken"),
            }),
            _ => Ok(()),
        }
    }

    /// Check credentials and issue a token.
    pub async fn login(&self, credentials: Credentials) -> Result<LoginData, ApiError> {
        let rejected = || ApiError::Rejected {
            message: INVALID_CREDENTIALS.to_string(),
        };

        let user = self
            .find_by(fields::USERNAME, &credentials.username)
            .await?
            .ok_or_else(rejected)?;
        if !verify_password(&user.password_hash, &credentials.password) {
            return Err(rejected());
        }

        let token = self.auth.issue_token(&Identity {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
        })?;
        info!(user_id = %user.user_id, "login succeeded");
        Ok(LoginData {
            id: user.user_id,
            profile_picture_url: user.profile_picture_url,
            username: user.username,
            token,
        })
    }

    pub async fn list(&self) -> Result<Vec<PublicUser>, ApiError> {
        let documents = find_all(self.metadata.as_ref(), Collection::Users).await?;
        let users = documents
            .into_iter()
            .map(|doc| from_document::<UserAccount>(doc).map(PublicUser::from))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub async fn get(&self, id: &str) -> Result<PublicUser, ApiError> {
        self.find_by(fields::USER_ID, id)
            .await?
            .map(PublicUser::from)
            .ok_or_else(|| Self::not_found(id))
    }

    pub async fn create(&self, input: NewUser, actor: &Identity) -> Result<PublicUser, ApiError> {
        input.validate()?;
        self.ensure_username_free(&input.username, None).await?;

        let now = Utc::now();
        let user = UserAccount {
            user_id: uuid::Uuid::new_v4().to_string(),
            full_name: input.full_name,
            username: input.username,
            password_hash: hash_password(&input.password)?,
            profile_picture_url: String::new(),
            phone_number: input.phone_number,
            created_at: now,
            updated_at: now,
            updated_by: actor.user_id.clone(),
            pending_profile_picture_url: String::new(),
        };
        insert(self.metadata.as_ref(), Collection::Users, to_document(&user)?).await?;

        info!(user_id = %user.user_id, username = %user.username, "user created");
        Ok(user.into())
    }

    /// Apply a sparse edit. A new password is hashed before it is stored.
    pub async fn edit(&self, id: &str, edit: UserEdit, actor: &Identity) -> Result<(), ApiError> {
        if matches!(edit.username, Patch::Clear) {
            return Err(ApiError::validation("username cannot be cleared"));
        }
        if matches!(edit.password, Patch::Clear) {
            return Err(ApiError::validation("password cannot be cleared"));
        }
        if let Patch::Set(username) = &edit.username {
            self.ensure_username_free(username, Some(id)).await?;
        }
        let password = match edit.password {
            Patch::Set(plain) => Patch::Set(hash_password(&plain)?),
            other => other,
        };

        let mut merge = MergeDocument::new();
        merge
            .apply(fields::FULL_NAME, edit.full_name)
            .apply(fields::USERNAME, edit.username)
            .apply(fields::PHONE_NUMBER, edit.phone_number)
            .apply(fields::PASSWORD, password)
            .stamp(&actor.user_id, Utc::now());

        if !merge_update(
            self.metadata.as_ref(),
            Collection::Users,
            fields::USER_ID,
            id,
            merge,
        )
        .await?
        {
            return Err(Self::not_found(id));
        }
        Ok(())
    }

    /// Remove the profile image, then the account.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        delete_with_media(
            self.metadata.as_ref(),
            self.media.as_ref(),
            MediaSlot::PROFILE,
            id,
        )
        .await?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    /// Replace the caller's own profile image.
    pub async fn replace_profile_image(
        &self,
        image: Upload,
        actor: &Identity,
    ) -> Result<MediaReplaced, ApiError> {
        let replaced = replace_media(
            self.metadata.as_ref(),
            self.media.as_ref(),
            MediaSlot::PROFILE,
            &actor.user_id,
            image,
            actor,
        )
        .await?;
        info!(
            user_id = %actor.user_id,
            profile_picture_url = %replaced.basename,
            "profile image replaced"
        );
        Ok(replaced)
    }
}
