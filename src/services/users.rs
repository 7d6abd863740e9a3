//! Users API service.

use serde::{Deserialize, Serialize};

use crate::client::{CallOptions, OneDriveClient};
use crate::core::ApiRequest;
use crate::error::OneDriveResult;

/// Service for the signed-in user's profile.
pub struct UsersService<'a> {
    client: &'a OneDriveClient,
}

impl<'a> UsersService<'a> {
    /// Creates a new users service.
    pub fn new(client: &'a OneDriveClient) -> Self {
        Self { client }
    }

    /// Gets the profile of the signed-in user (`GET me`).
    pub async fn me(&self) -> OneDriveResult<CurrentUser> {
        let response = self
            .client
            .call_with::<CurrentUser>(ApiRequest::get("me"), CallOptions::default())
            .await?;
        Ok(response.data)
    }
}

/// Profile of the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_principal_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub mobile_phone: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub office_location: Option<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub business_phones: Vec<String>,
}
