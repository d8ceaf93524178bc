/// Account handlers - registration, profiles and privacy tier
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::{AccountProfile, PrivacyTier};
use crate::error::Result;
use crate::middleware::UserId;
use crate::services::RegisterAccount;

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyUpdate {
    pub privacy_tier: PrivacyTier,
}

/// Register a new account
pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterAccount>,
) -> Result<HttpResponse> {
    let account = state.accounts.register(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(AccountProfile::from(&account)))
}

pub async fn get_profile(
    state: web::Data<AppState>,
    username: web::Path<String>,
) -> Result<HttpResponse> {
    let profile = state.accounts.profile(&username).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Change the caller's account-level privacy tier
pub async fn set_privacy(
    state: web::Data<AppState>,
    user: UserId,
    payload: web::Json<PrivacyUpdate>,
) -> Result<HttpResponse> {
    let update = payload.into_inner();
    state.accounts.set_privacy(user.0, update.privacy_tier).await?;
    Ok(HttpResponse::Ok().json(update))
}
