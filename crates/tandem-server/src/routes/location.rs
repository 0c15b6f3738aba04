//! Location sharing routes.  Gated by the `location_sharing` consent toggle.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use tandem_shared::consent::ConsentFeature;
use tandem_store::LocationPin;

use crate::api::AppState;
use crate::auth::require_user;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct LocationBody {
    pub latitude: f64,
    pub longitude: f64,
}

pub async fn update(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<LocationBody>,
) -> Result<Json<LocationPin>, ApiError> {
    let user = require_user(&state, &headers).await?;
    if !body.latitude.is_finite() || !(-90.0..=90.0).contains(&body.latitude) {
        return Err(ApiError::BadRequest("latitude must be within [-90, 90]".into()));
    }
    if !body.longitude.is_finite() || !(-180.0..=180.0).contains(&body.longitude) {
        return Err(ApiError::BadRequest(
            "longitude must be within [-180, 180]".into(),
        ));
    }

    let grant = state
        .engine
        .authorize_feature(user.id, ConsentFeature::LocationSharing)
        .await?;

    let pin = LocationPin {
        couple_id: grant.couple.id,
        user_id: user.id,
        latitude: body.latitude,
        longitude: body.longitude,
        updated_at: Utc::now(),
    };

    let db = state.db.lock().await;
    db.upsert_location(&pin)?;
    Ok(Json(pin))
}

pub async fn list(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<LocationPin>>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let grant = state
        .engine
        .authorize_feature(user.id, ConsentFeature::LocationSharing)
        .await?;

    let db = state.db.lock().await;
    Ok(Json(db.locations_for_couple(grant.couple.id)?))
}
