//! Picture request handlers.
//!
//! Both endpoints take the same inputs: a multipart body with the image in
//! `picture_file`, the tier in the path and the framing options in the query
//! string. They differ only in who is asking.

use axum::{
    extract::{
        Multipart, Path, Query, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::QueryRejection,
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use picmaker_core::QualityTier;

use crate::error::{AppError, PICS_LEFT_HEADER, Result};
use crate::middleware::{BearerUser, ClientOrigin};
use crate::services::pictures::{PictureOptions, PictureRequest, Upload, ValidationError};
use crate::state::AppState;

/// Multipart field holding the image.
pub const PICTURE_FIELD: &str = "picture_file";

/// Response header pointing at the stored asset on the authenticated path.
pub const PIC_URL_HEADER: &str = "pic-url";

/// Query string options. Numbers arrive as text so a bad value becomes a
/// validation error instead of a generic rejection.
#[derive(Debug, Default, Deserialize)]
pub struct PictureQuery {
    #[serde(rename = "faceIndex")]
    pub face_index: Option<String>,
    pub center: Option<String>,
    pub outer: Option<String>,
    pub border: Option<String>,
}

impl PictureQuery {
    fn into_options(self) -> std::result::Result<PictureOptions, ValidationError> {
        let face_index = self
            .face_index
            .map(|raw| {
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| ValidationError::Malformed(format!("faceIndex '{raw}' is not an integer")))
            })
            .transpose()?;

        Ok(PictureOptions {
            face_index,
            center: self.center,
            outer: self.outer,
            border: self.border,
        })
    }
}

/// `POST /pictures/example/{tier}`: anonymous, free tiers, daily limit per origin.
pub async fn example(
    State(state): State<AppState>,
    ClientOrigin(origin): ClientOrigin,
    Path(tier): Path<String>,
    query: std::result::Result<Query<PictureQuery>, QueryRejection>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let request = read_request(&state, &tier, query, multipart).await?;
    let delivery = state.pictures().make_free_picture(&origin, request).await?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
            (
                header::HeaderName::from_static(PICS_LEFT_HEADER),
                HeaderValue::from(delivery.remaining_today),
            ),
        ],
        delivery.bytes,
    )
        .into_response())
}

/// `POST /pictures/mypicture/{tier}`: authenticated, every tier, stored per owner.
pub async fn my_picture(
    State(state): State<AppState>,
    BearerUser(user): BearerUser,
    Path(tier): Path<String>,
    query: std::result::Result<Query<PictureQuery>, QueryRejection>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let request = read_request(&state, &tier, query, multipart).await?;
    let delivery = state.pictures().make_user_picture(&user, request).await?;

    tracing::debug!(file_name = %delivery.file_name, path = %delivery.path.display(), "Picture stored");

    // Asset hosting is not wired up yet; clients only see a placeholder.
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
            (
                header::HeaderName::from_static(PIC_URL_HEADER),
                HeaderValue::from_static("pending"),
            ),
        ],
        delivery.bytes,
    )
        .into_response())
}

/// Parse path, query and body into a [`PictureRequest`].
async fn read_request(
    state: &AppState,
    tier: &str,
    query: std::result::Result<Query<PictureQuery>, QueryRejection>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<PictureRequest> {
    let tier: QualityTier = tier.parse().map_err(ValidationError::from)?;

    let Query(query) = query.map_err(|e| ValidationError::Malformed(e.body_text()))?;
    let options = query.into_options()?;

    let mut multipart = multipart.map_err(|e| ValidationError::Malformed(e.body_text()))?;
    let upload = read_upload(state, &mut multipart).await?;

    Ok(PictureRequest {
        upload,
        tier,
        options,
    })
}

/// Find the image field and buffer it. Other fields are skipped.
async fn read_upload(state: &AppState, multipart: &mut Multipart) -> Result<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(state, &e))?
    {
        if field.name() != Some(PICTURE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await.map_err(|e| multipart_error(state, &e))?;

        return Ok(Upload {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(ValidationError::MissingFile.into())
}

fn multipart_error(state: &AppState, err: &MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let uploads = state.config().uploads;
        ValidationError::TooLarge {
            size: u64::try_from(uploads.body_limit()).unwrap_or(u64::MAX),
            max: uploads.user_max_bytes,
        }
        .into()
    } else {
        ValidationError::Malformed(err.body_text()).into()
    }
}
