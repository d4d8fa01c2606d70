//! Home page.

use axum::response::Html;

/// `GET /`
pub async fn home() -> Html<&'static str> {
    Html("<h1>Pic Profile Maker</h1>")
}
