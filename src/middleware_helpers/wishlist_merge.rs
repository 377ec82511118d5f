use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, SignedCookieJar};
use tracing::warn;

use crate::auth::CurrentUser;
use crate::services::wishlist::lifecycle::parse_token;
use crate::services::wishlist::COOKIE_NAME;
use crate::AppState;

/// Hands the cookie's anonymous wishlist to the signed-in user and drops
/// the cookie once it has been merged.
pub async fn merge_anonymous_wishlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: SignedCookieJar,
    request: Request,
    next: Next,
) -> Response {
    let cookie_token = jar
        .get(COOKIE_NAME)
        .and_then(|cookie| parse_token(Some(cookie.value())));

    let merged = match (user, cookie_token) {
        (Some(user), Some(token)) => {
            match state
                .wishlist_service
                .find_and_assign_anonymous_wishlist(&user, Some(token))
                .await
            {
                Ok(merged) => merged,
                Err(e) => {
                    warn!(user_id = %user.id, "Could not merge anonymous wishlist: {}", e);
                    false
                }
            }
        }
        _ => false,
    };

    let response = next.run(request).await;
    if merged {
        let jar = jar.remove(Cookie::build(COOKIE_NAME).path("/"));
        return (jar, response).into_response();
    }
    response
}
