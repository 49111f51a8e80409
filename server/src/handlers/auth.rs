use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::session::{
    access_token, landing_path, resolve_session, AuthUser, Session, HOME_PATH, LOGIN_PATH,
    SESSION_COOKIE,
};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub const CONFIRM_EMAIL_NOTICE: &str = "Confirm your email to continue";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoginMode {
    #[default]
    SignUp,
    SignIn,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[serde(default)]
    pub mode: LoginMode,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginPage {
    default_mode: LoginMode,
    modes: [LoginMode; 2],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResult {
    user: AuthUser,
    redirect: Option<&'static str>,
    notice: Option<&'static str>,
}

fn session_cookie(session: &Session) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.access_token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub async fn landing(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> Redirect {
    let session = resolve_session(state.backend.auth.as_ref(), &headers, &jar).await;
    Redirect::to(landing_path(session.as_ref()))
}

pub async fn login_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if resolve_session(state.backend.auth.as_ref(), &headers, &jar)
        .await
        .is_some()
    {
        return Redirect::to(HOME_PATH).into_response();
    }
    let page = LoginPage {
        default_mode: LoginMode::SignUp,
        modes: [LoginMode::SignUp, LoginMode::SignIn],
    };
    success(page, "Sign in or create an account")
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<LoginForm>,
) -> Result<(CookieJar, Response), AppError> {
    form.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;
    let auth = state.backend.auth.as_ref();

    match form.mode {
        LoginMode::SignUp => {
            let outcome = auth.sign_up(&form.email, &form.password).await?;
            tracing::info!(user = %outcome.user.id, confirmed = outcome.session.is_some(), "User signed up");
            let (jar, redirect, notice) = match &outcome.session {
                Some(session) => (jar.add(session_cookie(session)), Some(HOME_PATH), None),
                None => (jar, None, Some(CONFIRM_EMAIL_NOTICE)),
            };
            let body = LoginResult {
                user: outcome.user,
                redirect,
                notice,
            };
            Ok((jar, success(body, "User created successfully")))
        }
        LoginMode::SignIn => {
            let session = auth.sign_in_with_password(&form.email, &form.password).await?;
            tracing::info!(user = %session.user.id, "User signed in");
            let jar = jar.add(session_cookie(&session));
            let body = LoginResult {
                user: session.user,
                redirect: Some(HOME_PATH),
                notice: None,
            };
            Ok((jar, success(body, "User logged in successfully")))
        }
    }
}

/// Always clears the cookie, even when the backend call fails.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    if let Some(token) = access_token(&headers, &jar) {
        if let Err(e) = state.backend.auth.sign_out(&token).await {
            tracing::warn!(error = %e, "Error signing out");
        }
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to(LOGIN_PATH))
}
