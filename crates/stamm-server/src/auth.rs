//! HTTP Basic auth for the single configured account, and the middleware that
//! turns the authenticated user into the archival [`Actor`].

use std::sync::Arc;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  extract::{FromRequestParts, Request},
  http::{HeaderMap, header, request::Parts},
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use rand_core::OsRng;
use stamm_api::Actor;

use crate::error::Error;

/// The single account allowed to change master data on this instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

impl AuthConfig {
  /// Check the request's Basic credentials against this account and return
  /// the user name that will be stamped on archived records.
  pub fn authenticate(&self, headers: &HeaderMap) -> Result<String, Error> {
    let (user, password) = basic_credentials(headers).ok_or(Error::Unauthorized)?;
    if user != self.username || !self.password_matches(&password) {
      return Err(Error::Unauthorized);
    }
    Ok(user)
  }

  fn password_matches(&self, password: &str) -> bool {
    PasswordHash::new(&self.password_hash).is_ok_and(|hash| {
      Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
    })
  }
}

/// Hash `password` into the PHC string expected in `auth_password_hash`.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// `user:password` from an `Authorization: Basic …` header, if well formed.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let (scheme, payload) = value.split_once(' ')?;
  if !scheme.eq_ignore_ascii_case("basic") {
    return None;
  }
  let decoded = String::from_utf8(B64.decode(payload.trim()).ok()?).ok()?;
  let (user, password) = decoded.split_once(':')?;
  Some((user.to_owned(), password.to_owned()))
}

/// Present in a handler means the request was authenticated; carries the
/// user name.
pub struct Authenticated(pub String);

impl FromRequestParts<Arc<AuthConfig>> for Authenticated {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &Arc<AuthConfig>,
  ) -> Result<Self, Self::Rejection> {
    let user = state.authenticate(&parts.headers).inspect_err(|_| {
      tracing::debug!(uri = %parts.uri, "rejected credentials");
    })?;
    Ok(Authenticated(user))
  }
}

/// Middleware: reject unauthenticated requests, otherwise record the user as
/// the request's [`Actor`].
pub async fn require_auth(
  Authenticated(user): Authenticated,
  mut req: Request,
  next: Next,
) -> Response {
  req.extensions_mut().insert(Actor(user));
  next.run(req).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::{HeaderValue, Request};

  fn account(password: &str) -> Arc<AuthConfig> {
    Arc::new(AuthConfig {
      username:      "clerk".to_string(),
      password_hash: hash_password(password).unwrap(),
    })
  }

  fn headers(authorization: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
    headers
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn hashed_password_verifies() {
    let auth = account("secret");
    assert!(auth.password_hash.starts_with("$argon2"));
    assert_eq!(auth.authenticate(&headers(&basic("clerk", "secret"))).unwrap(), "clerk");
  }

  #[test]
  fn scheme_is_case_insensitive() {
    let auth  = account("secret");
    let value = basic("clerk", "secret").replacen("Basic", "basic", 1);
    assert_eq!(auth.authenticate(&headers(&value)).unwrap(), "clerk");
  }

  #[test]
  fn password_may_contain_colons() {
    let auth = account("a:b:c");
    assert_eq!(auth.authenticate(&headers(&basic("clerk", "a:b:c"))).unwrap(), "clerk");
  }

  #[test]
  fn rejected_credentials() {
    let auth = account("secret");
    for value in [
      basic("clerk", "wrong"),
      basic("mallory", "secret"),
      "Bearer abc".to_string(),
      "Basic !!!not-base64!!!".to_string(),
      format!("Basic {}", B64.encode("no-colon")),
    ] {
      assert!(
        matches!(auth.authenticate(&headers(&value)), Err(Error::Unauthorized)),
        "{value}"
      );
    }
  }

  #[test]
  fn corrupt_stored_hash_rejects_everyone() {
    let auth = AuthConfig {
      username:      "clerk".to_string(),
      password_hash: "not-a-phc-string".to_string(),
    };
    assert!(auth.authenticate(&headers(&basic("clerk", "secret"))).is_err());
  }

  #[tokio::test]
  async fn extractor_requires_a_header() {
    let auth = account("secret");
    let req  = Request::builder().body(axum::body::Body::empty()).unwrap();
    let (mut parts, _) = req.into_parts();
    let result = Authenticated::from_request_parts(&mut parts, &auth).await;
    assert!(matches!(result, Err(Error::Unauthorized)));
  }
}
