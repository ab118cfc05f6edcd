use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::dto::{
    AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest, UpdateProfileRequest,
};
use crate::auth::repo::UserStore;
use crate::auth::repo_types::{NewUser, Role, User};
use crate::error::AuthError;
use crate::state::AppState;

const NAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 6..=72;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn validate_name(name: &str) -> Result<(), AuthError> {
    if !NAME_LEN.contains(&name.chars().count()) {
        return Err(AuthError::Validation(
            "name must be 3 to 50 characters".into(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if !is_valid_email(email) {
        return Err(AuthError::Validation("invalid email address".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if !PASSWORD_LEN.contains(&password.len()) {
        return Err(AuthError::Validation(
            "password must be 6 to 72 characters".into(),
        ));
    }
    Ok(())
}

/// Argon2 is CPU-bound; run it off the reactor so unrelated requests
/// keep flowing.
async fn hash_blocking(state: &AppState, password: String) -> Result<String, AuthError> {
    let hasher = state.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| AuthError::Internal(e.into()))?
        .map_err(AuthError::Internal)
}

async fn verify_blocking(
    state: &AppState,
    password: String,
    hash: String,
) -> Result<bool, AuthError> {
    let hasher = state.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
        .await
        .map_err(|e| AuthError::Internal(e.into()))?
        .map_err(AuthError::Internal)
}

fn respond(state: &AppState, user: User) -> Result<AuthResponse, AuthError> {
    let pair = state
        .keys
        .issue_pair(user.id, user.role)
        .map_err(AuthError::Internal)?;
    Ok(AuthResponse {
        access_token: pair.access,
        refresh_token: pair.refresh,
        user: user.into(),
    })
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<AuthResponse, AuthError> {
    let name = req.name.trim().to_string();
    validate_name(&name)?;
    let email = normalize_email(&req.email);
    validate_email(&email)?;
    validate_password(&req.password)?;

    let password_hash = hash_blocking(state, req.password).await?;
    // No pre-check on the email: the unique index arbitrates
    // concurrent registrations and the loser surfaces as Conflict.
    let user = state
        .store
        .create(NewUser {
            name,
            email,
            password_hash,
            role: Role::default(),
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    respond(state, user)
}

pub async fn login(state: &AppState, req: LoginRequest) -> Result<AuthResponse, AuthError> {
    let email = normalize_email(&req.email);
    validate_email(&email)?;

    // Unknown email and wrong password exit through the same variant
    // so callers cannot enumerate accounts.
    let Some(user) = state.store.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AuthError::Unauthorized);
    };

    let ok = verify_blocking(state, req.password, user.password_hash.clone()).await?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::Unauthorized);
    }

    info!(user_id = %user.id, "user logged in");
    respond(state, user)
}

pub async fn refresh(state: &AppState, req: RefreshRequest) -> Result<AuthResponse, AuthError> {
    let claims = state.keys.verify_refresh(&req.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        AuthError::Forbidden
    })?;

    // Reload the subject so a role change since issuance shows up in
    // the new pair. The refresh token is rotated.
    let Some(user) = state.store.find_by_id(claims.sub).await? else {
        warn!(user_id = %claims.sub, "refresh for unknown subject");
        return Err(AuthError::Forbidden);
    };

    info!(user_id = %user.id, "session refreshed");
    respond(state, user)
}

/// Tokens are stateless, so logout is a client-side discard; the
/// server only records that it happened.
pub fn logout(claims: &Claims) {
    info!(user_id = %claims.sub, "user logged out");
}

pub async fn me(state: &AppState, user_id: Uuid) -> Result<PublicUser, AuthError> {
    let user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or(AuthError::NotFound)?;
    Ok(user.into())
}

pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> Result<PublicUser, AuthError> {
    if req.name.is_none() && req.email.is_none() {
        return Err(AuthError::Validation("nothing to update".into()));
    }

    let name = match req.name {
        Some(raw) => {
            let name = raw.trim().to_string();
            validate_name(&name)?;
            Some(name)
        }
        None => None,
    };
    let email = match req.email {
        Some(raw) => {
            let email = normalize_email(&raw);
            validate_email(&email)?;
            Some(email)
        }
        None => None,
    };

    let user = state.store.update_profile(user_id, name, email).await?;
    info!(user_id = %user.id, "profile updated");
    Ok(user.into())
}

pub async fn update_role(
    state: &AppState,
    caller: &Claims,
    target: Uuid,
    role: Role,
) -> Result<PublicUser, AuthError> {
    if !caller.role.is_admin() {
        warn!(user_id = %caller.sub, "role change denied");
        return Err(AuthError::Forbidden);
    }
    let user = state.store.update_role(target, role).await?;
    info!(user_id = %user.id, role = ?role, changed_by = %caller.sub, "role updated");
    Ok(user.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::TokenKind;

    fn register_req(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    fn admin_claims(sub: Uuid) -> Claims {
        Claims {
            sub,
            role: Role::Admin,
            iat: 0,
            exp: usize::MAX,
            kind: TokenKind::Access,
        }
    }

    #[tokio::test]
    async fn register_then_login_scenario() {
        let state = AppState::fake();
        let registered = register(&state, register_req("Alice", "a@x.com", "secret1"))
            .await
            .expect("register");
        assert_eq!(registered.user.role, Role::User);

        let err = login(&state, login_req("a@x.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));

        let logged_in = login(&state, login_req("a@x.com", "secret1"))
            .await
            .expect("login");
        let claims = state
            .keys
            .verify_access(&logged_in.access_token)
            .expect("verify access");
        assert_eq!(claims.sub, registered.user.id);
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_indistinguishable() {
        let state = AppState::fake();
        register(&state, register_req("Alice", "a@x.com", "secret1"))
            .await
            .expect("register");

        let wrong_password = login(&state, login_req("a@x.com", "nope-nope"))
            .await
            .unwrap_err();
        let unknown_email = login(&state, login_req("ghost@x.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(wrong_password, AuthError::Unauthorized));
        assert!(matches!(unknown_email, AuthError::Unauthorized));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn duplicate_email_registers_exactly_once() {
        let state = AppState::fake();
        register(&state, register_req("Alice", "a@x.com", "secret1"))
            .await
            .expect("first register");
        let err = register(&state, register_req("Alicia", "a@x.com", "secret2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict));

        let survivor = state
            .store
            .find_by_email("a@x.com")
            .await
            .unwrap()
            .expect("record exists");
        assert_eq!(survivor.name, "Alice");
    }

    #[tokio::test]
    async fn register_validates_input() {
        let state = AppState::fake();
        for req in [
            register_req("Al", "a@x.com", "secret1"),
            register_req("Alice", "not-an-email", "secret1"),
            register_req("Alice", "a@x.com", "short"),
        ] {
            let err = register(&state, req).await.unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn email_is_normalized_before_storage_and_lookup() {
        let state = AppState::fake();
        register(&state, register_req("Alice", "  A@X.com ", "secret1"))
            .await
            .expect("register");
        let logged_in = login(&state, login_req("a@x.COM", "secret1"))
            .await
            .expect("login via differently-cased email");
        assert_eq!(logged_in.user.email, "a@x.com");
    }

    #[tokio::test]
    async fn refresh_rotates_pair_for_same_subject() {
        let state = AppState::fake();
        let registered = register(&state, register_req("Alice", "a@x.com", "secret1"))
            .await
            .expect("register");

        let refreshed = refresh(
            &state,
            RefreshRequest {
                refresh_token: registered.refresh_token.clone(),
            },
        )
        .await
        .expect("refresh");

        let claims = state
            .keys
            .verify_access(&refreshed.access_token)
            .expect("verify access");
        assert_eq!(claims.sub, registered.user.id);
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let state = AppState::fake();
        let registered = register(&state, register_req("Alice", "a@x.com", "secret1"))
            .await
            .expect("register");
        let err = refresh(
            &state,
            RefreshRequest {
                refresh_token: registered.access_token,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));
    }

    #[tokio::test]
    async fn refresh_picks_up_role_changes() {
        let state = AppState::fake();
        let registered = register(&state, register_req("Alice", "a@x.com", "secret1"))
            .await
            .expect("register");

        state
            .store
            .update_role(registered.user.id, Role::Admin)
            .await
            .expect("promote");

        let refreshed = refresh(
            &state,
            RefreshRequest {
                refresh_token: registered.refresh_token,
            },
        )
        .await
        .expect("refresh");
        let claims = state
            .keys
            .verify_access(&refreshed.access_token)
            .expect("verify");
        assert_eq!(claims.role, Role::Admin);
    }

    #[tokio::test]
    async fn role_update_is_admin_gated() {
        let state = AppState::fake();
        let registered = register(&state, register_req("Alice", "a@x.com", "secret1"))
            .await
            .expect("register");

        let caller = Claims {
            sub: Uuid::new_v4(),
            role: Role::User,
            iat: 0,
            exp: usize::MAX,
            kind: TokenKind::Access,
        };
        let err = update_role(&state, &caller, registered.user.id, Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));

        let updated = update_role(
            &state,
            &admin_claims(Uuid::new_v4()),
            registered.user.id,
            Role::Admin,
        )
        .await
        .expect("admin promotes");
        assert_eq!(updated.role, Role::Admin);
    }

    #[tokio::test]
    async fn role_update_of_unknown_subject_is_not_found() {
        let state = AppState::fake();
        let err = update_role(
            &state,
            &admin_claims(Uuid::new_v4()),
            Uuid::new_v4(),
            Role::Admin,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn profile_update_refreshes_timestamp_and_conflicts_on_taken_email() {
        let state = AppState::fake();
        let alice = register(&state, register_req("Alice", "a@x.com", "secret1"))
            .await
            .expect("register alice");
        register(&state, register_req("Bobby", "b@x.com", "secret2"))
            .await
            .expect("register bob");

        let before = state
            .store
            .find_by_id(alice.user.id)
            .await
            .unwrap()
            .unwrap()
            .updated_at;
        update_profile(
            &state,
            alice.user.id,
            UpdateProfileRequest {
                name: Some("Alicia".into()),
                email: None,
            },
        )
        .await
        .expect("rename");
        let after = state
            .store
            .find_by_id(alice.user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.name, "Alicia");
        assert!(after.updated_at >= before);

        let err = update_profile(
            &state,
            alice.user.id,
            UpdateProfileRequest {
                name: None,
                email: Some("b@x.com".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::Conflict));
    }

    #[tokio::test]
    async fn empty_profile_update_is_rejected() {
        let state = AppState::fake();
        let alice = register(&state, register_req("Alice", "a@x.com", "secret1"))
            .await
            .expect("register");
        let err = update_profile(
            &state,
            alice.user.id,
            UpdateProfileRequest {
                name: None,
                email: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn me_returns_public_view_or_not_found() {
        let state = AppState::fake();
        let alice = register(&state, register_req("Alice", "a@x.com", "secret1"))
            .await
            .expect("register");
        let view = me(&state, alice.user.id).await.expect("me");
        assert_eq!(view.email, "a@x.com");

        let err = me(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }
}
