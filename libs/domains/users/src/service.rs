//! User Service - registration, activation, login and token authentication

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum_helpers::CurrentUser;
use std::sync::Arc;
use tracing::instrument;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{UserError, UserResult};
use crate::models::{
    ACTIVATION_TOKEN_TTL, AUTHENTICATION_TOKEN_TTL, ActivateUser, DEFAULT_PERMISSIONS,
    LoginRequest, NewUser, RegisterUser, Token, TokenScope, UpdateProfile, User, hash_token,
};
use crate::notifier::{ActivationNotifier, LoggingNotifier};
use crate::repository::{PermissionRepository, TokenRepository, UserRepository};

pub struct UserService<U, T, P>
where
    U: UserRepository,
    T: TokenRepository,
    P: PermissionRepository,
{
    users: Arc<U>,
    tokens: Arc<T>,
    permissions: Arc<P>,
    notifier: Arc<dyn ActivationNotifier>,
}

impl<U, T, P> UserService<U, T, P>
where
    U: UserRepository,
    T: TokenRepository,
    P: PermissionRepository,
{
    pub fn new(users: U, tokens: T, permissions: P) -> Self {
        Self {
            users: Arc::new(users),
            tokens: Arc::new(tokens),
            permissions: Arc::new(permissions),
            notifier: Arc::new(LoggingNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: impl ActivationNotifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Create an inactive account with the default permissions and send it an
    /// activation token.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterUser) -> UserResult<User> {
        input.validate()?;

        let (user, token) = self
            .users
            .create_account(
                NewUser {
                    password_hash: hash_password(&input.password)?,
                    first_name: input.first_name,
                    last_name: input.last_name,
                    email: input.email,
                    address: input.address,
                    profile_picture: input.profile_picture,
                },
                DEFAULT_PERMISSIONS.iter().map(|c| c.to_string()).collect(),
                ACTIVATION_TOKEN_TTL,
            )
            .await?;

        // Delivery failure leaves the account registered.
        if let Err(err) = self.notifier.send_activation(&user, &token.plaintext).await {
            tracing::warn!(user_id = user.id, error = %err, "Failed to deliver activation token");
        }

        Ok(user)
    }

    /// Mark the token's owner as activated and revoke their activation tokens.
    #[instrument(skip(self, input))]
    pub async fn activate(&self, input: ActivateUser) -> UserResult<User> {
        input.validate()?;

        let mut user = self
            .users
            .get_for_token(TokenScope::Activation, hash_token(&input.token))
            .await?
            .ok_or_else(|| invalid("token", "invalid or expired activation token"))?;

        user.activated = true;
        let user = self.users.update(&user).await?;

        self.tokens
            .delete_all_for_user(TokenScope::Activation, user.id)
            .await?;

        Ok(user)
    }

    /// Exchange email and password for a 24 hour authentication token.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_authentication_token(&self, input: LoginRequest) -> UserResult<Token> {
        input.validate()?;

        let user = self
            .users
            .get_by_email(&input.email)
            .await?
            .ok_or(UserError::InvalidCredentials)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(UserError::InvalidCredentials);
        }

        let token = Token::generate(user.id, AUTHENTICATION_TOKEN_TTL, TokenScope::Authentication);
        self.tokens.insert(&token).await?;
        Ok(token)
    }

    /// Resolve a bearer token to the account and its permissions.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, plaintext: &str) -> UserResult<CurrentUser> {
        let user = self
            .users
            .get_for_token(TokenScope::Authentication, hash_token(plaintext))
            .await?
            .ok_or(UserError::InvalidToken)?;

        let permissions = self.permissions.get_all_for_user(user.id).await?;

        Ok(CurrentUser {
            id: user.id,
            activated: user.activated,
            permissions,
        })
    }

    #[instrument(skip(self, input))]
    pub async fn update_profile(&self, user_id: i64, input: UpdateProfile) -> UserResult<User> {
        input.validate()?;

        let mut user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound(user_id))?;
        user.apply_update(input);
        user.validate_state()?;

        self.users.update(&user).await
    }
}

fn invalid(field: &'static str, message: &'static str) -> UserError {
    let mut errors = ValidationErrors::new();
    errors.add(field, ValidationError::new("invalid").with_message(message.into()));
    UserError::Validation(errors)
}

fn hash_password(password: &str) -> UserResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> UserResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| UserError::PasswordHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::MockActivationNotifier;
    use crate::repository::{
        InMemoryUserRepository, MockPermissionRepository, MockTokenRepository,
        MockUserRepository,
    };
    use chrono::Utc;
    use std::sync::Mutex;

    fn in_memory() -> (
        InMemoryUserRepository,
        UserService<InMemoryUserRepository, InMemoryUserRepository, InMemoryUserRepository>,
    ) {
        let repo = InMemoryUserRepository::new();
        let service = UserService::new(repo.clone(), repo.clone(), repo.clone());
        (repo, service)
    }

    fn register_input(email: &str) -> RegisterUser {
        RegisterUser {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password: "pa55word".to_string(),
            address: String::new(),
            profile_picture: String::new(),
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    /// Register through a notifier that captures the activation token.
    async fn register_capturing(
        service: UserService<InMemoryUserRepository, InMemoryUserRepository, InMemoryUserRepository>,
        email: &str,
    ) -> (
        UserService<InMemoryUserRepository, InMemoryUserRepository, InMemoryUserRepository>,
        User,
        String,
    ) {
        let captured = Arc::new(Mutex::new(String::new()));
        let sink = captured.clone();

        let mut notifier = MockActivationNotifier::new();
        notifier.expect_send_activation().returning(move |_, token| {
            *sink.lock().unwrap() = token.to_string();
            Ok(())
        });

        let service = service.with_notifier(notifier);
        let user = service.register(register_input(email)).await.unwrap();
        let token = captured.lock().unwrap().clone();
        (service, user, token)
    }

    #[tokio::test]
    async fn test_register_hashes_password_and_grants_defaults() {
        let (repo, service) = in_memory();

        let user = service
            .register(register_input("ada@example.com"))
            .await
            .unwrap();

        assert!(!user.activated);
        assert_ne!(user.password_hash, "pa55word");
        assert!(user.password_hash.starts_with("$argon2"));
        assert_eq!(
            repo.get_all_for_user(user.id).await.unwrap(),
            vec!["products:order".to_string(), "products:read".to_string()]
        );
    }

    #[tokio::test]
    async fn test_activation_flips_flag_and_consumes_token() {
        let (_, service) = in_memory();
        let (service, user, token) = register_capturing(service, "ada@example.com").await;
        assert_eq!(token.len(), 32);

        let activated = service
            .activate(ActivateUser {
                token: token.clone(),
            })
            .await
            .unwrap();
        assert!(activated.activated);
        assert_eq!(activated.version, user.version + 1);

        let again = service.activate(ActivateUser { token }).await;
        match again {
            Err(UserError::Validation(errors)) => {
                assert!(errors.field_errors().contains_key("token"))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_and_authenticate() {
        let (_, service) = in_memory();
        let (service, user, _) = register_capturing(service, "ada@example.com").await;

        let token = service
            .create_authentication_token(login("ADA@example.com", "pa55word"))
            .await
            .unwrap();
        assert!(token.expiry > Utc::now());

        let current = service.authenticate(&token.plaintext).await.unwrap();
        assert_eq!(current.id, user.id);
        assert!(!current.activated);
        assert!(current.has_permission("products:read"));
        assert!(!current.has_permission("products:write"));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_the_same() {
        let (_, service) = in_memory();
        service
            .register(register_input("ada@example.com"))
            .await
            .unwrap();

        let wrong = service
            .create_authentication_token(login("ada@example.com", "wrong-password"))
            .await;
        let unknown = service
            .create_authentication_token(login("bob@example.com", "pa55word"))
            .await;

        assert!(matches!(wrong, Err(UserError::InvalidCredentials)));
        assert!(matches!(unknown, Err(UserError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_activation_token_cannot_authenticate() {
        let (_, service) = in_memory();
        let (service, _, activation) = register_capturing(service, "ada@example.com").await;

        let result = service.authenticate(&activation).await;
        assert!(matches!(result, Err(UserError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_registration() {
        let (_, service) = in_memory();
        let mut notifier = MockActivationNotifier::new();
        notifier
            .expect_send_activation()
            .returning(|_, _| Err(UserError::Internal("smtp down".to_string())));

        let result = service
            .with_notifier(notifier)
            .register(register_input("ada@example.com"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_email_skips_grants_and_tokens() {
        let mut users = MockUserRepository::new();
        let mut tokens = MockTokenRepository::new();
        let mut permissions = MockPermissionRepository::new();
        let mut notifier = MockActivationNotifier::new();

        users
            .expect_create_account()
            .returning(|u, _, _| Err(UserError::DuplicateEmail(u.email)));
        users.expect_insert().never();
        tokens.expect_insert().never();
        permissions.expect_add_for_user().never();
        notifier.expect_send_activation().never();

        let service = UserService::new(users, tokens, permissions).with_notifier(notifier);
        let result = service.register(register_input("ada@example.com")).await;

        assert!(matches!(result, Err(UserError::DuplicateEmail(_))));
    }

    #[tokio::test]
    async fn test_register_creates_account_in_one_repository_call() {
        let mut users = MockUserRepository::new();
        users
            .expect_create_account()
            .withf(|user, permissions, ttl| {
                user.email == "ada@example.com"
                    && permissions == &vec!["products:read".to_string(), "products:order".to_string()]
                    && *ttl == ACTIVATION_TOKEN_TTL
            })
            .times(1)
            .returning(|user, _, ttl| {
                let stored = User {
                    id: 7,
                    created_at: Utc::now(),
                    first_name: user.first_name,
                    last_name: user.last_name,
                    email: user.email,
                    password_hash: user.password_hash,
                    address: user.address,
                    profile_picture: user.profile_picture,
                    activated: false,
                    version: 1,
                };
                let token = Token::generate(stored.id, ttl, TokenScope::Activation);
                Ok((stored, token))
            });
        users.expect_insert().never();

        let mut tokens = MockTokenRepository::new();
        tokens.expect_insert().never();
        let mut permissions = MockPermissionRepository::new();
        permissions.expect_add_for_user().never();

        let service = UserService::new(users, tokens, permissions);
        let user = service
            .register(register_input("ada@example.com"))
            .await
            .unwrap();
        assert_eq!(user.id, 7);
    }

    #[tokio::test]
    async fn test_update_profile_is_version_guarded() {
        let (repo, service) = in_memory();
        let user = service
            .register(register_input("ada@example.com"))
            .await
            .unwrap();

        let updated = service
            .update_profile(
                user.id,
                UpdateProfile {
                    address: Some("12 St James's Square".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.first_name, "Ada");

        let result = UserRepository::update(&repo, &user).await;
        assert!(matches!(result, Err(UserError::EditConflict(_))));
    }
}
