use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{UserError, UserResult};
use crate::models::{NewUser, Token, TokenScope, User};

/// Repository trait for User persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new account; `DuplicateEmail` when the address is taken
    async fn insert(&self, user: NewUser) -> UserResult<User>;

    /// Insert a new account, grant it `permissions` and issue an activation
    /// token valid for `activation_ttl`, all or nothing.
    async fn create_account(
        &self,
        user: NewUser,
        permissions: Vec<String>,
        activation_ttl: Duration,
    ) -> UserResult<(User, Token)>;

    async fn get_by_id(&self, id: i64) -> UserResult<Option<User>>;

    /// Case-insensitive lookup
    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>>;

    /// Owner of an unexpired token with this scope and hash
    async fn get_for_token(&self, scope: TokenScope, hash: Vec<u8>) -> UserResult<Option<User>>;

    /// Persist `user` if its stored version still equals `user.version`;
    /// `EditConflict` otherwise.
    async fn update(&self, user: &User) -> UserResult<User>;
}

/// Repository trait for token persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn insert(&self, token: &Token) -> UserResult<()>;

    /// Remove every token of `scope` belonging to `user_id`
    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> UserResult<()>;
}

/// Repository trait for permission grants
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn get_all_for_user(&self, user_id: i64) -> UserResult<Vec<String>>;

    /// Grant `codes`; codes already held are ignored
    async fn add_for_user(&self, user_id: i64, codes: Vec<String>) -> UserResult<()>;
}

/// In-memory implementation of all three user repositories (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    state: Arc<RwLock<Store>>,
}

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    users: BTreeMap<i64, User>,
    tokens: Vec<Token>,
    permissions: BTreeMap<i64, BTreeSet<String>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store {
    fn insert_user(&mut self, user: NewUser) -> UserResult<User> {
        if self
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(UserError::DuplicateEmail(user.email));
        }

        self.next_id += 1;
        let stored = User {
            id: self.next_id,
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
        self.users.insert(stored.id, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: NewUser) -> UserResult<User> {
        let mut state = self.state.write().await;
        let stored = state.insert_user(user)?;

        tracing::info!(user_id = stored.id, "Created user");
        Ok(stored)
    }

    async fn create_account(
        &self,
        user: NewUser,
        permissions: Vec<String>,
        activation_ttl: Duration,
    ) -> UserResult<(User, Token)> {
        let mut state = self.state.write().await;
        let stored = state.insert_user(user)?;

        state
            .permissions
            .entry(stored.id)
            .or_default()
            .extend(permissions);
        let token = Token::generate(stored.id, activation_ttl, TokenScope::Activation);
        state.tokens.push(token.clone());

        tracing::info!(user_id = stored.id, "Created account");
        Ok((stored, token))
    }

    async fn get_by_id(&self, id: i64) -> UserResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_for_token(&self, scope: TokenScope, hash: Vec<u8>) -> UserResult<Option<User>> {
        let state = self.state.read().await;
        let now = Utc::now();

        Ok(state
            .tokens
            .iter()
            .find(|t| t.scope == scope && t.hash == hash && t.expiry > now)
            .and_then(|t| state.users.get(&t.user_id))
            .cloned())
    }

    async fn update(&self, user: &User) -> UserResult<User> {
        let mut state = self.state.write().await;

        let stored = state
            .users
            .get_mut(&user.id)
            .filter(|stored| stored.version == user.version)
            .ok_or(UserError::EditConflict(user.id))?;

        *stored = User {
            version: user.version + 1,
            ..user.clone()
        };

        tracing::info!(user_id = user.id, version = stored.version, "Updated user");
        Ok(stored.clone())
    }
}

#[async_trait]
impl TokenRepository for InMemoryUserRepository {
    async fn insert(&self, token: &Token) -> UserResult<()> {
        let mut state = self.state.write().await;
        state.tokens.push(token.clone());
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> UserResult<()> {
        let mut state = self.state.write().await;
        state
            .tokens
            .retain(|t| !(t.scope == scope && t.user_id == user_id));
        Ok(())
    }
}

#[async_trait]
impl PermissionRepository for InMemoryUserRepository {
    async fn get_all_for_user(&self, user_id: i64) -> UserResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .permissions
            .get(&user_id)
            .map(|codes| codes.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_for_user(&self, user_id: i64, codes: Vec<String>) -> UserResult<()> {
        let mut state = self.state.write().await;
        state.permissions.entry(user_id).or_default().extend(codes);
        Ok(())
    }
}
