use async_trait::async_trait;
use database::postgres::{DEFAULT_QUERY_TIMEOUT, bounded, is_unique_violation, statement};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult, Statement, TransactionTrait,
};
use std::time::Duration;

use crate::{
    error::{UserError, UserResult},
    models::{NewUser, Token, TokenScope, User},
    repository::{PermissionRepository, TokenRepository, UserRepository},
};

// `email` is citext in the schema; cast so it decodes as text.
const USER_COLUMNS: &str = r#"
    users.id, users.created_at, users.first_name, users.last_name, users.email::text AS email,
    users.password_hash, users.address, users.profile_picture, users.activated, users.version
"#;

fn insert_user_statement(user: NewUser) -> Statement {
    statement(
        &format!(
            r#"
            INSERT INTO users (first_name, last_name, email, password_hash, address, profile_picture)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ),
        [
            user.first_name.into(),
            user.last_name.into(),
            user.email.into(),
            user.password_hash.into(),
            user.address.into(),
            user.profile_picture.into(),
        ],
    )
}

fn insert_token_statement(token: &Token) -> Statement {
    statement(
        "INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)",
        [
            token.hash.clone().into(),
            token.user_id.into(),
            token.expiry.into(),
            token.scope.as_ref().into(),
        ],
    )
}

fn grant_permissions_statement(user_id: i64, codes: Vec<String>) -> Statement {
    statement(
        r#"
        INSERT INTO users_permissions (user_id, permission_id)
        SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
        ON CONFLICT DO NOTHING
        "#,
        [user_id.into(), codes.into()],
    )
}

fn map_insert_error(err: DbErr, email: String) -> UserError {
    if is_unique_violation(&err) {
        UserError::DuplicateEmail(email)
    } else {
        UserError::from(err)
    }
}

/// PostgreSQL implementation of the user, token and permission repositories
#[derive(Clone)]
pub struct PgUserRepository {
    db: DatabaseConnection,
    timeout: Duration,
}

impl PgUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Override the per-query deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: NewUser) -> UserResult<User> {
        let email = user.email.clone();
        let stmt = insert_user_statement(user);

        let stored = bounded(self.timeout, User::find_by_statement(stmt).one(&self.db))
            .await
            .map_err(|err| map_insert_error(err, email))?
            .ok_or_else(|| UserError::Internal("insert returned no row".to_string()))?;

        tracing::info!(user_id = stored.id, "Created user");
        Ok(stored)
    }

    async fn create_account(
        &self,
        user: NewUser,
        permissions: Vec<String>,
        activation_ttl: chrono::Duration,
    ) -> UserResult<(User, Token)> {
        let email = user.email.clone();

        let (stored, token) = bounded(self.timeout, async {
            let txn = self.db.begin().await?;

            let stored = User::find_by_statement(insert_user_statement(user))
                .one(&txn)
                .await
                .map_err(|err| map_insert_error(err, email))?
                .ok_or_else(|| UserError::Internal("insert returned no row".to_string()))?;

            txn.execute_raw(grant_permissions_statement(stored.id, permissions))
                .await?;

            let token = Token::generate(stored.id, activation_ttl, TokenScope::Activation);
            txn.execute_raw(insert_token_statement(&token)).await?;

            txn.commit().await?;
            Ok::<_, UserError>((stored, token))
        })
        .await?;

        tracing::info!(user_id = stored.id, "Created account");
        Ok((stored, token))
    }

    async fn get_by_id(&self, id: i64) -> UserResult<Option<User>> {
        let stmt = statement(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE users.id = $1"),
            [id.into()],
        );
        Ok(bounded(self.timeout, User::find_by_statement(stmt).one(&self.db)).await?)
    }

    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let stmt = statement(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE users.email = $1::citext"),
            [email.into()],
        );
        Ok(bounded(self.timeout, User::find_by_statement(stmt).one(&self.db)).await?)
    }

    async fn get_for_token(&self, scope: TokenScope, hash: Vec<u8>) -> UserResult<Option<User>> {
        let stmt = statement(
            &format!(
                r#"
                SELECT {USER_COLUMNS}
                FROM users
                INNER JOIN tokens ON users.id = tokens.user_id
                WHERE tokens.hash = $1
                  AND tokens.scope = $2
                  AND tokens.expiry > now()
                "#
            ),
            [hash.into(), scope.as_ref().into()],
        );
        Ok(bounded(self.timeout, User::find_by_statement(stmt).one(&self.db)).await?)
    }

    async fn update(&self, user: &User) -> UserResult<User> {
        let stmt = statement(
            r#"
            UPDATE users
            SET first_name = $1, last_name = $2, address = $3, profile_picture = $4,
                activated = $5, password_hash = $6, version = version + 1
            WHERE id = $7 AND version = $8
            RETURNING version
            "#,
            [
                user.first_name.clone().into(),
                user.last_name.clone().into(),
                user.address.clone().into(),
                user.profile_picture.clone().into(),
                user.activated.into(),
                user.password_hash.clone().into(),
                user.id.into(),
                user.version.into(),
            ],
        );

        let row = bounded(self.timeout, self.db.query_one_raw(stmt))
            .await?
            .ok_or(UserError::EditConflict(user.id))?;

        let updated = User {
            version: row.try_get::<i32>("", "version")?,
            ..user.clone()
        };

        tracing::info!(user_id = user.id, version = updated.version, "Updated user");
        Ok(updated)
    }
}

#[async_trait]
impl TokenRepository for PgUserRepository {
    async fn insert(&self, token: &Token) -> UserResult<()> {
        bounded(self.timeout, self.db.execute_raw(insert_token_statement(token))).await?;
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> UserResult<()> {
        let stmt = statement(
            "DELETE FROM tokens WHERE scope = $1 AND user_id = $2",
            [scope.as_ref().into(), user_id.into()],
        );
        let result = bounded(self.timeout, self.db.execute_raw(stmt)).await?;

        tracing::debug!(user_id, %scope, deleted = result.rows_affected(), "Deleted tokens");
        Ok(())
    }
}

#[async_trait]
impl PermissionRepository for PgUserRepository {
    async fn get_all_for_user(&self, user_id: i64) -> UserResult<Vec<String>> {
        let stmt = statement(
            r#"
            SELECT permissions.code
            FROM permissions
            INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
            WHERE users_permissions.user_id = $1
            ORDER BY permissions.code
            "#,
            [user_id.into()],
        );

        let rows = bounded(self.timeout, self.db.query_all_raw(stmt)).await?;
        let codes = rows
            .iter()
            .map(|row| row.try_get::<String>("", "code"))
            .collect::<Result<_, _>>()?;
        Ok(codes)
    }

    async fn add_for_user(&self, user_id: i64, codes: Vec<String>) -> UserResult<()> {
        let stmt = grant_permissions_statement(user_id, codes);
        bounded(self.timeout, self.db.execute_raw(stmt)).await?;
        Ok(())
    }
}
