use axum_helpers::Validator;
use chrono::{DateTime, Duration, Utc};
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

/// Permission codes granted to every new account
pub const DEFAULT_PERMISSIONS: &[&str] = &["products:read", "products:order"];

pub const ACTIVATION_TOKEN_TTL: Duration = Duration::days(3);
pub const AUTHENTICATION_TOKEN_TTL: Duration = Duration::hours(24);

/// Random bytes behind every token
const TOKEN_BYTES: usize = 16;
/// Length of the hex-encoded plaintext
pub const TOKEN_PLAINTEXT_LEN: usize = TOKEN_BYTES * 2;

const MIN_PASSWORD_BYTES: usize = 8;
/// Upper bound on password input, in bytes
const MAX_PASSWORD_BYTES: usize = 72;

/// User entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromQueryResult)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Argon2 PHC string, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub address: String,
    pub profile_picture: String,
    pub activated: bool,
    pub version: i32,
}

impl User {
    pub fn apply_update(&mut self, input: UpdateProfile) {
        if let Some(first_name) = input.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = input.last_name {
            self.last_name = last_name;
        }
        if let Some(address) = input.address {
            self.address = address;
        }
        if let Some(profile_picture) = input.profile_picture {
            self.profile_picture = profile_picture;
        }
    }

    pub fn validate_state(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(!self.first_name.is_empty(), "first_name", "must be provided")
            .check(!self.last_name.is_empty(), "last_name", "must be provided");
        v.finish()
    }
}

/// Row written at registration
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub address: String,
    pub profile_picture: String,
}

/// DTO for registering an account
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(length(min = 1, max = 500, message = "must be provided"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 500, message = "must be provided"))]
    pub last_name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "password_bytes"))]
    pub password: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub profile_picture: String,
}

/// DTO for activating an account
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ActivateUser {
    #[validate(custom(function = "token_plaintext"))]
    pub token: String,
}

/// DTO for exchanging credentials for an authentication token
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "password_bytes"))]
    pub password: String,
}

/// DTO for a partial profile update
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 500, message = "must be provided"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 500, message = "must be provided"))]
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub profile_picture: Option<String>,
}

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum TokenScope {
    Activation,
    Authentication,
}

/// A freshly issued token. Only `hash` is stored; `plaintext` goes to the user once.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub plaintext: String,
    pub hash: Vec<u8>,
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: TokenScope,
}

impl Token {
    pub fn generate(user_id: i64, ttl: Duration, scope: TokenScope) -> Self {
        let bytes: [u8; TOKEN_BYTES] = rand::random();
        let plaintext = const_hex::encode(bytes);

        Self {
            hash: hash_token(&plaintext),
            plaintext,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        }
    }
}

/// SHA-256 of the plaintext, as stored in `tokens.hash`.
pub fn hash_token(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Authentication token returned to the client
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticationToken {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl From<Token> for AuthenticationToken {
    fn from(token: Token) -> Self {
        Self {
            token: token.plaintext,
            expiry: token.expiry,
        }
    }
}

fn password_bytes(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_BYTES {
        return Err(ValidationError::new("length")
            .with_message("must be at least 8 bytes long".into()));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::new("length")
            .with_message("must not be more than 72 bytes long".into()));
    }
    Ok(())
}

fn token_plaintext(token: &str) -> Result<(), ValidationError> {
    if token.len() != TOKEN_PLAINTEXT_LEN {
        return Err(ValidationError::new("length")
            .with_message("must be 32 bytes long".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register() -> RegisterUser {
        RegisterUser {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "pa55word".to_string(),
            address: String::new(),
            profile_picture: String::new(),
        }
    }

    #[test]
    fn test_token_plaintext_and_hash() {
        let token = Token::generate(7, AUTHENTICATION_TOKEN_TTL, TokenScope::Authentication);

        assert_eq!(token.plaintext.len(), TOKEN_PLAINTEXT_LEN);
        assert!(token.plaintext.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token.hash, hash_token(&token.plaintext));
        assert_eq!(token.hash.len(), 32);
        assert!(token.expiry > Utc::now() + Duration::hours(23));
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = Token::generate(7, ACTIVATION_TOKEN_TTL, TokenScope::Activation);
        let b = Token::generate(7, ACTIVATION_TOKEN_TTL, TokenScope::Activation);
        assert_ne!(a.plaintext, b.plaintext);
    }

    #[test]
    fn test_scope_round_trips_through_text() {
        assert_eq!(TokenScope::Activation.to_string(), "activation");
        assert_eq!(
            "authentication".parse::<TokenScope>().unwrap(),
            TokenScope::Authentication
        );
    }

    #[test]
    fn test_register_password_bounds() {
        assert!(register().validate().is_ok());

        let short = RegisterUser {
            password: "short".to_string(),
            ..register()
        };
        assert!(short.validate().unwrap_err().field_errors().contains_key("password"));

        let long = RegisterUser {
            password: "x".repeat(73),
            ..register()
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_register_reports_all_fields() {
        let input = RegisterUser {
            first_name: String::new(),
            last_name: String::new(),
            email: "not-an-email".to_string(),
            password: String::new(),
            ..register()
        };
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        for field in ["first_name", "last_name", "email", "password"] {
            assert!(fields.contains_key(field), "missing {field}");
        }
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User {
            id: 1,
            created_at: Utc::now(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            address: String::new(),
            profile_picture: String::new(),
            activated: false,
            version: 1,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
