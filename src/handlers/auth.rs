use axum::{extract::State, http::StatusCode, Json};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    middleware::auth::{AuthUser, Claims},
    models::{IdentityResponse, LoginRequest, RegisterRequest, TokenResponse},
    state::AppState,
};

/// Fixed hashing cost for stored credentials.
const BCRYPT_COST: u32 = 10;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let email = validate_registration(&req)?;

    let password_hash =
        hash(&req.password, BCRYPT_COST).map_err(|e| AppError::Internal(e.to_string()))?;

    sqlx::query("INSERT INTO users (name, email, password_hash, phone) VALUES ($1, $2, $3, $4)")
        .bind(req.name.trim())
        .bind(&email)
        .bind(&password_hash)
        .bind(req.phone.trim())
        .execute(&state.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint().is_some() {
                    return AppError::Conflict("Email is already registered".to_string());
                }
            }
            AppError::Database(e)
        })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully" })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let email = req.email.trim().to_lowercase();
    let row: Option<(Uuid, String)> =
        sqlx::query_as("SELECT id, password_hash FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&state.pool)
            .await?;

    // Same response for unknown email and wrong password.
    let (user_id, password_hash) = row.ok_or(AppError::InvalidCredentials)?;

    if !verify(&req.password, &password_hash).map_err(|e| AppError::Internal(e.to_string()))? {
        return Err(AppError::InvalidCredentials);
    }

    let token = create_jwt(user_id, &email, &state.config)?;

    Ok(Json(TokenResponse { token }))
}

pub async fn validate(auth: AuthUser) -> Json<IdentityResponse> {
    Json(IdentityResponse {
        user_id: auth.id,
        email: auth.email,
    })
}

/// Normalizes and checks the registration fields; returns the lowercased
/// email on success.
fn validate_registration(req: &RegisterRequest) -> Result<String, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    if req.phone.trim().is_empty() {
        return Err(AppError::validation("Phone number is required"));
    }

    let email = req.email.trim().to_lowercase();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        return Err(AppError::validation("Enter a valid email"));
    }

    if req.password.len() < 6 {
        return Err(AppError::validation(
            "Password must be at least 6 characters",
        ));
    }

    Ok(email)
}

fn create_jwt(user_id: Uuid, email: &str, config: &Config) -> Result<String, AppError> {
    let exp = (Utc::now() + Duration::hours(config.token_expiry_hours)).timestamp();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    use super::*;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/test".to_string(),
            jwt_secret: "unit-test-secret".to_string(),
            token_expiry_hours: 1,
            finnhub_api_key: "unused".to_string(),
            port: 0,
            cors_origin: None,
        }
    }

    fn request(name: &str, email: &str, password: &str, phone: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            phone: phone.to_string(),
        }
    }

    #[test]
    fn registration_requires_every_field() {
        assert!(validate_registration(&request("", "a@b.com", "secret1", "123")).is_err());
        assert!(validate_registration(&request("Ann", "a@b.com", "secret1", " ")).is_err());
        assert!(validate_registration(&request("Ann", "not-an-email", "secret1", "123")).is_err());
        assert!(validate_registration(&request("Ann", "a@b.com", "short", "123")).is_err());
    }

    #[test]
    fn registration_normalizes_email() {
        let email =
            validate_registration(&request("Ann", "  Ann@Example.COM ", "secret1", "123")).unwrap();
        assert_eq!(email, "ann@example.com");
    }

    #[test]
    fn token_round_trips_claims() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = create_jwt(user_id, "ann@example.com", &config).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(data.claims.sub, user_id);
        assert_eq!(data.claims.email, "ann@example.com");
        assert!(data.claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = test_config();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "ann@example.com".to_string(),
            // Past the default decode leeway.
            exp: (Utc::now() - Duration::hours(2)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn tampered_secret_fails_verification() {
        let config = test_config();
        let token = create_jwt(Uuid::new_v4(), "ann@example.com", &config).unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"some-other-secret"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn password_hash_verifies_with_fixed_cost() {
        let hashed = hash("correct horse", BCRYPT_COST).unwrap();
        assert!(verify("correct horse", &hashed).unwrap());
        assert!(!verify("wrong horse", &hashed).unwrap());
    }
}
