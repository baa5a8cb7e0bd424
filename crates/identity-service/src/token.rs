//! JWT Token 处理
//!
//! 提供 access / refresh 双令牌的生成和验证。
//! access 有效期 15 分钟，refresh 有效期 30 天；两类令牌使用
//! 不同密钥签名（HS256），每个令牌携带唯一 jti。

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use shop_shared::config::JwtConfig;
use uuid::Uuid;

use crate::error::{IdentityError, Result};

/// access token 有效期
const ACCESS_TTL_MINUTES: i64 = 15;
/// refresh token 有效期
const REFRESH_TTL_DAYS: i64 = 30;

/// JWT Claims（Token 载荷）
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// 用户 ID
    pub user_id: i64,
    /// 账户是否已激活（refresh token 不携带，固定 false）
    #[serde(default)]
    pub is_activated: bool,
    /// 过期时间
    pub exp: i64,
    /// 签发时间
    pub iat: i64,
    /// 唯一令牌 ID
    pub jti: String,
}

/// JWT 管理器
#[derive(Clone)]
pub struct TokenManager {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenManager {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
        }
    }

    /// 生成 access + refresh 令牌对
    pub fn generate_tokens(&self, user_id: i64, is_activated: bool) -> Result<(String, String)> {
        let now = Utc::now();

        let access_claims = Claims {
            user_id,
            is_activated,
            exp: (now + Duration::minutes(ACCESS_TTL_MINUTES)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let access = encode(&Header::default(), &access_claims, &self.access_encoding)
            .map_err(|e| IdentityError::Validation(format!("access token 生成失败: {e}")))?;

        let refresh_claims = Claims {
            user_id,
            is_activated: false,
            exp: (now + Duration::days(REFRESH_TTL_DAYS)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let refresh = encode(&Header::default(), &refresh_claims, &self.refresh_encoding)
            .map_err(|e| IdentityError::Validation(format!("refresh token 生成失败: {e}")))?;

        Ok((access, refresh))
    }

    /// 验证并解析 access token
    pub fn validate_access(&self, token: &str) -> Result<Claims> {
        Self::decode_with(token, &self.access_decoding)
    }

    /// 验证并解析 refresh token
    pub fn validate_refresh(&self, token: &str) -> Result<Claims> {
        Self::decode_with(token, &self.refresh_decoding)
    }

    fn decode_with(token: &str, key: &DecodingKey) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.required_spec_claims.clear();
        validation.validate_exp = true;

        let data = decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => IdentityError::TokenExpired,
            _ => IdentityError::Shared(shop_shared::error::ShopError::InvalidToken),
        })?;

        Ok(data.claims)
    }
}
