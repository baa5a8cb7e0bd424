//! 注册入参校验

use validator::ValidateEmail;

use crate::error::{IdentityError, Result};

/// 密码最小长度
const MIN_PASSWORD_LEN: usize = 8;

/// 校验邮箱格式
pub fn validate_email(email: &str) -> Result<()> {
    if email.validate_email() {
        Ok(())
    } else {
        Err(IdentityError::Validation(format!("邮箱格式无效: {email}")))
    }
}

/// 校验密码强度：长度下限 + 至少一个数字
pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(IdentityError::Validation(format!(
            "密码长度不能少于 {MIN_PASSWORD_LEN} 个字符"
        )));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(IdentityError::Validation(
            "密码必须包含至少一个数字".to_string(),
        ));
    }

    Ok(())
}
