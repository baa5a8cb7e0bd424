//! gRPC 服务端实现
//!
//! 将业务层暴露为 gRPC 接口，处理 Proto 类型与内部类型之间的转换。

use tonic::{Request, Response, Status};
use tracing::instrument;

use shop_proto::identity::identity_service_server::IdentityService as IdentityServiceTrait;
use shop_proto::identity::{
    ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, LoginResponse, LogoutRequest,
    LogoutResponse, RefreshRequest, RefreshResponse, RegisterRequest, RegisterResponse,
    ResetPasswordRequest, ResetPasswordResponse, UserInfoRequest, UserInfoResponse,
    ValidateRequest, ValidateResponse, VerifyRequest, VerifyResponse,
};

use crate::service::IdentityService;

/// gRPC 服务端
pub struct IdentityGrpc {
    service: IdentityService,
}

impl IdentityGrpc {
    pub fn new(service: IdentityService) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl IdentityServiceTrait for IdentityGrpc {
    #[instrument(skip(self, request))]
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        let req = request.into_inner();
        let registration = self.service.register(&req.email, &req.password).await?;

        Ok(Response::new(RegisterResponse {
            user_id: registration.user_id,
            activation_token: registration.activation_token,
        }))
    }

    #[instrument(skip(self, request))]
    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        let req = request.into_inner();
        let (access_token, refresh_token) = self.service.login(&req.email, &req.password).await?;

        Ok(Response::new(LoginResponse {
            access_token,
            refresh_token,
        }))
    }

    #[instrument(skip(self, request))]
    async fn refresh(
        &self,
        request: Request<RefreshRequest>,
    ) -> Result<Response<RefreshResponse>, Status> {
        let req = request.into_inner();
        let (access_token, refresh_token) = self.service.refresh(&req.refresh_token).await?;

        Ok(Response::new(RefreshResponse {
            access_token,
            refresh_token,
        }))
    }

    #[instrument(skip(self, request))]
    async fn logout(
        &self,
        request: Request<LogoutRequest>,
    ) -> Result<Response<LogoutResponse>, Status> {
        let req = request.into_inner();
        self.service.logout(&req.refresh_token).await?;

        Ok(Response::new(LogoutResponse { success: true }))
    }

    #[instrument(skip(self, request))]
    async fn verify_user(
        &self,
        request: Request<VerifyRequest>,
    ) -> Result<Response<VerifyResponse>, Status> {
        let req = request.into_inner();
        self.service.verify(&req.token).await?;

        Ok(Response::new(VerifyResponse { success: true }))
    }

    #[instrument(skip(self, request))]
    async fn validate_user(
        &self,
        request: Request<ValidateRequest>,
    ) -> Result<Response<ValidateResponse>, Status> {
        let req = request.into_inner();
        let claims = self.service.validate(&req.token)?;

        Ok(Response::new(ValidateResponse {
            user_id: claims.user_id,
            is_activated: claims.is_activated,
        }))
    }

    #[instrument(skip(self, request))]
    async fn forgot_password(
        &self,
        request: Request<ForgotPasswordRequest>,
    ) -> Result<Response<ForgotPasswordResponse>, Status> {
        let req = request.into_inner();
        self.service.forgot_password(&req.email).await?;

        Ok(Response::new(ForgotPasswordResponse {
            success: true,
            message: "重置链接已发送到您的邮箱".to_string(),
        }))
    }

    #[instrument(skip(self, request))]
    async fn reset_password(
        &self,
        request: Request<ResetPasswordRequest>,
    ) -> Result<Response<ResetPasswordResponse>, Status> {
        let req = request.into_inner();
        self.service.reset_password(&req.token, &req.password).await?;

        Ok(Response::new(ResetPasswordResponse { success: true }))
    }

    #[instrument(skip(self, request))]
    async fn get_user_info(
        &self,
        request: Request<UserInfoRequest>,
    ) -> Result<Response<UserInfoResponse>, Status> {
        let req = request.into_inner();
        let (email, is_activated) = self.service.get_user_info(req.user_id).await?;

        Ok(Response::new(UserInfoResponse {
            user_id: req.user_id,
            email,
            is_activated,
        }))
    }
}
