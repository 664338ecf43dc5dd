use crate::client::BeyondhClient;
use crate::core::errors::BeyondhError;
use crate::core::types::{ApiResponse, Call};

/// `Security.*` procedures
#[derive(Debug, Clone, Copy)]
pub struct Security<'a> {
    client: &'a BeyondhClient,
}

impl<'a> Security<'a> {
    pub(crate) fn new(client: &'a BeyondhClient) -> Self {
        Self { client }
    }

    /// Roles available to the channel
    pub async fn get_roles(&self) -> Result<ApiResponse, BeyondhError> {
        self.client.post(Call::new("Security.GetRoles")).await
    }

    /// Log a PMS user in
    pub async fn login_pms(
        &self,
        user_name: &str,
        password: &str,
        org_id: Option<i64>,
    ) -> Result<ApiResponse, BeyondhError> {
        let call = Call::new("Security.LoginPms")
            .param("UserName", user_name)
            .param("Password", password)
            .optional("OrgId", org_id);
        self.client.post(call).await
    }

    pub async fn get_user_by_session_id(
        &self,
        session_id: &str,
        org_id: Option<i64>,
    ) -> Result<ApiResponse, BeyondhError> {
        let call = Call::new("Security.GetUserBySessionId")
            .param("SessionId", session_id)
            .optional("OrgId", org_id);
        self.client.post(call).await
    }
}
