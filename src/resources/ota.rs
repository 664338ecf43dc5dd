use crate::client::BeyondhClient;
use crate::core::errors::BeyondhError;
use crate::core::types::{ApiResponse, Call};

/// `Ota.*` procedures
#[derive(Debug, Clone, Copy)]
pub struct Ota<'a> {
    client: &'a BeyondhClient,
}

impl<'a> Ota<'a> {
    pub(crate) fn new(client: &'a BeyondhClient) -> Self {
        Self { client }
    }

    /// Room types a hotel exposes on an OTA channel
    pub async fn get_ota_room_types_by_org_id(
        &self,
        org_id: i64,
        channel: &str,
    ) -> Result<ApiResponse, BeyondhError> {
        let call = Call::new("Ota.GetOtaRoomTypesByOrgId")
            .param("OrgId", org_id)
            .param("Channel", channel);
        self.client.post(call).await
    }
}
