use crate::client::BeyondhClient;
use crate::core::errors::BeyondhError;
use crate::core::types::{ApiResponse, Call};
use serde::Serialize;
use serde_json::{Map, Value};

/// Content of `Bill.AddBillItem`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddBillItem {
    pub org_id: i64,
    pub bill_id: i64,
    pub bill_item_type: String,
    pub sub_item_type: String,
    pub is_deposit: bool,
    pub amount: f64,
    pub memo: Option<String>,
    /// Extra payment details, passed through untouched
    pub payment_request: Map<String, Value>,
    pub external_ref_id: Option<i64>,
    pub small_ware_orders: Option<Vec<Value>>,
}

/// Content of `Bill.AddOnlinePayment`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddOnlinePayment {
    pub org_id: i64,
    pub bill_id: i64,
    pub room_detail: Option<String>,
    pub pay_type: String,
    pub amount: f64,
    pub operation_type: String,
}

/// `Bill.*` procedures: bill items, online payments and guarantees
#[derive(Debug, Clone, Copy)]
pub struct Bill<'a> {
    client: &'a BeyondhClient,
}

impl<'a> Bill<'a> {
    pub(crate) fn new(client: &'a BeyondhClient) -> Self {
        Self { client }
    }

    pub async fn add_bill_item(&self, item: &AddBillItem) -> Result<ApiResponse, BeyondhError> {
        let call = Call::from_serializable("Bill.AddBillItem", item)?;
        self.client.post(call).await
    }

    pub async fn get_bill_balance(
        &self,
        org_id: i64,
        bill_id: i64,
        include_pre_authorization: bool,
    ) -> Result<ApiResponse, BeyondhError> {
        let call = Call::new("Bill.GetBillBalance")
            .param("OrgId", org_id)
            .param("BillId", bill_id)
            .param("IncludePreAuthorization", include_pre_authorization);
        self.client.post(call).await
    }

    /// Either `bill_id` or `bill_item_ids` must be given
    pub async fn get_bill_items(
        &self,
        org_id: i64,
        bill_id: Option<i64>,
        bill_item_ids: Option<&[i64]>,
    ) -> Result<ApiResponse, BeyondhError> {
        if bill_id.is_none() && bill_item_ids.is_none() {
            return Err(BeyondhError::InvalidCall(
                "Bill.GetBillItems needs a bill id or bill item ids".to_string(),
            ));
        }
        let call = Call::new("Bill.GetBillItems")
            .param("OrgId", org_id)
            .optional("BillId", bill_id)
            .optional("BillItemIds", bill_item_ids.map(|ids| ids.to_vec()));
        self.client.post(call).await
    }

    pub async fn add_online_payment(
        &self,
        payment: &AddOnlinePayment,
    ) -> Result<ApiResponse, BeyondhError> {
        let call = Call::from_serializable("Bill.AddOnlinePayment", payment)?;
        self.client.post(call).await
    }

    pub async fn get_pay_qr_code(
        &self,
        org_id: i64,
        online_payment_id: i64,
        notify_url: &str,
        attach: Option<&str>,
    ) -> Result<ApiResponse, BeyondhError> {
        let call = Call::new("Bill.GetPayQrCode")
            .param("OrgId", org_id)
            .param("OnlinePaymentId", online_payment_id)
            .param("NotifyUrl", notify_url)
            .optional("Attach", attach);
        self.client.post(call).await
    }

    pub async fn get_guarantee_items(
        &self,
        org_id: i64,
        bill_ids: &[i64],
    ) -> Result<ApiResponse, BeyondhError> {
        let call = Call::new("Bill.GetGuaranteeItems")
            .param("OrgId", org_id)
            .param("BillIds", bill_ids.to_vec());
        self.client.post(call).await
    }

    pub async fn cancel_guarantee_items(
        &self,
        org_id: i64,
        guarantee_item_id: i64,
    ) -> Result<ApiResponse, BeyondhError> {
        let call = Call::new("Bill.CancelGuaranteeItems")
            .param("OrgId", org_id)
            .param("GuaranteeItemId", guarantee_item_id);
        self.client.post(call).await
    }

    pub async fn complete_guarantee_item(
        &self,
        org_id: i64,
        guarantee_item_id: i64,
        used_amount: f64,
    ) -> Result<ApiResponse, BeyondhError> {
        let call = Call::new("Bill.CompleteGuaranteeItem")
            .param("OrgId", org_id)
            .param("GuaranteeItemId", guarantee_item_id)
            .param("UsedAmount", used_amount);
        self.client.post(call).await
    }
}
