//! Resource clients. Each method assembles a [`Call`](crate::core::types::Call)
//! and hands back the raw response; business payloads are not interpreted.

pub mod bill;
pub mod ota;
pub mod security;

pub use bill::{AddBillItem, AddOnlinePayment, Bill};
pub use ota::Ota;
pub use security::Security;
