use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{AccountInfo, CustomerInfo};
use crate::domain::{Account, Cents, Customer, NewCustomer, Transaction, TransactionKind};

/// Money travels as a two-decimal string. Requests may also send a JSON number.
pub mod money {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use crate::domain::{Cents, format_cents, parse_cents};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Input {
        Text(String),
        Number(serde_json::Number),
    }

    pub fn serialize<S: Serializer>(cents: &Cents, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_cents(*cents))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cents, D::Error> {
        let raw = match Input::deserialize(deserializer)? {
            Input::Text(s) => s,
            Input::Number(n) => n.to_string(),
        };
        parse_cents(&raw).map_err(|e| de::Error::custom(format!("invalid amount {:?}: {}", raw, e)))
    }
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub date_of_birth: NaiveDate,
}

impl From<CreateCustomerRequest> for NewCustomer {
    fn from(req: CreateCustomerRequest) -> Self {
        NewCustomer {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            phone: req.phone,
            address: req.address,
            date_of_birth: req.date_of_birth,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub customer_id: Uuid,
    pub account_number: String,
    #[serde(with = "money", default)]
    pub balance: Cents,
    pub owner_name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub account_id: Uuid,
    pub kind: TransactionKind,
    #[serde(with = "money")]
    pub amount: Cents,
    pub description: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub date_of_birth: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl From<&Customer> for CustomerResponse {
    fn from(c: &Customer) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
            email: c.email.clone(),
            phone: c.phone.clone(),
            address: c.address.clone(),
            date_of_birth: c.date_of_birth,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerDetailResponse {
    #[serde(flatten)]
    pub customer: CustomerResponse,
    pub accounts: Vec<AccountResponse>,
}

impl From<&CustomerInfo> for CustomerDetailResponse {
    fn from(info: &CustomerInfo) -> Self {
        Self {
            customer: CustomerResponse::from(&info.customer),
            accounts: info.accounts.iter().map(AccountResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub account_number: String,
    pub owner_name: String,
    #[serde(serialize_with = "money::serialize")]
    pub balance: Cents,
    #[serde(serialize_with = "money::serialize")]
    pub opening_balance: Cents,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountResponse {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id,
            customer_id: a.customer_id,
            account_number: a.account_number.clone(),
            owner_name: a.owner_name.clone(),
            balance: a.balance,
            opening_balance: a.opening_balance,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountDetailResponse {
    #[serde(flatten)]
    pub account: AccountResponse,
    pub transaction_count: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

impl From<&AccountInfo> for AccountDetailResponse {
    fn from(info: &AccountInfo) -> Self {
        Self {
            account: AccountResponse::from(&info.account),
            transaction_count: info.transaction_count,
            last_activity: info.last_activity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub sequence: i64,
    pub kind: TransactionKind,
    #[serde(serialize_with = "money::serialize")]
    pub amount: Cents,
    pub description: String,
    #[serde(serialize_with = "money::serialize")]
    pub balance_before: Cents,
    #[serde(serialize_with = "money::serialize")]
    pub balance_after: Cents,
    pub timestamp: DateTime<Utc>,
}

impl From<&Transaction> for TransactionResponse {
    fn from(t: &Transaction) -> Self {
        Self {
            id: t.id,
            account_id: t.account_id,
            sequence: t.sequence,
            kind: t.kind,
            amount: t.amount_cents,
            description: t.description.clone(),
            balance_before: t.balance_before,
            balance_after: t.balance_after,
            timestamp: t.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn from_slice<'a, E: 'a>(entities: &'a [E]) -> Self
    where
        T: From<&'a E>,
    {
        Self {
            items: entities.iter().map(T::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_accepts_string_or_number() {
        let from_text: CreateTransactionRequest = serde_json::from_str(&format!(
            r#"{{"account_id":"{}","kind":"deposit","amount":"50.00"}}"#,
            Uuid::nil()
        ))
        .unwrap();
        assert_eq!(from_text.amount, 5000);

        let from_number: CreateTransactionRequest = serde_json::from_str(&format!(
            r#"{{"account_id":"{}","kind":"withdrawal","amount":12.5}}"#,
            Uuid::nil()
        ))
        .unwrap();
        assert_eq!(from_number.amount, 1250);
        assert_eq!(from_number.kind, TransactionKind::Withdrawal);
    }

    #[test]
    fn test_amount_rejects_sub_cent_precision() {
        let result: Result<CreateTransactionRequest, _> = serde_json::from_str(&format!(
            r#"{{"account_id":"{}","kind":"deposit","amount":"1.005"}}"#,
            Uuid::nil()
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_account_response_formats_money() {
        let account = Account::new(Uuid::nil(), "00012345", "Ada Lovelace", 10000);
        let json = serde_json::to_value(AccountResponse::from(&account)).unwrap();
        assert_eq!(json["balance"], "100.00");
        assert_eq!(json["opening_balance"], "100.00");
        assert_eq!(json["account_number"], "00012345");
    }
}
