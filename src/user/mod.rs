mod repository;
mod service;

pub use repository::*;
pub use service::*;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ACCOUNT_TYPE: &str = "user";

/// Account as saved on database.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    /// Row id assigned by the relational store.
    #[serde(skip)]
    pub id: i64,
    /// Identity token shared with the document store.
    pub identity: String,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    #[serde(skip)]
    pub salt: String,
    #[serde(rename = "acc_type")]
    pub account_type: String,
}

/// Plaintext signup data.
#[derive(Clone, Debug, PartialEq)]
pub struct NewAccount {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub account_type: String,
}

/// Columns written on account update.
#[derive(Clone, Debug, PartialEq)]
pub struct AccountUpdate {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub salt: String,
    pub account_type: String,
}

impl From<&Account> for AccountUpdate {
    fn from(account: &Account) -> Self {
        Self {
            name: account.name.clone(),
            username: account.username.clone(),
            email: account.email.clone(),
            password: account.password.clone(),
            salt: account.salt.clone(),
            account_type: account.account_type.clone(),
        }
    }
}
