pub mod account_service;

pub use account_service::{
    AccountEvent, AccountPage, AccountService, AccountServiceError, BulkAction, BulkOutcome,
};
