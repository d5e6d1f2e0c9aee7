pub mod account;

pub use account::{Account, AccountPatch, AccountRow, NewAccount};
