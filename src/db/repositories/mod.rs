pub mod event;
pub mod ledger;
pub mod promotion;
pub mod stats;
pub mod user;
