pub mod chat;
pub mod ledger;
pub mod redemption;
pub mod resolution;
pub mod search;
pub mod stages;
pub mod tags;
pub mod window;
