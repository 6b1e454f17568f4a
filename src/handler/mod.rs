pub mod auth;
pub mod referrals;
pub mod rewards;
pub mod users;
