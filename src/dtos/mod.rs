pub mod referraldtos;
pub mod userdtos;

pub use referraldtos::*;
pub use userdtos::*;
