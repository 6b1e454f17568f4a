pub mod referralmodel;
pub mod usermodel;
