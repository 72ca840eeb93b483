pub mod intake;
pub mod locale;
