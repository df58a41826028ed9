pub mod xendit;

pub use xendit::{XenditConfig, XenditProvider};
