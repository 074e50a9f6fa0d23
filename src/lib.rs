pub mod appsettings;
pub mod event;
pub mod http;
pub mod scheduling;
pub mod storage;
pub mod telegram;
