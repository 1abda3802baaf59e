pub mod api;
pub mod export;
pub mod storage;
pub mod trip;
