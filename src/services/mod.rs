pub mod fault;
pub mod store;
pub mod upload_service;
