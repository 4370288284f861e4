pub mod decision;
pub mod error;
pub mod flow;
pub mod invoice;
pub mod log;
pub mod role;
pub mod service;
pub mod template;
