pub mod problem;
pub mod session;
