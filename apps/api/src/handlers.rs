pub mod audit;
pub mod employees;
pub mod health;
pub mod permissions;
pub mod positions;
pub mod session;
