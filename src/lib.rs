pub mod base;
pub mod l2;
pub mod sim;
pub mod traffic;
