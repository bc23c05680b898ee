pub mod action;
pub mod context;
pub mod intent;
pub mod memory;
pub mod safety;
pub mod tier;
pub mod turn;
