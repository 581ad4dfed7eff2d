//! CLI Commands

pub mod describe;
pub mod reshard;
pub mod view;
