#![allow(dead_code)]

mod app;
mod factory;

pub use app::*;
pub use factory::*;
