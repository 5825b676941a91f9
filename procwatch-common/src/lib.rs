#![cfg_attr(not(test), no_std)]

mod capture;
mod event;

pub use capture::*;
pub use event::*;
