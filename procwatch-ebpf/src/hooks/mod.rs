mod exec;

pub use exec::*;
