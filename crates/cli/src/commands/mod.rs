pub mod breaker;
pub mod broker;
pub mod map;
pub mod pool;
