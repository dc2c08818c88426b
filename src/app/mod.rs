pub mod alerts;
pub mod engine;
pub mod mapping;
pub mod persistence;
pub mod reconnect;
pub mod seed;
pub mod shutdown;
pub mod store;
pub mod subscriber;
