pub mod change;
pub mod notification;
