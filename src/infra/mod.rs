pub mod cache;
pub mod change_feed;
pub mod db;
pub mod records;
