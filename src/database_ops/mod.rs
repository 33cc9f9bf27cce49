pub mod amazon;
pub mod cache;
pub mod db;
pub mod similar;

pub use similar::Amazon;
