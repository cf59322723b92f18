pub mod link;

pub use link::{ConnectivityStatus, NotificationLink};
