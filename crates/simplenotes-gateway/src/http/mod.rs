pub mod health;
pub mod realtime;
