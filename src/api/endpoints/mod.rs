pub mod analysis;
pub mod chat;
pub mod conversations;
pub mod health;
pub mod patients;
