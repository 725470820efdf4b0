// Messaging - lock-free channels between host, scheduler thread and audio thread

pub mod channels;
pub mod command;
pub mod event;
pub mod notification;
