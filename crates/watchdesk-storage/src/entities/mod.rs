pub mod alert;
pub mod alert_event;
pub mod chat_group;
pub mod mailbox_message;
