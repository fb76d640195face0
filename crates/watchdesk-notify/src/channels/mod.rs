pub mod email;
pub mod inapp;
pub mod whatsapp;

pub use email::EmailChannel;
pub use inapp::InAppChannel;
pub use whatsapp::WhatsappChannel;
