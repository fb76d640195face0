/// Errors from the notification subsystem.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// SMTP transport failure after retries.
    #[error("Notify: SMTP error: {0}")]
    Smtp(String),

    /// A sender or recipient address failed to parse.
    #[error("Notify: invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// Building the email message failed.
    #[error("Notify: email build error: {0}")]
    Email(#[from] lettre::error::Error),

    /// The messaging bridge rejected the outbound message.
    #[error("Notify: bridge error: {0}")]
    Bridge(#[from] watchdesk_session::SessionError),

    /// Writing the in-app mailbox failed.
    #[error("Notify: storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
