use tokio::sync::mpsc;
use tracing::warn;

/// A structured outbound notification. Delivery (SMTP, templates on disk)
/// belongs to the host application; the engine only decides what to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Template the mailer should wrap the body in, when set.
    pub template: Option<String>,
}

/// Sending half of the outbound notification channel.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Notice>,
}

impl Outbox {
    /// Channel pair: the engine keeps the `Outbox`, the mail listener
    /// drains the receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Best-effort send. A missing listener never fails a booking.
    pub fn send(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            metrics::counter!(crate::observability::NOTICES_DROPPED_TOTAL).increment(1);
            warn!("notice dropped: mail listener is gone");
        }
    }
}
