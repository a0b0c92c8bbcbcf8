//! Best-effort transactional email.
//!
//! Handlers enqueue jobs on a bounded channel and move on; a single
//! dispatcher task drains the queue and posts each job to the mail API.
//! Delivery is at-most-once: a full queue, a missing API key, or a failed
//! request drops the job with a log line and nothing else.

pub mod templates;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Args;

/// A queued email job
#[derive(Debug, Clone)]
pub enum EmailJob {
    Welcome {
        to: String,
        name: String,
        profile_url: String,
    },
    ConnectionAccepted {
        to: String,
        sender_name: String,
        recipient_name: String,
        profile_url: String,
    },
    CommentNotification {
        to: String,
        recipient_name: String,
        commenter_name: String,
        post_url: String,
        comment_content: String,
    },
}

impl EmailJob {
    fn render(&self) -> (&str, String, String) {
        match self {
            EmailJob::Welcome {
                to,
                name,
                profile_url,
            } => {
                let (subject, body) = templates::welcome(name, profile_url);
                (to, subject, body)
            }
            EmailJob::ConnectionAccepted {
                to,
                sender_name,
                recipient_name,
                profile_url,
            } => {
                let (subject, body) =
                    templates::connection_accepted(sender_name, recipient_name, profile_url);
                (to, subject, body)
            }
            EmailJob::CommentNotification {
                to,
                recipient_name,
                commenter_name,
                post_url,
                comment_content,
            } => {
                let (subject, body) = templates::comment_notification(
                    recipient_name,
                    commenter_name,
                    post_url,
                    comment_content,
                );
                (to, subject, body)
            }
        }
    }
}

/// Handle for enqueueing email jobs
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::Sender<EmailJob>,
}

impl Mailer {
    /// Spawn the dispatcher task and return the enqueue handle.
    pub fn spawn(args: &Args) -> Self {
        let (tx, rx) = mpsc::channel(args.mail_queue_size);

        let dispatcher = Dispatcher {
            api_url: args.mail_api_url.clone(),
            api_key: args.mail_api_key.clone(),
            sender_email: args.mail_sender_email.clone(),
            sender_name: args.mail_sender_name.clone(),
            client: reqwest::Client::new(),
        };

        tokio::spawn(dispatcher.run(rx));

        if args.mail_api_key.is_some() {
            info!("Mail dispatcher started");
        } else {
            warn!("No mail API key configured, outgoing email will be dropped");
        }

        Self { tx }
    }

    /// Enqueue a job without blocking. A full queue drops the job.
    pub fn enqueue(&self, job: EmailJob) {
        if let Err(e) = self.tx.try_send(job) {
            warn!("Dropping email job: {}", e);
        }
    }
}

struct Dispatcher {
    api_url: String,
    api_key: Option<String>,
    sender_email: String,
    sender_name: String,
    client: reqwest::Client,
}

impl Dispatcher {
    async fn run(self, mut rx: mpsc::Receiver<EmailJob>) {
        while let Some(job) = rx.recv().await {
            self.dispatch(job).await;
        }
        debug!("Mail dispatcher shutting down");
    }

    async fn dispatch(&self, job: EmailJob) {
        let Some(api_key) = &self.api_key else {
            debug!("Mail API key not configured, dropping email job");
            return;
        };

        let (to, subject, html_content) = job.render();

        let payload = json!({
            "sender": { "name": self.sender_name, "email": self.sender_email },
            "to": [{ "email": to }],
            "subject": subject,
            "htmlContent": html_content,
        });

        let result = self
            .client
            .post(&self.api_url)
            .header("api-key", api_key)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!("Sent email '{}' to {}", subject, to);
            }
            Ok(resp) => {
                error!(
                    "Mail API returned {} for email '{}' to {}",
                    resp.status(),
                    subject,
                    to
                );
            }
            Err(e) => {
                error!("Failed to send email '{}' to {}: {}", subject, to, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_render_to_subject_and_body() {
        let job = EmailJob::Welcome {
            to: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            profile_url: "https://example.com/profile/ada".to_string(),
        };
        let (to, subject, body) = job.render();
        assert_eq!(to, "ada@example.com");
        assert!(subject.contains("Welcome"));
        assert!(body.contains("Ada"));
    }

    #[tokio::test]
    async fn enqueue_drops_when_queue_is_full() {
        let (tx, _rx) = mpsc::channel(1);
        let mailer = Mailer { tx };
        let job = EmailJob::Welcome {
            to: "a@b.c".to_string(),
            name: "A".to_string(),
            profile_url: "u".to_string(),
        };
        // First fills the queue, second is dropped without panicking.
        mailer.enqueue(job.clone());
        mailer.enqueue(job);
    }
}
