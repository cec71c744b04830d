use lettre::{
    Message, SmtpTransport, Transport,
    message::{SinglePart, header},
    transport::smtp::authentication::Credentials,
};

use crate::config::{Config, MailBackend};

type MailError = Box<dyn std::error::Error + Send + Sync>;

/// Outgoing mail transport
///
/// Cloning is cheap; the SMTP transport keeps its connection pool behind an Arc.
#[derive(Clone)]
pub struct Mailer {
    from: String,
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Smtp(SmtpTransport),
    Log,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self, MailError> {
        let backend = match &config.mail_backend {
            MailBackend::Smtp {
                server,
                port,
                username,
                password,
            } => {
                let creds = Credentials::new(username.clone(), password.clone());
                // STARTTLS: starts unencrypted, upgrades to TLS
                let smtp = SmtpTransport::starttls_relay(server)?
                    .credentials(creds)
                    .port(*port)
                    .build();
                Backend::Smtp(smtp)
            }
            MailBackend::Log => Backend::Log,
        };

        Ok(Mailer {
            from: config.mail_from.clone(),
            backend,
        })
    }

    /// A mailer that only writes messages to the log
    pub fn log(from: &str) -> Self {
        Mailer {
            from: from.to_string(),
            backend: Backend::Log,
        }
    }

    /// Send a plain-text email built from `template` with `placeholders` replaced
    ///
    /// # Parameters
    /// - `to_email`: Recipient's email address
    /// - `subject`: Email subject line
    /// - `template`: Body text containing `{{key}}` markers
    /// - `placeholders`: Key-value pairs to replace in the template
    pub async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        template: &str,
        placeholders: &[(String, String)],
    ) -> Result<(), MailError> {
        let body = render(template, placeholders);

        match &self.backend {
            Backend::Log => {
                tracing::info!(to = %to_email, subject = %subject, "Mail (log backend):\n{}", body);
                Ok(())
            }
            Backend::Smtp(smtp) => {
                let email = Message::builder()
                    .from(self.from.parse()?)
                    .to(to_email.parse()?)
                    .subject(subject)
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(body),
                    )?;

                // lettre's SmtpTransport is blocking; keep it off the async workers
                let smtp = smtp.clone();
                tokio::task::spawn_blocking(move || smtp.send(&email)).await??;

                tracing::debug!(to = %to_email, "Email sent successfully");
                Ok(())
            }
        }
    }
}

/// Replace every placeholder key in `template` with its value
pub fn render(template: &str, placeholders: &[(String, String)]) -> String {
    let mut rendered = template.to_string();
    for (key, value) in placeholders {
        rendered = rendered.replace(key, value);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_all_occurrences() {
        let rendered = render(
            "{{a}} and {{a}} but {{b}}",
            &[
                ("{{a}}".to_string(), "x".to_string()),
                ("{{b}}".to_string(), "y".to_string()),
            ],
        );
        assert_eq!(rendered, "x and x but y");
    }

    #[tokio::test]
    async fn smtp_backend_rejects_a_malformed_recipient() {
        let mailer = Mailer::from_config(&Config {
            database_url: String::new(),
            jwt_secret: String::new(),
            jwt_maxage: 60,
            confirmation_code_maxage: 60,
            port: 8000,
            frontend_url: String::new(),
            mail_from: "noreply@yamdb.local".to_string(),
            mail_backend: MailBackend::Smtp {
                server: "localhost".to_string(),
                port: 2525,
                username: "user".to_string(),
                password: "pass".to_string(),
            },
        })
        .unwrap();

        let result = mailer
            .send_email("not an address", "subject", "body", &[])
            .await;
        assert!(result.is_err());
    }
}
