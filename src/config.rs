use std::error::Error;

/// Which transport delivers confirmation-code emails
#[derive(Debug, Clone, PartialEq)]
pub enum MailBackend {
    /// Real delivery through an SMTP relay (STARTTLS)
    Smtp {
        server: String,
        port: u16,
        username: String,
        password: String,
    },
    /// Development backend: the message is written to the log instead of sent
    Log,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub confirmation_code_maxage: i64,
    pub port: u16,
    pub frontend_url: String,
    pub mail_from: String,
    pub mail_backend: MailBackend,
}

impl Config {
    pub fn init() -> Result<Config, Box<dyn Error>> {
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET_KEY")?;
        let jwt_maxage = required("JWT_MAXAGE")?.parse::<i64>()?;
        let confirmation_code_maxage =
            optional("CONFIRMATION_CODE_MAXAGE", "86400").parse::<i64>()?;
        let port = optional("PORT", "8000").parse::<u16>()?;
        let frontend_url = optional("FRONTEND_URL", "http://localhost:3000");
        let mail_from = optional("MAIL_FROM", "noreply@yamdb.local");

        let mail_backend = match optional("MAIL_BACKEND", "log").as_str() {
            "smtp" => MailBackend::Smtp {
                server: required("SMTP_SERVER")?, // e.g. smtp.gmail.com
                port: required("SMTP_PORT")?.parse::<u16>()?, // usually 587
                username: required("SMTP_USERNAME")?,
                password: required("SMTP_PASSWORD")?,
            },
            "log" => MailBackend::Log,
            other => return Err(format!("MAIL_BACKEND must be smtp or log, got {other}").into()),
        };

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_maxage,
            confirmation_code_maxage,
            port,
            frontend_url,
            mail_from,
            mail_backend,
        })
    }
}

fn required(key: &str) -> Result<String, Box<dyn Error>> {
    std::env::var(key).map_err(|_| format!("{key} must be set").into())
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
