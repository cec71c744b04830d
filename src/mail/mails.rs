use super::sendmail::Mailer;

const CONFIRMATION_CODE_TEMPLATE: &str = include_str!("templates/confirmation-code.txt");

pub async fn send_confirmation_code_email(
    mailer: &Mailer,
    to_email: &str,
    username: &str,
    confirmation_code: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let subject = "Confirmation code for API access";
    let placeholders = vec![
        ("{{username}}".to_string(), username.to_string()),
        ("{{confirmation_code}}".to_string(), confirmation_code.to_string()),
    ];

    mailer
        .send_email(to_email, subject, CONFIRMATION_CODE_TEMPLATE, &placeholders)
        .await
}
