//! Plain-text message bodies

use encore_core::{AuthConfig, UserRole};

/// A composed email, ready for any transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
}

/// Base URLs for the links embedded in messages
///
/// Verification links hit this API directly. Reset links open the web
/// client's reset form, which then calls the reset endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLinks {
    api_base_url: String,
    frontend_url: String,
}

impl MessageLinks {
    pub fn new(api_base_url: impl Into<String>, frontend_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            frontend_url: frontend_url.into(),
        }
    }

    pub fn verification(&self, token: &str) -> String {
        format!(
            "{}/api/v1/auth/verify?token={}",
            self.api_base_url.trim_end_matches('/'),
            token
        )
    }

    pub fn reset(&self, token: &str) -> String {
        format!(
            "{}/reset-password?token={}",
            self.frontend_url.trim_end_matches('/'),
            token
        )
    }
}

impl From<&AuthConfig> for MessageLinks {
    fn from(config: &AuthConfig) -> Self {
        Self::new(&config.public_base_url, &config.frontend_url)
    }
}

pub(crate) fn verification(
    links: &MessageLinks,
    to: &str,
    username: &str,
    token: &str,
) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: "Verify your email address".to_string(),
        text_body: format!(
            "Hi {username},\n\n\
             Thanks for signing up. Confirm your email address by opening the link below:\n\n\
             {}\n\n\
             The link expires in 24 hours. If you did not create an account, ignore this email.\n",
            links.verification(token)
        ),
    }
}

pub(crate) fn password_reset(
    links: &MessageLinks,
    to: &str,
    username: &str,
    token: &str,
) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        text_body: format!(
            "Hi {username},\n\n\
             We received a request to reset your password. Choose a new one here:\n\n\
             {}\n\n\
             The link expires in 1 hour. If you did not ask for a reset, ignore this email.\n",
            links.reset(token)
        ),
    }
}

pub(crate) fn welcome(to: &str, username: &str, role: UserRole) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: "Welcome to Encore".to_string(),
        text_body: format!(
            "Hi {username},\n\n\
             Your email is verified and your {} account is ready. You can now log in.\n",
            role.label()
        ),
    }
}
