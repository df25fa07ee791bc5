use crate::common::Sender;

use super::error::ValidationError;

pub const MAX_MESSAGE_CHARS: usize = 5000;

/// Checks message shape before anything touches the UI or the store.
/// Length is counted in Unicode scalar values.
pub fn validate(text: &str, sender: &str) -> Result<Sender, ValidationError> {
    check_text(text)?;
    sender
        .parse::<Sender>()
        .map_err(|_| ValidationError::UnknownSender(sender.to_string()))
}

/// Re-checks text after sanitization, which is what gets displayed and
/// stored.
pub fn validate_sanitized(text: &str) -> Result<(), ValidationError> {
    check_text(text)
}

fn check_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    let length = text.chars().count();
    if length > MAX_MESSAGE_CHARS {
        return Err(ValidationError::TooLong {
            length,
            max: MAX_MESSAGE_CHARS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_user_message() {
        assert_eq!(validate("Hola", "user"), Ok(Sender::User));
        assert_eq!(validate("¿Qué tal?", "ai"), Ok(Sender::Ai));
    }

    #[test]
    fn rejects_empty_and_whitespace_only() {
        for text in ["", " ", "\n\t  ", "\u{3000}"] {
            assert_eq!(validate(text, "user"), Err(ValidationError::Empty), "{text:?}");
        }
    }

    #[test]
    fn length_limit_is_inclusive() {
        let at_limit = "a".repeat(MAX_MESSAGE_CHARS);
        assert!(validate(&at_limit, "user").is_ok());

        let over = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert_eq!(
            validate(&over, "user"),
            Err(ValidationError::TooLong {
                length: MAX_MESSAGE_CHARS + 1,
                max: MAX_MESSAGE_CHARS
            })
        );
    }

    #[test]
    fn counts_characters_not_bytes() {
        let accented = "é".repeat(MAX_MESSAGE_CHARS);
        assert!(validate(&accented, "user").is_ok());
    }

    #[test]
    fn rejects_unknown_senders() {
        for sender in ["", "system", "User", "assistant", "bot"] {
            assert_eq!(
                validate("Hola", sender),
                Err(ValidationError::UnknownSender(sender.to_string()))
            );
        }
    }

    #[test]
    fn sanitized_text_is_held_to_the_same_bounds() {
        assert_eq!(validate_sanitized(" \n "), Err(ValidationError::Empty));
        assert!(validate_sanitized(&"&lt;".repeat(MAX_MESSAGE_CHARS / 4)).is_ok());
        assert_eq!(
            validate_sanitized(&"a".repeat(MAX_MESSAGE_CHARS + 1)),
            Err(ValidationError::TooLong {
                length: MAX_MESSAGE_CHARS + 1,
                max: MAX_MESSAGE_CHARS
            })
        );
    }
}
