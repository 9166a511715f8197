use serde::{Deserialize, Serialize};

/// Inbound update from getUpdates.
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Reply keyboard rendered under the chat input field.
#[derive(Debug, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
    pub one_time_keyboard: bool,
}

#[derive(Debug, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

impl ReplyKeyboardMarkup {
    /// Build a persistent keyboard from rows of button labels.
    pub fn from_rows(rows: &[&[&str]]) -> Self {
        Self {
            keyboard: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|label| KeyboardButton {
                            text: (*label).to_string(),
                        })
                        .collect()
                })
                .collect(),
            resize_keyboard: true,
            one_time_keyboard: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_serializes_rows() {
        let keyboard = ReplyKeyboardMarkup::from_rows(&[&["/alert london", "/alert nyc"], &["/help"]]);
        let json = serde_json::to_value(&keyboard).unwrap();

        assert_eq!(json["keyboard"][0][0]["text"], "/alert london");
        assert_eq!(json["keyboard"][1][0]["text"], "/help");
        assert_eq!(json["resize_keyboard"], true);
        assert_eq!(json["one_time_keyboard"], false);
    }

    #[test]
    fn test_update_deserializes() {
        let update: Update = serde_json::from_str(
            r#"{"update_id": 42, "message": {"chat": {"id": 1001}, "text": "/alert london"}}"#,
        )
        .unwrap();
        assert_eq!(update.update_id, 42);
        let message = update.message.unwrap();
        assert_eq!(message.chat.id, 1001);
        assert_eq!(message.text.as_deref(), Some("/alert london"));
    }
}
