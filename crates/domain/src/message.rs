use crate::value_objects::{HexColor, MessageContent, MessageId, Timestamp, Username};

/// 聊天消息
///
/// `color` 是发送时作者颜色的快照，之后不会随作者资料变化。
/// 除 `content` 可被编辑外，消息创建后不可变。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub username: Username,
    pub content: MessageContent,
    pub color: HexColor,
    pub created_at: Timestamp,
}

impl Message {
    pub fn is_authored_by(&self, username: &Username) -> bool {
        &self.username == username
    }

    pub fn edit(&mut self, content: MessageContent) {
        self.content = content;
    }
}

/// 待持久化的消息，`id` 与 `created_at` 由存储分配。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub username: Username,
    pub content: MessageContent,
    pub color: HexColor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn serializes_with_camel_case_fields() {
        let message = Message {
            id: MessageId(1),
            username: Username::parse("alice").unwrap(),
            content: MessageContent::new("hi"),
            color: HexColor::parse("#ff0000").unwrap(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["username"], "alice");
        assert_eq!(json["color"], "#ff0000");
        assert!(json.get("createdAt").is_some());
    }
}
