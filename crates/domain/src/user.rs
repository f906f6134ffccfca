use crate::value_objects::{HexColor, PasswordHash, Timestamp, UserEmail, UserId, Username};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: UserEmail,
    #[serde(skip_serializing)] // 密码字段不暴露给客户端
    pub password: PasswordHash,
    pub color: HexColor,
    pub created_at: Timestamp,
}

impl User {
    pub fn register(
        id: UserId,
        username: Username,
        email: UserEmail,
        password: PasswordHash,
        color: HexColor,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            username,
            email,
            password,
            color,
            created_at: now,
        }
    }

    pub fn set_color(&mut self, color: HexColor) {
        self.color = color;
    }
}
