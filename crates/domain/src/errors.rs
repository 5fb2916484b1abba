use thiserror::Error;

/// 领域错误。
///
/// 映射规则（由 web-api 层执行）：参数类错误 -> 400，权限类 -> 403，
/// 缺失类 -> 404，业务冲突类 -> 409。领域错误一律不重试。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("user is not a participant of this room")]
    NotParticipant,

    #[error("user is already a participant of this room")]
    AlreadyMember,

    #[error("cannot open a direct chat with oneself")]
    SelfChat,

    #[error("room not found")]
    RoomNotFound,

    #[error("message not found")]
    MessageNotFound,

    #[error("operation not allowed")]
    OperationNotAllowed,
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

/// 仓储层错误。
///
/// `Conflict` 专门承载唯一约束冲突（例如单聊的 (type, user_pair) 唯一索引），
/// 调用方据此实现「冲突即返回已存在房间」。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("entity not found")]
    NotFound,

    #[error("unique constraint conflict")]
    Conflict,

    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
