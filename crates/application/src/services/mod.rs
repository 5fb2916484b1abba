pub mod chat_service;


pub use chat_service::{
    ChatService, ChatServiceDependencies, CreateGroupRoomRequest, DeleteMessageRequest,
    DirectChatRequest, InviteParticipantRequest, LeaveRoomRequest, MarkReadRequest,
    SendMessageRequest,
};
