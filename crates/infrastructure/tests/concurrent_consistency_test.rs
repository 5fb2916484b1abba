//! 并发一致性集成测试。
//!
//! 验证按 RoomId 串行化后并发发送不会产生乱序或碰撞的序号，
//! 以及单聊创建竞态被关闭。

use std::sync::Arc;

use application::{
    ChatService, ChatServiceDependencies, CreateGroupRoomRequest, DirectChatRequest,
    LocalRoomBroadcaster, SendMessageRequest, SystemClock,
};
use domain::MessageType;
use infrastructure::InMemoryChatRoomRepository;
use uuid::Uuid;

fn build_service() -> Arc<ChatService> {
    Arc::new(ChatService::new(ChatServiceDependencies {
        room_repository: Arc::new(InMemoryChatRoomRepository::new()),
        clock: Arc::new(SystemClock),
        broadcaster: Arc::new(LocalRoomBroadcaster::new()),
    }))
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_sends_keep_sequence_strictly_increasing() {
    let service = build_service();
    let users: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

    let room = service
        .create_group_room(CreateGroupRoomRequest {
            name: "busy room".into(),
            creator_id: users[0],
            participant_ids: users[1..].to_vec(),
        })
        .await
        .expect("create room");

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let service = service.clone();
            let sender = users[i % users.len()];
            let room_id = room.id;
            tokio::spawn(async move {
                service
                    .send_message(SendMessageRequest {
                        room_id,
                        sender_id: sender,
                        content: format!("message {i}"),
                        message_type: MessageType::Text,
                        image_url: None,
                    })
                    .await
            })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task").expect("send"))
        .collect();

    // 序号互不碰撞且恰好覆盖 1..=20
    let mut seqs: Vec<u64> = results.iter().map(|dto| dto.seq).collect();
    seqs.sort_unstable();
    assert_eq!(seqs, (1..=20).collect::<Vec<u64>>());

    // 存储顺序与序号顺序一致
    let stored = service
        .recent_messages(room.id, users[0], 50)
        .await
        .expect("history");
    assert_eq!(stored.len(), 20);
    let stored_seqs: Vec<u64> = stored.iter().rev().map(|dto| dto.seq).collect();
    assert_eq!(stored_seqs, (1..=20).collect::<Vec<u64>>());
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_direct_chat_creation_yields_single_room() {
    let service = build_service();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let service = service.clone();
            // 一半从 alice 方向发起，一半从 bob 方向发起
            let (requester, other) = if i % 2 == 0 { (alice, bob) } else { (bob, alice) };
            tokio::spawn(async move {
                service
                    .find_or_create_direct_chat(DirectChatRequest {
                        requester_id: requester,
                        other_id: other,
                        counterpart_name: None,
                    })
                    .await
            })
        })
        .collect();

    let rooms: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task").expect("find_or_create"))
        .collect();

    let first_id = rooms[0].id;
    assert!(rooms.iter().all(|room| room.id == first_id));

    assert_eq!(service.list_rooms(alice).await.expect("list").len(), 1);
    assert_eq!(service.list_rooms(bob).await.expect("list").len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn repository_conflict_is_resolved_to_existing_room() {
    // 绕过服务层的对级锁，直接制造仓储冲突
    let repository = Arc::new(InMemoryChatRoomRepository::new());
    let alice = domain::UserId::from(Uuid::new_v4());
    let bob = domain::UserId::from(Uuid::new_v4());
    let now = time::OffsetDateTime::now_utc();

    let first = domain::Room::new_direct(
        domain::RoomId::from(Uuid::new_v4()),
        alice,
        bob,
        "Bob",
        now,
    )
    .expect("first room");
    let second = domain::Room::new_direct(
        domain::RoomId::from(Uuid::new_v4()),
        bob,
        alice,
        "Alice",
        now,
    )
    .expect("second room");

    use domain::ChatRoomRepository;
    repository.save(first.clone()).await.expect("first save");
    let err = repository.save(second).await.expect_err("conflict");
    assert_eq!(err, domain::RepositoryError::Conflict);

    let found = repository
        .find_direct_between(bob, alice)
        .await
        .expect("lookup")
        .expect("existing room");
    assert_eq!(found.id(), first.id());
}
