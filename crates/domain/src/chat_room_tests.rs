//! 聊天室聚合根单元测试。

use time::macros::datetime;
use uuid::Uuid;

use crate::chat_room::{direct_pair, Room, RoomType};
use crate::errors::DomainError;
use crate::events::RoomEvent;
use crate::value_objects::{MessageContent, MessageId, Timestamp, UserId};

fn user() -> UserId {
    UserId::from(Uuid::new_v4())
}

fn room_id() -> crate::RoomId {
    crate::RoomId::from(Uuid::new_v4())
}

fn message_id() -> MessageId {
    MessageId::from(Uuid::new_v4())
}

fn t0() -> Timestamp {
    datetime!(2026-01-01 00:00:00 UTC)
}

fn later(seconds: i64) -> Timestamp {
    t0() + time::Duration::seconds(seconds)
}

fn content(text: &str) -> MessageContent {
    MessageContent::new(text).unwrap()
}

fn group_of(creator: UserId, others: Vec<UserId>) -> Room {
    Room::create_group(room_id(), "Launch Team", creator, others, t0()).unwrap()
}

#[test]
fn create_group_adds_creator_and_deduplicates() {
    let creator = user();
    let member = user();
    let room = Room::create_group(
        room_id(),
        "  Launch Team  ",
        creator,
        vec![member, member, creator],
        t0(),
    )
    .unwrap();

    assert_eq!(room.name(), "Launch Team");
    assert_eq!(room.room_type(), RoomType::Group);
    assert_eq!(room.participants().len(), 2);
    assert!(room.is_participant(creator));
    assert!(room.is_participant(member));
}

#[test]
fn create_group_rejects_blank_name_and_too_few_members() {
    let creator = user();
    let err = Room::create_group(room_id(), "   ", creator, vec![user()], t0()).unwrap_err();
    assert!(matches!(err, DomainError::InvalidArgument { .. }));

    let err = Room::create_group(room_id(), "Solo", creator, vec![creator], t0()).unwrap_err();
    assert!(matches!(err, DomainError::InvalidArgument { .. }));
}

#[test]
fn direct_pair_is_symmetric_and_rejects_self() {
    let a = user();
    let b = user();
    assert_eq!(direct_pair(a, b).unwrap(), direct_pair(b, a).unwrap());
    assert_eq!(direct_pair(a, a).unwrap_err(), DomainError::SelfChat);
}

#[test]
fn direct_room_has_exactly_two_participants() {
    let a = user();
    let b = user();
    let room = Room::new_direct(room_id(), a, b, "Bob", t0()).unwrap();
    assert_eq!(room.room_type(), RoomType::Direct);
    assert_eq!(room.participants().len(), 2);
    assert_eq!(room.counterpart_of(a), Some(b));

    let err = room
        .clone()
        .add_participant(user(), a, later(1))
        .unwrap_err();
    assert_eq!(err, DomainError::OperationNotAllowed);
}

#[test]
fn send_message_assigns_strictly_increasing_seq() {
    let creator = user();
    let mut room = group_of(creator, vec![user()]);

    let mut seqs = Vec::new();
    for i in 0..5 {
        let event = room
            .send_message(message_id(), creator, content("hello"), later(i))
            .unwrap();
        match event {
            RoomEvent::MessageSent { message, .. } => seqs.push(message.seq),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    let stored: Vec<u64> = room.messages().iter().map(|m| m.seq).collect();
    assert_eq!(stored, seqs);
    assert_eq!(room.updated_at(), later(4));
}

#[test]
fn send_message_rejects_non_participant() {
    let mut room = group_of(user(), vec![user()]);
    let err = room
        .send_message(message_id(), user(), content("hi"), later(1))
        .unwrap_err();
    assert_eq!(err, DomainError::NotParticipant);
}

#[test]
fn image_message_requires_reference_and_validated_caption() {
    let creator = user();
    let mut room = group_of(creator, vec![user()]);

    let err = room
        .send_image_message(message_id(), creator, content("caption"), "  ".into(), later(1))
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidArgument { .. }));

    // 图片配文与普通正文走同一套长度校验
    assert!(MessageContent::new("   ").is_err());
    assert!(MessageContent::new("x".repeat(5001)).is_err());

    let event = room
        .send_image_message(
            message_id(),
            creator,
            content("caption"),
            "https://files.example/cv.png".into(),
            later(1),
        )
        .unwrap();
    assert!(matches!(event, RoomEvent::MessageSent { .. }));
}

#[test]
fn add_participant_checks_inviter_and_duplicates() {
    let creator = user();
    let member = user();
    let mut room = group_of(creator, vec![member]);

    let err = room.add_participant(user(), user(), later(1)).unwrap_err();
    assert_eq!(err, DomainError::NotParticipant);

    let err = room.add_participant(member, creator, later(1)).unwrap_err();
    assert_eq!(err, DomainError::AlreadyMember);

    let newcomer = user();
    let event = room.add_participant(newcomer, creator, later(2)).unwrap();
    assert!(matches!(event, RoomEvent::ParticipantJoined { user_id, .. } if user_id == newcomer));
    assert_eq!(room.participants().len(), 3);
}

#[test]
fn late_joiner_starts_with_zero_unread() {
    let creator = user();
    let mut room = group_of(creator, vec![user()]);
    room.send_message(message_id(), creator, content("before"), later(1))
        .unwrap();

    let newcomer = user();
    room.add_participant(newcomer, creator, later(2)).unwrap();
    assert_eq!(room.unread_count(newcomer).unwrap(), 0);

    room.send_message(message_id(), creator, content("after"), later(3))
        .unwrap();
    assert_eq!(room.unread_count(newcomer).unwrap(), 1);
}

#[test]
fn remove_participant_flags_room_deletion_on_last_leave() {
    let creator = user();
    let member = user();
    let mut room = group_of(creator, vec![member]);

    let event = room.remove_participant(member, later(1)).unwrap();
    assert!(matches!(
        event,
        RoomEvent::ParticipantLeft {
            room_deleted: false,
            ..
        }
    ));

    let event = room.remove_participant(creator, later(2)).unwrap();
    assert!(matches!(
        event,
        RoomEvent::ParticipantLeft {
            room_deleted: true,
            ..
        }
    ));
    assert!(room.is_empty());

    let err = room.remove_participant(creator, later(3)).unwrap_err();
    assert_eq!(err, DomainError::NotParticipant);
}

#[test]
fn mark_message_read_is_monotonic_and_idempotent() {
    let creator = user();
    let reader = user();
    let mut room = group_of(creator, vec![reader]);

    let first = match room
        .send_message(message_id(), creator, content("one"), later(1))
        .unwrap()
    {
        RoomEvent::MessageSent { message, .. } => message,
        _ => unreachable!(),
    };
    let second = match room
        .send_message(message_id(), creator, content("two"), later(2))
        .unwrap()
    {
        RoomEvent::MessageSent { message, .. } => message,
        _ => unreachable!(),
    };

    assert_eq!(room.unread_count(reader).unwrap(), 2);

    room.mark_message_read(second.id, reader).unwrap();
    assert_eq!(room.unread_count(reader).unwrap(), 0);

    // 重复标记与回退标记都是无操作
    room.mark_message_read(second.id, reader).unwrap();
    room.mark_message_read(first.id, reader).unwrap();
    assert_eq!(room.unread_count(reader).unwrap(), 0);

    let err = room.mark_message_read(message_id(), reader).unwrap_err();
    assert_eq!(err, DomainError::MessageNotFound);
    let err = room.mark_message_read(first.id, user()).unwrap_err();
    assert_eq!(err, DomainError::NotParticipant);
}

#[test]
fn unread_count_excludes_own_and_deleted_messages() {
    let alice = user();
    let bob = user();
    let mut room = group_of(alice, vec![bob]);

    room.send_message(message_id(), bob, content("from bob"), later(1))
        .unwrap();
    let own = match room
        .send_message(message_id(), alice, content("from alice"), later(2))
        .unwrap()
    {
        RoomEvent::MessageSent { message, .. } => message,
        _ => unreachable!(),
    };
    let deleted = match room
        .send_message(message_id(), bob, content("soon gone"), later(3))
        .unwrap()
    {
        RoomEvent::MessageSent { message, .. } => message,
        _ => unreachable!(),
    };
    room.delete_message(deleted.id, bob, later(4)).unwrap();

    assert_eq!(room.unread_count(alice).unwrap(), 1);
    assert_eq!(own.sender_id, alice);
}

#[test]
fn delete_message_is_author_only_soft_delete() {
    let author = user();
    let other = user();
    let mut room = group_of(author, vec![other]);

    let message = match room
        .send_message(message_id(), author, content("mine"), later(1))
        .unwrap()
    {
        RoomEvent::MessageSent { message, .. } => message,
        _ => unreachable!(),
    };

    let err = room.delete_message(message.id, other, later(2)).unwrap_err();
    assert_eq!(err, DomainError::OperationNotAllowed);

    let event = room.delete_message(message.id, author, later(2)).unwrap();
    assert!(matches!(event, RoomEvent::MessageDeleted { .. }));

    // 内容保留供审计，但删除后的消息对再次删除不可见
    assert!(room.messages().iter().any(|m| m.id == message.id && m.is_deleted()));
    let err = room.delete_message(message.id, author, later(3)).unwrap_err();
    assert_eq!(err, DomainError::MessageNotFound);
}

#[test]
fn recent_messages_are_newest_first_without_deleted() {
    let creator = user();
    let mut room = group_of(creator, vec![user()]);

    let mut ids = Vec::new();
    for i in 0..4 {
        let event = room
            .send_message(message_id(), creator, content("m"), later(i))
            .unwrap();
        if let RoomEvent::MessageSent { message, .. } = event {
            ids.push(message.id);
        }
    }
    room.delete_message(ids[3], creator, later(10)).unwrap();

    let recent = room.recent_messages(2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, ids[2]);
    assert_eq!(recent[1].id, ids[1]);
}

#[test]
fn restore_resumes_sequence_numbering() {
    let creator = user();
    let mut room = group_of(creator, vec![user()]);
    room.send_message(message_id(), creator, content("one"), later(1))
        .unwrap();
    room.send_message(message_id(), creator, content("two"), later(2))
        .unwrap();

    let mut restored = Room::restore(
        room.id(),
        room.name().to_owned(),
        room.room_type(),
        room.created_by(),
        room.participants().to_vec(),
        room.messages().to_vec(),
        room.created_at(),
        room.updated_at(),
    );
    let event = restored
        .send_message(message_id(), creator, content("three"), later(3))
        .unwrap();
    match event {
        RoomEvent::MessageSent { message, .. } => assert_eq!(message.seq, 3),
        _ => unreachable!(),
    }
}

#[test]
fn content_preview_and_length_classes() {
    let short = content("hello");
    assert!(short.is_short());
    assert!(!short.is_long());
    assert_eq!(short.preview(), "hello");

    let long = content(&"x".repeat(1000));
    assert!(long.is_long());
    let preview = long.preview();
    assert_eq!(preview.chars().count(), 101);
    assert!(preview.ends_with('…'));

    assert_eq!(MessageContent::new("  padded  ").unwrap().as_str(), "padded");
    assert!(MessageContent::new("x".repeat(5000)).is_ok());
}

#[test]
fn launch_team_scenario() {
    let u1 = user();
    let u2 = user();
    let u3 = user();
    let mut room =
        Room::create_group(room_id(), "Launch Team", u1, vec![u2, u3], t0()).unwrap();
    assert_eq!(room.participants().len(), 3);
    assert_eq!(room.name(), "Launch Team");

    let hello = match room
        .send_message(message_id(), u1, content("hello"), later(1))
        .unwrap()
    {
        RoomEvent::MessageSent { message, .. } => message,
        _ => unreachable!(),
    };
    assert_eq!(room.messages().len(), 1);
    assert_eq!(room.unread_count(u2).unwrap(), 1);
    assert_eq!(room.unread_count(u3).unwrap(), 1);
    assert_eq!(room.unread_count(u1).unwrap(), 0);

    room.mark_message_read(hello.id, u2).unwrap();
    assert_eq!(room.unread_count(u2).unwrap(), 0);

    room.remove_participant(u3, later(2)).unwrap();
    assert_eq!(room.participants().len(), 2);

    room.remove_participant(u1, later(3)).unwrap();
    let event = room.remove_participant(u2, later(4)).unwrap();
    assert!(matches!(
        event,
        RoomEvent::ParticipantLeft {
            room_deleted: true,
            ..
        }
    ));
}
