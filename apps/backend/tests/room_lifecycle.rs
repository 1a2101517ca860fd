//! Room lifecycle through the coordinator: lobby, joining, stakes, play to
//! settlement, pause negotiation, and connection churn.

mod support;

use support::{first_valid_action, harness, msgs_to, started_room, started_state, BET, GUEST, HOST};

use dealuxe_backend::domain::GameAction;
use dealuxe_backend::errors::DomainError;
use dealuxe_backend::services::rooms::RoomStatus;
use dealuxe_backend::store::WalletStore;
use dealuxe_backend::ws::ServerMsg;
use time::Duration;

#[tokio::test]
async fn create_and_join_produce_the_expected_frames() {
    let h = harness();
    let created = h.coordinator.create_room(HOST, None, BET).await.unwrap();
    let host_frames = msgs_to(&created, HOST);
    let ServerMsg::RoomCreated { room } = host_frames[0] else {
        panic!("expected room_created");
    };
    assert_eq!(room.status, RoomStatus::Waiting);
    assert_eq!(room.host_id, HOST);

    // The waiting room is listed for other players.
    let lobby = h.coordinator.get_lobby(GUEST);
    assert_eq!(lobby.len(), 1);
    assert_eq!(lobby[0].code, room.code);

    let joined = h.coordinator.join_room(GUEST, &room.code).await.unwrap();
    assert!(msgs_to(&joined, GUEST)
        .iter()
        .any(|m| matches!(m, ServerMsg::RoomJoined { .. })));
    assert!(msgs_to(&joined, HOST)
        .iter()
        .any(|m| matches!(m, ServerMsg::OpponentJoined { player_id, .. } if *player_id == GUEST)));
    // Both get the countdown.
    for player in [HOST, GUEST] {
        assert!(msgs_to(&joined, player)
            .iter()
            .any(|m| matches!(m, ServerMsg::GameStarting { .. })));
    }
}

#[tokio::test]
async fn create_requires_a_funded_wallet() {
    let h = harness();
    let err = h.coordinator.create_room(999, None, BET).await.unwrap_err();
    assert!(matches!(err, DomainError::InsufficientBalance(_)));
}

#[tokio::test]
async fn host_cannot_join_their_own_room() {
    let h = harness();
    let created = h.coordinator.create_room(HOST, None, BET).await.unwrap();
    let ServerMsg::RoomCreated { room } = &msgs_to(&created, HOST)[0] else {
        panic!("expected room_created");
    };
    assert!(h.coordinator.join_room(HOST, &room.code).await.is_err());
}

#[tokio::test]
async fn start_deducts_both_stakes_and_deals_seats() {
    let h = harness();
    let (_code, started) = started_room(&h).await;

    assert_eq!(h.wallet.balance(HOST, BET.bet_type).await.unwrap(), 900);
    assert_eq!(h.wallet.balance(GUEST, BET.bet_type).await.unwrap(), 900);

    let host_state = started_state(&started, HOST);
    let guest_state = started_state(&started, GUEST);
    // Each player sees their own six cards and only a count opposite.
    assert_eq!(host_state["players"][0]["hand"].as_array().unwrap().len(), 6);
    assert_eq!(host_state["players"][1]["hand_count"], 6);
    assert_eq!(guest_state["players"][1]["hand"].as_array().unwrap().len(), 6);
    assert_eq!(guest_state["players"][0]["hand_count"], 6);
    assert_eq!(host_state["deck_len"], 40);
}

#[tokio::test]
async fn start_match_is_idempotent() {
    let h = harness();
    let (code, _) = started_room(&h).await;
    let again = h.coordinator.start_match(&code).await.unwrap();
    assert!(again.is_empty());
    // Stakes were not deducted a second time.
    assert_eq!(h.wallet.balance(HOST, BET.bet_type).await.unwrap(), 900);
}

#[tokio::test]
async fn duplicate_submission_replays_the_cached_snapshot() {
    let h = harness();
    let (code, started) = started_room(&h).await;
    let action = first_valid_action(&started_state(&started, HOST));

    let first = h
        .coordinator
        .game_action(HOST, &code, action.clone(), Some("key-1"))
        .await
        .unwrap();
    // A fresh move fans out to both seats.
    assert_eq!(first.len(), 2);

    let replay = h
        .coordinator
        .game_action(HOST, &code, action, Some("key-1"))
        .await
        .unwrap();
    // A replay goes only to the submitter, with the cached snapshot.
    assert_eq!(replay.len(), 1);
    let ServerMsg::GameUpdate { state, .. } = &msgs_to(&replay, HOST)[0] else {
        panic!("expected game_update");
    };
    let first_update = msgs_to(&first, HOST);
    let ServerMsg::GameUpdate { state: original, .. } = first_update[0] else {
        panic!("expected game_update");
    };
    assert_eq!(state, original);
}

#[tokio::test]
async fn timeouts_drive_the_match_to_a_single_settlement() {
    let h = harness();
    let (code, _) = started_room(&h).await;

    // Nobody plays voluntarily: every deadline lapse scripts a fallback
    // move, which must eventually decide the game.
    let mut all_frames = Vec::new();
    let mut finished = false;
    for _ in 0..500 {
        h.clock.advance(Duration::seconds(301));
        let outs = h
            .coordinator
            .game_action(HOST, &code, GameAction::Draw, None)
            .await
            .unwrap();
        finished = outs
            .iter()
            .any(|o| matches!(o.msg, ServerMsg::GameOver { .. }));
        all_frames.extend(outs);
        if finished {
            break;
        }
    }
    assert!(finished, "scripted fallbacks never decided the game");

    let personals: Vec<_> = all_frames
        .iter()
        .filter_map(|o| match &o.msg {
            ServerMsg::GameOverPersonal {
                new_balance,
                winnings_awarded,
                ..
            } => Some((*new_balance, *winnings_awarded)),
            _ => None,
        })
        .collect();
    assert_eq!(personals.len(), 2);

    // Winner takes both stakes; the books balance.
    let host_balance = h.wallet.balance(HOST, BET.bet_type).await.unwrap();
    let guest_balance = h.wallet.balance(GUEST, BET.bet_type).await.unwrap();
    assert_eq!(host_balance + guest_balance, 2_000);
    assert!(
        (host_balance, guest_balance) == (1_100, 900)
            || (host_balance, guest_balance) == (900, 1_100)
    );
    let (host_record, guest_record) = (h.wallet.record(HOST), h.wallet.record(GUEST));
    assert_eq!(host_record.0 + guest_record.0, 1);
    assert_eq!(host_record.1 + guest_record.1, 1);

    // Further actions are soft errors and never re-settle.
    let after = h
        .coordinator
        .game_action(HOST, &code, GameAction::Draw, None)
        .await
        .unwrap();
    assert!(msgs_to(&after, HOST)
        .iter()
        .any(|m| matches!(m, ServerMsg::Error { .. })));
    assert_eq!(
        h.wallet.balance(HOST, BET.bet_type).await.unwrap(),
        host_balance
    );
}

#[tokio::test]
async fn pause_negotiation_gates_play() {
    let h = harness();
    let (code, started) = started_room(&h).await;

    let requested = h.coordinator.request_pause(HOST, &code).await.unwrap();
    assert!(msgs_to(&requested, HOST)
        .iter()
        .any(|m| matches!(m, ServerMsg::PauseRequestSent { .. })));
    assert!(msgs_to(&requested, GUEST)
        .iter()
        .any(|m| matches!(m, ServerMsg::PauseRequested { seat: 0, .. })));

    let approved = h
        .coordinator
        .approve_pause(GUEST, &code, true)
        .await
        .unwrap();
    for player in [HOST, GUEST] {
        assert!(msgs_to(&approved, player)
            .iter()
            .any(|m| matches!(m, ServerMsg::GamePaused { .. })));
    }

    // Paused: actions bounce.
    let action = first_valid_action(&started_state(&started, HOST));
    let blocked = h
        .coordinator
        .game_action(HOST, &code, action.clone(), None)
        .await
        .unwrap();
    assert!(msgs_to(&blocked, HOST)
        .iter()
        .any(|m| matches!(m, ServerMsg::Error { .. })));

    let resumed = h.coordinator.resume_game(GUEST, &code).await.unwrap();
    for player in [HOST, GUEST] {
        assert!(msgs_to(&resumed, player)
            .iter()
            .any(|m| matches!(m, ServerMsg::GameResumed { .. })));
    }
    let allowed = h
        .coordinator
        .game_action(HOST, &code, action, None)
        .await
        .unwrap();
    assert!(msgs_to(&allowed, HOST)
        .iter()
        .any(|m| matches!(m, ServerMsg::GameUpdate { .. })));
}

#[tokio::test]
async fn rejected_pause_leaves_the_match_running() {
    let h = harness();
    let (code, started) = started_room(&h).await;
    h.coordinator.request_pause(HOST, &code).await.unwrap();
    let rejected = h
        .coordinator
        .approve_pause(GUEST, &code, false)
        .await
        .unwrap();
    assert!(msgs_to(&rejected, HOST)
        .iter()
        .any(|m| matches!(m, ServerMsg::PauseRejected { .. })));

    let action = first_valid_action(&started_state(&started, HOST));
    let out = h
        .coordinator
        .game_action(HOST, &code, action, None)
        .await
        .unwrap();
    assert!(msgs_to(&out, HOST)
        .iter()
        .any(|m| matches!(m, ServerMsg::GameUpdate { .. })));
}

#[tokio::test]
async fn disconnect_and_reconnect_notify_the_opponent() {
    let h = harness();
    let (code, _) = started_room(&h).await;

    let dropped = h.coordinator.disconnect(GUEST).await;
    assert!(msgs_to(&dropped, HOST)
        .iter()
        .any(|m| matches!(m, ServerMsg::OpponentDisconnected { seat: 1, .. })));

    let rejoined = h.coordinator.reconnect(GUEST, &code).await.unwrap();
    let guest_frames = msgs_to(&rejoined, GUEST);
    let ServerMsg::GameStarted {
        your_seat, state, ..
    } = guest_frames[0]
    else {
        panic!("expected a snapshot resend");
    };
    assert_eq!(*your_seat, 1);
    // The resent snapshot still masks the opponent.
    assert_eq!(state["players"][0]["hand_count"], 6);
    assert!(msgs_to(&rejoined, HOST)
        .iter()
        .any(|m| matches!(m, ServerMsg::OpponentReconnected { seat: 1, .. })));
}

#[tokio::test]
async fn reconnect_to_a_waiting_room_is_refused() {
    let h = harness();
    let created = h.coordinator.create_room(HOST, None, BET).await.unwrap();
    let ServerMsg::RoomCreated { room } = &msgs_to(&created, HOST)[0] else {
        panic!("expected room_created");
    };
    let err = h.coordinator.reconnect(HOST, &room.code).await.unwrap_err();
    assert!(matches!(err, DomainError::SessionNotFound(_)));
    assert!(matches!(
        h.coordinator.reconnect(HOST, "NOSUCH").await.unwrap_err(),
        DomainError::RoomNotFound(_)
    ));
}

#[tokio::test]
async fn stale_waiting_rooms_fall_out_of_the_lobby() {
    let h = harness();
    h.coordinator.create_room(HOST, None, BET).await.unwrap();
    assert_eq!(h.coordinator.get_lobby(GUEST).len(), 1);

    h.clock.advance(Duration::hours(6));
    assert!(h.coordinator.get_lobby(GUEST).is_empty());

    // The expiry sticks: the room is abandoned, not merely hidden.
    let created = h.coordinator.create_room(HOST, None, BET).await.unwrap();
    let ServerMsg::RoomCreated { room } = &msgs_to(&created, HOST)[0] else {
        panic!("expected room_created");
    };
    assert_eq!(h.coordinator.get_lobby(GUEST).len(), 1);
    assert_eq!(h.coordinator.get_lobby(GUEST)[0].code, room.code);
}
