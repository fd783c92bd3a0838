//! End-to-end session tests: MockConnector → Player → MockDecoder.
//!
//! Everything above the socket runs for real — framer, queue, ingest and
//! playback tasks, orchestration — with the network and the decoder chip
//! mocked at the platform boundary.

#![allow(clippy::unwrap_used)]

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use platform::mocks::{MockConnector, MockDecoder, MockFlash};
use platform::ConnectionInfo;
use playback::{preset_url, ChunkQueue, Player, PlayerError, RadioStatus};
use store::testutil::PageBuilder;
use stream::ProtocolError;

fn remote() -> ConnectionInfo {
    ConnectionInfo {
        local: false,
        length: None,
    }
}

fn icy_stream() -> Vec<u8> {
    let mut body = Vec::from(
        b"ICY 200 OK\r\n\
icy-name:Blue Note FM\r\n\
icy-genre:Jazz\r\n\
icy-br:128\r\n\
icy-metaint:64\r\n\
content-type:audio/mpeg\r\n\
\r\n"
            .as_slice(),
    );
    body.extend_from_slice(&[0xA1u8; 64]);
    body.push(2); // 32-byte metadata block
    let mut block = [0u8; 32];
    let text = b"StreamTitle='So What';";
    block[..text.len()].copy_from_slice(text);
    body.extend_from_slice(&block);
    body.extend_from_slice(&[0xA2u8; 64]);
    body
}

#[tokio::test]
async fn icy_session_plays_audio_and_title() {
    let data = icy_stream();
    let mut connector = MockConnector::new();
    connector.route("http://radio.example/stream", &data, remote());
    // Fragment hard: every read returns at most 7 bytes.
    connector.set_max_read(7);

    let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
    let status: RadioStatus<NoopRawMutex> = RadioStatus::new();
    let mut player = Player::new(connector, MockDecoder::new(), &queue, &status);

    player.play("http://radio.example/stream").await.unwrap();

    let np = player.current_metadata();
    assert_eq!(np.station.as_str(), "Blue Note FM");
    assert_eq!(np.title.as_str(), "So What");
    assert!(queue.is_empty(), "playback drained the queue");
}

#[tokio::test]
async fn decoder_receives_exactly_the_audio_payload() {
    let data = icy_stream();
    let mut connector = MockConnector::new();
    connector.route("http://radio.example/stream", &data, remote());

    let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
    let status: RadioStatus<NoopRawMutex> = RadioStatus::new();
    let mut player = Player::new(connector, MockDecoder::new(), &queue, &status);

    player.play("http://radio.example/stream").await.unwrap();

    // 128 audio bytes; the metadata length byte and block never reach the
    // chip, and the session is bracketed by exactly one start/stop pair.
    let decoder = player.decoder();
    assert_eq!(decoder.data().len(), 128);
    assert!(decoder.data().iter().all(|&b| b == 0xA1 || b == 0xA2));
    assert_eq!(decoder.start_count(), 1);
    assert_eq!(decoder.stop_count(), 1);
}

#[tokio::test]
async fn playlist_hop_reaches_real_stream() {
    let playlist = b"HTTP/1.0 200 OK\r\n\
content-type:audio/x-scpls\r\n\
\r\n\
[playlist]\r\n\
File1=http://radio.example/live\r\n";
    let data = icy_stream();
    let mut connector = MockConnector::new();
    connector.route("http://radio.example/top.pls", playlist, remote());
    connector.route("http://radio.example/live", &data, remote());

    let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
    let status: RadioStatus<NoopRawMutex> = RadioStatus::new();
    let mut player = Player::new(connector, MockDecoder::new(), &queue, &status);

    player.play("http://radio.example/top.pls").await.unwrap();
    assert_eq!(player.current_metadata().station.as_str(), "Blue Note FM");
}

#[tokio::test]
async fn self_referential_playlist_terminates() {
    let playlist = b"HTTP/1.0 200 OK\r\n\
content-type:audio/x-scpls\r\n\
\r\n\
File1=http://radio.example/loop.pls\r\n";
    let mut connector = MockConnector::new();
    connector.route("http://radio.example/loop.pls", playlist, remote());

    let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
    let status: RadioStatus<NoopRawMutex> = RadioStatus::new();
    let mut player = Player::new(connector, MockDecoder::new(), &queue, &status);

    let result = player.play("http://radio.example/loop.pls").await;
    assert_eq!(
        result,
        Err(PlayerError::Protocol(ProtocolError::RunawayPlaylist))
    );
    assert!(!status.is_playing());
}

#[tokio::test]
async fn preset_resolves_then_plays() {
    let mut builder = PageBuilder::new(1);
    builder.put_u8(0, playback::PREF_NAMESPACE, 1);
    builder.put_str(1, "preset_00", "http://radio.example/stream");
    let image = builder.finish();
    let mut flash = MockFlash::new(&image);
    let url = preset_url(&mut flash, 0).unwrap().unwrap();

    let data = icy_stream();
    let mut connector = MockConnector::new();
    connector.route("http://radio.example/stream", &data, remote());

    let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
    let status: RadioStatus<NoopRawMutex> = RadioStatus::new();
    let mut player = Player::new(connector, MockDecoder::new(), &queue, &status);

    player.play(url.as_str()).await.unwrap();
    assert_eq!(player.current_metadata().station.as_str(), "Blue Note FM");
}

#[tokio::test]
async fn local_file_session_with_id3() {
    // ID3v2.3 tag with TIT2, then MPEG-looking audio, length declared.
    let mut tag_body = Vec::new();
    tag_body.extend_from_slice(b"TIT2");
    let text = b"\x00Take Five";
    tag_body.extend_from_slice(&(text.len() as u32).to_be_bytes());
    tag_body.extend_from_slice(&[0, 0]);
    tag_body.extend_from_slice(text);

    let size = tag_body.len() as u32;
    let mut file = Vec::from(b"ID3".as_slice());
    file.push(3);
    file.push(0);
    file.push(0);
    file.push(((size >> 21) & 0x7F) as u8);
    file.push(((size >> 14) & 0x7F) as u8);
    file.push(((size >> 7) & 0x7F) as u8);
    file.push((size & 0x7F) as u8);
    file.extend_from_slice(&tag_body);
    file.extend_from_slice(&[0xFFu8; 96]);

    let mut connector = MockConnector::new();
    connector.route(
        "/sd/jazz/take_five.mp3",
        &file,
        ConnectionInfo {
            local: true,
            length: Some(file.len() as u32),
        },
    );

    let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
    let status: RadioStatus<NoopRawMutex> = RadioStatus::new();
    let mut player = Player::new(connector, MockDecoder::new(), &queue, &status);

    player.play("/sd/jazz/take_five.mp3").await.unwrap();
    let np = player.current_metadata();
    assert_eq!(np.station.as_str(), "/sd/jazz/take_five.mp3");
    assert_eq!(np.title.as_str(), "Take Five");
}

#[tokio::test]
async fn stop_before_data_still_closes_cleanly() {
    let data = icy_stream();
    let mut connector = MockConnector::new();
    connector.route("http://radio.example/stream", &data, remote());

    let queue: ChunkQueue<NoopRawMutex> = ChunkQueue::new();
    let status: RadioStatus<NoopRawMutex> = RadioStatus::new();
    let mut player = Player::new(connector, MockDecoder::new(), &queue, &status);

    // A stop raised before the session clears when the session starts, so
    // this plays through; a stop raised by another task mid-session ends it
    // at the next read boundary (covered by the ingest unit tests).
    player.play("http://radio.example/stream").await.unwrap();
    player.stop();
    assert!(!status.is_playing());
}
